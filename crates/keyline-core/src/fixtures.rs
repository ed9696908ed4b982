use uuid::Uuid;

use crate::{
    animation::AnimationSet,
    clip::{AnimationClip, DEFAULT_ANIMATION_LAYER},
    curve::CurveKind,
    document::ControllerState,
    host::HostAtom,
    target::{AnimationTarget, ChannelSet},
    transform::{Quaternion, Transform, Vector3},
};

pub const DEMO_ATOM_TYPE: &str = "Person";

/// Person-like entity with a root controller, three animatable controllers
/// and one controller no demo clip touches.
#[must_use]
pub fn demo_host() -> HostAtom {
    let rest = |y: f32| ControllerState::new(1, 1, Transform::new(Vector3::new(0.0, y, 0.0), Quaternion::IDENTITY));
    HostAtom::new(DEMO_ATOM_TYPE)
        .with_controller("control", rest(0.0))
        .with_controller("hipControl", rest(1.0))
        .with_controller("headControl", rest(1.6))
        .with_controller("lHandControl", rest(1.1))
        .with_controller("rFootControl", rest(0.1))
}

/// Three clips on the main layer: a looping idle, a walk that hands over to
/// the idle, and an auto transition between them. A second layer blinks.
#[must_use]
pub fn demo_animation() -> AnimationSet {
    let idle = idle_clip();
    let walk = walk_clip();

    let mut transition = AnimationClip::new("Idle to Walk", DEFAULT_ANIMATION_LAYER, 0.5)
        .expect("fixture transition length should be valid");
    transition.id = fixed_id("0b8f6f0e-9a53-4d16-9d61-6f03d3f5c7a2");
    transition.auto_transition_previous = true;
    transition.auto_transition_next = true;
    transition
        .add_target(AnimationTarget::controller("hipControl", ChannelSet::Position))
        .expect("fixture transition target should add");

    let mut blink = AnimationClip::new("Blink", "Face", 1.0).expect("fixture blink length should be valid");
    blink.id = fixed_id("d3c1b0a4-52e8-4c0e-a0c7-0f6f4f0ff4b1");
    blink.set_loop(true);
    blink
        .add_target(AnimationTarget::float_param("geometry", "Eyes Closed"))
        .expect("fixture morph target should add");
    blink
        .set_keyframe("geometry/Eyes Closed", 0.5, &[1.0], CurveKind::Linear)
        .expect("fixture blink key should insert");

    let mut set = AnimationSet::from_clips(vec![idle, transition, walk, blink])
        .expect("fixture clips should be valid");
    set.rebuild_transitions();
    set.dispatch_target_events();
    set
}

fn idle_clip() -> AnimationClip {
    let mut idle = AnimationClip::new("Idle", DEFAULT_ANIMATION_LAYER, 4.0)
        .expect("fixture idle length should be valid");
    idle.id = fixed_id("5f0ad0f2-3f55-4b39-8f1e-3fbc1e9b0b7d");
    idle.set_loop(true);
    idle.add_target(AnimationTarget::controller("hipControl", ChannelSet::Position))
        .expect("fixture hip target should add");
    idle.add_target(AnimationTarget::controller("headControl", ChannelSet::Rotation))
        .expect("fixture head target should add");
    idle.add_target(AnimationTarget::float_param("geometry", "Smile"))
        .expect("fixture smile target should add");

    for (time, height) in [(0.0, 1.0), (2.0, 0.97), (4.0, 1.0)] {
        idle.set_transform_keyframe(
            "hipControl",
            time,
            Transform::new(Vector3::new(0.0, height, 0.0), Quaternion::IDENTITY),
            CurveKind::Smooth,
        )
        .expect("fixture hip key should insert");
    }
    idle.set_keyframe("headControl", 1.0, &[0.0, 0.087, 0.0, 0.996], CurveKind::Smooth)
        .expect("fixture head key should insert");
    idle.set_keyframe("headControl", 3.0, &[0.0, -0.087, 0.0, 0.996], CurveKind::Smooth)
        .expect("fixture head key should insert");
    idle.set_keyframe("geometry/Smile", 2.0, &[0.35], CurveKind::Linear)
        .expect("fixture smile key should insert");
    idle
}

fn walk_clip() -> AnimationClip {
    let mut walk = AnimationClip::new("Walk", DEFAULT_ANIMATION_LAYER, 2.0)
        .expect("fixture walk length should be valid");
    walk.id = fixed_id("8f7c1b5e-0a0f-4a57-9c43-8b7b9a0c2d11");
    walk.next_animation_name = Some("Idle".to_string());
    walk.add_target(AnimationTarget::controller("hipControl", ChannelSet::Position))
        .expect("fixture hip target should add");
    walk.add_target(AnimationTarget::controller("lHandControl", ChannelSet::Position))
        .expect("fixture hand target should add");

    for (time, x) in [(0.0, 0.0), (0.5, 0.25), (1.0, 0.5), (1.5, 0.75), (2.0, 1.0)] {
        walk.set_keyframe("hipControl", time, &[x, 1.0, 0.0], CurveKind::Linear)
            .expect("fixture hip key should insert");
    }
    walk.set_keyframe("lHandControl", 0.5, &[0.3, 1.2, 0.2], CurveKind::Bounce)
        .expect("fixture hand key should insert");
    walk.set_keyframe("lHandControl", 1.5, &[0.3, 1.0, -0.2], CurveKind::Bounce)
        .expect("fixture hand key should insert");
    walk
}

fn fixed_id(raw: &str) -> Uuid {
    Uuid::parse_str(raw).expect("fixture id should be valid")
}

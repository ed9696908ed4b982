use keyline_core::{
    AnimationClip, AnimationTarget, ChannelSet, ClipError, CurveKind, DEFAULT_ANIMATION_LAYER,
    Quaternion, ResizeMode, TargetValue, Transform, Vector3,
};

fn walk_clip() -> AnimationClip {
    let mut clip =
        AnimationClip::new("Walk", DEFAULT_ANIMATION_LAYER, 2.0).expect("clip length should be valid");
    clip.add_target(AnimationTarget::controller("hipControl", ChannelSet::Position))
        .expect("target should add");
    clip.set_keyframe("hipControl", 1.0, &[0.5, 1.0, 0.0], CurveKind::Linear)
        .expect("keyframe should insert");
    clip
}

fn hip_times(clip: &AnimationClip) -> Vec<f32> {
    clip.target("hipControl")
        .expect("target exists")
        .keyframe_times()
        .collect()
}

#[test]
fn non_positive_lengths_are_rejected() {
    for length in [0.0, -1.0, f32::NAN, f32::INFINITY] {
        assert!(matches!(
            AnimationClip::new("Broken", DEFAULT_ANIMATION_LAYER, length),
            Err(ClipError::InvalidLength(_))
        ));
    }
}

#[test]
fn unknown_targets_are_reported() {
    let mut clip = walk_clip();
    let error = clip
        .set_keyframe("tailControl", 1.0, &[0.0, 0.0, 0.0], CurveKind::Linear)
        .expect_err("missing target should be reported");
    assert!(matches!(error, ClipError::TargetNotFound { .. }));
    assert!(clip.remove_target("tailControl").is_err());
}

#[test]
fn transform_targets_keep_seven_synchronized_curves() {
    let mut clip = AnimationClip::new("Turn", DEFAULT_ANIMATION_LAYER, 1.0)
        .expect("clip length should be valid");
    clip.add_target(AnimationTarget::controller("headControl", ChannelSet::Transform))
        .expect("target should add");
    clip.set_transform_keyframe(
        "headControl",
        0.5,
        Transform::new(Vector3::new(0.0, 1.6, 0.0), Quaternion::new(0.0, 0.0, 0.0, 2.0)),
        CurveKind::Smooth,
    )
    .expect("keyframe should insert");

    let target = clip.target("headControl").expect("target exists");
    assert_eq!(target.curves().len(), 7);
    for curve in target.curves() {
        assert_eq!(curve.len(), 3);
    }
    let w = target.curves()[6].keys()[1].value;
    assert!((w - 1.0).abs() < 1e-6, "rotation should be stored normalized");
    clip.validate().expect("clip should validate");
}

#[test]
fn extend_holds_the_final_pose() {
    let mut clip = walk_clip();
    let end = clip.evaluate(2.0);
    clip.resize(3.0, ResizeMode::CropOrExtend)
        .expect("resize should succeed");
    assert_eq!(hip_times(&clip), vec![0.0, 1.0, 2.0, 3.0]);
    assert_eq!(clip.evaluate(3.0), end);
    clip.validate().expect("extended clip should validate");
}

#[test]
fn invalid_resize_changes_nothing() {
    let mut clip = walk_clip();
    assert!(clip.resize(-2.0, ResizeMode::Stretch).is_err());
    assert!((clip.animation_length() - 2.0).abs() < f32::EPSILON);
    assert_eq!(hip_times(&clip), vec![0.0, 1.0, 2.0]);
}

#[test]
fn linear_segments_interpolate_between_keys() {
    let mut clip = walk_clip();
    clip.set_keyframe("hipControl", 0.0, &[0.0, 1.0, 0.0], CurveKind::Linear)
        .expect("keyframe should update");
    let samples = clip.evaluate(0.5);
    let TargetValue::Position(position) = samples[0].value else {
        panic!("hip target should sample a position");
    };
    assert!((position.x - 0.25).abs() < 1e-4);
}

#[test]
fn keyframe_counts_merge_frames_across_targets() {
    let mut clip = walk_clip();
    clip.add_target(AnimationTarget::float_param("geometry", "Smile"))
        .expect("target should add");
    clip.set_keyframe("geometry/Smile", 1.0002, &[0.4], CurveKind::Linear)
        .expect("keyframe should insert");
    clip.set_keyframe("geometry/Smile", 1.5, &[0.2], CurveKind::Linear)
        .expect("keyframe should insert");

    assert_eq!(clip.all_keyframe_times(), vec![0.0, 1.0, 1.5, 2.0]);
    assert_eq!(clip.keyframe_count(), 4);
}

#[test]
fn loaded_clips_get_fresh_ids_and_no_pending_events() {
    let clip = walk_clip();
    let json = serde_json::to_string(&clip).expect("clip should serialize");
    let mut restored: AnimationClip = serde_json::from_str(&json).expect("clip should deserialize");

    restored.prepare_after_load().expect("restored clip should validate");
    assert_ne!(restored.id, clip.id);
    assert_ne!(restored.targets()[0].id, clip.targets()[0].id);
    assert!(restored.drain_target_events().is_empty());
}

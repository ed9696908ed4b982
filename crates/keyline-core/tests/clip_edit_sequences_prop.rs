use keyline_core::{
    AnimationClip, AnimationSet, AnimationTarget, ChannelSet, Clipboard, CurveKind,
    DEFAULT_ANIMATION_LAYER, ResizeMode, SelectionRange, bulk, fixtures::demo_animation,
    is_same_frame,
};
use proptest::prelude::*;

const HIP: &str = "hipControl";
const SMILE: &str = "geometry/Smile";

#[derive(Debug, Clone)]
enum Edit {
    Key { time: f32, value: f32, kind: CurveKind },
    Resize { length: f32, stretch: bool },
    Copy { start: f32, end: f32 },
    Cut { start: f32, end: f32 },
    Delete { start: f32, end: f32 },
    Paste { at: f32 },
    ChangeCurve { start: f32, end: f32, kind: CurveKind },
    Loop(bool),
}

fn kind() -> impl Strategy<Value = CurveKind> {
    prop_oneof![
        Just(CurveKind::Smooth),
        Just(CurveKind::Linear),
        Just(CurveKind::Constant),
        Just(CurveKind::Flat),
        Just(CurveKind::Bounce),
        Just(CurveKind::CopyPrevious),
    ]
}

fn edit() -> impl Strategy<Value = Edit> {
    prop_oneof![
        4 => (0.0f32..4.0, -5.0f32..5.0, kind())
            .prop_map(|(time, value, kind)| Edit::Key { time, value, kind }),
        2 => (0.001f32..4.0, any::<bool>())
            .prop_map(|(length, stretch)| Edit::Resize { length, stretch }),
        1 => (0.0f32..4.0, 0.0f32..4.0).prop_map(|(start, end)| Edit::Copy { start, end }),
        1 => (0.0f32..4.0, 0.0f32..4.0).prop_map(|(start, end)| Edit::Cut { start, end }),
        1 => (0.0f32..4.0, 0.0f32..4.0).prop_map(|(start, end)| Edit::Delete { start, end }),
        2 => (0.0f32..4.0).prop_map(|at| Edit::Paste { at }),
        1 => (0.0f32..4.0, 0.0f32..4.0, kind())
            .prop_map(|(start, end, kind)| Edit::ChangeCurve { start, end, kind }),
        1 => any::<bool>().prop_map(Edit::Loop),
    ]
}

fn edited_clip() -> AnimationClip {
    let mut clip = AnimationClip::new("Edit", DEFAULT_ANIMATION_LAYER, 2.0)
        .expect("clip length should be valid");
    clip.add_target(AnimationTarget::controller(HIP, ChannelSet::Position))
        .expect("hip target should add");
    clip.add_target(AnimationTarget::float_param("geometry", "Smile"))
        .expect("smile target should add");
    clip
}

fn apply(clip: &mut AnimationClip, clipboard: &mut Clipboard, edit: &Edit) {
    let length = clip.animation_length();
    match *edit {
        Edit::Key { time, value, kind } => {
            // Out-of-range times are refused; the clip must stay valid either way.
            let _ = clip.set_keyframe(HIP, time, &[value, 1.0, -value], kind);
            let _ = clip.set_keyframe(SMILE, time, &[value], kind);
        }
        Edit::Resize { length, stretch } => {
            let mode = if stretch {
                ResizeMode::Stretch
            } else {
                ResizeMode::CropOrExtend
            };
            clip.resize(length, mode).expect("positive lengths resize");
        }
        Edit::Copy { start, end } => {
            bulk::copy(clip, SelectionRange::new(start, end, length), clipboard);
        }
        Edit::Cut { start, end } => {
            bulk::cut(clip, SelectionRange::new(start, end, length), clipboard);
        }
        Edit::Delete { start, end } => {
            bulk::delete(clip, SelectionRange::new(start, end, length));
        }
        Edit::Paste { at } => {
            bulk::paste(clip, clipboard, at);
        }
        Edit::ChangeCurve { start, end, kind } => {
            bulk::change_curve(clip, SelectionRange::new(start, end, length), kind);
        }
        Edit::Loop(looping) => clip.set_loop(looping),
    }
}

fn assert_sorted_and_unique(clip: &AnimationClip) -> Result<(), TestCaseError> {
    for target in clip.targets() {
        for curve in target.curves() {
            for pair in curve.keys().windows(2) {
                prop_assert!(pair[0].time < pair[1].time, "{} keys out of order", target.name());
                prop_assert!(
                    !is_same_frame(pair[0].time, pair[1].time),
                    "{} keys share a frame at {}",
                    target.name(),
                    pair[1].time
                );
            }
        }
    }
    Ok(())
}

proptest! {
    #![proptest_config(ProptestConfig {
        cases: 128,
        .. ProptestConfig::default()
    })]

    #[test]
    fn edit_sequences_keep_clips_valid_and_loadable(edits in prop::collection::vec(edit(), 1..24)) {
        let mut clip = edited_clip();
        let mut clipboard = Clipboard::new();

        for edit in &edits {
            apply(&mut clip, &mut clipboard, edit);

            prop_assert!(clip.validate().is_ok(), "invalid after {:?}: {:?}", edit, clip.validate());
            assert_sorted_and_unique(&clip)?;

            let json = serde_json::to_string(&clip).expect("clip should serialize");
            let loaded: Result<AnimationClip, _> = serde_json::from_str(&json);
            prop_assert!(loaded.is_ok(), "reload failed after {:?}: {:?}", edit, loaded.as_ref().err());
            if let Ok(loaded) = loaded {
                prop_assert_eq!(loaded.all_keyframe_times().len(), clip.all_keyframe_times().len());
            }
        }
    }

    #[test]
    fn transition_rebuilds_after_edits_keep_every_clip_valid(
        edits in prop::collection::vec(edit(), 1..12),
    ) {
        let mut set: AnimationSet = demo_animation();
        let mut clipboard = Clipboard::new();

        for edit in &edits {
            if let Some(walk) = set.clip_mut("Walk") {
                apply_to_demo(walk, &mut clipboard, edit);
            }
            set.rebuild_transitions();

            for clip in set.clips() {
                prop_assert!(
                    clip.validate().is_ok(),
                    "{} invalid after {:?}",
                    clip.animation_name,
                    edit
                );
                assert_sorted_and_unique(clip)?;
            }
        }
    }
}

/// The demo Walk clip animates the hip and the left hand; float edits are
/// routed to the hand instead.
fn apply_to_demo(clip: &mut AnimationClip, clipboard: &mut Clipboard, edit: &Edit) {
    if let Edit::Key { time, value, kind } = *edit {
        let _ = clip.set_keyframe(HIP, time, &[value, 1.0, 0.0], kind);
        let _ = clip.set_keyframe("lHandControl", time, &[0.3, value, 0.0], kind);
    } else {
        apply(clip, clipboard, edit);
    }
}

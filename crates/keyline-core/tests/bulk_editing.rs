use keyline_core::{
    AnimationClip, AnimationTarget, ChannelSet, Clipboard, CurveKind, DEFAULT_ANIMATION_LAYER,
    Engine, HostAtom, SelectionRange, bulk,
};

const SMILE: &str = "geometry/Smile";

fn smile_clip(length: f32, keys: &[(f32, f32)]) -> AnimationClip {
    let mut clip =
        AnimationClip::new("Edit", DEFAULT_ANIMATION_LAYER, length).expect("clip length should be valid");
    clip.add_target(AnimationTarget::float_param("geometry", "Smile"))
        .expect("target should add");
    for (time, value) in keys {
        clip.set_keyframe(SMILE, *time, &[*value], CurveKind::Linear)
            .expect("keyframe should insert");
    }
    clip
}

fn hip_clip(length: f32, times: &[f32]) -> AnimationClip {
    let mut clip =
        AnimationClip::new("Walk", DEFAULT_ANIMATION_LAYER, length).expect("clip length should be valid");
    clip.add_target(AnimationTarget::controller("hipControl", ChannelSet::Position))
        .expect("target should add");
    for time in times {
        clip.set_keyframe("hipControl", *time, &[*time, 1.0, 0.0], CurveKind::Smooth)
            .expect("keyframe should insert");
    }
    clip
}

fn times(clip: &AnimationClip, target: &str) -> Vec<f32> {
    clip.target(target)
        .expect("target should exist")
        .keyframe_times()
        .collect()
}

#[test]
fn cut_removes_interior_keys_and_fills_clipboard() {
    let mut clip = smile_clip(5.0, &[(2.0, 0.8)]);
    let mut clipboard = Clipboard::new();

    let report = bulk::cut(&mut clip, SelectionRange::new(1.0, 3.0, 5.0), &mut clipboard);

    assert!(report.is_clean());
    assert_eq!(report.copied, 1);
    assert_eq!(report.deleted, 1);
    assert_eq!(times(&clip, SMILE), vec![0.0, 5.0]);
    assert_eq!(clipboard.entries.len(), 1);
    assert!((clipboard.time - 1.0).abs() < f32::EPSILON);
    assert!((clipboard.entries[0].time - 2.0).abs() < f32::EPSILON);
    let snapshot = clipboard.entries[0]
        .snapshot(SMILE)
        .expect("clipboard should hold the smile frame");
    assert!((snapshot.keys[0].value - 0.8).abs() < f32::EPSILON);
}

#[test]
fn full_range_delete_keeps_both_endpoints() {
    let mut clip = smile_clip(5.0, &[(1.0, 0.2), (2.0, 0.4), (4.0, 0.6)]);

    let report = bulk::delete(&mut clip, SelectionRange::full(5.0));

    assert_eq!(report.deleted, 3);
    assert_eq!(report.skipped_protected, 2);
    assert_eq!(times(&clip, SMILE), vec![0.0, 5.0]);
}

#[test]
fn delete_leaves_the_clipboard_alone() {
    let mut clip = smile_clip(5.0, &[(2.0, 0.8), (3.0, 0.1)]);
    let mut clipboard = Clipboard::new();
    bulk::copy(&mut clip, SelectionRange::new(1.5, 2.5, 5.0), &mut clipboard);
    assert_eq!(clipboard.snapshot_count(), 1);

    bulk::delete(&mut clip, SelectionRange::new(2.5, 3.5, 5.0));

    assert_eq!(clipboard.snapshot_count(), 1);
    assert_eq!(times(&clip, SMILE), vec![0.0, 2.0, 5.0]);
}

#[test]
fn every_copy_starts_a_fresh_clipboard() {
    let mut clip = smile_clip(5.0, &[(1.0, 0.2), (4.0, 0.6)]);
    let mut clipboard = Clipboard::new();
    bulk::copy(&mut clip, SelectionRange::new(0.5, 1.5, 5.0), &mut clipboard);
    bulk::copy(&mut clip, SelectionRange::new(3.5, 4.5, 5.0), &mut clipboard);

    assert_eq!(clipboard.entries.len(), 1);
    assert!((clipboard.entries[0].time - 4.0).abs() < f32::EPSILON);
    assert!((clipboard.time - 3.5).abs() < f32::EPSILON);
}

#[test]
fn paste_keeps_offsets_from_the_range_start() {
    let mut clip = smile_clip(5.0, &[(2.0, 0.8)]);
    let mut clipboard = Clipboard::new();
    bulk::copy(&mut clip, SelectionRange::new(1.0, 3.0, 5.0), &mut clipboard);

    let report = bulk::paste(&mut clip, &clipboard, 3.0);

    assert_eq!(report.applied, 1);
    assert_eq!(report.out_of_range, 0);
    assert_eq!(times(&clip, SMILE), vec![0.0, 2.0, 4.0, 5.0]);
    let value = clip.target(SMILE).expect("target exists").lead_curve().keys()[2].value;
    assert!((value - 0.8).abs() < f32::EPSILON);
}

#[test]
fn paste_past_the_end_is_skipped_and_never_grows_the_clip() {
    let mut clip = smile_clip(5.0, &[(2.0, 0.8)]);
    let mut clipboard = Clipboard::new();
    bulk::copy(&mut clip, SelectionRange::new(1.0, 3.0, 5.0), &mut clipboard);

    let report = bulk::paste(&mut clip, &clipboard, 4.5);

    assert_eq!(report.applied, 0);
    assert_eq!(report.out_of_range, 1);
    assert!((clip.animation_length() - 5.0).abs() < f32::EPSILON);
    assert_eq!(times(&clip, SMILE), vec![0.0, 2.0, 5.0]);
}

#[test]
fn paste_reports_targets_the_clip_lacks() {
    let mut source = smile_clip(5.0, &[(2.0, 0.8)]);
    let mut clipboard = Clipboard::new();
    bulk::copy(&mut source, SelectionRange::new(1.0, 3.0, 5.0), &mut clipboard);

    let mut destination = hip_clip(5.0, &[]);
    let report = bulk::paste(&mut destination, &clipboard, 1.0);

    assert_eq!(report.applied, 0);
    assert_eq!(report.missing_targets, vec![SMILE.to_string()]);
}

#[test]
fn only_selected_targets_are_edited_when_any_are_selected() {
    let mut clip = smile_clip(5.0, &[(2.0, 0.8)]);
    clip.add_target(AnimationTarget::float_param("geometry", "Frown"))
        .expect("target should add");
    clip.set_keyframe("geometry/Frown", 2.0, &[0.3], CurveKind::Linear)
        .expect("keyframe should insert");
    clip.set_target_selected("geometry/Frown", true)
        .expect("target exists");

    let report = bulk::delete(&mut clip, SelectionRange::new(1.0, 3.0, 5.0));

    assert_eq!(report.targets, 1);
    assert_eq!(times(&clip, SMILE), vec![0.0, 2.0, 5.0]);
    assert_eq!(times(&clip, "geometry/Frown"), vec![0.0, 5.0]);
}

#[test]
fn change_curve_skips_the_first_and_last_keys() {
    let mut clip = hip_clip(4.0, &[1.0, 2.0, 3.0]);

    let report = bulk::change_curve(&mut clip, SelectionRange::full(4.0), CurveKind::Constant);

    assert_eq!(report.changed, 3);
    let kinds: Vec<CurveKind> = clip
        .target("hipControl")
        .expect("target exists")
        .lead_curve()
        .keys()
        .iter()
        .map(|key| key.kind)
        .collect();
    assert_eq!(
        kinds,
        vec![
            CurveKind::Smooth,
            CurveKind::Constant,
            CurveKind::Constant,
            CurveKind::Constant,
            CurveKind::Smooth,
        ]
    );
}

#[test]
fn change_curve_on_endpoints_only_is_a_no_op() {
    let mut clip = hip_clip(4.0, &[2.0]);
    let before = clip.target("hipControl").expect("target exists").revision();

    let report = bulk::change_curve(&mut clip, SelectionRange::new(3.5, 4.0, 4.0), CurveKind::Flat);

    assert_eq!(report.changed, 0);
    assert!(report.is_clean());
    assert_eq!(clip.target("hipControl").expect("target exists").revision(), before);
}

#[test]
fn change_curve_ignores_float_targets() {
    let mut clip = smile_clip(5.0, &[(2.0, 0.8)]);

    let report = bulk::change_curve(&mut clip, SelectionRange::full(5.0), CurveKind::Constant);

    assert_eq!(report.targets, 0);
    assert_eq!(report.changed, 0);
    let kind = clip.target(SMILE).expect("target exists").lead_curve().keys()[1].kind;
    assert_eq!(kind, CurveKind::Linear);
}

#[test]
fn each_bulk_edit_notifies_once_per_target() {
    let mut clip = smile_clip(5.0, &[(1.0, 0.1), (2.0, 0.2), (3.0, 0.3)]);
    clip.drain_target_events();

    bulk::delete(&mut clip, SelectionRange::full(5.0));

    let events = clip.drain_target_events();
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].0, SMILE);
}

#[test]
fn engine_selection_follows_the_playhead() {
    let mut engine = Engine::new(HostAtom::new("Person"));
    engine
        .animation_mut()
        .current_mut()
        .add_target(AnimationTarget::float_param("geometry", "Smile"))
        .expect("target should add");
    engine
        .animation_mut()
        .current_mut()
        .set_keyframe(SMILE, 1.0, &[0.5], CurveKind::Linear)
        .expect("keyframe should insert");

    engine.animation_mut().set_clip_time(0.5);
    engine.mark_selection_start();
    engine.animation_mut().set_clip_time(1.5);
    let range = engine.mark_selection_end();
    assert!((range.start - 0.5).abs() < f32::EPSILON);
    assert!((range.end - 1.5).abs() < f32::EPSILON);

    let summary = engine.selection_summary();
    assert_eq!(summary.total_keyframes(), 1);
    assert!(summary.to_string().contains("- geometry/Smile: 1 keyframes"));

    let report = engine.cut();
    assert_eq!(report.deleted, 1);

    engine.animation_mut().set_clip_time(1.0);
    let pasted = engine.paste();
    assert_eq!(pasted.applied, 1);
    let times: Vec<f32> = engine
        .animation()
        .current()
        .target(SMILE)
        .expect("target exists")
        .keyframe_times()
        .collect();
    assert_eq!(times, vec![0.0, 1.5, 2.0]);
}

#[test]
fn unknown_curve_names_are_rejected_by_the_engine() {
    let mut engine = Engine::new(HostAtom::new("Person"));
    assert!(engine.change_curve_by_name("Wobbly").is_err());
    assert!(engine.change_curve_by_name("Copy Previous").is_ok());
}

//! Range-based editing across the targets of one clip.
//!
//! Every function here is stateless: the clip, the selection range and the
//! session clipboard are passed in. Each target is edited inside a single
//! bulk-update scope, so listeners see one notification per target. Work is
//! best-effort across targets; a target whose edit fails is restored to the
//! curves it had before the call.

use std::fmt;

use serde::{Deserialize, Serialize};
use tracing::{debug, info, instrument, warn};

use crate::{
    clip::{AnimationClip, PasteReport},
    clipboard::Clipboard,
    curve::{CurveError, CurveKind},
    target::TargetError,
    time::{FRAME_TOLERANCE, is_same_frame},
};

/// Inclusive time range, `start <= end`, inside the clip.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SelectionRange {
    pub start: f32,
    pub end: f32,
}

impl SelectionRange {
    #[must_use]
    pub fn new(start: f32, end: f32, length: f32) -> Self {
        let mut range = Self {
            start: start.min(end),
            end: start.max(end),
        };
        range.clamp_to(length);
        range
    }

    #[must_use]
    pub fn full(length: f32) -> Self {
        Self::new(0.0, length, length)
    }

    #[must_use]
    pub fn contains(&self, time: f32) -> bool {
        time >= self.start - FRAME_TOLERANCE && time <= self.end + FRAME_TOLERANCE
    }

    pub fn mark_start(&mut self, time: f32) {
        self.start = time.max(0.0);
        if self.end < self.start {
            self.end = self.start;
        }
    }

    pub fn mark_end(&mut self, time: f32) {
        self.end = time.max(0.0);
        if self.start > self.end {
            self.start = self.end;
        }
    }

    /// Pulls the range back inside `[0, length]` after the clip changed.
    pub fn clamp_to(&mut self, length: f32) {
        let length = length.max(0.0);
        self.start = self.start.clamp(0.0, length);
        self.end = self.end.clamp(0.0, length);
        if self.start > self.end {
            self.start = self.end;
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct BulkFailure {
    pub target: String,
    pub error: TargetError,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct BulkReport {
    pub targets: usize,
    pub copied: usize,
    pub deleted: usize,
    pub changed: usize,
    pub skipped_protected: usize,
    pub failures: Vec<BulkFailure>,
}

impl BulkReport {
    #[must_use]
    pub fn is_clean(&self) -> bool {
        self.failures.is_empty()
    }
}

/// Copies and/or deletes every keyframe inside `range` on the
/// all-or-selected targets of `clip`.
///
/// Copying clears the clipboard and anchors it at `range.start`. Keys at
/// 0 and at the clip length are never deleted; they are counted in
/// [`BulkReport::skipped_protected`].
#[instrument(skip(clip, clipboard), fields(clip = %clip.animation_name))]
pub fn copy_delete_selected(
    clip: &mut AnimationClip,
    range: SelectionRange,
    clipboard: &mut Clipboard,
    copy: bool,
    delete: bool,
) -> BulkReport {
    scan_range(clip, range, copy.then_some(clipboard), delete)
}

pub fn copy(clip: &mut AnimationClip, range: SelectionRange, clipboard: &mut Clipboard) -> BulkReport {
    copy_delete_selected(clip, range, clipboard, true, false)
}

pub fn cut(clip: &mut AnimationClip, range: SelectionRange, clipboard: &mut Clipboard) -> BulkReport {
    copy_delete_selected(clip, range, clipboard, true, true)
}

/// Deletes without touching the clipboard.
#[instrument(skip(clip), fields(clip = %clip.animation_name))]
pub fn delete(clip: &mut AnimationClip, range: SelectionRange) -> BulkReport {
    scan_range(clip, range, None, true)
}

fn scan_range(
    clip: &mut AnimationClip,
    range: SelectionRange,
    mut clipboard: Option<&mut Clipboard>,
    delete: bool,
) -> BulkReport {
    let length = clip.animation_length();
    let mut report = BulkReport::default();
    if let Some(clipboard) = clipboard.as_deref_mut() {
        clipboard.clear();
        clipboard.time = range.start;
    }

    let indices = clip.all_or_selected_indices();
    let targets = clip.targets_mut();
    for index in indices {
        let target = &mut targets[index];
        report.targets += 1;
        let checkpoint = target.checkpoint();
        let mut scope = target.bulk_updates();

        // Descending, so deleting a key never shifts one still to visit.
        let matches: Vec<(usize, f32)> = scope
            .keyframe_times()
            .enumerate()
            .rev()
            .filter(|(_, time)| range.contains(*time))
            .collect();

        let mut deleted = 0;
        let mut failure = None;
        for (key, time) in matches {
            if let Some(clipboard) = clipboard.as_deref_mut() {
                if let Some(snapshot) = scope.snapshot_at(time) {
                    clipboard.push_snapshot(time, snapshot);
                    report.copied += 1;
                }
            }
            if !delete {
                continue;
            }
            if is_same_frame(time, 0.0) || is_same_frame(time, length) {
                report.skipped_protected += 1;
                continue;
            }
            match scope.delete_frame_by_key(key) {
                Ok(_) => deleted += 1,
                Err(TargetError::Curve {
                    source: CurveError::ProtectedEndpoint { .. },
                    ..
                }) => report.skipped_protected += 1,
                Err(error) => {
                    failure = Some(error);
                    break;
                }
            }
        }

        if let Some(error) = failure {
            warn!(target_name = %scope.name(), %error, "bulk delete reverted for target");
            scope.restore(checkpoint);
            report.failures.push(BulkFailure {
                target: scope.name().to_string(),
                error,
            });
        } else {
            report.deleted += deleted;
        }
    }

    info!(
        start = range.start,
        end = range.end,
        copied = report.copied,
        deleted = report.deleted,
        skipped = report.skipped_protected,
        "bulk range edit applied"
    );
    report
}

/// Sets the segment kind of every interior key inside `range` on the
/// all-or-selected controller targets. The first and last keys are never
/// visited.
#[instrument(skip(clip), fields(clip = %clip.animation_name))]
pub fn change_curve(clip: &mut AnimationClip, range: SelectionRange, kind: CurveKind) -> BulkReport {
    let mut report = BulkReport::default();
    let indices = clip.all_or_selected_indices();
    let targets = clip.targets_mut();

    for index in indices {
        let target = &mut targets[index];
        if !target.supports_curve_changes() {
            debug!(target_name = %target.name(), "curve change skipped for float target");
            continue;
        }
        report.targets += 1;
        let len = target.keyframe_count();
        if len < 3 {
            continue;
        }

        let checkpoint = target.checkpoint();
        let mut scope = target.bulk_updates();
        let times: Vec<f32> = (1..len - 1)
            .rev()
            .map(|key| scope.lead_curve().keys()[key].time)
            .filter(|time| range.contains(*time))
            .collect();

        let mut changed = 0;
        let mut failure = None;
        for time in times {
            match scope.change_curve(time, kind) {
                Ok(()) => changed += 1,
                Err(TargetError::Curve {
                    source: CurveError::ProtectedEndpoint { .. },
                    ..
                }) => report.skipped_protected += 1,
                Err(error) => {
                    failure = Some(error);
                    break;
                }
            }
        }

        if let Some(error) = failure {
            warn!(target_name = %scope.name(), %error, "curve change reverted for target");
            scope.restore(checkpoint);
            report.failures.push(BulkFailure {
                target: scope.name().to_string(),
                error,
            });
        } else {
            report.changed += changed;
        }
    }

    info!(%kind, changed = report.changed, "curve kind changed");
    report
}

#[instrument(skip(clip, clipboard), fields(clip = %clip.animation_name))]
pub fn paste(clip: &mut AnimationClip, clipboard: &Clipboard, time: f32) -> PasteReport {
    let report = clip.paste(clipboard, time);
    info!(
        applied = report.applied,
        out_of_range = report.out_of_range,
        "clipboard pasted"
    );
    report
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TargetKeyCount {
    pub target: String,
    pub keyframes: usize,
}

/// What a bulk edit over `range` would touch.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SelectionSummary {
    pub range: SelectionRange,
    pub animation_length: f32,
    pub targets: Vec<TargetKeyCount>,
}

impl SelectionSummary {
    #[must_use]
    pub fn total_keyframes(&self) -> usize {
        self.targets.iter().map(|count| count.keyframes).sum()
    }
}

impl fmt::Display for SelectionSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "Selected range: {:.3}s-{:.3}s of {:.3}s",
            self.range.start, self.range.end, self.animation_length
        )?;
        for count in &self.targets {
            writeln!(f, "- {}: {} keyframes", count.target, count.keyframes)?;
        }
        Ok(())
    }
}

#[must_use]
pub fn selection_summary(clip: &AnimationClip, range: SelectionRange) -> SelectionSummary {
    let targets = clip
        .all_or_selected_targets()
        .into_iter()
        .map(|target| TargetKeyCount {
            target: target.name().to_string(),
            keyframes: target
                .keyframe_times()
                .filter(|time| range.contains(*time))
                .count(),
        })
        .filter(|count| count.keyframes > 0)
        .collect();

    SelectionSummary {
        range,
        animation_length: clip.animation_length(),
        targets,
    }
}

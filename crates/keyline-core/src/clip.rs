use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::{
    clipboard::{Clipboard, ClipboardEntry},
    curve::CurveKind,
    target::{AnimationTarget, TargetError, TargetEvent, TargetValue},
    time::{FRAME_TOLERANCE, is_same_frame},
    transform::Transform,
};

pub const DEFAULT_ANIMATION_NAME: &str = "Anim 1";
pub const DEFAULT_ANIMATION_LAYER: &str = "Main Layer";
pub const DEFAULT_ANIMATION_LENGTH: f32 = 2.0;
pub const DEFAULT_BLEND_DURATION: f32 = 1.0;

#[derive(Debug, Clone, Error, PartialEq)]
pub enum ClipError {
    #[error("invalid animation length: {0}")]
    InvalidLength(f32),
    #[error("clip {clip} already has a target named {target}")]
    DuplicateTarget { clip: String, target: String },
    #[error("clip {clip} has no target named {target}")]
    TargetNotFound { clip: String, target: String },
    #[error("time {time}s is outside clip {clip} of length {length}s")]
    TimeOutOfRange { clip: String, time: f32, length: f32 },
    #[error("target {target} of clip {clip} has no keyframe at {time}s")]
    MissingEndpoint {
        clip: String,
        target: String,
        time: f32,
    },
    #[error(transparent)]
    Target(#[from] TargetError),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ResizeMode {
    /// Scales every key time by the length ratio.
    #[default]
    Stretch,
    /// Keeps key times; shortening drops keys past the new end, lengthening
    /// holds the final pose until the new end.
    CropOrExtend,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TargetSample {
    pub target: String,
    pub value: TargetValue,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PasteReport {
    pub applied: usize,
    pub out_of_range: usize,
    pub missing_targets: Vec<String>,
}

/// Serialized form of a clip.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct ClipRecord {
    pub animation_name: String,
    #[serde(default = "default_layer")]
    pub animation_layer: String,
    pub animation_length: f32,
    #[serde(default)]
    pub r#loop: bool,
    #[serde(default)]
    pub auto_transition_previous: bool,
    #[serde(default)]
    pub auto_transition_next: bool,
    #[serde(default = "default_blend_duration")]
    pub blend_duration: f32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub next_animation_name: Option<String>,
    #[serde(default)]
    pub targets: Vec<AnimationTarget>,
}

/// A named, layered animation: an ordered set of targets sharing one
/// length. Every lead curve keeps keys at 0 and at `animation_length`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(try_from = "ClipRecord", into = "ClipRecord")]
pub struct AnimationClip {
    pub id: Uuid,
    pub animation_name: String,
    pub animation_layer: String,
    animation_length: f32,
    looping: bool,
    pub auto_transition_previous: bool,
    pub auto_transition_next: bool,
    pub blend_duration: f32,
    pub next_animation_name: Option<String>,
    targets: Vec<AnimationTarget>,
}

impl TryFrom<ClipRecord> for AnimationClip {
    type Error = ClipError;

    fn try_from(record: ClipRecord) -> Result<Self, Self::Error> {
        let mut clip = Self::new(
            record.animation_name,
            record.animation_layer,
            record.animation_length,
        )?;
        clip.auto_transition_previous = record.auto_transition_previous;
        clip.auto_transition_next = record.auto_transition_next;
        clip.blend_duration = record.blend_duration.max(0.0);
        clip.next_animation_name = record.next_animation_name;
        clip.targets = record.targets;
        clip.set_loop(record.r#loop);
        clip.validate()?;
        for target in &mut clip.targets {
            target.take_events();
        }
        Ok(clip)
    }
}

impl From<AnimationClip> for ClipRecord {
    fn from(clip: AnimationClip) -> Self {
        Self {
            animation_name: clip.animation_name,
            animation_layer: clip.animation_layer,
            animation_length: clip.animation_length,
            r#loop: clip.looping,
            auto_transition_previous: clip.auto_transition_previous,
            auto_transition_next: clip.auto_transition_next,
            blend_duration: clip.blend_duration,
            next_animation_name: clip.next_animation_name,
            targets: clip.targets,
        }
    }
}

impl Default for AnimationClip {
    fn default() -> Self {
        Self {
            id: Uuid::new_v4(),
            animation_name: DEFAULT_ANIMATION_NAME.to_string(),
            animation_layer: DEFAULT_ANIMATION_LAYER.to_string(),
            animation_length: DEFAULT_ANIMATION_LENGTH,
            looping: false,
            auto_transition_previous: false,
            auto_transition_next: false,
            blend_duration: DEFAULT_BLEND_DURATION,
            next_animation_name: None,
            targets: Vec::new(),
        }
    }
}

impl AnimationClip {
    pub fn new(
        animation_name: impl Into<String>,
        animation_layer: impl Into<String>,
        animation_length: f32,
    ) -> Result<Self, ClipError> {
        validate_length(animation_length)?;
        Ok(Self {
            animation_name: animation_name.into(),
            animation_layer: animation_layer.into(),
            animation_length,
            ..Self::default()
        })
    }

    #[must_use]
    pub fn animation_length(&self) -> f32 {
        self.animation_length
    }

    #[must_use]
    pub fn is_looping(&self) -> bool {
        self.looping
    }

    pub fn set_loop(&mut self, looping: bool) {
        self.looping = looping;
        for target in &mut self.targets {
            target.set_looping(looping);
        }
    }

    /// Auto-blend segments are plumbing between animations, not animations
    /// users pick on their own.
    #[must_use]
    pub fn is_transition(&self) -> bool {
        self.auto_transition_previous || self.auto_transition_next
    }

    #[must_use]
    pub fn targets(&self) -> &[AnimationTarget] {
        &self.targets
    }

    pub(crate) fn targets_mut(&mut self) -> &mut [AnimationTarget] {
        &mut self.targets
    }

    #[must_use]
    pub fn target(&self, name: &str) -> Option<&AnimationTarget> {
        self.targets.iter().find(|target| target.name() == name)
    }

    pub(crate) fn target_mut(&mut self, name: &str) -> Option<&mut AnimationTarget> {
        self.targets.iter_mut().find(|target| target.name() == name)
    }

    #[must_use]
    pub fn controller_names(&self) -> Vec<&str> {
        self.targets
            .iter()
            .filter_map(AnimationTarget::controller_name)
            .collect()
    }

    /// Adds a target, seeding keys at both clip boundaries.
    pub fn add_target(&mut self, mut target: AnimationTarget) -> Result<Uuid, ClipError> {
        if self.target(target.name()).is_some() {
            return Err(ClipError::DuplicateTarget {
                clip: self.animation_name.clone(),
                target: target.name().to_string(),
            });
        }
        if let Some(time) = target
            .keyframe_times()
            .find(|time| *time > self.animation_length + FRAME_TOLERANCE)
        {
            return Err(self.out_of_range(time));
        }

        target.ensure_endpoints(self.animation_length)?;
        target.set_looping(self.looping);
        let id = target.id;
        debug!(clip = %self.animation_name, target_name = %target.name(), "target added");
        self.targets.push(target);
        Ok(id)
    }

    pub fn remove_target(&mut self, name: &str) -> Result<AnimationTarget, ClipError> {
        let index = self
            .targets
            .iter()
            .position(|target| target.name() == name)
            .ok_or_else(|| self.target_not_found(name))?;
        Ok(self.targets.remove(index))
    }

    pub fn set_keyframe(
        &mut self,
        target_name: &str,
        time: f32,
        values: &[f32],
        kind: CurveKind,
    ) -> Result<usize, ClipError> {
        self.check_time(time)?;
        let Some(target) = self.target_mut(target_name) else {
            return Err(self.target_not_found(target_name));
        };
        Ok(target.set_keyframe(time, values, kind)?)
    }

    pub fn set_transform_keyframe(
        &mut self,
        target_name: &str,
        time: f32,
        transform: Transform,
        kind: CurveKind,
    ) -> Result<usize, ClipError> {
        self.check_time(time)?;
        let Some(target) = self.target_mut(target_name) else {
            return Err(self.target_not_found(target_name));
        };
        Ok(target.set_transform_keyframe(time, transform, kind)?)
    }

    pub fn set_target_selected(&mut self, name: &str, selected: bool) -> Result<bool, ClipError> {
        let Some(target) = self.target_mut(name) else {
            return Err(self.target_not_found(name));
        };
        Ok(target.set_selected(selected))
    }

    pub fn clear_target_selection(&mut self) {
        for target in &mut self.targets {
            target.set_selected(false);
        }
    }

    #[must_use]
    pub fn has_selected_targets(&self) -> bool {
        self.targets.iter().any(AnimationTarget::selected)
    }

    /// Selected targets, or every target when nothing is selected.
    #[must_use]
    pub fn all_or_selected_targets(&self) -> Vec<&AnimationTarget> {
        self.all_or_selected_indices()
            .into_iter()
            .map(|index| &self.targets[index])
            .collect()
    }

    #[must_use]
    pub fn all_or_selected_indices(&self) -> Vec<usize> {
        let any_selected = self.has_selected_targets();
        self.targets
            .iter()
            .enumerate()
            .filter(|(_, target)| !any_selected || target.selected())
            .map(|(index, _)| index)
            .collect()
    }

    /// Keyframes of every all-or-selected target at `time`.
    #[must_use]
    pub fn copy(&self, time: f32) -> ClipboardEntry {
        let mut entry = ClipboardEntry::new(time);
        entry.targets = self
            .all_or_selected_targets()
            .into_iter()
            .filter_map(|target| target.snapshot_at(time))
            .collect();
        entry
    }

    /// Pastes every clipboard entry at `time` plus its offset from the
    /// clipboard's reference time. Entries landing outside the clip and
    /// snapshots of targets this clip does not have are skipped.
    pub fn paste(&mut self, clipboard: &Clipboard, time: f32) -> PasteReport {
        let mut report = PasteReport::default();
        let length = self.animation_length;

        let mut placed = Vec::with_capacity(clipboard.entries.len());
        for entry in &clipboard.entries {
            let paste_time = time + (entry.time - clipboard.time);
            if paste_time < -FRAME_TOLERANCE || paste_time > length + FRAME_TOLERANCE {
                report.out_of_range += entry.targets.len();
                continue;
            }
            placed.push((paste_time.clamp(0.0, length), entry));
        }

        for entry in &clipboard.entries {
            for snapshot in &entry.targets {
                if self.target(&snapshot.target_name).is_none()
                    && !report.missing_targets.contains(&snapshot.target_name)
                {
                    warn!(
                        clip = %self.animation_name,
                        target_name = %snapshot.target_name,
                        "clipboard target not found in clip"
                    );
                    report.missing_targets.push(snapshot.target_name.clone());
                }
            }
        }

        for target in &mut self.targets {
            if !placed.iter().any(|(_, entry)| entry.snapshot(target.name()).is_some()) {
                continue;
            }
            let mut scope = target.bulk_updates();
            for (paste_time, entry) in &placed {
                let Some(snapshot) = entry.snapshot(scope.name()) else {
                    continue;
                };
                match scope.apply_snapshot(*paste_time, snapshot) {
                    Ok(_) => report.applied += 1,
                    Err(error) => warn!(%error, "clipboard snapshot skipped"),
                }
            }
        }

        report
    }

    /// Changes the clip length explicitly; bulk edits never do.
    pub fn resize(&mut self, new_length: f32, mode: ResizeMode) -> Result<(), ClipError> {
        validate_length(new_length)?;
        let old_length = self.animation_length;
        if is_same_frame(old_length, new_length) {
            return Ok(());
        }

        let checkpoints: Vec<_> = self.targets.iter().map(AnimationTarget::checkpoint).collect();
        let result = self.resize_targets(old_length, new_length, mode);
        if let Err(error) = result {
            for (target, checkpoint) in self.targets.iter_mut().zip(checkpoints) {
                target.restore(checkpoint);
            }
            return Err(error);
        }

        self.animation_length = new_length;
        debug!(clip = %self.animation_name, old_length, new_length, ?mode, "clip resized");
        Ok(())
    }

    fn resize_targets(
        &mut self,
        old_length: f32,
        new_length: f32,
        mode: ResizeMode,
    ) -> Result<(), ClipError> {
        for target in &mut self.targets {
            let mut scope = target.bulk_updates();
            match mode {
                ResizeMode::Stretch => {
                    let folded = scope.stretch(old_length, new_length);
                    if folded > 0 {
                        debug!(target_name = %scope.name(), folded, "keys folded onto shared frames");
                    }
                }
                ResizeMode::CropOrExtend => {
                    let sample_time = new_length.min(old_length);
                    let values: Vec<f32> = scope
                        .curves()
                        .iter()
                        .map(|curve| curve.evaluate(sample_time))
                        .collect();
                    scope.truncate_from(new_length);
                    scope.set_keyframe(new_length, &values, CurveKind::default())?;
                }
            }
        }
        Ok(())
    }

    /// Distinct keyframe times across every target, ascending.
    #[must_use]
    pub fn all_keyframe_times(&self) -> Vec<f32> {
        let mut times: Vec<f32> = self
            .targets
            .iter()
            .flat_map(AnimationTarget::keyframe_times)
            .collect();
        times.sort_by(f32::total_cmp);
        times.dedup_by(|later, earlier| is_same_frame(*later, *earlier));
        times
    }

    #[must_use]
    pub fn keyframe_count(&self) -> usize {
        self.all_keyframe_times().len()
    }

    #[must_use]
    pub fn evaluate(&self, time: f32) -> Vec<TargetSample> {
        self.targets
            .iter()
            .map(|target| TargetSample {
                target: target.name().to_string(),
                value: target.evaluate(time),
            })
            .collect()
    }

    /// Checks length, target uniqueness, synchronisation and endpoint keys.
    pub fn validate(&self) -> Result<(), ClipError> {
        validate_length(self.animation_length)?;
        for (index, target) in self.targets.iter().enumerate() {
            if self.targets[..index]
                .iter()
                .any(|other| other.name() == target.name())
            {
                return Err(ClipError::DuplicateTarget {
                    clip: self.animation_name.clone(),
                    target: target.name().to_string(),
                });
            }
            target.validate()?;

            for time in [0.0, self.animation_length] {
                if target.lead_curve().key_index_at(time).is_none() {
                    return Err(ClipError::MissingEndpoint {
                        clip: self.animation_name.clone(),
                        target: target.name().to_string(),
                        time,
                    });
                }
            }
            if let Some(time) = target
                .keyframe_times()
                .find(|time| *time > self.animation_length + FRAME_TOLERANCE)
            {
                return Err(self.out_of_range(time));
            }
        }
        Ok(())
    }

    /// Re-establishes runtime state for a clip that came out of a document:
    /// fresh ids, loop continuity, no pending events.
    pub fn prepare_after_load(&mut self) -> Result<(), ClipError> {
        self.id = Uuid::new_v4();
        let looping = self.looping;
        for target in &mut self.targets {
            target.id = Uuid::new_v4();
            target.set_looping(looping);
        }
        self.validate()?;
        for target in &mut self.targets {
            target.take_events();
        }
        Ok(())
    }

    /// Pending target events in target order.
    pub fn drain_target_events(&mut self) -> Vec<(String, TargetEvent)> {
        self.targets
            .iter_mut()
            .flat_map(|target| {
                let name = target.name().to_string();
                target
                    .take_events()
                    .into_iter()
                    .map(move |event| (name.clone(), event))
            })
            .collect()
    }

    fn check_time(&self, time: f32) -> Result<(), ClipError> {
        if time.is_finite() && time >= 0.0 && time <= self.animation_length + FRAME_TOLERANCE {
            Ok(())
        } else {
            Err(self.out_of_range(time))
        }
    }

    fn out_of_range(&self, time: f32) -> ClipError {
        ClipError::TimeOutOfRange {
            clip: self.animation_name.clone(),
            time,
            length: self.animation_length,
        }
    }

    fn target_not_found(&self, name: &str) -> ClipError {
        ClipError::TargetNotFound {
            clip: self.animation_name.clone(),
            target: name.to_string(),
        }
    }
}

fn validate_length(length: f32) -> Result<(), ClipError> {
    if length.is_finite() && length > FRAME_TOLERANCE {
        Ok(())
    } else {
        Err(ClipError::InvalidLength(length))
    }
}

fn default_layer() -> String {
    DEFAULT_ANIMATION_LAYER.to_string()
}

const fn default_blend_duration() -> f32 {
    DEFAULT_BLEND_DURATION
}

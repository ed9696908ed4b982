use std::ops::{Deref, DerefMut};

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::warn;
use uuid::Uuid;

use crate::{
    curve::{Curve, CurveError, CurveKind, Keyframe},
    time::is_same_frame,
    transform::{Quaternion, Transform, Vector3},
};

#[derive(Debug, Clone, Error, PartialEq)]
pub enum TargetError {
    #[error("target {target} expects {expected} channel values, got {actual}")]
    ChannelMismatch {
        target: String,
        expected: usize,
        actual: usize,
    },
    #[error("target {target}, curve {curve}: {source}")]
    Curve {
        target: String,
        curve: usize,
        source: CurveError,
    },
    #[error("target {target} has no keyframe at {time}s")]
    KeyframeNotFound { target: String, time: f32 },
    #[error("target {0} has curves out of sync with its lead curve")]
    Unsynchronized(String),
    #[error("target {0} cannot hold this kind of value")]
    ValueKindMismatch(String),
}

/// Channel group animated on a controller.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ChannelSet {
    Position,
    Rotation,
    Transform,
}

impl ChannelSet {
    #[must_use]
    pub fn curve_count(self) -> usize {
        match self {
            Self::Position => 3,
            Self::Rotation => 4,
            Self::Transform => 7,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "Type")]
pub enum TargetBinding {
    Controller {
        controller: String,
        channels: ChannelSet,
    },
    Float {
        storable: String,
        param: String,
    },
}

impl TargetBinding {
    #[must_use]
    pub fn curve_count(&self) -> usize {
        match self {
            Self::Controller { channels, .. } => channels.curve_count(),
            Self::Float { .. } => 1,
        }
    }

    #[must_use]
    pub fn display_name(&self) -> String {
        match self {
            Self::Controller { controller, .. } => controller.clone(),
            Self::Float { storable, param } => format!("{storable}/{param}"),
        }
    }

    fn default_values(&self) -> Vec<f32> {
        match self {
            Self::Controller { channels, .. } => match channels {
                ChannelSet::Position => Vector3::ZERO.to_array().to_vec(),
                ChannelSet::Rotation => Quaternion::IDENTITY.to_array().to_vec(),
                ChannelSet::Transform => Transform::default().to_channels().to_vec(),
            },
            Self::Float { .. } => vec![0.0],
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub enum TargetValue {
    Scalar(f32),
    Position(Vector3),
    Rotation(Quaternion),
    Transform(Transform),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TargetEvent {
    SelectionChanged { selected: bool },
    CurvesModified,
}

/// Keys of every curve of one target at one frame.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TargetSnapshot {
    pub target_name: String,
    pub keys: Vec<Keyframe>,
}

/// Saved curve state used to revert a target after a failed edit.
#[derive(Debug, Clone)]
pub struct TargetCheckpoint(Vec<Curve>);

/// Serialized form of a target.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct TargetRecord {
    pub binding: TargetBinding,
    pub curves: Vec<Curve>,
}

/// One animated property of a clip: a controller channel group or a single
/// float parameter, backed by one curve per component.
///
/// Curve 0 is the lead curve; every other curve carries keys on exactly the
/// lead curve's frames.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(try_from = "TargetRecord", into = "TargetRecord")]
pub struct AnimationTarget {
    pub id: Uuid,
    name: String,
    binding: TargetBinding,
    curves: Vec<Curve>,
    selected: bool,
    looping: bool,
    bulk_depth: u32,
    bulk_dirty: bool,
    revision: u64,
    events: Vec<TargetEvent>,
}

impl TryFrom<TargetRecord> for AnimationTarget {
    type Error = TargetError;

    fn try_from(record: TargetRecord) -> Result<Self, Self::Error> {
        let mut target = Self::new(record.binding);
        target.curves = record.curves;
        target.validate()?;
        for curve in &mut target.curves {
            curve.recompute_tangents(false);
        }
        Ok(target)
    }
}

impl From<AnimationTarget> for TargetRecord {
    fn from(target: AnimationTarget) -> Self {
        Self {
            binding: target.binding,
            curves: target.curves,
        }
    }
}

impl AnimationTarget {
    #[must_use]
    pub fn new(binding: TargetBinding) -> Self {
        Self {
            id: Uuid::new_v4(),
            name: binding.display_name(),
            curves: vec![Curve::new(); binding.curve_count()],
            binding,
            selected: false,
            looping: false,
            bulk_depth: 0,
            bulk_dirty: false,
            revision: 0,
            events: Vec::new(),
        }
    }

    #[must_use]
    pub fn controller(controller: impl Into<String>, channels: ChannelSet) -> Self {
        Self::new(TargetBinding::Controller {
            controller: controller.into(),
            channels,
        })
    }

    #[must_use]
    pub fn float_param(storable: impl Into<String>, param: impl Into<String>) -> Self {
        Self::new(TargetBinding::Float {
            storable: storable.into(),
            param: param.into(),
        })
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[must_use]
    pub fn binding(&self) -> &TargetBinding {
        &self.binding
    }

    #[must_use]
    pub fn controller_name(&self) -> Option<&str> {
        match &self.binding {
            TargetBinding::Controller { controller, .. } => Some(controller),
            TargetBinding::Float { .. } => None,
        }
    }

    /// Controller targets accept curve-kind changes; float parameters keep
    /// whatever kinds their keys were recorded with.
    #[must_use]
    pub fn supports_curve_changes(&self) -> bool {
        matches!(self.binding, TargetBinding::Controller { .. })
    }

    #[must_use]
    pub fn curves(&self) -> &[Curve] {
        &self.curves
    }

    #[must_use]
    pub fn lead_curve(&self) -> &Curve {
        &self.curves[0]
    }

    pub fn keyframe_times(
        &self,
    ) -> impl DoubleEndedIterator<Item = f32> + ExactSizeIterator + '_ {
        self.lead_curve().times()
    }

    #[must_use]
    pub fn keyframe_count(&self) -> usize {
        self.lead_curve().len()
    }

    #[must_use]
    pub fn keyframe_count_in_range(&self, start: f32, end: f32) -> usize {
        self.keyframe_times()
            .filter(|time| *time >= start && *time <= end)
            .count()
    }

    #[must_use]
    pub fn selected(&self) -> bool {
        self.selected
    }

    /// Returns whether the flag changed; changes queue a selection event.
    pub fn set_selected(&mut self, selected: bool) -> bool {
        if self.selected == selected {
            return false;
        }
        self.selected = selected;
        self.events.push(TargetEvent::SelectionChanged { selected });
        true
    }

    /// Number of consolidated curve modifications so far.
    #[must_use]
    pub fn revision(&self) -> u64 {
        self.revision
    }

    #[must_use]
    pub fn is_looping(&self) -> bool {
        self.looping
    }

    pub(crate) fn set_looping(&mut self, looping: bool) {
        if self.looping != looping {
            self.looping = looping;
            self.mark_modified();
        }
    }

    pub fn take_events(&mut self) -> Vec<TargetEvent> {
        std::mem::take(&mut self.events)
    }

    #[must_use]
    pub fn is_in_bulk_update(&self) -> bool {
        self.bulk_depth > 0
    }

    pub fn start_bulk_updates(&mut self) {
        self.bulk_depth += 1;
    }

    pub fn end_bulk_updates(&mut self) {
        if self.bulk_depth == 0 {
            warn!(target_name = %self.name, "unbalanced end of bulk updates ignored");
            return;
        }
        self.bulk_depth -= 1;
        if self.bulk_depth == 0 && self.bulk_dirty {
            self.bulk_dirty = false;
            self.finish_modification();
        }
    }

    /// Scoped bulk-update mode; the scope ends when the guard drops, even
    /// while unwinding.
    pub fn bulk_updates(&mut self) -> BulkUpdates<'_> {
        self.start_bulk_updates();
        BulkUpdates { target: self }
    }

    pub fn set_keyframe(
        &mut self,
        time: f32,
        values: &[f32],
        kind: CurveKind,
    ) -> Result<usize, TargetError> {
        self.check_channel_count(values.len())?;

        let checkpoint = self.checkpoint();
        let mut lead_index = 0;
        for (curve_index, value) in values.iter().enumerate() {
            match self.curves[curve_index].insert_or_update_key(time, *value, kind) {
                Ok(index) if curve_index == 0 => lead_index = index,
                Ok(_) => {}
                Err(source) => {
                    self.curves = checkpoint.0;
                    return Err(self.curve_error(curve_index, source));
                }
            }
        }

        self.mark_modified();
        Ok(lead_index)
    }

    pub fn set_float_keyframe(
        &mut self,
        time: f32,
        value: f32,
        kind: CurveKind,
    ) -> Result<usize, TargetError> {
        if self.supports_curve_changes() {
            return Err(TargetError::ValueKindMismatch(self.name.clone()));
        }
        self.set_keyframe(time, &[value], kind)
    }

    /// Writes the components of `transform` this controller animates.
    pub fn set_transform_keyframe(
        &mut self,
        time: f32,
        transform: Transform,
        kind: CurveKind,
    ) -> Result<usize, TargetError> {
        let values = match &self.binding {
            TargetBinding::Controller { channels, .. } => match channels {
                ChannelSet::Position => transform.position.to_array().to_vec(),
                ChannelSet::Rotation => transform.rotation.normalized().to_array().to_vec(),
                ChannelSet::Transform => Transform::new(
                    transform.position,
                    transform.rotation.normalized(),
                )
                .to_channels()
                .to_vec(),
            },
            TargetBinding::Float { .. } => {
                return Err(TargetError::ValueKindMismatch(self.name.clone()));
            }
        };
        self.set_keyframe(time, &values, kind)
    }

    /// Removes key `index` from every curve, or from none of them.
    pub fn delete_frame_by_key(&mut self, index: usize) -> Result<Keyframe, TargetError> {
        for (curve_index, curve) in self.curves.iter().enumerate() {
            curve
                .check_deletable(index, true)
                .map_err(|source| self.curve_error(curve_index, source))?;
        }

        let mut removed = None;
        for (curve_index, curve) in self.curves.iter_mut().enumerate() {
            let key = curve
                .delete_key(index, true)
                .map_err(|source| TargetError::Curve {
                    target: self.name.clone(),
                    curve: curve_index,
                    source,
                })?;
            if curve_index == 0 {
                removed = Some(key);
            }
        }

        self.mark_modified();
        removed.ok_or_else(|| TargetError::Unsynchronized(self.name.clone()))
    }

    pub fn delete_frame_at(&mut self, time: f32) -> Result<Keyframe, TargetError> {
        let index = self
            .lead_curve()
            .key_index_at(time)
            .ok_or_else(|| TargetError::KeyframeNotFound {
                target: self.name.clone(),
                time,
            })?;
        self.delete_frame_by_key(index)
    }

    /// Applies `kind` to the segment at `time` on every curve.
    pub fn change_curve(&mut self, time: f32, kind: CurveKind) -> Result<(), TargetError> {
        let index = self
            .lead_curve()
            .nearest_key_index(time)
            .ok_or_else(|| self.curve_error(0, CurveError::Empty))?;
        if self.lead_curve().is_endpoint(index) {
            return Err(self.curve_error(0, CurveError::ProtectedEndpoint { index }));
        }

        let key_time = self.lead_curve().keys()[index].time;
        let checkpoint = self.checkpoint();
        for curve_index in 0..self.curves.len() {
            if let Err(source) = self.curves[curve_index].set_segment_kind(key_time, kind) {
                self.curves = checkpoint.0;
                return Err(self.curve_error(curve_index, source));
            }
        }

        self.mark_modified();
        Ok(())
    }

    pub fn change_curve_by_name(&mut self, time: f32, kind_name: &str) -> Result<(), TargetError> {
        let kind =
            CurveKind::from_display(kind_name).map_err(|source| self.curve_error(0, source))?;
        self.change_curve(time, kind)
    }

    #[must_use]
    pub fn snapshot_at(&self, time: f32) -> Option<TargetSnapshot> {
        let index = self.lead_curve().key_index_at(time)?;
        let keys = self
            .curves
            .iter()
            .map(|curve| curve.get(index).copied())
            .collect::<Option<Vec<_>>>()?;
        Some(TargetSnapshot {
            target_name: self.name.clone(),
            keys,
        })
    }

    pub fn apply_snapshot(
        &mut self,
        time: f32,
        snapshot: &TargetSnapshot,
    ) -> Result<usize, TargetError> {
        self.check_channel_count(snapshot.keys.len())?;

        let checkpoint = self.checkpoint();
        let mut lead_index = 0;
        for (curve_index, key) in snapshot.keys.iter().enumerate() {
            let key = Keyframe { time, ..*key };
            match self.curves[curve_index].set_key(key) {
                Ok(index) if curve_index == 0 => lead_index = index,
                Ok(_) => {}
                Err(source) => {
                    self.curves = checkpoint.0;
                    return Err(self.curve_error(curve_index, source));
                }
            }
        }

        self.mark_modified();
        Ok(lead_index)
    }

    #[must_use]
    pub fn evaluate(&self, time: f32) -> TargetValue {
        let sample = |index: usize| {
            self.curves
                .get(index)
                .map_or(0.0, |curve| curve.evaluate(time))
        };
        let position = || Vector3::new(sample(0), sample(1), sample(2));
        let rotation = |offset: usize| {
            Quaternion::new(
                sample(offset),
                sample(offset + 1),
                sample(offset + 2),
                sample(offset + 3),
            )
            .normalized()
        };

        match &self.binding {
            TargetBinding::Float { .. } => TargetValue::Scalar(sample(0)),
            TargetBinding::Controller { channels, .. } => match channels {
                ChannelSet::Position => TargetValue::Position(position()),
                ChannelSet::Rotation => TargetValue::Rotation(rotation(0)),
                ChannelSet::Transform => {
                    TargetValue::Transform(Transform::new(position(), rotation(3)))
                }
            },
        }
    }

    #[must_use]
    pub fn checkpoint(&self) -> TargetCheckpoint {
        TargetCheckpoint(self.curves.clone())
    }

    pub fn restore(&mut self, checkpoint: TargetCheckpoint) {
        self.curves = checkpoint.0;
        self.mark_modified();
    }

    /// Checks channel count and lead-curve synchronisation.
    pub fn validate(&self) -> Result<(), TargetError> {
        self.check_channel_count(self.curves.len())?;
        let lead = self.lead_curve();
        if lead.is_empty() {
            return Err(self.curve_error(0, CurveError::Empty));
        }

        let synchronized = self.curves.iter().skip(1).all(|curve| {
            curve.len() == lead.len()
                && curve
                    .times()
                    .zip(lead.times())
                    .all(|(time, lead_time)| is_same_frame(time, lead_time))
        });
        if synchronized {
            Ok(())
        } else {
            Err(TargetError::Unsynchronized(self.name.clone()))
        }
    }

    /// Guarantees keys at 0 and `length`, sampling the current curves (or
    /// the binding's rest values when empty) for any missing endpoint.
    pub fn ensure_endpoints(&mut self, length: f32) -> Result<(), TargetError> {
        let missing: Vec<f32> = [0.0, length]
            .into_iter()
            .filter(|time| self.lead_curve().key_index_at(*time).is_none())
            .collect();
        if missing.is_empty() {
            return Ok(());
        }

        let mut scope = self.bulk_updates();
        for time in missing {
            let values = if scope.lead_curve().is_empty() {
                scope.binding.default_values()
            } else {
                scope.curves.iter().map(|curve| curve.evaluate(time)).collect()
            };
            scope.set_keyframe(time, &values, CurveKind::default())?;
        }
        Ok(())
    }

    /// Curves share key times, so each one folds the same keys.
    pub(crate) fn stretch(&mut self, old_length: f32, new_length: f32) -> usize {
        let mut folded = 0;
        for curve in &mut self.curves {
            folded = curve.stretch(old_length, new_length);
        }
        self.mark_modified();
        folded
    }

    pub(crate) fn truncate_from(&mut self, time: f32) -> usize {
        let mut removed = 0;
        for curve in &mut self.curves {
            removed = curve.truncate_from(time);
        }
        if removed > 0 {
            self.mark_modified();
        }
        removed
    }

    fn check_channel_count(&self, actual: usize) -> Result<(), TargetError> {
        let expected = self.binding.curve_count();
        if actual == expected {
            Ok(())
        } else {
            Err(TargetError::ChannelMismatch {
                target: self.name.clone(),
                expected,
                actual,
            })
        }
    }

    fn curve_error(&self, curve: usize, source: CurveError) -> TargetError {
        TargetError::Curve {
            target: self.name.clone(),
            curve,
            source,
        }
    }

    fn mark_modified(&mut self) {
        if self.bulk_depth > 0 {
            self.bulk_dirty = true;
        } else {
            self.finish_modification();
        }
    }

    fn finish_modification(&mut self) {
        for curve in &mut self.curves {
            if self.looping {
                curve.mirror_first_onto_last();
            }
            curve.recompute_tangents(self.looping);
        }
        self.revision += 1;
        self.events.push(TargetEvent::CurvesModified);
    }
}

/// Guard returned by [`AnimationTarget::bulk_updates`].
pub struct BulkUpdates<'a> {
    target: &'a mut AnimationTarget,
}

impl Deref for BulkUpdates<'_> {
    type Target = AnimationTarget;

    fn deref(&self) -> &Self::Target {
        self.target
    }
}

impl DerefMut for BulkUpdates<'_> {
    fn deref_mut(&mut self) -> &mut Self::Target {
        self.target
    }
}

impl Drop for BulkUpdates<'_> {
    fn drop(&mut self) {
        self.target.end_bulk_updates();
    }
}

use std::{cell::Cell, fmt, str::FromStr};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::time::{FRAME_TOLERANCE, is_same_frame};

#[derive(Debug, Clone, Error, PartialEq)]
pub enum CurveError {
    #[error("invalid keyframe time: {0}")]
    InvalidTime(f32),
    #[error("invalid keyframe value: {0}")]
    InvalidValue(f32),
    #[error("keyframe index {index} out of range for curve of {len} keys")]
    IndexOutOfRange { index: usize, len: usize },
    #[error("keyframe {index} is a protected endpoint")]
    ProtectedEndpoint { index: usize },
    #[error("curve has no keyframes")]
    Empty,
    #[error("two keyframes share the frame at {0}s")]
    DuplicateTime(f32),
    #[error("unknown curve type: {0:?}")]
    UnknownKind(String),
}

/// Interpolation policy of the segment that starts at a keyframe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum CurveKind {
    #[default]
    Smooth,
    Linear,
    Constant,
    Flat,
    FlatLinear,
    LinearFlat,
    Bounce,
    CopyPrevious,
}

const CURVE_KIND_NAMES: [(CurveKind, &str); 8] = [
    (CurveKind::Smooth, "Smooth"),
    (CurveKind::Linear, "Linear"),
    (CurveKind::Constant, "Constant"),
    (CurveKind::Flat, "Flat"),
    (CurveKind::FlatLinear, "Flat-Linear"),
    (CurveKind::LinearFlat, "Linear-Flat"),
    (CurveKind::Bounce, "Bounce"),
    (CurveKind::CopyPrevious, "Copy Previous"),
];

impl CurveKind {
    #[must_use]
    pub fn display_name(self) -> &'static str {
        CURVE_KIND_NAMES
            .iter()
            .find(|(kind, _)| *kind == self)
            .map_or("Smooth", |(_, name)| name)
    }

    /// Display strings offered to curve-type pickers, in menu order.
    pub fn display_choices() -> impl Iterator<Item = &'static str> {
        CURVE_KIND_NAMES.iter().map(|(_, name)| *name)
    }

    pub fn from_display(name: &str) -> Result<Self, CurveError> {
        let trimmed = name.trim();
        CURVE_KIND_NAMES
            .iter()
            .find(|(_, display)| display.eq_ignore_ascii_case(trimmed))
            .map(|(kind, _)| *kind)
            .ok_or_else(|| CurveError::UnknownKind(name.to_string()))
    }
}

impl fmt::Display for CurveKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.display_name())
    }
}

impl FromStr for CurveKind {
    type Err = CurveError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_display(s)
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct Keyframe {
    pub time: f32,
    pub value: f32,
    #[serde(default)]
    pub in_tangent: f32,
    #[serde(default)]
    pub out_tangent: f32,
    #[serde(default)]
    pub kind: CurveKind,
}

impl Keyframe {
    #[must_use]
    pub fn new(time: f32, value: f32, kind: CurveKind) -> Self {
        Self {
            time,
            value,
            in_tangent: 0.0,
            out_tangent: 0.0,
            kind,
        }
    }
}

/// Time-sorted keyframes of one scalar channel.
///
/// No two keys share a frame (see [`FRAME_TOLERANCE`]). Sampling caches the
/// last segment it hit, so sequential playback avoids the binary search.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(try_from = "Vec<Keyframe>", into = "Vec<Keyframe>")]
pub struct Curve {
    keys: Vec<Keyframe>,
    cursor: Cell<usize>,
}

impl PartialEq for Curve {
    fn eq(&self, other: &Self) -> bool {
        self.keys == other.keys
    }
}

impl TryFrom<Vec<Keyframe>> for Curve {
    type Error = CurveError;

    fn try_from(mut keys: Vec<Keyframe>) -> Result<Self, Self::Error> {
        for key in &keys {
            validate_time(key.time)?;
            validate_value(key.value)?;
        }
        keys.sort_by(|a, b| a.time.total_cmp(&b.time));
        if let Some(pair) = keys
            .windows(2)
            .find(|pair| is_same_frame(pair[0].time, pair[1].time))
        {
            return Err(CurveError::DuplicateTime(pair[1].time));
        }

        Ok(Self {
            keys,
            cursor: Cell::new(0),
        })
    }
}

impl From<Curve> for Vec<Keyframe> {
    fn from(curve: Curve) -> Self {
        curve.keys
    }
}

impl Curve {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_keys(keys: Vec<Keyframe>) -> Result<Self, CurveError> {
        Self::try_from(keys)
    }

    #[must_use]
    pub fn keys(&self) -> &[Keyframe] {
        &self.keys
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.keys.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    #[must_use]
    pub fn get(&self, index: usize) -> Option<&Keyframe> {
        self.keys.get(index)
    }

    #[must_use]
    pub fn first(&self) -> Option<&Keyframe> {
        self.keys.first()
    }

    #[must_use]
    pub fn last(&self) -> Option<&Keyframe> {
        self.keys.last()
    }

    pub fn times(
        &self,
    ) -> impl DoubleEndedIterator<Item = f32> + ExactSizeIterator + '_ {
        self.keys.iter().map(|key| key.time)
    }

    #[must_use]
    pub fn is_endpoint(&self, index: usize) -> bool {
        index == 0 || index + 1 == self.keys.len()
    }

    /// Index of the key on the same frame as `time`.
    #[must_use]
    pub fn key_index_at(&self, time: f32) -> Option<usize> {
        let index = self
            .keys
            .partition_point(|key| key.time <= time - FRAME_TOLERANCE);
        self.keys
            .get(index)
            .filter(|key| is_same_frame(key.time, time))
            .map(|_| index)
    }

    #[must_use]
    pub fn nearest_key_index(&self, time: f32) -> Option<usize> {
        if self.keys.is_empty() {
            return None;
        }

        let index = self.keys.partition_point(|key| key.time < time);
        if index == 0 {
            return Some(0);
        }
        if index == self.keys.len() {
            return Some(index - 1);
        }

        let before = time - self.keys[index - 1].time;
        let after = self.keys[index].time - time;
        Some(if before <= after { index - 1 } else { index })
    }

    pub fn insert_or_update_key(
        &mut self,
        time: f32,
        value: f32,
        kind: CurveKind,
    ) -> Result<usize, CurveError> {
        validate_time(time)?;
        validate_value(value)?;

        if let Some(index) = self.key_index_at(time) {
            let key = &mut self.keys[index];
            key.value = value;
            key.kind = kind;
            return Ok(index);
        }

        let index = self.keys.partition_point(|key| key.time < time);
        self.keys.insert(index, Keyframe::new(time, value, kind));
        self.cursor.set(0);
        Ok(index)
    }

    /// Writes a full keyframe, tangents included; an existing key on the
    /// same frame keeps its time.
    pub fn set_key(&mut self, keyframe: Keyframe) -> Result<usize, CurveError> {
        validate_time(keyframe.time)?;
        validate_value(keyframe.value)?;

        if let Some(index) = self.key_index_at(keyframe.time) {
            let existing_time = self.keys[index].time;
            self.keys[index] = Keyframe {
                time: existing_time,
                ..keyframe
            };
            return Ok(index);
        }

        let index = self.keys.partition_point(|key| key.time < keyframe.time);
        self.keys.insert(index, keyframe);
        self.cursor.set(0);
        Ok(index)
    }

    pub fn check_deletable(&self, index: usize, protect_endpoints: bool) -> Result<(), CurveError> {
        let len = self.keys.len();
        if index >= len {
            return Err(CurveError::IndexOutOfRange { index, len });
        }
        if protect_endpoints && self.is_endpoint(index) {
            return Err(CurveError::ProtectedEndpoint { index });
        }
        Ok(())
    }

    pub fn delete_key(
        &mut self,
        index: usize,
        protect_endpoints: bool,
    ) -> Result<Keyframe, CurveError> {
        self.check_deletable(index, protect_endpoints)?;
        self.cursor.set(0);
        Ok(self.keys.remove(index))
    }

    /// Sets the kind of the segment starting at the key nearest `time`.
    pub fn set_segment_kind(&mut self, time: f32, kind: CurveKind) -> Result<usize, CurveError> {
        let index = self.nearest_key_index(time).ok_or(CurveError::Empty)?;
        if self.is_endpoint(index) {
            return Err(CurveError::ProtectedEndpoint { index });
        }
        self.keys[index].kind = kind;
        Ok(index)
    }

    #[must_use]
    pub fn evaluate(&self, time: f32) -> f32 {
        let (Some(first), Some(last)) = (self.keys.first(), self.keys.last()) else {
            return 0.0;
        };
        if self.keys.len() == 1 || time <= first.time {
            return first.value;
        }
        if time >= last.time {
            return last.value;
        }

        let index = self.segment_index(time);
        interpolate(&self.keys[index], &self.keys[index + 1], time)
    }

    /// Recomputes every tangent from the key kinds. Loops treat the curve
    /// as periodic so the first and last key share a slope.
    pub fn recompute_tangents(&mut self, looping: bool) {
        let len = self.keys.len();
        if len == 0 {
            return;
        }
        if len == 1 {
            self.keys[0].in_tangent = 0.0;
            self.keys[0].out_tangent = 0.0;
            return;
        }

        for index in 1..len {
            if self.keys[index].kind == CurveKind::CopyPrevious {
                self.keys[index].value = self.keys[index - 1].value;
            }
        }

        for index in 0..len {
            let incoming = if index > 0 {
                Some(slope(&self.keys[index - 1], &self.keys[index]))
            } else if looping && len > 2 {
                Some(slope(&self.keys[len - 2], &self.keys[len - 1]))
            } else {
                None
            };
            let outgoing = if index + 1 < len {
                Some(slope(&self.keys[index], &self.keys[index + 1]))
            } else if looping && len > 2 {
                Some(slope(&self.keys[0], &self.keys[1]))
            } else {
                None
            };

            let (in_tangent, out_tangent) = match self.keys[index].kind {
                CurveKind::Flat | CurveKind::Constant | CurveKind::CopyPrevious => (0.0, 0.0),
                CurveKind::Linear => {
                    let fallback = incoming.or(outgoing).unwrap_or_default();
                    (
                        incoming.unwrap_or(fallback),
                        outgoing.unwrap_or(fallback),
                    )
                }
                CurveKind::Smooth => match (incoming, outgoing) {
                    (Some(incoming), Some(outgoing)) => {
                        let tangent = (incoming + outgoing) * 0.5;
                        (tangent, tangent)
                    }
                    _ => (0.0, 0.0),
                },
                CurveKind::LinearFlat => (incoming.unwrap_or_default(), 0.0),
                CurveKind::FlatLinear => (0.0, outgoing.unwrap_or_default()),
                CurveKind::Bounce => {
                    let incoming = incoming.unwrap_or_default();
                    (incoming, -incoming)
                }
            };

            self.keys[index].in_tangent = in_tangent;
            self.keys[index].out_tangent = out_tangent;
        }
    }

    pub(crate) fn mirror_first_onto_last(&mut self) {
        let len = self.keys.len();
        if len >= 2 {
            self.keys[len - 1].value = self.keys[0].value;
        }
    }

    /// Rescales key times from `old_length` to `new_length`. The end key
    /// lands exactly on `new_length`; keys squeezed onto one frame fold into
    /// the earlier key, and the end key always survives. Returns how many
    /// keys were folded away.
    pub(crate) fn stretch(&mut self, old_length: f32, new_length: f32) -> usize {
        let before = self.keys.len();
        self.cursor.set(0);
        if before < 2 {
            return 0;
        }

        let factor = new_length / old_length;
        for key in &mut self.keys {
            key.time *= factor;
        }
        if let Some(mut end) = self.keys.pop() {
            end.time = new_length;
            self.keys
                .dedup_by(|later, earlier| is_same_frame(later.time, earlier.time));
            while self.keys.len() > 1
                && self
                    .keys
                    .last()
                    .is_some_and(|key| is_same_frame(key.time, end.time))
            {
                self.keys.pop();
            }
            self.keys.push(end);
        }
        before - self.keys.len()
    }

    /// Drops every key on or after the frame of `time`; returns how many
    /// were removed.
    pub(crate) fn truncate_from(&mut self, time: f32) -> usize {
        let keep = self
            .keys
            .partition_point(|key| key.time < time && !is_same_frame(key.time, time));
        let removed = self.keys.len() - keep;
        self.keys.truncate(keep);
        self.cursor.set(0);
        removed
    }

    fn segment_index(&self, time: f32) -> usize {
        let len = self.keys.len();
        let cached = self.cursor.get();
        for candidate in [cached, cached + 1] {
            if candidate + 1 < len
                && self.keys[candidate].time <= time
                && time < self.keys[candidate + 1].time
            {
                self.cursor.set(candidate);
                return candidate;
            }
        }

        let index = self
            .keys
            .partition_point(|key| key.time <= time)
            .saturating_sub(1)
            .min(len - 2);
        self.cursor.set(index);
        index
    }
}

fn validate_time(time: f32) -> Result<(), CurveError> {
    if time.is_finite() && time >= 0.0 {
        Ok(())
    } else {
        Err(CurveError::InvalidTime(time))
    }
}

fn validate_value(value: f32) -> Result<(), CurveError> {
    if value.is_finite() {
        Ok(())
    } else {
        Err(CurveError::InvalidValue(value))
    }
}

fn slope(a: &Keyframe, b: &Keyframe) -> f32 {
    let dt = b.time - a.time;
    if dt <= f32::EPSILON {
        return 0.0;
    }
    (b.value - a.value) / dt
}

fn interpolate(a: &Keyframe, b: &Keyframe, time: f32) -> f32 {
    let dt = b.time - a.time;
    if dt <= f32::EPSILON {
        return b.value;
    }
    let t = (time - a.time) / dt;

    match a.kind {
        CurveKind::Constant => a.value,
        CurveKind::Linear => a.value + (b.value - a.value) * t,
        _ => hermite(a.value, a.out_tangent * dt, b.value, b.in_tangent * dt, t),
    }
}

fn hermite(p0: f32, m0: f32, p1: f32, m1: f32, t: f32) -> f32 {
    let t2 = t * t;
    let t3 = t2 * t;

    let h00 = 2.0 * t3 - 3.0 * t2 + 1.0;
    let h10 = t3 - 2.0 * t2 + t;
    let h01 = -2.0 * t3 + 3.0 * t2;
    let h11 = t3 - t2;

    h00 * p0 + h10 * m0 + h01 * p1 + h11 * m1
}

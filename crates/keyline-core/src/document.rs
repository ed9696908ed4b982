//! Exchange document for whole-clip export and import.
//!
//! Field names match the format other tools already read and write:
//! `Clips`, `AtomType`, `ControllersState`, and per controller
//! `currentPositionState`, `localPosition`, `currentRotationState`,
//! `localRotation`. State codes are written as strings; numbers and numeric
//! strings are both accepted on read.

use std::{collections::BTreeMap, fmt};

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::Value;
use thiserror::Error;

use crate::{
    clip::AnimationClip,
    transform::{Quaternion, Transform, Vector3},
};

pub const CONTROLLER_SUFFIX: &str = "Control";
pub const ROOT_CONTROLLER: &str = "control";
pub const POSE_AND_ALL_ANIMATIONS: &str = "Pose & all animations";
pub const ALL_ANIMATIONS: &str = "All animations";

#[derive(Debug, Error)]
pub enum DocumentError {
    #[error("malformed animation document: {0}")]
    Malformed(String),
    #[error("document does not contain any animations")]
    NoClips,
    #[error("document was exported for {found} but the current entity is {expected}")]
    AtomTypeMismatch { expected: String, found: String },
    #[error("animation {name} in document is invalid: {reason}")]
    InvalidClip { name: String, reason: String },
}

/// Physics state and local transform of one controller.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ControllerState {
    #[serde(rename = "currentPositionState", with = "state_code")]
    pub position_state: i32,
    #[serde(rename = "localPosition", deserialize_with = "lenient_vector")]
    pub local_position: Vector3,
    #[serde(rename = "currentRotationState", with = "state_code")]
    pub rotation_state: i32,
    #[serde(rename = "localRotation", deserialize_with = "lenient_quaternion")]
    pub local_rotation: Quaternion,
}

impl ControllerState {
    #[must_use]
    pub fn new(position_state: i32, rotation_state: i32, transform: Transform) -> Self {
        Self {
            position_state,
            local_position: transform.position,
            rotation_state,
            local_rotation: transform.rotation,
        }
    }

    #[must_use]
    pub fn transform(&self) -> Transform {
        Transform::new(self.local_position, self.local_rotation.normalized())
    }
}

/// What an export covers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ExportScope {
    /// Every clip plus the state of every host controller.
    PoseAndAllAnimations,
    /// Every clip plus the controllers those clips animate.
    AllAnimations,
    /// One clip plus its controllers.
    Animation(String),
}

impl ExportScope {
    /// Maps an export picker label back to a scope.
    #[must_use]
    pub fn from_label(label: &str) -> Self {
        match label {
            POSE_AND_ALL_ANIMATIONS => Self::PoseAndAllAnimations,
            ALL_ANIMATIONS => Self::AllAnimations,
            name => Self::Animation(name.to_string()),
        }
    }

    #[must_use]
    pub fn label(&self) -> &str {
        match self {
            Self::PoseAndAllAnimations => POSE_AND_ALL_ANIMATIONS,
            Self::AllAnimations => ALL_ANIMATIONS,
            Self::Animation(name) => name,
        }
    }
}

impl fmt::Display for ExportScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnimationDocument {
    #[serde(rename = "Clips")]
    pub clips: Vec<AnimationClip>,
    #[serde(rename = "AtomType")]
    pub atom_type: String,
    #[serde(rename = "ControllersState", default)]
    pub controllers_state: BTreeMap<String, ControllerState>,
}

impl AnimationDocument {
    #[must_use]
    pub fn new(atom_type: impl Into<String>, clips: Vec<AnimationClip>) -> Self {
        Self {
            clips,
            atom_type: atom_type.into(),
            controllers_state: BTreeMap::new(),
        }
    }

    /// Parses and validates a document without checking who it is for.
    pub fn from_json(json: &str) -> Result<Self, DocumentError> {
        Self::parse(json, None)
    }

    /// Parses a document meant for an entity of `atom_type`. The type is
    /// checked before anything else in the document is looked at.
    pub fn from_json_for(json: &str, atom_type: &str) -> Result<Self, DocumentError> {
        Self::parse(json, Some(atom_type))
    }

    pub fn to_json(&self) -> Result<String, DocumentError> {
        serde_json::to_string_pretty(self).map_err(|error| DocumentError::Malformed(error.to_string()))
    }

    fn parse(json: &str, expected_atom_type: Option<&str>) -> Result<Self, DocumentError> {
        let value: Value =
            serde_json::from_str(json).map_err(|error| DocumentError::Malformed(error.to_string()))?;
        let Value::Object(mut root) = value else {
            return Err(DocumentError::Malformed("document is not an object".to_string()));
        };

        let atom_type = match root.remove("AtomType") {
            Some(Value::String(atom_type)) => atom_type,
            Some(_) => return Err(DocumentError::Malformed("AtomType is not a string".to_string())),
            None => String::new(),
        };
        if let Some(expected) = expected_atom_type {
            if atom_type != expected {
                return Err(DocumentError::AtomTypeMismatch {
                    expected: expected.to_string(),
                    found: atom_type,
                });
            }
        }

        let clip_values = match root.remove("Clips") {
            Some(Value::Array(clips)) if !clips.is_empty() => clips,
            Some(Value::Array(_)) | None | Some(Value::Null) => return Err(DocumentError::NoClips),
            Some(_) => return Err(DocumentError::Malformed("Clips is not an array".to_string())),
        };

        let mut clips = Vec::with_capacity(clip_values.len());
        for (index, clip_value) in clip_values.into_iter().enumerate() {
            let name = clip_value
                .get("AnimationName")
                .and_then(Value::as_str)
                .map_or_else(|| format!("#{index}"), str::to_string);
            let clip: AnimationClip = serde_json::from_value(clip_value)
                .map_err(|error| DocumentError::InvalidClip {
                    name,
                    reason: error.to_string(),
                })?;
            clips.push(clip);
        }

        let controllers_state = match root.remove("ControllersState") {
            None | Some(Value::Null) => BTreeMap::new(),
            Some(state) => serde_json::from_value(state)
                .map_err(|error| DocumentError::Malformed(format!("ControllersState: {error}")))?,
        };

        Ok(Self {
            clips,
            atom_type,
            controllers_state,
        })
    }
}

/// Controllers whose state travels with a document: names ending in
/// `suffix`, never the root controller itself.
#[must_use]
pub fn is_restorable_controller(name: &str, suffix: &str, root: &str) -> bool {
    name != root && name.ends_with(suffix)
}

#[derive(Deserialize)]
#[serde(untagged)]
enum LenientNumber {
    Integer(i64),
    Float(f64),
    Text(String),
}

impl LenientNumber {
    fn as_f64<E: serde::de::Error>(&self) -> Result<f64, E> {
        match self {
            #[allow(clippy::cast_precision_loss)]
            Self::Integer(value) => Ok(*value as f64),
            Self::Float(value) => Ok(*value),
            Self::Text(text) => text
                .trim()
                .parse()
                .map_err(|_| E::custom(format!("not a number: {text}"))),
        }
    }
}

mod state_code {
    use super::{Deserialize, Deserializer, LenientNumber, Serializer};

    pub fn serialize<S: Serializer>(code: &i32, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&code.to_string())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<i32, D::Error> {
        let value = LenientNumber::deserialize(deserializer)?.as_f64::<D::Error>()?;
        #[allow(clippy::cast_possible_truncation)]
        Ok(value as i32)
    }
}

#[derive(Deserialize)]
struct LenientVector {
    x: LenientNumber,
    y: LenientNumber,
    z: LenientNumber,
    #[serde(default)]
    w: Option<LenientNumber>,
}

#[allow(clippy::cast_possible_truncation)]
fn component<E: serde::de::Error>(value: &LenientNumber) -> Result<f32, E> {
    value.as_f64::<E>().map(|value| value as f32)
}

fn lenient_vector<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vector3, D::Error> {
    let raw = LenientVector::deserialize(deserializer)?;
    Ok(Vector3::new(
        component::<D::Error>(&raw.x)?,
        component::<D::Error>(&raw.y)?,
        component::<D::Error>(&raw.z)?,
    ))
}

fn lenient_quaternion<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Quaternion, D::Error> {
    let raw = LenientVector::deserialize(deserializer)?;
    let w = raw
        .w
        .as_ref()
        .ok_or_else(|| <D::Error as serde::de::Error>::missing_field("w"))?;
    Ok(Quaternion::new(
        component::<D::Error>(&raw.x)?,
        component::<D::Error>(&raw.y)?,
        component::<D::Error>(&raw.z)?,
        component::<D::Error>(w)?,
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn controller_state_reads_strings_and_numbers() {
        let json = r#"{
            "currentPositionState": "1",
            "localPosition": { "x": "0.5", "y": 1, "z": 2.5 },
            "currentRotationState": 2,
            "localRotation": { "x": 0, "y": 0, "z": 0, "w": "1" }
        }"#;
        let state: ControllerState = serde_json::from_str(json).expect("lenient state parses");
        assert_eq!(state.position_state, 1);
        assert_eq!(state.rotation_state, 2);
        assert_eq!(state.local_position, Vector3::new(0.5, 1.0, 2.5));
        assert_eq!(state.local_rotation, Quaternion::IDENTITY);

        let written = serde_json::to_value(state).expect("serialize");
        assert_eq!(written["currentPositionState"], "1");
        assert_eq!(written["localRotation"]["w"], 1.0);
    }

    #[test]
    fn quaternions_need_a_w_component() {
        let json = r#"{
            "currentPositionState": 1,
            "localPosition": { "x": 0, "y": 0, "z": 0 },
            "currentRotationState": 1,
            "localRotation": { "x": 0, "y": 0, "z": 0 }
        }"#;
        assert!(serde_json::from_str::<ControllerState>(json).is_err());
    }

    #[test]
    fn atom_type_is_checked_before_clips() {
        let json = r#"{ "AtomType": "Person", "Clips": "garbage" }"#;
        let err = AnimationDocument::from_json_for(json, "Prop").expect_err("wrong entity type");
        assert!(matches!(
            err,
            DocumentError::AtomTypeMismatch { ref expected, ref found }
                if expected == "Prop" && found == "Person"
        ));
    }

    #[test]
    fn empty_clip_lists_are_rejected() {
        for json in [
            r#"{ "AtomType": "Person", "Clips": [] }"#,
            r#"{ "AtomType": "Person" }"#,
        ] {
            assert!(matches!(
                AnimationDocument::from_json(json),
                Err(DocumentError::NoClips)
            ));
        }
    }

    #[test]
    fn invalid_clips_are_reported_by_name() {
        let json = r#"{ "AtomType": "Person", "Clips": [{ "AnimationName": "Walk", "AnimationLength": -1 }] }"#;
        let err = AnimationDocument::from_json(json).expect_err("negative length");
        assert!(matches!(err, DocumentError::InvalidClip { ref name, .. } if name == "Walk"));
    }

    #[test]
    fn controller_filter_skips_the_root() {
        assert!(is_restorable_controller("headControl", CONTROLLER_SUFFIX, ROOT_CONTROLLER));
        assert!(!is_restorable_controller("control", CONTROLLER_SUFFIX, ROOT_CONTROLLER));
        assert!(!is_restorable_controller("head", CONTROLLER_SUFFIX, ROOT_CONTROLLER));
    }

    #[test]
    fn export_scope_labels_round_trip() {
        for scope in [
            ExportScope::PoseAndAllAnimations,
            ExportScope::AllAnimations,
            ExportScope::Animation("Walk".to_string()),
        ] {
            assert_eq!(ExportScope::from_label(scope.label()), scope);
        }
    }
}

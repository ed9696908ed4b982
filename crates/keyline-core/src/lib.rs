pub mod animation;
pub mod bulk;
pub mod clip;
pub mod clipboard;
pub mod config;
pub mod curve;
pub mod diagnostics;
pub mod document;
pub mod engine;
pub mod fixtures;
pub mod host;
pub mod persistence;
pub mod target;
pub mod time;
pub mod transform;

pub use animation::{
    AnimationChoice, AnimationError, AnimationEvent, AnimationSet, ImportReport, LayerPlayback,
    LayerSample, ListenerId, NameConflictPolicy,
};
pub use bulk::{BulkFailure, BulkReport, SelectionRange, SelectionSummary, TargetKeyCount};
pub use clip::{
    AnimationClip, ClipError, DEFAULT_ANIMATION_LAYER, DEFAULT_ANIMATION_LENGTH,
    DEFAULT_ANIMATION_NAME, PasteReport, ResizeMode, TargetSample,
};
pub use clipboard::{Clipboard, ClipboardEntry};
pub use config::KeylineConfig;
pub use curve::{Curve, CurveError, CurveKind, Keyframe};
pub use diagnostics::{
    TelemetryGuard, init_tracing, init_tracing_from_config, init_tracing_with_options,
};
pub use document::{AnimationDocument, ControllerState, DocumentError, ExportScope};
pub use engine::{Engine, EngineError, ImportSummary};
pub use host::{HostAtom, HostEntity};
pub use target::{
    AnimationTarget, BulkUpdates, ChannelSet, TargetBinding, TargetError, TargetEvent,
    TargetSnapshot, TargetValue,
};
pub use time::{FRAME_TOLERANCE, is_same_frame};
pub use transform::{Quaternion, Transform, Vector3};

use std::path::{Path, PathBuf};

use serde::Serialize;
use thiserror::Error;
use tracing::{debug, error, info, instrument, warn};

use crate::{
    animation::{AnimationError, AnimationSet, ImportReport, LayerSample},
    bulk::{self, BulkReport, SelectionRange, SelectionSummary},
    clip::{ClipError, PasteReport},
    clipboard::Clipboard,
    config::KeylineConfig,
    curve::{CurveError, CurveKind},
    document::{AnimationDocument, DocumentError, ExportScope, is_restorable_controller},
    host::HostEntity,
    persistence,
};

#[derive(Debug, Error)]
pub enum EngineError {
    #[error("animation not found: {0}")]
    AnimationNotFound(String),
    #[error(transparent)]
    Animation(#[from] AnimationError),
    #[error(transparent)]
    Clip(#[from] ClipError),
    #[error(transparent)]
    Curve(#[from] CurveError),
    #[error(transparent)]
    Document(#[from] DocumentError),
    #[error("io error: {0}")]
    Io(String),
}

impl From<anyhow::Error> for EngineError {
    fn from(value: anyhow::Error) -> Self {
        Self::Io(format!("{value:#}"))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ImportSummary {
    pub added: Vec<String>,
    pub renamed: Vec<(String, String)>,
    pub replaced: Vec<String>,
    pub restored_controllers: Vec<String>,
    pub missing_controllers: Vec<String>,
    pub selected: String,
    pub samples: Vec<LayerSample>,
}

impl ImportSummary {
    fn new(report: ImportReport) -> Self {
        Self {
            added: report.added,
            renamed: report.renamed,
            replaced: report.replaced,
            restored_controllers: Vec::new(),
            missing_controllers: Vec::new(),
            selected: String::new(),
            samples: Vec::new(),
        }
    }
}

/// One editing session over a host entity: its animations, the session
/// clipboard and the bulk selection range.
#[derive(Debug)]
pub struct Engine<H: HostEntity> {
    animation: AnimationSet,
    clipboard: Clipboard,
    selection: SelectionRange,
    host: H,
    config: KeylineConfig,
}

impl<H: HostEntity> Engine<H> {
    #[must_use]
    pub fn new(host: H) -> Self {
        let animation = AnimationSet::new();
        let selection = SelectionRange::full(animation.current().animation_length());
        Self {
            animation,
            clipboard: Clipboard::new(),
            selection,
            host,
            config: KeylineConfig::default(),
        }
    }

    pub fn with_config(host: H, config: KeylineConfig) -> Result<Self, EngineError> {
        let mut animation = AnimationSet::with_default_clip(
            &config.animation.default_name,
            &config.animation.default_layer,
            config.animation.default_length,
        )?;
        animation.set_conflict_policy(config.editing.name_conflict_policy);
        let selection = SelectionRange::full(animation.current().animation_length());
        Ok(Self {
            animation,
            clipboard: Clipboard::new(),
            selection,
            host,
            config,
        })
    }

    /// Replaces the whole animation set, e.g. after loading a scene.
    #[instrument(skip(self, animation), fields(clips = animation.clips().len()))]
    pub fn replace_animation(&mut self, mut animation: AnimationSet) {
        animation.set_conflict_policy(self.config.editing.name_conflict_policy);
        self.animation = animation;
        self.selection = SelectionRange::full(self.animation.current().animation_length());
        info!("animation set replaced");
    }

    #[must_use]
    pub fn animation(&self) -> &AnimationSet {
        &self.animation
    }

    pub fn animation_mut(&mut self) -> &mut AnimationSet {
        &mut self.animation
    }

    #[must_use]
    pub fn clipboard(&self) -> &Clipboard {
        &self.clipboard
    }

    #[must_use]
    pub fn selection(&self) -> SelectionRange {
        self.selection
    }

    #[must_use]
    pub fn host(&self) -> &H {
        &self.host
    }

    pub fn host_mut(&mut self) -> &mut H {
        &mut self.host
    }

    #[must_use]
    pub fn config(&self) -> &KeylineConfig {
        &self.config
    }

    /// Switches the current animation and pulls the selection range inside
    /// its length. Unknown names change nothing.
    #[instrument(skip(self))]
    pub fn select_animation(&mut self, name: &str) -> bool {
        if !self.animation.select_animation(name) {
            return false;
        }
        self.selection
            .clamp_to(self.animation.current().animation_length());
        true
    }

    pub fn set_selection(&mut self, start: f32, end: f32) {
        self.selection =
            SelectionRange::new(start, end, self.animation.current().animation_length());
    }

    pub fn mark_selection_start(&mut self) -> SelectionRange {
        self.selection.mark_start(self.animation.clip_time());
        self.selection
    }

    pub fn mark_selection_end(&mut self) -> SelectionRange {
        self.selection.mark_end(self.animation.clip_time());
        self.selection
    }

    /// Snaps the playhead to the configured editing step.
    pub fn snap_clip_time(&mut self) -> f32 {
        self.animation.snap_clip_time(self.config.editing.snap);
        self.animation.clip_time()
    }

    #[must_use]
    pub fn selection_summary(&self) -> SelectionSummary {
        bulk::selection_summary(self.animation.current(), self.selection)
    }

    #[instrument(skip(self), fields(start = self.selection.start, end = self.selection.end))]
    pub fn copy(&mut self) -> BulkReport {
        let report = bulk::copy(
            self.animation.current_mut(),
            self.selection,
            &mut self.clipboard,
        );
        self.animation.dispatch_target_events();
        report
    }

    #[instrument(skip(self), fields(start = self.selection.start, end = self.selection.end))]
    pub fn cut(&mut self) -> BulkReport {
        let report = bulk::cut(
            self.animation.current_mut(),
            self.selection,
            &mut self.clipboard,
        );
        self.animation.dispatch_target_events();
        report
    }

    #[instrument(skip(self), fields(start = self.selection.start, end = self.selection.end))]
    pub fn delete_selected(&mut self) -> BulkReport {
        let report = bulk::delete(self.animation.current_mut(), self.selection);
        self.animation.dispatch_target_events();
        report
    }

    /// Pastes the clipboard at the current clip time.
    #[instrument(skip(self))]
    pub fn paste(&mut self) -> PasteReport {
        if self.clipboard.is_empty() {
            debug!("clipboard empty; nothing to paste");
            return PasteReport::default();
        }
        let time = self.animation.clip_time();
        let report = bulk::paste(self.animation.current_mut(), &self.clipboard, time);
        self.animation.dispatch_target_events();
        report
    }

    #[instrument(skip(self), fields(start = self.selection.start, end = self.selection.end))]
    pub fn change_curve(&mut self, kind: CurveKind) -> BulkReport {
        let report = bulk::change_curve(self.animation.current_mut(), self.selection, kind);
        self.animation.dispatch_target_events();
        report
    }

    /// Parses a picker label such as `"Linear"` or `"Copy Previous"`.
    pub fn change_curve_by_name(&mut self, kind_name: &str) -> Result<BulkReport, EngineError> {
        let kind = CurveKind::from_display(kind_name)?;
        Ok(self.change_curve(kind))
    }

    /// Builds the exchange document for `scope` from the live animations
    /// and the host's current controller poses.
    #[instrument(skip(self, scope), fields(scope = %scope))]
    pub fn export_document(&self, scope: &ExportScope) -> Result<AnimationDocument, EngineError> {
        let (clips, controllers): (Vec<_>, Vec<String>) = match scope {
            ExportScope::PoseAndAllAnimations => (
                self.animation.clips().to_vec(),
                self.host.controller_names(),
            ),
            ExportScope::AllAnimations => {
                let mut controllers: Vec<String> = Vec::new();
                for name in self
                    .animation
                    .clips()
                    .iter()
                    .flat_map(|clip| clip.controller_names())
                {
                    if !controllers.iter().any(|existing| existing == name) {
                        controllers.push(name.to_string());
                    }
                }
                (self.animation.clips().to_vec(), controllers)
            }
            ExportScope::Animation(name) => {
                let clip = self
                    .animation
                    .clip(name)
                    .ok_or_else(|| EngineError::AnimationNotFound(name.clone()))?;
                let controllers = clip
                    .controller_names()
                    .into_iter()
                    .map(str::to_string)
                    .collect();
                (vec![clip.clone()], controllers)
            }
        };

        let mut document = AnimationDocument::new(self.host.atom_type(), clips);
        for name in controllers {
            if !self.is_restorable(&name) {
                continue;
            }
            match self.host.controller_state(&name) {
                Some(state) => {
                    document.controllers_state.insert(name, state);
                }
                None => debug!(controller = %name, "controller has no state to export"),
            }
        }

        info!(
            clips = document.clips.len(),
            controllers = document.controllers_state.len(),
            "animation document exported"
        );
        Ok(document)
    }

    pub fn export_json(&self, scope: &ExportScope) -> Result<String, EngineError> {
        Ok(self.export_document(scope)?.to_json()?)
    }

    /// Merges a document into the session. The atom type and every clip are
    /// checked before anything changes; controllers the host lacks are
    /// reported and skipped. Afterwards the last clip is selected,
    /// transitions are rebuilt and every layer is sampled.
    #[instrument(skip(self, document), fields(atom_type = %document.atom_type, clips = document.clips.len()))]
    pub fn import_document(
        &mut self,
        document: AnimationDocument,
    ) -> Result<ImportSummary, EngineError> {
        if document.atom_type != self.host.atom_type() {
            let error = DocumentError::AtomTypeMismatch {
                expected: self.host.atom_type().to_string(),
                found: document.atom_type,
            };
            warn!(%error, "import aborted");
            return Err(error.into());
        }
        if document.clips.is_empty() {
            warn!("import aborted: document has no animations");
            return Err(DocumentError::NoClips.into());
        }

        let mut clips = document.clips;
        for clip in &mut clips {
            clip.prepare_after_load()
                .map_err(|source| DocumentError::InvalidClip {
                    name: clip.animation_name.clone(),
                    reason: source.to_string(),
                })?;
        }

        let report = self.animation.import_clips(clips)?;
        let mut summary = ImportSummary::new(report);

        for (name, state) in &document.controllers_state {
            if !self.is_restorable(name) {
                debug!(controller = %name, "controller state not restorable; skipped");
                continue;
            }
            if self.host.apply_controller_state(name, state) {
                summary.restored_controllers.push(name.clone());
            } else {
                warn!(controller = %name, "document has state for a controller this entity lacks");
                summary.missing_controllers.push(name.clone());
            }
        }

        if let Some(last) = self
            .animation
            .clips()
            .last()
            .map(|clip| clip.animation_name.clone())
        {
            self.select_animation(&last);
            summary.selected = last;
        }
        self.animation.rebuild_transitions();
        self.animation.dispatch_target_events();
        summary.samples = self.animation.sample();

        info!(
            added = summary.added.len(),
            replaced = summary.replaced.len(),
            missing_controllers = summary.missing_controllers.len(),
            "animation document imported"
        );
        Ok(summary)
    }

    /// Parses `json` for this host's atom type, then imports it.
    pub fn import_json(&mut self, json: &str) -> Result<ImportSummary, EngineError> {
        let document = AnimationDocument::from_json_for(json, self.host.atom_type())
            .inspect_err(|error| warn!(%error, "import aborted"))?;
        self.import_document(document)
    }

    /// Default location for an export named `file_name`.
    #[must_use]
    pub fn export_path(&self, file_name: &str) -> PathBuf {
        persistence::with_extension(
            &self.config.io.save_folder.join(file_name),
            &self.config.io.extension,
        )
    }

    #[instrument(skip(self, path, scope), fields(path = %path.display(), scope = %scope))]
    pub fn export_to_path(&self, path: &Path, scope: &ExportScope) -> Result<PathBuf, EngineError> {
        let document = self.export_document(scope)?;
        persistence::save_document(path, &document).map_err(|failure| {
            error!(error = %format!("{failure:#}"), "failed to export animation");
            EngineError::from(failure)
        })
    }

    #[instrument(skip(self, path), fields(path = %path.display()))]
    pub fn import_from_path(&mut self, path: &Path) -> Result<ImportSummary, EngineError> {
        let json = persistence::read_document_text(path).map_err(|failure| {
            error!(error = %format!("{failure:#}"), "failed to import animation");
            EngineError::from(failure)
        })?;
        self.import_json(&json)
    }

    fn is_restorable(&self, controller: &str) -> bool {
        is_restorable_controller(
            controller,
            &self.config.host.controller_suffix,
            &self.config.host.root_controller,
        )
    }
}

use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info, instrument, warn};
use uuid::Uuid;

use crate::{
    clip::{AnimationClip, ClipError, TargetSample},
    target::{TargetEvent, TargetSnapshot},
    time::{DEFAULT_TIME_RESOLUTION, clamp_time, is_same_frame, snap, wrap_time},
};

#[derive(Debug, Error)]
pub enum AnimationError {
    #[error("animation not found: {0}")]
    ClipNotFound(String),
    #[error("an animation named {0} already exists")]
    DuplicateName(String),
    #[error("the last animation cannot be removed")]
    LastClip,
    #[error("an animation set needs at least one clip")]
    Empty,
    #[error("animation {name} is invalid: {source}")]
    InvalidClip { name: String, source: ClipError },
    #[error(transparent)]
    Clip(#[from] ClipError),
}

/// How `import_clips` resolves an imported clip whose name is taken.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NameConflictPolicy {
    /// Keep both; the imported clip becomes `"<name> 2"`, `"<name> 3"`, ...
    #[default]
    Rename,
    /// The imported clip takes the existing clip's place in the list.
    Replace,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AnimationEvent {
    CurrentAnimationChanged { before: String, after: String },
    ClipsListChanged,
    TargetsSelectionChanged { clip: String },
    TargetsModified { clip: String, targets: Vec<String> },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerId(u64);

type Listener = Box<dyn FnMut(&AnimationEvent)>;

#[derive(Default)]
struct Listeners {
    next_id: u64,
    entries: Vec<(ListenerId, Listener)>,
}

impl fmt::Debug for Listeners {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Listeners")
            .field("count", &self.entries.len())
            .finish()
    }
}

impl Listeners {
    fn emit(&mut self, event: &AnimationEvent) {
        for (_, listener) in &mut self.entries {
            listener(event);
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ImportReport {
    pub added: Vec<String>,
    /// `(requested, assigned)` names of clips renamed on conflict.
    pub renamed: Vec<(String, String)>,
    pub replaced: Vec<String>,
}

impl ImportReport {
    #[must_use]
    pub fn imported_count(&self) -> usize {
        self.added.len() + self.replaced.len()
    }
}

/// Playback position of the active clip of one layer.
#[derive(Debug, Clone, PartialEq)]
pub struct LayerPlayback {
    pub layer: String,
    pub clip: Uuid,
    pub time: f32,
    pub playing: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LayerSample {
    pub layer: String,
    pub clip: String,
    pub time: f32,
    pub targets: Vec<TargetSample>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AnimationChoice {
    pub name: String,
    pub label: String,
}

/// The ordered clips of one animated entity, the current clip being edited,
/// and one playback cursor per layer.
#[derive(Debug)]
pub struct AnimationSet {
    clips: Vec<AnimationClip>,
    current: usize,
    layers: Vec<LayerPlayback>,
    listeners: Listeners,
    conflict_policy: NameConflictPolicy,
}

impl Default for AnimationSet {
    fn default() -> Self {
        Self::from_parts(vec![AnimationClip::default()])
    }
}

impl Drop for AnimationSet {
    fn drop(&mut self) {
        if !self.listeners.entries.is_empty() {
            warn!(
                listeners = self.listeners.entries.len(),
                "animation set dropped with listeners still subscribed"
            );
        }
    }
}

impl AnimationSet {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_default_clip(
        name: &str,
        layer: &str,
        length: f32,
    ) -> Result<Self, AnimationError> {
        let clip = AnimationClip::new(name, layer, length)?;
        Ok(Self::from_parts(vec![clip]))
    }

    pub fn from_clips(clips: Vec<AnimationClip>) -> Result<Self, AnimationError> {
        if clips.is_empty() {
            return Err(AnimationError::Empty);
        }
        for clip in &clips {
            clip.validate().map_err(|source| AnimationError::InvalidClip {
                name: clip.animation_name.clone(),
                source,
            })?;
        }
        Ok(Self::from_parts(clips))
    }

    fn from_parts(clips: Vec<AnimationClip>) -> Self {
        let mut set = Self {
            clips,
            current: 0,
            layers: Vec::new(),
            listeners: Listeners::default(),
            conflict_policy: NameConflictPolicy::default(),
        };
        set.sync_layers();
        set
    }

    #[must_use]
    pub fn clips(&self) -> &[AnimationClip] {
        &self.clips
    }

    #[must_use]
    pub fn clip(&self, name: &str) -> Option<&AnimationClip> {
        self.clips.iter().find(|clip| clip.animation_name == name)
    }

    pub fn clip_mut(&mut self, name: &str) -> Option<&mut AnimationClip> {
        self.clips.iter_mut().find(|clip| clip.animation_name == name)
    }

    #[must_use]
    pub fn current(&self) -> &AnimationClip {
        &self.clips[self.current]
    }

    pub fn current_mut(&mut self) -> &mut AnimationClip {
        &mut self.clips[self.current]
    }

    #[must_use]
    pub fn conflict_policy(&self) -> NameConflictPolicy {
        self.conflict_policy
    }

    pub fn set_conflict_policy(&mut self, policy: NameConflictPolicy) {
        self.conflict_policy = policy;
    }

    #[must_use]
    pub fn layers(&self) -> &[LayerPlayback] {
        &self.layers
    }

    pub fn subscribe(&mut self, listener: impl FnMut(&AnimationEvent) + 'static) -> ListenerId {
        let id = ListenerId(self.listeners.next_id);
        self.listeners.next_id += 1;
        self.listeners.entries.push((id, Box::new(listener)));
        id
    }

    /// Returns whether `id` was registered.
    pub fn unsubscribe(&mut self, id: ListenerId) -> bool {
        let before = self.listeners.entries.len();
        self.listeners.entries.retain(|(entry, _)| *entry != id);
        self.listeners.entries.len() != before
    }

    #[must_use]
    pub fn listener_count(&self) -> usize {
        self.listeners.entries.len()
    }

    #[instrument(skip(self, clip), fields(animation = %clip.animation_name))]
    pub fn add_clip(&mut self, clip: AnimationClip) -> Result<(), AnimationError> {
        if self.clip(&clip.animation_name).is_some() {
            return Err(AnimationError::DuplicateName(clip.animation_name));
        }
        clip.validate()?;
        self.clips.push(clip);
        self.sync_layers();
        self.listeners.emit(&AnimationEvent::ClipsListChanged);
        info!(clips = self.clips.len(), "animation added");
        Ok(())
    }

    #[instrument(skip(self))]
    pub fn remove_clip(&mut self, name: &str) -> Result<AnimationClip, AnimationError> {
        let index = self
            .index_of(name)
            .ok_or_else(|| AnimationError::ClipNotFound(name.to_string()))?;
        if self.clips.len() == 1 {
            return Err(AnimationError::LastClip);
        }

        let removed = self.clips.remove(index);
        let mut changed_current = None;
        if index < self.current {
            self.current -= 1;
        } else if index == self.current {
            self.current = self.current.min(self.clips.len() - 1);
            changed_current = Some(AnimationEvent::CurrentAnimationChanged {
                before: removed.animation_name.clone(),
                after: self.current().animation_name.clone(),
            });
        }
        self.sync_layers();

        if let Some(event) = changed_current {
            self.listeners.emit(&event);
        }
        self.listeners.emit(&AnimationEvent::ClipsListChanged);
        info!("animation removed");
        Ok(removed)
    }

    /// Makes `name` the current clip and activates it on its layer. Unknown
    /// names are logged and ignored.
    #[instrument(skip(self))]
    pub fn select_animation(&mut self, name: &str) -> bool {
        let Some(index) = self.index_of(name) else {
            warn!("animation not found; selection unchanged");
            return false;
        };
        if index == self.current {
            debug!("animation already current");
            self.activate_on_layer(index);
            return true;
        }

        let before = self.current().animation_name.clone();
        self.current = index;
        self.activate_on_layer(index);
        let after = self.current().animation_name.clone();
        self.listeners
            .emit(&AnimationEvent::CurrentAnimationChanged { before, after });
        info!("current animation changed");
        true
    }

    /// Merges externally built clips into the set. Every clip is validated
    /// before any is merged; on error the set is unchanged. Listeners get a
    /// single `ClipsListChanged` for the whole batch.
    #[instrument(skip(self, imported), fields(count = imported.len(), policy = ?self.conflict_policy))]
    pub fn import_clips(
        &mut self,
        imported: Vec<AnimationClip>,
    ) -> Result<ImportReport, AnimationError> {
        for clip in &imported {
            clip.validate().map_err(|source| AnimationError::InvalidClip {
                name: clip.animation_name.clone(),
                source,
            })?;
        }

        let mut report = ImportReport::default();
        if imported.is_empty() {
            debug!("nothing to import");
            return Ok(report);
        }

        let mut merged = Vec::with_capacity(imported.len());
        for mut clip in imported {
            match (self.index_of(&clip.animation_name), self.conflict_policy) {
                (None, _) => {
                    report.added.push(clip.animation_name.clone());
                    self.clips.push(clip);
                    merged.push(self.clips.len() - 1);
                }
                (Some(index), NameConflictPolicy::Replace) => {
                    report.replaced.push(clip.animation_name.clone());
                    self.clips[index] = clip;
                    merged.push(index);
                }
                (Some(_), NameConflictPolicy::Rename) => {
                    let requested = clip.animation_name.clone();
                    clip.animation_name = self.unique_name(&requested);
                    report
                        .renamed
                        .push((requested, clip.animation_name.clone()));
                    report.added.push(clip.animation_name.clone());
                    self.clips.push(clip);
                    merged.push(self.clips.len() - 1);
                }
            }
        }

        // Sequences inside the batch follow their renamed partners.
        for index in merged {
            let Some(next) = self.clips[index].next_animation_name.as_mut() else {
                continue;
            };
            if let Some((_, assigned)) = report
                .renamed
                .iter()
                .find(|(requested, _)| *requested == *next)
            {
                debug!(from = %next, to = %assigned, "sequence follows renamed clip");
                *next = assigned.clone();
            }
        }

        self.sync_layers();
        self.listeners.emit(&AnimationEvent::ClipsListChanged);
        info!(
            added = report.added.len(),
            renamed = report.renamed.len(),
            replaced = report.replaced.len(),
            "animations imported"
        );
        Ok(report)
    }

    /// Evaluates the active clip of every layer at its playback time.
    #[must_use]
    pub fn sample(&self) -> Vec<LayerSample> {
        self.layers
            .iter()
            .filter_map(|layer| {
                let clip = self.clip_by_id(layer.clip)?;
                Some(LayerSample {
                    layer: layer.layer.clone(),
                    clip: clip.animation_name.clone(),
                    time: layer.time,
                    targets: clip.evaluate(layer.time),
                })
            })
            .collect()
    }

    /// Turns queued target events into at most one selection event and one
    /// modification event per clip.
    pub fn dispatch_target_events(&mut self) {
        let mut events = Vec::new();
        for clip in &mut self.clips {
            let mut selection_changed = false;
            let mut modified: Vec<String> = Vec::new();
            for (target, event) in clip.drain_target_events() {
                match event {
                    TargetEvent::SelectionChanged { .. } => selection_changed = true,
                    TargetEvent::CurvesModified => {
                        if !modified.contains(&target) {
                            modified.push(target);
                        }
                    }
                }
            }
            if selection_changed {
                events.push(AnimationEvent::TargetsSelectionChanged {
                    clip: clip.animation_name.clone(),
                });
            }
            if !modified.is_empty() {
                events.push(AnimationEvent::TargetsModified {
                    clip: clip.animation_name.clone(),
                    targets: modified,
                });
            }
        }
        for event in &events {
            self.listeners.emit(event);
        }
    }

    /// Picker entries; labels carry the layer once more than one exists.
    #[must_use]
    pub fn animation_choices(&self) -> Vec<AnimationChoice> {
        let has_layers = self
            .clips
            .iter()
            .skip(1)
            .any(|clip| clip.animation_layer != self.clips[0].animation_layer);
        self.clips
            .iter()
            .map(|clip| AnimationChoice {
                name: clip.animation_name.clone(),
                label: if has_layers {
                    format!("[{}] {}", clip.animation_layer, clip.animation_name)
                } else {
                    clip.animation_name.clone()
                },
            })
            .collect()
    }

    /// Names offered for single-animation export; transition clips are
    /// left out.
    #[must_use]
    pub fn exportable_animation_names(&self) -> Vec<&str> {
        self.clips
            .iter()
            .filter(|clip| !clip.is_transition())
            .map(|clip| clip.animation_name.as_str())
            .collect()
    }

    /// Copies boundary frames into auto-transition clips: the previous clip
    /// of the layer lends its last frame to key 0, the next clip its first
    /// frame to the last key. Returns how many target frames were written.
    #[instrument(skip(self))]
    pub fn rebuild_transitions(&mut self) -> usize {
        let mut plans: Vec<(usize, f32, Vec<TargetSnapshot>)> = Vec::new();
        for (index, clip) in self.clips.iter().enumerate() {
            if clip.auto_transition_previous {
                if let Some(previous) = self.layer_neighbour(index, false) {
                    let source = &self.clips[previous];
                    plans.push((
                        index,
                        0.0,
                        boundary_snapshots(source, clip, source.animation_length()),
                    ));
                }
            }
            if clip.auto_transition_next {
                if let Some(next) = self.layer_neighbour(index, true) {
                    let source = &self.clips[next];
                    plans.push((
                        index,
                        clip.animation_length(),
                        boundary_snapshots(source, clip, 0.0),
                    ));
                }
            }
        }

        let mut written = 0;
        for (index, time, snapshots) in plans {
            let clip = &mut self.clips[index];
            for snapshot in snapshots {
                let Some(target) = clip.target_mut(&snapshot.target_name) else {
                    continue;
                };
                match target.apply_snapshot(time, &snapshot) {
                    Ok(_) => written += 1,
                    Err(error) => warn!(%error, "transition frame skipped"),
                }
            }
        }
        info!(written, "transitions rebuilt");
        written
    }

    #[must_use]
    pub fn is_playing(&self) -> bool {
        self.layers.iter().any(|layer| layer.playing)
    }

    /// Starts the current clip's layer.
    pub fn play(&mut self) {
        let id = self.current().id;
        if let Some(layer) = self.layers.iter_mut().find(|layer| layer.clip == id) {
            layer.playing = true;
        }
        info!(animation = %self.current().animation_name, "playback started");
    }

    pub fn play_all(&mut self) {
        for layer in &mut self.layers {
            layer.playing = true;
        }
        info!(layers = self.layers.len(), "playback started on all layers");
    }

    pub fn stop(&mut self) {
        for layer in &mut self.layers {
            layer.playing = false;
        }
        info!("playback stopped");
    }

    /// Moves every playing layer forward by `delta` seconds. Looping clips
    /// wrap; clips with a `next_animation_name` on the same layer hand over
    /// and carry the overflow; others stop at their end.
    pub fn advance(&mut self, delta: f32) {
        if !delta.is_finite() || delta <= 0.0 {
            return;
        }

        let mut events = Vec::new();
        for layer_index in 0..self.layers.len() {
            if !self.layers[layer_index].playing {
                continue;
            }
            let Some(clip_index) = self.index_of_id(self.layers[layer_index].clip) else {
                continue;
            };

            let clip = &self.clips[clip_index];
            let length = clip.animation_length();
            let time = self.layers[layer_index].time + delta;
            if time < length || (is_same_frame(time, length) && !clip.is_looping()) {
                self.layers[layer_index].time = time.min(length);
                continue;
            }

            if clip.is_looping() {
                self.layers[layer_index].time = wrap_time(time, length);
                continue;
            }

            let next = clip.next_animation_name.as_deref().and_then(|name| {
                self.clips.iter().position(|candidate| {
                    candidate.animation_name == name
                        && candidate.animation_layer == clip.animation_layer
                })
            });
            match next {
                Some(next_index) => {
                    let next_clip = &self.clips[next_index];
                    let overflow = clamp_time(time - length, next_clip.animation_length());
                    debug!(
                        from = %clip.animation_name,
                        to = %next_clip.animation_name,
                        "animation sequence advanced"
                    );
                    let layer = &mut self.layers[layer_index];
                    layer.clip = next_clip.id;
                    layer.time = overflow;
                    if clip_index == self.current {
                        events.push(AnimationEvent::CurrentAnimationChanged {
                            before: clip.animation_name.clone(),
                            after: next_clip.animation_name.clone(),
                        });
                        self.current = next_index;
                    }
                }
                None => {
                    let layer = &mut self.layers[layer_index];
                    layer.time = length;
                    layer.playing = false;
                }
            }
        }

        for event in &events {
            self.listeners.emit(event);
        }
    }

    /// Playback time of the current clip.
    #[must_use]
    pub fn clip_time(&self) -> f32 {
        self.current_layer().map_or(0.0, |layer| layer.time)
    }

    pub fn set_clip_time(&mut self, time: f32) {
        let length = self.current().animation_length();
        let id = self.current().id;
        if let Some(layer) = self.layers.iter_mut().find(|layer| layer.clip == id) {
            layer.time = clamp_time(time, length);
        }
    }

    /// Nudges the clip time by `delta`. Going backwards stops at 0; going
    /// forward onto the end lands on the last frame, or one `delta` short of
    /// it for looping clips, whose end frame duplicates frame 0.
    pub fn step_clip_time(&mut self, delta: f32) {
        let clip = self.current();
        let length = clip.animation_length();
        let mut time = self.clip_time() + delta;
        if delta >= 0.0 && time >= length - DEFAULT_TIME_RESOLUTION {
            time = if clip.is_looping() {
                length - delta
            } else {
                length
            };
        }
        self.set_clip_time(time.max(0.0));
    }

    pub fn snap_clip_time(&mut self, step: f32) {
        self.set_clip_time(snap(self.clip_time(), step));
    }

    /// Jumps to the next keyframe of the current clip, wrapping to 0.
    pub fn next_frame(&mut self) -> f32 {
        let time = self.clip_time();
        let next = self
            .current()
            .all_keyframe_times()
            .into_iter()
            .find(|key| *key > time && !is_same_frame(*key, time))
            .unwrap_or(0.0);
        self.set_clip_time(next);
        self.clip_time()
    }

    /// Jumps to the previous keyframe of the current clip, wrapping to the
    /// last one.
    pub fn previous_frame(&mut self) -> f32 {
        let time = self.clip_time();
        let times = self.current().all_keyframe_times();
        let previous = times
            .iter()
            .rev()
            .find(|key| **key < time && !is_same_frame(**key, time))
            .or_else(|| times.last())
            .copied()
            .unwrap_or(0.0);
        self.set_clip_time(previous);
        self.clip_time()
    }

    fn current_layer(&self) -> Option<&LayerPlayback> {
        let id = self.current().id;
        self.layers.iter().find(|layer| layer.clip == id)
    }

    fn activate_on_layer(&mut self, index: usize) {
        let clip = &self.clips[index];
        let (id, name, length) = (
            clip.id,
            clip.animation_layer.clone(),
            clip.animation_length(),
        );
        if let Some(layer) = self.layers.iter_mut().find(|layer| layer.layer == name) {
            if layer.clip != id {
                layer.clip = id;
                layer.time = clamp_time(layer.time, length);
            }
        }
    }

    fn index_of(&self, name: &str) -> Option<usize> {
        self.clips
            .iter()
            .position(|clip| clip.animation_name == name)
    }

    fn index_of_id(&self, id: Uuid) -> Option<usize> {
        self.clips.iter().position(|clip| clip.id == id)
    }

    fn clip_by_id(&self, id: Uuid) -> Option<&AnimationClip> {
        self.clips.iter().find(|clip| clip.id == id)
    }

    /// Nearest clip on the same layer before (or after) `index`.
    fn layer_neighbour(&self, index: usize, forward: bool) -> Option<usize> {
        let layer = &self.clips[index].animation_layer;
        if forward {
            (index + 1..self.clips.len()).find(|other| &self.clips[*other].animation_layer == layer)
        } else {
            (0..index)
                .rev()
                .find(|other| &self.clips[*other].animation_layer == layer)
        }
    }

    fn unique_name(&self, base: &str) -> String {
        (2..)
            .map(|suffix| format!("{base} {suffix}"))
            .find(|candidate| self.index_of(candidate).is_none())
            .unwrap_or_else(|| format!("{base} {}", Uuid::new_v4()))
    }

    /// Keeps one playback cursor per layer, in clip order, pointing at a
    /// clip that still exists. The current clip owns its layer's cursor.
    fn sync_layers(&mut self) {
        if self.clips.is_empty() {
            self.layers.clear();
            return;
        }
        self.current = self.current.min(self.clips.len() - 1);

        let mut layers: Vec<LayerPlayback> = Vec::new();
        for clip in &self.clips {
            if layers.iter().any(|layer| layer.layer == clip.animation_layer) {
                continue;
            }
            let existing = self.layers.iter().find(|layer| {
                layer.layer == clip.animation_layer
                    && self
                        .clips
                        .iter()
                        .any(|candidate| candidate.id == layer.clip)
            });
            layers.push(existing.cloned().unwrap_or_else(|| LayerPlayback {
                layer: clip.animation_layer.clone(),
                clip: clip.id,
                time: 0.0,
                playing: false,
            }));
        }
        self.layers = layers;
        self.activate_on_layer(self.current);
    }
}

/// Snapshots of `source` at `time` for every target `destination` shares.
fn boundary_snapshots(
    source: &AnimationClip,
    destination: &AnimationClip,
    time: f32,
) -> Vec<TargetSnapshot> {
    destination
        .targets()
        .iter()
        .filter_map(|target| source.target(target.name())?.snapshot_at(time))
        .collect()
}

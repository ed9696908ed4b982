use std::{
    fs,
    io::Write,
    path::{Path, PathBuf},
};

use anyhow::{Context, Result};
use serde::Serialize;
use tracing::{debug, info, instrument, warn};
use walkdir::WalkDir;

use crate::document::AnimationDocument;

pub const DEFAULT_EXTENSION: &str = "json";

/// Appends `.{extension}` unless the path already ends with it (any case).
#[must_use]
pub fn with_extension(path: &Path, extension: &str) -> PathBuf {
    let has_extension = path
        .extension()
        .and_then(|existing| existing.to_str())
        .is_some_and(|existing| existing.eq_ignore_ascii_case(extension));
    if has_extension {
        return path.to_path_buf();
    }
    let mut raw = path.as_os_str().to_os_string();
    raw.push(".");
    raw.push(extension);
    PathBuf::from(raw)
}

/// Writes the document through a temp file in the target directory, so a
/// failed save leaves any previous file intact. Returns the final path.
#[instrument(skip(document), fields(path = %path.display(), clips = document.clips.len()))]
pub fn save_document(path: &Path, document: &AnimationDocument) -> Result<PathBuf> {
    let path = with_extension(path, DEFAULT_EXTENSION);
    let parent = path
        .parent()
        .filter(|parent| !parent.as_os_str().is_empty())
        .map_or_else(|| Path::new(".").to_path_buf(), Path::to_path_buf);
    fs::create_dir_all(&parent)
        .with_context(|| format!("failed to create directory: {}", parent.display()))?;

    let json = serde_json::to_vec_pretty(document).context("failed to serialize animation document")?;
    let mut temp_file = tempfile::NamedTempFile::new_in(&parent)
        .context("failed to create temp animation file")?;
    temp_file
        .write_all(&json)
        .context("failed to write temp animation file")?;
    temp_file
        .persist(&path)
        .map_err(|error| anyhow::anyhow!(error.error))
        .with_context(|| format!("failed to persist animation: {}", path.display()))?;

    info!(path = %path.display(), "animation document saved");
    Ok(path)
}

#[instrument(fields(path = %path.display()))]
pub fn read_document_text(path: &Path) -> Result<String> {
    fs::read_to_string(path)
        .with_context(|| format!("failed to read animation: {}", path.display()))
}

#[instrument(fields(path = %path.display()))]
pub fn load_document(path: &Path) -> Result<AnimationDocument> {
    let content = read_document_text(path)?;
    let document = AnimationDocument::from_json(&content)
        .with_context(|| format!("invalid animation document: {}", path.display()))?;
    info!(
        atom_type = %document.atom_type,
        clips = document.clips.len(),
        "animation document loaded"
    );
    Ok(document)
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AnimationFileEntry {
    pub path: PathBuf,
    pub name: String,
}

/// Animation files under `directory`, sorted by path. Unreadable entries are
/// skipped.
#[instrument(fields(directory = %directory.display(), extension))]
pub fn list_animation_files(directory: &Path, extension: &str) -> Result<Vec<AnimationFileEntry>> {
    if !directory.is_dir() {
        debug!("animation directory does not exist");
        return Ok(Vec::new());
    }

    let mut entries = Vec::new();
    for entry in WalkDir::new(directory).follow_links(true) {
        let entry = match entry {
            Ok(entry) => entry,
            Err(error) => {
                warn!(?error, "ignoring unreadable entry while scanning animations");
                continue;
            }
        };
        if !entry.file_type().is_file() {
            continue;
        }
        let path = entry.path();
        let matches = path
            .extension()
            .and_then(|existing| existing.to_str())
            .is_some_and(|existing| existing.eq_ignore_ascii_case(extension));
        if !matches {
            continue;
        }
        let name = path
            .file_stem()
            .map(|stem| stem.to_string_lossy().into_owned())
            .unwrap_or_default();
        entries.push(AnimationFileEntry {
            path: path.to_path_buf(),
            name,
        });
    }

    entries.sort_by(|left, right| left.path.cmp(&right.path));
    debug!(count = entries.len(), "animation files listed");
    Ok(entries)
}

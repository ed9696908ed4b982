use serde::{Deserialize, Serialize};

use crate::{target::TargetSnapshot, time::is_same_frame};

/// Frames captured by a copy, keyed by their original time.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct ClipboardEntry {
    pub time: f32,
    pub targets: Vec<TargetSnapshot>,
}

impl ClipboardEntry {
    #[must_use]
    pub fn new(time: f32) -> Self {
        Self {
            time,
            targets: Vec::new(),
        }
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.targets.is_empty()
    }

    #[must_use]
    pub fn snapshot(&self, target_name: &str) -> Option<&TargetSnapshot> {
        self.targets
            .iter()
            .find(|snapshot| snapshot.target_name == target_name)
    }
}

/// Session-scoped copy buffer. `time` is the reference the entries are
/// pasted relative to.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct Clipboard {
    pub time: f32,
    pub entries: Vec<ClipboardEntry>,
}

impl Clipboard {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn clear(&mut self) {
        self.time = 0.0;
        self.entries.clear();
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.iter().all(ClipboardEntry::is_empty)
    }

    #[must_use]
    pub fn snapshot_count(&self) -> usize {
        self.entries.iter().map(|entry| entry.targets.len()).sum()
    }

    /// Adds a snapshot to the entry on the same frame, creating the entry
    /// if needed. Entries stay in ascending time order; a later snapshot of
    /// the same target on the same frame replaces the earlier one.
    pub fn push_snapshot(&mut self, time: f32, snapshot: TargetSnapshot) {
        let position = self
            .entries
            .iter()
            .position(|entry| entry.time > time || is_same_frame(entry.time, time));

        let entry = match position {
            Some(index) if is_same_frame(self.entries[index].time, time) => &mut self.entries[index],
            Some(index) => {
                self.entries.insert(index, ClipboardEntry::new(time));
                &mut self.entries[index]
            }
            None => {
                self.entries.push(ClipboardEntry::new(time));
                let last = self.entries.len() - 1;
                &mut self.entries[last]
            }
        };

        if let Some(existing) = entry
            .targets
            .iter_mut()
            .find(|existing| existing.target_name == snapshot.target_name)
        {
            *existing = snapshot;
        } else {
            entry.targets.push(snapshot);
        }
    }
}

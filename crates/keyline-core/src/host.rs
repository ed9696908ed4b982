use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::document::ControllerState;

/// The animated entity as the host exposes it: a type tag and a set of
/// named controllers whose pose can be read and written.
pub trait HostEntity {
    fn atom_type(&self) -> &str;

    fn controller_names(&self) -> Vec<String>;

    fn controller_state(&self, name: &str) -> Option<ControllerState>;

    /// Returns `false` when the entity has no controller called `name`.
    fn apply_controller_state(&mut self, name: &str, state: &ControllerState) -> bool;
}

/// In-memory entity for headless use and tests.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct HostAtom {
    pub atom_type: String,
    pub controllers: BTreeMap<String, ControllerState>,
}

impl HostAtom {
    #[must_use]
    pub fn new(atom_type: impl Into<String>) -> Self {
        Self {
            atom_type: atom_type.into(),
            controllers: BTreeMap::new(),
        }
    }

    #[must_use]
    pub fn with_controller(mut self, name: impl Into<String>, state: ControllerState) -> Self {
        self.controllers.insert(name.into(), state);
        self
    }
}

impl HostEntity for HostAtom {
    fn atom_type(&self) -> &str {
        &self.atom_type
    }

    fn controller_names(&self) -> Vec<String> {
        self.controllers.keys().cloned().collect()
    }

    fn controller_state(&self, name: &str) -> Option<ControllerState> {
        self.controllers.get(name).copied()
    }

    fn apply_controller_state(&mut self, name: &str, state: &ControllerState) -> bool {
        match self.controllers.get_mut(name) {
            Some(existing) => {
                *existing = *state;
                true
            }
            None => false,
        }
    }
}

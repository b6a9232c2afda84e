//! Read-only view of the host's game state used by conditions and page preconditions.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Numbered game variables, game switches, and party inventory.
///
/// Ids the host does not know read as 0 / off.
pub trait GameState {
    fn variable(&self, id: u32) -> i64;
    fn switch(&self, id: u32) -> bool;
    fn item_quantity(&self, id: u32) -> u32;
}

/// Plain in-memory game state.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GameVariables {
    #[serde(default)]
    pub variables: BTreeMap<u32, i64>,
    #[serde(default)]
    pub switches: BTreeMap<u32, bool>,
    #[serde(default)]
    pub items: BTreeMap<u32, u32>,
}

impl GameVariables {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_variable(&mut self, id: u32, value: i64) {
        self.variables.insert(id, value);
    }

    pub fn set_switch(&mut self, id: u32, value: bool) {
        self.switches.insert(id, value);
    }

    pub fn set_item_quantity(&mut self, id: u32, quantity: u32) {
        self.items.insert(id, quantity);
    }
}

impl GameState for GameVariables {
    fn variable(&self, id: u32) -> i64 {
        self.variables.get(&id).copied().unwrap_or(0)
    }

    fn switch(&self, id: u32) -> bool {
        self.switches.get(&id).copied().unwrap_or(false)
    }

    fn item_quantity(&self, id: u32) -> u32 {
        self.items.get(&id).copied().unwrap_or(0)
    }
}

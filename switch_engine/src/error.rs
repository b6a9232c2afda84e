//! Error kinds returned by store, registry, and condition operations.
//!
//! Every variant is recoverable: callers (menus, debug tools, the tick driver) report the
//! rejection and carry on. Nothing here is allowed to abort a tick.

use std::fmt;

use thiserror::Error;

/// Why a switch name was refused.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NameRejection {
    Empty,
    TooLong { max: usize },
    Reserved,
    NotAWord,
}

impl fmt::Display for NameRejection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NameRejection::Empty => write!(f, "name is empty"),
            NameRejection::TooLong { max } => write!(f, "name is longer than {max} characters"),
            NameRejection::Reserved => write!(f, "name is reserved for a built-in self switch"),
            NameRejection::NotAWord => write!(f, "name may only contain letters, digits and '_'"),
        }
    }
}

/// Errors produced by the switch engine.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SwitchError {
    #[error("invalid switch name '{name}': {reason}")]
    InvalidSwitchName { name: String, reason: NameRejection },
    #[error("a switch named '{name}' already exists on map {scope}")]
    NameCollision { scope: i32, name: String },
    #[error("corrupt record '{key}': {reason}")]
    CorruptRecord { key: String, reason: String },
    #[error("map {scope} (event {owner:?}) is not loaded")]
    MissingScope { scope: i32, owner: Option<i32> },
}

impl SwitchError {
    /// Stable reason code for collaborators that map failures onto their own messages.
    pub fn code(&self) -> &'static str {
        match self {
            SwitchError::InvalidSwitchName { .. } => "invalid_switch_name",
            SwitchError::NameCollision { .. } => "name_collision",
            SwitchError::CorruptRecord { .. } => "corrupt_record",
            SwitchError::MissingScope { .. } => "missing_scope",
        }
    }

    pub(crate) fn corrupt(key: impl fmt::Display, reason: impl Into<String>) -> Self {
        SwitchError::CorruptRecord {
            key: key.to_string(),
            reason: reason.into(),
        }
    }
}

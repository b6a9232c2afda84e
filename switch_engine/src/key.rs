//! Switch identity.
//!
//! A switch is addressed by the map it lives on, the event that owns it, and a name. The host
//! engine's four built-in self switches share the same key space under the letters `A`..`D`.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{NameRejection, SwitchError};

/// Longest custom switch name accepted unless configured otherwise.
pub const DEFAULT_MAX_NAME_LEN: usize = 10;

/// `(map, event, name)` address of a switch.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct SwitchKey {
    pub scope: i32,
    pub owner: i32,
    pub name: String,
}

impl SwitchKey {
    pub fn new(scope: i32, owner: i32, name: impl Into<String>) -> Self {
        Self {
            scope,
            owner,
            name: name.into(),
        }
    }

    /// Key for one of the built-in self switches of the same owner.
    pub fn builtin(scope: i32, owner: i32, switch: BuiltinSwitch) -> Self {
        Self::new(scope, owner, switch.as_str())
    }

    /// Same owner, different name.
    pub fn renamed(&self, name: impl Into<String>) -> Self {
        Self::new(self.scope, self.owner, name)
    }

    pub fn is_builtin(&self) -> bool {
        BuiltinSwitch::from_name(&self.name).is_some()
    }
}

impl fmt::Display for SwitchKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}:{}", self.scope, self.owner, self.name)
    }
}

/// The host engine's fixed self switches.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum BuiltinSwitch {
    A,
    B,
    C,
    D,
}

impl BuiltinSwitch {
    pub const ALL: [BuiltinSwitch; 4] = [BuiltinSwitch::A, BuiltinSwitch::B, BuiltinSwitch::C, BuiltinSwitch::D];

    pub fn as_str(self) -> &'static str {
        match self {
            BuiltinSwitch::A => "A",
            BuiltinSwitch::B => "B",
            BuiltinSwitch::C => "C",
            BuiltinSwitch::D => "D",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|s| s.as_str() == name)
    }
}

impl fmt::Display for BuiltinSwitch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Check that `name` can be used for a custom switch.
///
/// # Errors
/// - `InvalidSwitchName` if the name is empty, longer than `max_len` characters, one of the
///   built-in letters, or contains anything besides letters, digits and `_`.
pub fn validate_name(name: &str, max_len: usize) -> Result<(), SwitchError> {
    let reject = |reason| {
        Err(SwitchError::InvalidSwitchName {
            name: name.to_string(),
            reason,
        })
    };
    if name.is_empty() {
        return reject(NameRejection::Empty);
    }
    if name.chars().count() > max_len {
        return reject(NameRejection::TooLong { max: max_len });
    }
    if BuiltinSwitch::from_name(name).is_some() {
        return reject(NameRejection::Reserved);
    }
    if !name.chars().all(|c| c.is_alphanumeric() || c == '_') {
        return reject(NameRejection::NotAWord);
    }
    Ok(())
}

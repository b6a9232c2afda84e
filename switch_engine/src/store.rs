//! Switch value storage.
//!
//! `SwitchStore` maps every [`SwitchKey`] to an explicit on/off value. A key that was never
//! written (or was deleted) is *unset*, which gates pages exactly like "off" but is reported
//! separately for diagnostics.
//!
//! Writes that change a value mark the key's map scope dirty; the host drains the dirty set to
//! decide which maps need their event pages re-resolved.
//!
//! ### Compatibility quirk
//! Turning a custom switch on also forces built-in switch `A` of the same event off. Existing maps
//! may depend on this, so it stays, even though it looks like accidental coupling between the two
//! switch systems.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use log::{debug, warn};
use variantly::Variantly;

use crate::error::SwitchError;
use crate::key::{BuiltinSwitch, DEFAULT_MAX_NAME_LEN, SwitchKey, validate_name};

/// Tri-state value of a switch.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Variantly)]
pub enum SwitchState {
    #[default]
    Unset,
    On,
    Off,
}

impl SwitchState {
    /// Value used for page gating: unset reads as off.
    pub fn as_bool(self) -> bool {
        self == SwitchState::On
    }

    /// The explicit stored value, if any.
    pub fn stored(self) -> Option<bool> {
        match self {
            SwitchState::Unset => None,
            SwitchState::On => Some(true),
            SwitchState::Off => Some(false),
        }
    }
}

impl From<Option<bool>> for SwitchState {
    fn from(value: Option<bool>) -> Self {
        match value {
            None => SwitchState::Unset,
            Some(true) => SwitchState::On,
            Some(false) => SwitchState::Off,
        }
    }
}

impl From<bool> for SwitchState {
    fn from(value: bool) -> Self {
        Some(value).into()
    }
}

impl fmt::Display for SwitchState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SwitchState::Unset => write!(f, "unset"),
            SwitchState::On => write!(f, "ON"),
            SwitchState::Off => write!(f, "OFF"),
        }
    }
}

/// Long-lived store of switch values for the whole session.
#[derive(Debug, Clone)]
pub struct SwitchStore {
    values: BTreeMap<SwitchKey, bool>,
    dirty: BTreeSet<i32>,
    max_name_len: usize,
}

impl Default for SwitchStore {
    fn default() -> Self {
        Self::new()
    }
}

impl SwitchStore {
    pub fn new() -> Self {
        Self::with_max_name_len(DEFAULT_MAX_NAME_LEN)
    }

    pub fn with_max_name_len(max_name_len: usize) -> Self {
        Self {
            values: BTreeMap::new(),
            dirty: BTreeSet::new(),
            max_name_len,
        }
    }

    pub fn max_name_len(&self) -> usize {
        self.max_name_len
    }

    /// Look up a switch. Never creates an entry.
    pub fn get(&self, key: &SwitchKey) -> SwitchState {
        self.values.get(key).copied().into()
    }

    /// True only if the switch is explicitly on.
    pub fn is_on(&self, key: &SwitchKey) -> bool {
        self.get(key).as_bool()
    }

    pub fn builtin(&self, scope: i32, owner: i32, switch: BuiltinSwitch) -> SwitchState {
        self.get(&SwitchKey::builtin(scope, owner, switch))
    }

    /// Write a custom switch and report whether its value changed.
    ///
    /// # Errors
    /// - `InvalidSwitchName` if the key's name is not a valid custom name; nothing is written.
    pub fn set(&mut self, key: &SwitchKey, value: bool) -> Result<bool, SwitchError> {
        validate_name(&key.name, self.max_name_len)?;
        let changed = self.write(key.clone(), value);
        if value {
            self.write(SwitchKey::builtin(key.scope, key.owner, BuiltinSwitch::A), false);
        }
        debug!("switch {key} set to {}", SwitchState::from(value));
        Ok(changed)
    }

    /// Write one of the built-in self switches.
    pub fn set_builtin(&mut self, scope: i32, owner: i32, switch: BuiltinSwitch, value: bool) -> bool {
        self.write(SwitchKey::builtin(scope, owner, switch), value)
    }

    /// Create a custom switch as off if it has no value yet. Does not mark the scope dirty,
    /// since unset and off gate pages identically.
    ///
    /// # Errors
    /// - `InvalidSwitchName` for an invalid custom name.
    pub fn ensure_default(&mut self, key: &SwitchKey) -> Result<bool, SwitchError> {
        validate_name(&key.name, self.max_name_len)?;
        if self.values.contains_key(key) {
            return Ok(false);
        }
        self.values.insert(key.clone(), false);
        Ok(true)
    }

    /// Remove a switch value. Returns the value it held.
    pub fn delete(&mut self, key: &SwitchKey) -> Option<bool> {
        let old = self.values.remove(key);
        if old.is_some() {
            self.dirty.insert(key.scope);
        }
        old
    }

    /// Move the value stored at `old` to `new`, leaving `old` unset.
    ///
    /// If `new` already holds a value that differs from `old`'s, the rename is refused unless
    /// `overwrite` is set (the caller has confirmed replacing it).
    ///
    /// # Errors
    /// - `InvalidSwitchName` if either name is not a valid custom name.
    /// - `NameCollision` if `new` holds a conflicting value and `overwrite` is false.
    pub fn rename(&mut self, old: &SwitchKey, new: &SwitchKey, overwrite: bool) -> Result<(), SwitchError> {
        validate_name(&old.name, self.max_name_len)?;
        validate_name(&new.name, self.max_name_len)?;
        if old == new {
            return Ok(());
        }
        let moving = self.values.get(old).copied();
        let existing = self.values.get(new).copied();
        if existing.is_some() && existing != moving && !overwrite {
            warn!("refusing to rename {old} onto {new}: target already holds a different value");
            return Err(SwitchError::NameCollision {
                scope: new.scope,
                name: new.name.clone(),
            });
        }
        self.values.remove(old);
        match moving {
            Some(value) => {
                self.values.insert(new.clone(), value);
            },
            None => {
                self.values.remove(new);
            },
        }
        self.dirty.insert(old.scope);
        self.dirty.insert(new.scope);
        debug!("switch {old} renamed to {new}");
        Ok(())
    }

    /// Custom (non built-in) switches with an explicit value in `scope`.
    pub fn custom_entries(&self, scope: i32) -> impl Iterator<Item = (&SwitchKey, bool)> {
        self.values
            .iter()
            .filter(move |(key, _)| key.scope == scope && !key.is_builtin())
            .map(|(key, value)| (key, *value))
    }

    /// Every stored value, built-in switches included.
    pub fn entries(&self) -> impl Iterator<Item = (&SwitchKey, bool)> {
        self.values.iter().map(|(key, value)| (key, *value))
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Flag a scope for page re-resolution without writing anything.
    pub fn mark_dirty(&mut self, scope: i32) {
        self.dirty.insert(scope);
    }

    pub fn is_dirty(&self, scope: i32) -> bool {
        self.dirty.contains(&scope)
    }

    /// Consume the dirty flag of a scope.
    pub fn take_dirty(&mut self, scope: i32) -> bool {
        self.dirty.remove(&scope)
    }

    /// Consume every dirty flag.
    pub fn drain_dirty(&mut self) -> Vec<i32> {
        std::mem::take(&mut self.dirty).into_iter().collect()
    }

    /// Insert a value coming from a saved snapshot: no side effects, built-in letters allowed.
    pub(crate) fn restore(&mut self, key: SwitchKey, value: bool) -> Result<(), SwitchError> {
        if !key.is_builtin() {
            validate_name(&key.name, self.max_name_len)?;
        }
        self.values.insert(key, value);
        Ok(())
    }

    pub(crate) fn clear(&mut self) {
        self.values.clear();
        self.dirty.clear();
    }

    fn write(&mut self, key: SwitchKey, value: bool) -> bool {
        let scope = key.scope;
        let changed = self.values.insert(key, value) != Some(value);
        if changed {
            self.dirty.insert(scope);
        }
        changed
    }
}

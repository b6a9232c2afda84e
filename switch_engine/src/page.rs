//! Page preconditions and resolution.
//!
//! Each page's preconditions are parsed once, when its event is loaded, into an ordered list of
//! [`Precondition`]s: the standard ones from the page's condition block first, then the switch
//! annotations found in its comments. [`PageResolver`] walks an event's pages from last to first
//! and selects the first one whose preconditions all hold.

use log::warn;
use switch_data::{PageDef, TriggerKind};

use crate::annotation::{self, SwitchAnnotation};
use crate::game_state::GameState;
use crate::key::{BuiltinSwitch, SwitchKey};
use crate::store::SwitchStore;

/// One gate on a page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Precondition {
    /// Game switch 1 must be on.
    Flag(u32),
    /// Game switch 2 must be on.
    Flag2(u32),
    /// Game variable must be at least `at_least`.
    Variable { id: u32, at_least: i64 },
    /// Built-in self switch must be in the required state.
    Builtin { switch: BuiltinSwitch, required: bool },
    /// Custom switch must be in the required state. Unset reads as off.
    Custom { name: String, required: bool },
}

impl Precondition {
    /// Standard preconditions come from the page's condition block and only touch game state.
    pub fn is_standard(&self) -> bool {
        !matches!(self, Precondition::Custom { .. })
    }

    pub fn holds(&self, scope: i32, owner: i32, store: &SwitchStore, state: &dyn GameState) -> bool {
        match self {
            Precondition::Flag(id) | Precondition::Flag2(id) => state.switch(*id),
            Precondition::Variable { id, at_least } => state.variable(*id) >= *at_least,
            Precondition::Builtin { switch, required } => store.builtin(scope, owner, *switch).as_bool() == *required,
            Precondition::Custom { name, required } => {
                store.get(&SwitchKey::new(scope, owner, name.as_str())).as_bool() == *required
            },
        }
    }
}

impl From<SwitchAnnotation> for Precondition {
    fn from(found: SwitchAnnotation) -> Self {
        match BuiltinSwitch::from_name(&found.name) {
            Some(switch) => Precondition::Builtin {
                switch,
                required: found.required,
            },
            None => Precondition::Custom {
                name: found.name,
                required: found.required,
            },
        }
    }
}

/// A page with its preconditions parsed.
#[derive(Debug, Clone)]
pub struct Page {
    pub index: usize,
    pub preconditions: Vec<Precondition>,
    pub def: PageDef,
}

impl Page {
    pub fn from_def(index: usize, def: &PageDef) -> Self {
        let mut preconditions = Vec::new();
        if let Some(cond) = &def.condition {
            if let Some(id) = cond.switch1 {
                preconditions.push(Precondition::Flag(id));
            }
            if let Some(id) = cond.switch2 {
                preconditions.push(Precondition::Flag2(id));
            }
            if let Some(var) = &cond.variable {
                preconditions.push(Precondition::Variable {
                    id: var.id,
                    at_least: var.value,
                });
            }
            if let Some(letter) = &cond.self_switch {
                match BuiltinSwitch::from_name(letter) {
                    Some(switch) => preconditions.push(Precondition::Builtin { switch, required: true }),
                    None => {
                        warn!("page {} self switch condition '{letter}' is not a built-in letter", index + 1);
                        preconditions.push(Precondition::Custom {
                            name: letter.clone(),
                            required: true,
                        });
                    },
                }
            }
        }
        preconditions.extend(annotation::parse_page(def).into_iter().map(Precondition::from));
        preconditions.sort_by_key(|p| !p.is_standard());
        Self {
            index,
            preconditions,
            def: def.clone(),
        }
    }

    pub fn trigger(&self) -> TriggerKind {
        self.def.trigger
    }

    /// Names of the custom switches this page reads.
    pub fn custom_switches(&self) -> impl Iterator<Item = &str> {
        self.preconditions.iter().filter_map(|p| match p {
            Precondition::Custom { name, .. } => Some(name.as_str()),
            _ => None,
        })
    }

    /// True if every precondition holds, checking standard ones first.
    pub fn matches(&self, scope: i32, owner: i32, store: &SwitchStore, state: &dyn GameState) -> bool {
        self.preconditions
            .iter()
            .all(|p| p.holds(scope, owner, store, state))
    }
}

/// Parse every page slot of an event. Missing slots stay `None` and never match.
pub fn parse_pages(pages: &[Option<PageDef>]) -> Vec<Option<Page>> {
    pages
        .iter()
        .enumerate()
        .map(|(index, slot)| slot.as_ref().map(|def| Page::from_def(index, def)))
        .collect()
}

/// Result of resolving an event's pages.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Resolution {
    /// Index of the selected page, or `None` if no page matches.
    pub page: Option<usize>,
    /// False when the selection is the same page as before.
    pub changed: bool,
}

/// Read-only page selection over the current switch values and game state.
pub struct PageResolver<'a> {
    store: &'a SwitchStore,
    state: &'a dyn GameState,
}

impl<'a> PageResolver<'a> {
    pub fn new(store: &'a SwitchStore, state: &'a dyn GameState) -> Self {
        Self { store, state }
    }

    /// Select the last-declared page whose preconditions hold.
    pub fn resolve(&self, scope: i32, owner: i32, pages: &[Option<Page>], previous: Option<usize>) -> Resolution {
        let page = pages
            .iter()
            .rev()
            .flatten()
            .find(|page| page.matches(scope, owner, self.store, self.state))
            .map(|page| page.index);
        Resolution {
            page,
            changed: page != previous,
        }
    }
}

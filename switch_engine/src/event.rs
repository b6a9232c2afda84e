//! Runtime map events.
//!
//! A `MapEvent` owns its current page index and the presentation state derived from that page.
//! Refreshing asks the [`PageResolver`] for a selection and only reinitializes presentation when
//! the selection actually changed.

use log::{debug, warn};
use switch_data::{CommandDef, EventDef, GraphicDef, MoveType, PageDef, TriggerKind};

use crate::game_state::GameState;
use crate::key::SwitchKey;
use crate::page::{Page, PageResolver, parse_pages};
use crate::store::SwitchStore;

/// What the host draws and runs for an event.
#[derive(Debug, Clone, PartialEq)]
pub struct Presentation {
    pub graphic: GraphicDef,
    pub move_type: MoveType,
    pub move_speed: u8,
    pub move_frequency: u8,
    pub walk_anime: bool,
    pub step_anime: bool,
    pub direction_fix: bool,
    pub through: bool,
    pub always_on_top: bool,
    /// `None` when no page is active and the event cannot be started.
    pub trigger: Option<TriggerKind>,
    pub list: Vec<CommandDef>,
}

impl Presentation {
    /// State of an event with no active page: no graphic, no commands, passable.
    pub fn inert() -> Self {
        Self {
            graphic: GraphicDef::default(),
            move_type: MoveType::Fixed,
            move_speed: 3,
            move_frequency: 3,
            walk_anime: false,
            step_anime: false,
            direction_fix: false,
            through: true,
            always_on_top: false,
            trigger: None,
            list: Vec::new(),
        }
    }

    pub fn from_page(def: &PageDef) -> Self {
        Self {
            graphic: def.graphic.clone(),
            move_type: def.move_type,
            move_speed: def.move_speed,
            move_frequency: def.move_frequency,
            walk_anime: def.walk_anime,
            step_anime: def.step_anime,
            direction_fix: def.direction_fix,
            through: def.through,
            always_on_top: def.always_on_top,
            trigger: Some(def.trigger),
            list: def.list.clone().unwrap_or_default(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct MapEvent {
    pub scope: i32,
    pub id: i32,
    pub name: String,
    pages: Vec<Option<Page>>,
    current_page: Option<usize>,
    presentation: Presentation,
    /// Number of times presentation was reinitialized.
    setups: usize,
    autorun_pending: bool,
}

impl MapEvent {
    pub fn from_def(scope: i32, def: &EventDef) -> Self {
        if def.pages.iter().any(Option::is_none) {
            warn!("map {scope} event {} has missing pages; they will never be selected", def.id);
        }
        Self {
            scope,
            id: def.id,
            name: def.name.clone(),
            pages: parse_pages(&def.pages),
            current_page: None,
            presentation: Presentation::inert(),
            setups: 0,
            autorun_pending: false,
        }
    }

    pub fn pages(&self) -> &[Option<Page>] {
        &self.pages
    }

    pub fn current_page(&self) -> Option<usize> {
        self.current_page
    }

    pub fn page(&self) -> Option<&Page> {
        self.current_page
            .and_then(|index| self.pages.get(index))
            .and_then(Option::as_ref)
    }

    pub fn presentation(&self) -> &Presentation {
        &self.presentation
    }

    pub fn setup_count(&self) -> usize {
        self.setups
    }

    pub fn is_autorun_pending(&self) -> bool {
        self.autorun_pending
    }

    /// Consume the pending autorun check, if any.
    pub fn take_autorun(&mut self) -> bool {
        std::mem::take(&mut self.autorun_pending)
    }

    /// Re-resolve this event's page. Returns true if the page changed.
    pub fn refresh(&mut self, store: &mut SwitchStore, state: &dyn GameState) -> bool {
        let resolution = PageResolver::new(store, state).resolve(self.scope, self.id, &self.pages, self.current_page);
        if !resolution.changed {
            return false;
        }
        debug!(
            "map {} event {} page {:?} -> {:?}",
            self.scope, self.id, self.current_page, resolution.page
        );
        self.current_page = resolution.page;
        self.setup_page(store);
        true
    }

    fn setup_page(&mut self, store: &mut SwitchStore) {
        self.setups += 1;
        let Some(page) = self.current_page.and_then(|i| self.pages.get(i)).and_then(Option::as_ref) else {
            self.presentation = Presentation::inert();
            self.autorun_pending = false;
            return;
        };
        self.presentation = Presentation::from_page(&page.def);
        for name in page.custom_switches() {
            let key = SwitchKey::new(self.scope, self.id, name);
            if let Err(e) = store.ensure_default(&key) {
                warn!("page {} of map {} event {}: {e}", page.index + 1, self.scope, self.id);
            }
        }
        if page.trigger() == TriggerKind::Autorun {
            self.autorun_pending = true;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::game_state::GameVariables;

    fn event(pages: Vec<Option<PageDef>>) -> MapEvent {
        MapEvent::from_def(
            1,
            &EventDef {
                id: 5,
                name: "Door".into(),
                pages,
            },
        )
    }

    fn page(trigger: TriggerKind, comments: &[&str]) -> Option<PageDef> {
        Some(PageDef {
            trigger,
            list: Some(comments.iter().map(|c| CommandDef::comment(*c)).collect()),
            ..PageDef::default()
        })
    }

    #[test]
    fn refresh_sets_up_only_on_change() {
        let mut store = SwitchStore::new();
        let state = GameVariables::new();
        let mut ev = event(vec![page(TriggerKind::ActionButton, &[])]);
        assert!(ev.refresh(&mut store, &state));
        assert_eq!(ev.current_page(), Some(0));
        assert_eq!(ev.setup_count(), 1);
        for _ in 0..5 {
            assert!(!ev.refresh(&mut store, &state));
        }
        assert_eq!(ev.setup_count(), 1);
    }

    #[test]
    fn no_matching_page_makes_event_inert() {
        let mut store = SwitchStore::new();
        let state = GameVariables::new();
        let door = SwitchKey::new(1, 5, "DOOR");
        store.set(&door, true).expect("set");
        let mut ev = event(vec![page(TriggerKind::PlayerTouch, &["SelfSwitch: DOOR"])]);
        ev.refresh(&mut store, &state);
        assert_eq!(ev.presentation().trigger, Some(TriggerKind::PlayerTouch));
        assert!(!ev.presentation().list.is_empty());

        store.set(&door, false).expect("set");
        assert!(ev.refresh(&mut store, &state));
        assert_eq!(ev.current_page(), None);
        assert_eq!(ev.presentation(), &Presentation::inert());
    }

    #[test]
    fn autorun_page_requests_one_check() {
        let mut store = SwitchStore::new();
        let state = GameVariables::new();
        let mut ev = event(vec![page(TriggerKind::Autorun, &[])]);
        ev.refresh(&mut store, &state);
        assert!(ev.take_autorun());
        assert!(!ev.take_autorun());
        ev.refresh(&mut store, &state);
        assert!(!ev.is_autorun_pending());
    }

    #[test]
    fn page_setup_defaults_referenced_switches_to_off() {
        let mut store = SwitchStore::new();
        let state = GameVariables::new();
        let mut ev = event(vec![page(TriggerKind::ActionButton, &["Switch: LAMP: off"])]);
        ev.refresh(&mut store, &state);
        assert_eq!(ev.current_page(), Some(0));
        assert_eq!(store.get(&SwitchKey::new(1, 5, "LAMP")).stored(), Some(false));
        assert!(!store.is_dirty(1));
    }
}

//! The currently loaded map and its events.

use std::collections::BTreeMap;

use log::{debug, info};
use switch_data::MapDef;

use crate::event::MapEvent;
use crate::game_state::GameState;
use crate::store::SwitchStore;

/// Events whose page changed during one refresh.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RefreshReport {
    /// `(event id, new page)` for each event whose selection changed.
    pub changed: Vec<(i32, Option<usize>)>,
    /// Events whose new page is autorun.
    pub autoruns: Vec<i32>,
}

#[derive(Debug, Clone)]
pub struct GameMap {
    pub id: i32,
    pub name: String,
    pub events: BTreeMap<i32, MapEvent>,
    /// Set when the map needs its events re-resolved on the next tick.
    pub need_refresh: bool,
}

impl GameMap {
    /// Build runtime events for a map. The map starts out needing a refresh.
    pub fn from_def(def: &MapDef) -> Self {
        let mut events = BTreeMap::new();
        for event in &def.events {
            if events.insert(event.id, MapEvent::from_def(def.id, event)).is_some() {
                debug!("map {} event {} declared twice; keeping the later one", def.id, event.id);
            }
        }
        info!("map {} '{}' loaded with {} events", def.id, def.name, events.len());
        Self {
            id: def.id,
            name: def.name.clone(),
            events,
            need_refresh: true,
        }
    }

    pub fn event(&self, id: i32) -> Option<&MapEvent> {
        self.events.get(&id)
    }

    pub fn event_mut(&mut self, id: i32) -> Option<&mut MapEvent> {
        self.events.get_mut(&id)
    }

    /// Re-resolve every event and clear `need_refresh`.
    pub fn refresh(&mut self, store: &mut SwitchStore, state: &dyn GameState) -> RefreshReport {
        let mut report = RefreshReport::default();
        for (id, event) in &mut self.events {
            if event.refresh(store, state) {
                report.changed.push((*id, event.current_page()));
                if event.is_autorun_pending() {
                    report.autoruns.push(*id);
                }
            }
        }
        self.need_refresh = false;
        if !report.changed.is_empty() {
            debug!("map {} refresh: {} events changed page", self.id, report.changed.len());
        }
        report
    }
}

use std::collections::HashSet;
use std::fmt;

use crate::*;

/// Letters the host engine reserves for its built-in self switches.
pub const BUILTIN_SELF_SWITCHES: [&str; 4] = ["A", "B", "C", "D"];

/// Problem found in a set of map definitions.
///
/// None of these are fatal to the engine: the loader logs them and skips the offending record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    DuplicateMap { map_id: i32 },
    DuplicateEvent { map_id: i32, event_id: i32 },
    EmptyEvent { map_id: i32, event_id: i32 },
    MissingPage { map_id: i32, event_id: i32, page: usize },
    InvalidValue { context: String },
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ValidationError::DuplicateMap { map_id } => write!(f, "duplicate map id {map_id}"),
            ValidationError::DuplicateEvent { map_id, event_id } => {
                write!(f, "duplicate event id {event_id} on map {map_id}")
            },
            ValidationError::EmptyEvent { map_id, event_id } => {
                write!(f, "event {event_id} on map {map_id} declares no pages")
            },
            ValidationError::MissingPage { map_id, event_id, page } => {
                write!(f, "event {event_id} on map {map_id}: page {} is missing", page + 1)
            },
            ValidationError::InvalidValue { context } => write!(f, "invalid value ({context})"),
        }
    }
}

impl std::error::Error for ValidationError {}

/// Check basic invariants across a set of maps.
///
/// ```
/// use switch_data::{EventDef, MapDef, PageDef, validate_maps};
///
/// let maps = vec![MapDef {
///     id: 1,
///     name: "Town".into(),
///     events: vec![EventDef {
///         id: 5,
///         name: "Door".into(),
///         pages: vec![Some(PageDef::default())],
///     }],
/// }];
/// assert!(validate_maps(&maps).is_empty());
/// ```
pub fn validate_maps(maps: &[MapDef]) -> Vec<ValidationError> {
    let mut errors = Vec::new();
    let mut map_ids = HashSet::new();

    for map in maps {
        if !map_ids.insert(map.id) {
            errors.push(ValidationError::DuplicateMap { map_id: map.id });
        }
        let mut event_ids = HashSet::new();
        for event in &map.events {
            if !event_ids.insert(event.id) {
                errors.push(ValidationError::DuplicateEvent {
                    map_id: map.id,
                    event_id: event.id,
                });
            }
            validate_event(map.id, event, &mut errors);
        }
    }

    errors
}

fn validate_event(map_id: i32, event: &EventDef, errors: &mut Vec<ValidationError>) {
    if event.pages.is_empty() {
        errors.push(ValidationError::EmptyEvent {
            map_id,
            event_id: event.id,
        });
    }
    for (index, slot) in event.pages.iter().enumerate() {
        let Some(page) = slot else {
            errors.push(ValidationError::MissingPage {
                map_id,
                event_id: event.id,
                page: index,
            });
            continue;
        };
        if let Some(letter) = page.condition.as_ref().and_then(|c| c.self_switch.as_deref())
            && !BUILTIN_SELF_SWITCHES.contains(&letter)
        {
            errors.push(ValidationError::InvalidValue {
                context: format!(
                    "event {} on map {map_id}, page {}: unknown self switch '{letter}'",
                    event.id,
                    index + 1
                ),
            });
        }
    }
}

#![warn(clippy::pedantic)]
#![allow(clippy::must_use_candidate)]
#![allow(clippy::missing_panics_doc)]

pub const SWITCH_ENGINE_VERSION: &str = env!("CARGO_PKG_VERSION");

// Switch state
pub mod error;
pub mod key;
pub mod registry;
pub mod store;

// Conditions
pub mod condition;
pub mod evaluator;
pub mod game_state;

// Pages and maps
pub mod annotation;
pub mod event;
pub mod map;
pub mod page;

// Wiring and persistence
pub mod config;
pub mod engine;
pub mod loader;
pub mod snapshot;

// Re-exports for convenience
pub use condition::{CompareOp, Condition, ConditionKey, ConditionKind, ConditionRegistry, QuantityOp, RawCondition};
pub use config::{EngineConfig, load_config};
pub use engine::{SwitchEngine, TickReport};
pub use error::{NameRejection, SwitchError};
pub use evaluator::{ChangeNotice, Clock, ConditionEvaluator, ManualClock, PassReport, SystemClock};
pub use game_state::{GameState, GameVariables};
pub use key::{BuiltinSwitch, SwitchKey};
pub use loader::load_maps;
pub use map::GameMap;
pub use page::{PageResolver, Precondition, Resolution};
pub use registry::SwitchRegistry;
pub use snapshot::SwitchSnapshot;
pub use store::{SwitchState, SwitchStore};

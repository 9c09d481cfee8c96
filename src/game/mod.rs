//! Game Logic Module
//!
//! All battle simulation code. 100% deterministic.
//!
//! ## Module Structure
//!
//! - `field`: Tile grid, column ownership and column swaps
//! - `input`: Per-tick intents and intent logs
//! - `entity`: Entities, traits and status timers
//! - `hit`: Hit accumulation and resolution
//! - `behavior`: The behavior state machine and its variants
//! - `chip`: Chip catalog
//! - `timestop`: Timestop stack records
//! - `context`: What a behavior may touch while it steps
//! - `events`: Sounds, decorations and battle events
//! - `state`: Complete simulation state
//! - `tick`: Authoritative step scheduler

pub mod field;
pub mod input;
pub mod entity;
pub mod hit;
pub mod behavior;
pub mod chip;
pub mod timestop;
pub mod context;
pub mod events;
pub mod state;
pub mod tick;

// Re-export key types
pub use field::{Direction, Field, Side, TilePos, TILE_COLS, TILE_ROWS};
pub use input::{Intent, IntentLog};
pub use entity::{Entity, EntityId, EntityTraits};
pub use hit::Hit;
pub use behavior::{Behavior, BehaviorKind, BehaviorState};
pub use chip::{Chip, ChipCatalog};
pub use state::{MatchPhase, SimState};
pub use tick::{SimConfig, TickResult, tick, replay};
pub use events::BattleEvent;

//! Simulation State
//!
//! Everything that must match between peers lives in `SimState`.
//! Uses BTreeMap for deterministic iteration order; every field is plain
//! owned data, so a `clone()` is a full independent snapshot.

use std::collections::BTreeMap;
use serde::{Serialize, Deserialize};

use crate::core::hash::{StateHash, compute_state_hash};
use crate::core::rng::DeterministicRng;
use crate::game::behavior::Behavior;
use crate::game::entity::{Entity, EntityId};
use crate::game::events::{BattleEvent, Presentation};
use crate::game::field::{Field, Side, Tile, TilePos};
use crate::game::tick::SimConfig;
use crate::game::timestop::Timestop;

/// Starting tile of each side's player, as (x, y).
pub const PLAYER_START: [(i32, i32); 2] = [(1, 2), (6, 2)];

// =============================================================================
// MATCH PHASE
// =============================================================================

/// Current phase of the battle.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum MatchPhase {
    /// Nothing steps until the countdown runs out
    Countdown {
        /// Ticks left
        ticks_remaining: u32,
    },
    /// Active gameplay
    Playing,
    /// A player reached 0 HP
    Ended {
        /// Winner, or None on a draw
        winner: Option<Side>,
    },
}

// =============================================================================
// PLAYER SLOT
// =============================================================================

/// Per-side chip state.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlayerSlot {
    /// Side this slot belongs to
    pub side: Side,
    /// The player's entity
    pub entity: EntityId,
    /// Draw pile of chip indices, top first
    pub folder: Vec<u16>,
    /// Chips ready to use, front first
    pub hand: Vec<u16>,
    /// Ticks of custom gauge filled
    pub custom_gauge: u32,
}

impl PlayerSlot {
    /// Draw from the folder until the hand holds `hand_size` chips.
    pub fn refill_hand(&mut self, hand_size: usize) {
        while self.hand.len() < hand_size && !self.folder.is_empty() {
            let chip = self.folder.remove(0);
            self.hand.push(chip);
        }
    }
}

// =============================================================================
// SIM STATE
// =============================================================================

/// Complete simulation state.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct SimState {
    /// Gameplay ticks simulated
    pub tick: u32,

    /// Calls to `tick()`, including countdown ticks
    pub frame: u32,

    /// Current phase
    pub phase: MatchPhase,

    /// Negotiated seed (for verification)
    pub rng_seed: u64,

    /// Synchronized random source
    pub rng: DeterministicRng,

    /// All entities (BTreeMap for deterministic iteration)
    pub entities: BTreeMap<EntityId, Entity>,

    /// Next entity id (monotonic, never reused)
    pub next_entity_id: u64,

    /// Tile grid
    pub field: Field,

    /// Timestop stack, top last
    pub timestops: Vec<Timestop>,

    /// Live sounds and decorations
    pub presentation: Presentation,

    /// Per-side chip state, indexed by `Side::index`
    pub players: [PlayerSlot; 2],

    /// Events generated this tick (cleared each tick)
    #[serde(skip)]
    pub pending_events: Vec<BattleEvent>,
}

impl SimState {
    /// Create the starting state for a negotiated seed.
    ///
    /// Each side's folder is shuffled with the synchronized source (offerer
    /// first) and the opening hand is drawn.
    pub fn new(rng_seed: u64, config: &SimConfig) -> Self {
        let mut rng = DeterministicRng::new(rng_seed);
        let mut entities = BTreeMap::new();
        let mut next_entity_id = 0u64;

        let players = Side::ALL.map(|side| {
            let (x, y) = PLAYER_START[side.index()];
            let id = EntityId(next_entity_id);
            next_entity_id += 1;

            let mut entity = match TilePos::new(x, y) {
                Some(pos) => Entity::new(side, pos, Behavior::idle()),
                None => unreachable!("player start tile is on the field"),
            }
            .with_hp(config.player_hp);
            entity.id = id;
            entities.insert(id, entity);

            let mut folder = config.folder.clone();
            rng.shuffle(&mut folder);

            let mut slot = PlayerSlot {
                side,
                entity: id,
                folder,
                hand: Vec::with_capacity(config.hand_size),
                custom_gauge: 0,
            };
            slot.refill_hand(config.hand_size);
            slot
        });

        let phase = if config.countdown_ticks == 0 {
            MatchPhase::Playing
        } else {
            MatchPhase::Countdown {
                ticks_remaining: config.countdown_ticks,
            }
        };

        Self {
            tick: 0,
            frame: 0,
            phase,
            rng_seed,
            rng,
            entities,
            next_entity_id,
            field: Field::new(),
            timestops: Vec::new(),
            presentation: Presentation::default(),
            players,
            pending_events: Vec::new(),
        }
    }

    /// Look up an entity.
    pub fn entity(&self, id: EntityId) -> Option<&Entity> {
        self.entities.get(&id)
    }

    /// All entities in id order.
    pub fn entities(&self) -> impl Iterator<Item = &Entity> {
        self.entities.values()
    }

    /// All tiles with their positions.
    pub fn tiles(&self) -> impl Iterator<Item = (TilePos, &Tile)> {
        self.field.tiles()
    }

    /// A side's player slot.
    pub fn player(&self, side: Side) -> &PlayerSlot {
        &self.players[side.index()]
    }

    /// A side's player entity.
    ///
    /// # Panics
    ///
    /// If the player entity was removed, which never happens in a valid state.
    pub fn player_entity(&self, side: Side) -> &Entity {
        let id = self.players[side.index()].entity;
        self.entities
            .get(&id)
            .unwrap_or_else(|| panic!("player entity {id} missing"))
    }

    /// Whether a timestop is active.
    pub fn timestop_active(&self) -> bool {
        !self.timestops.is_empty()
    }

    /// Top of the timestop stack.
    pub fn top_timestop(&self) -> Option<&Timestop> {
        self.timestops.last()
    }

    /// Whether the battle is over.
    pub fn is_ended(&self) -> bool {
        matches!(self.phase, MatchPhase::Ended { .. })
    }

    /// Winner, once ended.
    pub fn winner(&self) -> Option<Side> {
        match self.phase {
            MatchPhase::Ended { winner } => winner,
            _ => None,
        }
    }

    /// Compute hash of current state for desync detection.
    pub fn compute_hash(&self) -> StateHash {
        compute_state_hash(self.tick, self.rng.state(), |hasher| {
            hasher.update_u32(self.frame);
            match self.phase {
                MatchPhase::Countdown { ticks_remaining } => {
                    hasher.update_u8(0);
                    hasher.update_u32(ticks_remaining);
                }
                MatchPhase::Playing => hasher.update_u8(1),
                MatchPhase::Ended { winner } => {
                    hasher.update_u8(2);
                    hasher.update_u8(winner.map_or(u8::MAX, |s| s as u8));
                }
            }

            // Entities in sorted order (BTreeMap guarantees this)
            hasher.update_u64(self.next_entity_id);
            hasher.update_u32(self.entities.len() as u32);
            for entity in self.entities.values() {
                entity.hash_into(hasher);
            }

            self.field.hash_into(hasher);

            hasher.update_u32(self.timestops.len() as u32);
            for timestop in &self.timestops {
                timestop.hash_into(hasher);
            }

            self.presentation.hash_into(hasher);

            for slot in &self.players {
                hasher.update_u64(slot.entity.0);
                hasher.update_u32(slot.custom_gauge);
                hasher.update_u32(slot.folder.len() as u32);
                for chip in &slot.folder {
                    hasher.update_u16(*chip);
                }
                hasher.update_u32(slot.hand.len() as u32);
                for chip in &slot.hand {
                    hasher.update_u16(*chip);
                }
            }
        })
    }

    /// Serialize the full state.
    pub fn snapshot_bytes(&self) -> Result<Vec<u8>, bincode::Error> {
        bincode::serialize(self)
    }

    /// Rebuild a state from `snapshot_bytes` output.
    pub fn restore(bytes: &[u8]) -> Result<Self, bincode::Error> {
        bincode::deserialize(bytes)
    }

    /// Take pending events (consumes them).
    pub fn take_events(&mut self) -> Vec<BattleEvent> {
        std::mem::take(&mut self.pending_events)
    }
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> SimConfig {
        SimConfig {
            countdown_ticks: 0,
            ..SimConfig::default()
        }
    }

    #[test]
    fn test_new_state_places_players() {
        let state = SimState::new(12345, &config());

        let offerer = state.player_entity(Side::Offerer);
        let answerer = state.player_entity(Side::Answerer);
        assert_eq!(offerer.tile_pos.xy(), (1, 2));
        assert_eq!(answerer.tile_pos.xy(), (6, 2));
        assert!(!offerer.flip);
        assert!(answerer.flip);
        assert_eq!(offerer.hp, config().player_hp);
        assert_ne!(offerer.id, answerer.id);
    }

    #[test]
    fn test_opening_hands_drawn() {
        let cfg = config();
        let state = SimState::new(12345, &cfg);

        for side in Side::ALL {
            let slot = state.player(side);
            assert_eq!(slot.hand.len(), cfg.hand_size);
            assert_eq!(slot.hand.len() + slot.folder.len(), cfg.folder.len());
        }
    }

    #[test]
    fn test_same_seed_same_state() {
        let a = SimState::new(777, &config());
        let b = SimState::new(777, &config());
        assert_eq!(a.compute_hash(), b.compute_hash());
        assert_eq!(a.snapshot_bytes().unwrap(), b.snapshot_bytes().unwrap());
    }

    #[test]
    fn test_different_seed_shuffles_differently() {
        let a = SimState::new(1, &config());
        let b = SimState::new(2, &config());
        assert_ne!(a.compute_hash(), b.compute_hash());
    }

    #[test]
    fn test_snapshot_restore_roundtrip() {
        let state = SimState::new(4242, &config());
        let bytes = state.snapshot_bytes().unwrap();
        let restored = SimState::restore(&bytes).unwrap();

        assert_eq!(restored.compute_hash(), state.compute_hash());
        assert_eq!(restored.rng.state(), state.rng.state());
    }

    #[test]
    fn test_countdown_phase_from_config() {
        let cfg = SimConfig {
            countdown_ticks: 30,
            ..SimConfig::default()
        };
        let state = SimState::new(1, &cfg);
        assert_eq!(state.phase, MatchPhase::Countdown { ticks_remaining: 30 });
    }
}

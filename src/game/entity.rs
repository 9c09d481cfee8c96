//! Entity Definitions
//!
//! Everything that lives on the field (players, projectiles, falling panels)
//! is an `Entity`. What an entity does each tick is decided by its active
//! behavior; this module only holds the data.

use serde::{Serialize, Deserialize};

use crate::core::hash::StateHasher;
use crate::game::behavior::{Behavior, BehaviorImpl, BehaviorState};
use crate::game::field::{Direction, Side, TilePos};
use crate::game::hit::Hit;
use crate::game::input::Intent;

// =============================================================================
// ENTITY ID
// =============================================================================

/// Unique entity identifier.
///
/// Assigned from a monotonic counter and never reused within a session,
/// so ordering by id is ordering by creation.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct EntityId(pub u64);

impl std::fmt::Display for EntityId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "#{}", self.0)
    }
}

// =============================================================================
// TRAITS
// =============================================================================

/// Static capability flags of an entity (packed bits).
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(transparent)]
pub struct EntityTraits(pub u8);

impl EntityTraits {
    /// No flags
    pub const NONE: EntityTraits = EntityTraits(0);
    /// May stand on broken tiles and holes
    pub const CAN_STEP_ON_HOLE_LIKE: EntityTraits = EntityTraits(0x01);
    /// Does not trigger tile enter/leave effects
    pub const IGNORES_TILE_EFFECTS: EntityTraits = EntityTraits(0x02);
    /// Flinching hits do not interrupt the behavior
    pub const CANNOT_FLINCH: EntityTraits = EntityTraits(0x04);
    /// Drag hits are ignored
    pub const CANNOT_SLIDE: EntityTraits = EntityTraits(0x08);
    /// Neither occupies a tile nor can be hit
    pub const INTANGIBLE: EntityTraits = EntityTraits(0x10);
    /// A fatal hit from above 1 HP leaves 1 HP
    pub const FATAL_HIT_LEAVES_1HP: EntityTraits = EntityTraits(0x20);
    /// May enter tiles owned by the other side
    pub const IGNORES_TILE_OWNERSHIP: EntityTraits = EntityTraits(0x40);

    /// Whether every flag in `other` is set.
    #[inline]
    pub const fn contains(self, other: EntityTraits) -> bool {
        self.0 & other.0 == other.0
    }

    /// Union of two flag sets.
    #[inline]
    pub const fn union(self, other: EntityTraits) -> EntityTraits {
        EntityTraits(self.0 | other.0)
    }
}

impl std::ops::BitOr for EntityTraits {
    type Output = EntityTraits;

    fn bitor(self, rhs: EntityTraits) -> EntityTraits {
        self.union(rhs)
    }
}

// =============================================================================
// STATUS
// =============================================================================

/// Status effect timers, in ticks left. Zero means inactive.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusTimers {
    /// Cannot act
    pub paralyzed: u32,
    /// Cannot act
    pub frozen: u32,
    /// Cannot act
    pub bubbled: u32,
    /// Directional input is mirrored
    pub confused: u32,
    /// Hitscan attacks miss
    pub blinded: u32,
    /// Cannot start moves
    pub immobilized: u32,
    /// Hits are dropped
    pub flashing: u32,
    /// Hits are dropped
    pub invincible: u32,
}

impl StatusTimers {
    /// Count every timer down by one tick.
    pub fn decrement(&mut self) {
        for timer in [
            &mut self.paralyzed,
            &mut self.frozen,
            &mut self.bubbled,
            &mut self.confused,
            &mut self.blinded,
            &mut self.immobilized,
            &mut self.flashing,
            &mut self.invincible,
        ] {
            *timer = timer.saturating_sub(1);
        }
    }

    /// Whether the entity skips its behavior step this tick.
    #[inline]
    pub fn is_stunned(&self) -> bool {
        self.paralyzed > 0 || self.frozen > 0 || self.bubbled > 0
    }

    /// Whether incoming hits are dropped.
    #[inline]
    pub fn rejects_hits(&self) -> bool {
        self.flashing > 0 || self.invincible > 0
    }

    /// Keep at most one of paralyze > freeze > bubble > confuse active.
    pub fn enforce_exclusivity(&mut self) {
        if self.paralyzed > 0 {
            self.frozen = 0;
            self.bubbled = 0;
            self.confused = 0;
        } else if self.frozen > 0 {
            self.bubbled = 0;
            self.confused = 0;
        } else if self.bubbled > 0 {
            self.confused = 0;
        }
    }

    fn hash_into(&self, hasher: &mut StateHasher) {
        hasher.update_u32(self.paralyzed);
        hasher.update_u32(self.frozen);
        hasher.update_u32(self.bubbled);
        hasher.update_u32(self.confused);
        hasher.update_u32(self.blinded);
        hasher.update_u32(self.immobilized);
        hasher.update_u32(self.flashing);
        hasher.update_u32(self.invincible);
    }
}

/// An in-progress forced slide.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct DragState {
    /// Slide direction
    pub direction: Direction,
    /// Ticks since the drag started
    pub elapsed: u32,
}

/// Ticks between two tiles of a drag.
pub const DRAG_TICKS_PER_TILE: u32 = 4;

// =============================================================================
// ENTITY
// =============================================================================

/// A single entity on the field.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Entity {
    /// Unique id
    pub id: EntityId,

    /// Allegiance
    pub side: Side,

    /// Current tile
    pub tile_pos: TilePos,

    /// Tile reserved by an in-progress move
    pub future_tile_pos: Option<TilePos>,

    /// Faces left when set
    pub flip: bool,

    /// Hit points
    pub hp: i32,

    /// Maximum hit points
    pub max_hp: i32,

    /// Displayed hit points, eased towards `hp`
    pub display_hp: i32,

    /// Capability flags
    pub traits: EntityTraits,

    /// Status timers
    pub status: StatusTimers,

    /// Hit accumulated this tick, consumed by resolution
    pub hit: Hit,

    /// Forced slide in progress
    pub drag: Option<DragState>,

    /// Active behavior and its elapsed counter
    pub behavior_state: BehaviorState,

    /// Behavior to switch to after the current step
    pub next_behavior: Option<Behavior>,

    /// Will be removed at end of tick
    pub pending_destruction: bool,

    /// Still to be stepped this tick
    pub pending_step: bool,

    /// Keeps stepping while a timestop is active
    pub runs_in_timestop: bool,

    /// Set once by a single hit of 300 or more damage
    pub is_angry: bool,

    /// Intent applied this tick (players only)
    pub intent: Intent,

    /// Intent applied last tick (players only)
    pub last_intent: Intent,

    /// Ticks the charge button has been held
    pub charging_elapsed: u32,
}

impl Entity {
    /// Create an entity with the given behavior. The id is assigned on spawn.
    pub fn new(side: Side, tile_pos: TilePos, behavior: Behavior) -> Self {
        Self {
            id: EntityId(0),
            side,
            tile_pos,
            future_tile_pos: None,
            flip: side == Side::Answerer,
            hp: 0,
            max_hp: 0,
            display_hp: 0,
            traits: EntityTraits::NONE,
            status: StatusTimers::default(),
            hit: Hit::default(),
            drag: None,
            behavior_state: BehaviorState::new(behavior),
            next_behavior: None,
            pending_destruction: false,
            pending_step: false,
            runs_in_timestop: false,
            is_angry: false,
            intent: Intent::NONE,
            last_intent: Intent::NONE,
            charging_elapsed: 0,
        }
    }

    /// Builder: set hit points (current, max and displayed).
    pub fn with_hp(mut self, hp: i32) -> Self {
        self.hp = hp;
        self.max_hp = hp;
        self.display_hp = hp;
        self
    }

    /// Builder: set trait flags.
    pub fn with_traits(mut self, traits: EntityTraits) -> Self {
        self.traits = traits;
        self
    }

    /// Builder: keep stepping during timestops.
    pub fn running_in_timestop(mut self) -> Self {
        self.runs_in_timestop = true;
        self
    }

    /// Direction the entity attacks towards.
    #[inline]
    pub fn forward(&self) -> Direction {
        if self.flip {
            Direction::Left
        } else {
            Direction::Right
        }
    }

    /// Whether the entity can be targeted by hits and blocks tiles.
    #[inline]
    pub fn is_tangible(&self) -> bool {
        !self.traits.contains(EntityTraits::INTANGIBLE)
    }

    /// Whether the entity is still alive and not scheduled for removal.
    #[inline]
    pub fn is_active(&self) -> bool {
        !self.pending_destruction
    }

    /// Schedule a behavior switch after the current step.
    #[inline]
    pub fn set_next_behavior(&mut self, behavior: Behavior) {
        self.next_behavior = Some(behavior);
    }

    /// Replace the behavior immediately. The new one starts fresh.
    pub fn replace_behavior(&mut self, behavior: Behavior) {
        self.behavior_state = BehaviorState::new(behavior);
        self.next_behavior = None;
        self.future_tile_pos = None;
    }

    /// Request removal at end of tick.
    #[inline]
    pub fn destroy(&mut self) {
        self.pending_destruction = true;
    }

    /// Whether a hit landing now would be a counter hit.
    pub fn is_counterable(&self) -> bool {
        let state = &self.behavior_state;
        state.behavior.traits(state.elapsed).counterable
    }

    /// Hash the entity.
    pub fn hash_into(&self, hasher: &mut StateHasher) {
        hasher.update_u64(self.id.0);
        hasher.update_u8(self.side as u8);
        hasher.update_u8(self.tile_pos.index() as u8);
        match self.future_tile_pos {
            Some(pos) => {
                hasher.update_bool(true);
                hasher.update_u8(pos.index() as u8);
            }
            None => hasher.update_bool(false),
        }
        hasher.update_bool(self.flip);
        hasher.update_i32(self.hp);
        hasher.update_i32(self.max_hp);
        hasher.update_i32(self.display_hp);
        hasher.update_u8(self.traits.0);
        self.status.hash_into(hasher);
        match self.drag {
            Some(drag) => {
                hasher.update_bool(true);
                hasher.update_u8(drag.direction as u8);
                hasher.update_u32(drag.elapsed);
            }
            None => hasher.update_bool(false),
        }
        hasher.update_u8(self.behavior_state.behavior.kind() as u8);
        hasher.update_i32(self.behavior_state.elapsed);
        hasher.update_bool(self.pending_destruction);
        hasher.update_bool(self.runs_in_timestop);
        hasher.update_bool(self.is_angry);
        hasher.update_u16(self.intent.bits());
        hasher.update_u32(self.charging_elapsed);
    }
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::game::behavior::BehaviorKind;

    fn pos(x: i32, y: i32) -> TilePos {
        TilePos::new(x, y).unwrap()
    }

    #[test]
    fn test_traits_contains() {
        let traits = EntityTraits::INTANGIBLE | EntityTraits::CANNOT_FLINCH;
        assert!(traits.contains(EntityTraits::INTANGIBLE));
        assert!(traits.contains(EntityTraits::CANNOT_FLINCH));
        assert!(!traits.contains(EntityTraits::CANNOT_SLIDE));
        assert!(traits.contains(EntityTraits::NONE));
    }

    #[test]
    fn test_status_decrement_saturates() {
        let mut status = StatusTimers {
            paralyzed: 1,
            ..Default::default()
        };
        status.decrement();
        status.decrement();
        assert_eq!(status.paralyzed, 0);
        assert!(!status.is_stunned());
    }

    #[test]
    fn test_status_exclusivity_chain() {
        let mut status = StatusTimers {
            paralyzed: 30,
            frozen: 10,
            bubbled: 5,
            confused: 5,
            ..Default::default()
        };
        status.enforce_exclusivity();
        assert_eq!(status.paralyzed, 30);
        assert_eq!(status.frozen, 0);
        assert_eq!(status.bubbled, 0);
        assert_eq!(status.confused, 0);

        let mut status = StatusTimers {
            bubbled: 5,
            confused: 5,
            blinded: 7,
            ..Default::default()
        };
        status.enforce_exclusivity();
        assert_eq!(status.bubbled, 5);
        assert_eq!(status.confused, 0);
        assert_eq!(status.blinded, 7);
    }

    #[test]
    fn test_new_entity_faces_by_side() {
        let left = Entity::new(Side::Offerer, pos(1, 2), Behavior::idle());
        let right = Entity::new(Side::Answerer, pos(6, 2), Behavior::idle());
        assert_eq!(left.forward(), Direction::Right);
        assert_eq!(right.forward(), Direction::Left);
    }

    #[test]
    fn test_fresh_behavior_starts_before_zero() {
        let entity = Entity::new(Side::Offerer, pos(1, 2), Behavior::idle());
        assert_eq!(entity.behavior_state.elapsed, -1);
        assert_eq!(entity.behavior_state.behavior.kind(), BehaviorKind::Idle);
    }

    #[test]
    fn test_replace_behavior_clears_reservation() {
        let mut entity = Entity::new(Side::Offerer, pos(1, 2), Behavior::idle());
        entity.future_tile_pos = Some(pos(2, 2));
        entity.set_next_behavior(Behavior::idle());

        entity.replace_behavior(Behavior::flinch());
        assert_eq!(entity.future_tile_pos, None);
        assert!(entity.next_behavior.is_none());
        assert_eq!(entity.behavior_state.behavior.kind(), BehaviorKind::Flinch);
    }
}

//! Step Context
//!
//! The view of the world a behavior gets while it steps. The entity being
//! stepped is taken out of the entity map for the duration of its step and
//! handed over separately, so behaviors see it as `&mut Entity` and everyone
//! else through this context.

use std::collections::BTreeMap;

use crate::core::rng::DeterministicRng;
use crate::game::chip::Chip;
use crate::game::entity::{Entity, EntityId, EntityTraits};
use crate::game::events::{BattleEvent, DecorationKind, Presentation, SoundKind};
use crate::game::field::{Field, Side, TilePos};
use crate::game::hit::{Hit, COUNTER_PARALYZE_TICKS};
use crate::game::state::{PlayerSlot, SimState};
use crate::game::tick::SimConfig;
use crate::game::timestop::{Timestop, TimestopBehavior};

/// Maximum pixel jitter of hit decorations.
const HIT_JITTER: i32 = 8;

/// Mutable access to everything but the entity being stepped.
pub struct StepContext<'a> {
    tick: u32,
    rng: &'a mut DeterministicRng,
    entities: &'a mut BTreeMap<EntityId, Entity>,
    next_entity_id: &'a mut u64,
    field: &'a mut Field,
    timestops: &'a mut Vec<Timestop>,
    presentation: &'a mut Presentation,
    events: &'a mut Vec<BattleEvent>,
    players: &'a mut [PlayerSlot; 2],
    config: &'a SimConfig,
}

impl<'a> StepContext<'a> {
    /// Borrow the parts of the state a step may touch.
    pub fn new(state: &'a mut SimState, config: &'a SimConfig) -> Self {
        Self {
            tick: state.tick,
            rng: &mut state.rng,
            entities: &mut state.entities,
            next_entity_id: &mut state.next_entity_id,
            field: &mut state.field,
            timestops: &mut state.timestops,
            presentation: &mut state.presentation,
            events: &mut state.pending_events,
            players: &mut state.players,
            config,
        }
    }

    /// Current tick.
    #[inline]
    pub fn tick(&self) -> u32 {
        self.tick
    }

    /// The synchronized random source.
    #[inline]
    pub fn rng(&mut self) -> &mut DeterministicRng {
        &mut *self.rng
    }

    /// Simulation configuration.
    #[inline]
    pub fn config(&self) -> &SimConfig {
        self.config
    }

    /// The tile field.
    #[inline]
    pub fn field(&self) -> &Field {
        &*self.field
    }

    /// The tile field, mutably.
    #[inline]
    pub fn field_mut(&mut self) -> &mut Field {
        &mut *self.field
    }

    // =========================================================================
    // ENTITIES
    // =========================================================================

    /// Look up another entity.
    pub fn entity(&self, id: EntityId) -> Option<&Entity> {
        self.entities.get(&id)
    }

    /// Look up another entity mutably.
    pub fn entity_mut(&mut self, id: EntityId) -> Option<&mut Entity> {
        self.entities.get_mut(&id)
    }

    /// Add a new entity and return its id.
    ///
    /// The entity is not stepped in the tick it is created; its behavior
    /// sees elapsed 0 on the next tick.
    pub fn spawn(&mut self, mut entity: Entity) -> EntityId {
        let id = EntityId(*self.next_entity_id);
        *self.next_entity_id += 1;

        entity.id = id;
        entity.pending_step = false;
        entity.behavior_state.elapsed = -1;
        self.entities.insert(id, entity);
        id
    }

    /// Tangible, live entities of the other side standing on `pos`, by id.
    pub fn enemies_at(&self, side: Side, pos: TilePos) -> Vec<EntityId> {
        self.entities
            .values()
            .filter(|e| e.side != side && e.is_active() && e.is_tangible() && e.tile_pos == pos)
            .map(|e| e.id)
            .collect()
    }

    /// Tangible, live entities of the other side standing in column `x`, by id.
    pub fn enemies_in_column(&self, side: Side, x: u8) -> Vec<EntityId> {
        self.entities
            .values()
            .filter(|e| {
                e.side != side && e.is_active() && e.is_tangible() && e.tile_pos.x() == x as i32
            })
            .map(|e| e.id)
            .collect()
    }

    /// Whether a tangible entity other than `except` stands on or has
    /// reserved `pos`.
    pub fn is_occupied(&self, pos: TilePos, except: EntityId) -> bool {
        self.entities.values().any(|e| {
            e.id != except
                && e.is_active()
                && e.is_tangible()
                && (e.tile_pos == pos || e.future_tile_pos == Some(pos))
        })
    }

    /// Whether `entity` may enter `pos`.
    pub fn can_move_to(&self, entity: &Entity, pos: TilePos) -> bool {
        let tile = self.field.tile(pos);
        if !tile.is_steppable(entity.traits) {
            return false;
        }
        if !entity.traits.contains(EntityTraits::IGNORES_TILE_OWNERSHIP) && tile.owner != entity.side {
            return false;
        }
        !entity.is_tangible() || !self.is_occupied(pos, entity.id)
    }

    /// Move `entity` to `pos` right now, triggering tile leave/enter.
    ///
    /// Returns false and leaves the entity in place if the move is not allowed.
    pub fn move_directly(&mut self, entity: &mut Entity, pos: TilePos) -> bool {
        if !self.can_move_to(entity, pos) {
            return false;
        }
        self.field.tile_mut(entity.tile_pos).on_leave(entity.traits);
        self.field.tile_mut(pos).on_enter(entity.traits);
        entity.tile_pos = pos;
        true
    }

    // =========================================================================
    // HITS
    // =========================================================================

    /// Merge a hit into a target.
    ///
    /// Dropped (returns false) when the target is destroyed, intangible,
    /// flashing or invincible. Hitting a counterable behavior adds paralysis.
    ///
    /// # Panics
    ///
    /// If `target` is not in the entity map.
    pub fn apply_hit(&mut self, target: EntityId, mut hit: Hit) -> bool {
        let entity = self
            .entities
            .get_mut(&target)
            .unwrap_or_else(|| panic!("hit on unknown entity {target}"));
        if !entity.is_active() || !entity.is_tangible() || entity.status.rejects_hits() {
            return false;
        }

        if entity.is_counterable() {
            hit.paralyze = COUNTER_PARALYZE_TICKS;
            hit.counter = true;
        }
        entity.hit.merge(&hit);

        if hit.counter {
            self.presentation.add_sound(SoundKind::Counter, 0);
            self.events.push(BattleEvent::CounterHit { target });
        }
        if hit.damage > 0 {
            self.presentation.add_sound(SoundKind::Hurt, 0);
        }
        true
    }

    /// Fire down the attacker's row and hit the first enemy found.
    ///
    /// Blinded attackers always miss.
    pub fn hitscan(&mut self, attacker: &Entity, hit: Hit, decoration: DecorationKind) -> Option<EntityId> {
        if attacker.status.blinded > 0 {
            return None;
        }

        let direction = attacker.forward();
        let mut pos = attacker.tile_pos.step(direction);
        while let Some(tile) = pos {
            if let Some(&target) = self.enemies_at(attacker.side, tile).first() {
                self.apply_hit(target, hit);
                self.add_jittered_decoration(decoration, tile, attacker.flip);
                return Some(target);
            }
            pos = tile.step(direction);
        }
        None
    }

    // =========================================================================
    // PRESENTATION
    // =========================================================================

    /// Add a decoration on a tile.
    pub fn add_decoration(&mut self, kind: DecorationKind, pos: TilePos, flip: bool) {
        self.presentation.add_decoration(kind, pos, (0, 0), flip, 0);
    }

    /// Add a decoration with a random pixel offset.
    pub fn add_jittered_decoration(&mut self, kind: DecorationKind, pos: TilePos, flip: bool) {
        let dx = self.rng.next_int_range(-HIT_JITTER, HIT_JITTER);
        let dy = self.rng.next_int_range(-HIT_JITTER, HIT_JITTER);
        self.presentation.add_decoration(kind, pos, (dx, dy), flip, 0);
    }

    /// Play a sound.
    pub fn add_sound(&mut self, kind: SoundKind) {
        self.presentation.add_sound(kind, 0);
    }

    // =========================================================================
    // CHIPS & TIMESTOPS
    // =========================================================================

    /// Remove and return the chip at the front of `side`'s hand.
    pub fn take_chip(&mut self, side: Side) -> Option<Chip> {
        let slot = &mut self.players[side.index()];
        let index = *slot.hand.first()?;
        let chip = self.config.catalog.get(index)?.clone();
        slot.hand.remove(0);
        self.events.push(BattleEvent::ChipUsed { side, chip: index });
        Some(chip)
    }

    /// Whether a timestop is active.
    pub fn timestop_active(&self) -> bool {
        !self.timestops.is_empty()
    }

    /// Push a timestop. Entities not flagged to run in it stop being stepped
    /// immediately, including the rest of this tick.
    pub fn push_timestop(&mut self, owner: EntityId, side: Side, behavior: TimestopBehavior) {
        self.timestops.push(Timestop::new(owner, side, behavior));
        self.presentation.add_sound(SoundKind::Timestop, 0);
        self.events.push(BattleEvent::TimestopStarted {
            side,
            depth: self.timestops.len(),
        });
    }
}

// =============================================================================
// TESTS
// =============================================================================

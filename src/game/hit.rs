//! Hit Accumulation & Resolution
//!
//! Behaviors never change another entity's HP or status directly. They merge
//! a `Hit` into the target, and every entity's accumulated hit is resolved
//! exactly once per tick after all behaviors have stepped.

use serde::{Serialize, Deserialize};

use crate::game::behavior::Behavior;
use crate::game::entity::{DragState, Entity, EntityTraits};
use crate::game::field::Direction;

/// Paralysis added to a counter hit.
pub const COUNTER_PARALYZE_TICKS: u32 = 150;

/// A single hit of this much damage or more makes the target angry.
pub const ANGRY_DAMAGE_THRESHOLD: i32 = 300;

/// Blinking invulnerability granted after a flinching hit.
pub const FLINCH_FLASH_TICKS: u32 = 120;

/// Minimum change of the displayed HP per tick.
pub const DISPLAY_HP_MIN_STEP: i32 = 4;

/// Divisor of the displayed HP easing.
pub const DISPLAY_HP_EASE_DIVISOR: i32 = 8;

// =============================================================================
// HIT
// =============================================================================

/// Damage and status requests against one entity.
///
/// Damage adds up when merged; a nonzero status duration overrides the
/// previous request.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Hit {
    /// Damage to subtract
    pub damage: i32,
    /// Requested paralysis
    pub paralyze: u32,
    /// Requested freeze
    pub freeze: u32,
    /// Requested bubble
    pub bubble: u32,
    /// Requested confusion
    pub confuse: u32,
    /// Requested blindness
    pub blind: u32,
    /// Requested immobilization
    pub immobilize: u32,
    /// Requested flashing
    pub flash: u32,
    /// Requested invincibility
    pub invincible: u32,
    /// Interrupt the target's behavior
    pub flinch: bool,
    /// Force the target to slide
    pub drag: Option<Direction>,
    /// Landed as a counter hit
    pub counter: bool,
}

impl Hit {
    /// Plain damage.
    pub fn damage(damage: i32) -> Self {
        Self {
            damage,
            ..Default::default()
        }
    }

    /// Builder: flinch the target.
    pub fn flinching(mut self) -> Self {
        self.flinch = true;
        self
    }

    /// Builder: drag the target.
    pub fn dragging(mut self, direction: Direction) -> Self {
        self.drag = Some(direction);
        self
    }

    /// Builder: paralyze the target.
    pub fn paralyzing(mut self, ticks: u32) -> Self {
        self.paralyze = ticks;
        self
    }

    /// Whether nothing was requested.
    pub fn is_empty(&self) -> bool {
        *self == Hit::default()
    }

    /// Merge another hit into this one.
    pub fn merge(&mut self, other: &Hit) {
        self.damage += other.damage;

        override_nonzero(&mut self.paralyze, other.paralyze);
        override_nonzero(&mut self.freeze, other.freeze);
        override_nonzero(&mut self.bubble, other.bubble);
        override_nonzero(&mut self.confuse, other.confuse);
        override_nonzero(&mut self.blind, other.blind);
        override_nonzero(&mut self.immobilize, other.immobilize);
        override_nonzero(&mut self.flash, other.flash);
        override_nonzero(&mut self.invincible, other.invincible);

        self.flinch |= other.flinch;
        if other.drag.is_some() {
            self.drag = other.drag;
        }
        self.counter |= other.counter;
    }
}

#[inline]
fn override_nonzero(slot: &mut u32, incoming: u32) {
    if incoming != 0 {
        *slot = incoming;
    }
}

// =============================================================================
// RESOLUTION
// =============================================================================

/// Apply and reset the entity's accumulated hit, then ease its displayed HP.
pub fn resolve(entity: &mut Entity) {
    let hit = std::mem::take(&mut entity.hit);

    if hit.damage > 0 {
        apply_damage(entity, hit.damage);
        if hit.damage >= ANGRY_DAMAGE_THRESHOLD {
            entity.is_angry = true;
        }
    }

    if let Some(direction) = hit.drag {
        if !entity.traits.contains(EntityTraits::CANNOT_SLIDE) && entity.drag.is_none() {
            // Sliding abandons whatever the entity was doing, including a
            // reserved move target
            entity.replace_behavior(Behavior::idle());
            entity.charging_elapsed = 0;
            entity.drag = Some(DragState { direction, elapsed: 0 });
        }
    }

    let status = &mut entity.status;
    if entity.drag.is_some() {
        status.frozen = 0;
        status.bubbled = 0;
        status.paralyzed = 0;
    } else {
        override_nonzero(&mut status.paralyzed, hit.paralyze);
        override_nonzero(&mut status.frozen, hit.freeze);
        override_nonzero(&mut status.bubbled, hit.bubble);
        override_nonzero(&mut status.confused, hit.confuse);
        override_nonzero(&mut status.blinded, hit.blind);
        override_nonzero(&mut status.immobilized, hit.immobilize);
        override_nonzero(&mut status.flashing, hit.flash);
        override_nonzero(&mut status.invincible, hit.invincible);
    }
    status.enforce_exclusivity();

    if hit.flinch && !entity.traits.contains(EntityTraits::CANNOT_FLINCH) {
        entity.replace_behavior(Behavior::flinch());
        entity.charging_elapsed = 0;
        if entity.drag.is_none() && entity.status.flashing == 0 {
            entity.status.flashing = FLINCH_FLASH_TICKS;
        }
    }

    ease_display_hp(entity);
}

fn apply_damage(entity: &mut Entity, damage: i32) {
    let floor = if entity.traits.contains(EntityTraits::FATAL_HIT_LEAVES_1HP) && entity.hp > 1 {
        1
    } else {
        0
    };
    entity.hp = (entity.hp - damage).max(floor);
}

fn ease_display_hp(entity: &mut Entity) {
    let diff = entity.hp - entity.display_hp;
    if diff == 0 {
        return;
    }
    let step = (diff.abs() / DISPLAY_HP_EASE_DIVISOR + DISPLAY_HP_MIN_STEP).min(diff.abs());
    entity.display_hp += step * diff.signum();
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::game::behavior::BehaviorKind;
    use crate::game::field::{Side, TilePos};

    fn entity_with_hp(hp: i32) -> Entity {
        Entity::new(Side::Answerer, TilePos::new(5, 2).unwrap(), Behavior::idle()).with_hp(hp)
    }

    #[test]
    fn test_merge_adds_damage_and_overrides_status() {
        let mut hit = Hit::damage(10).paralyzing(30);
        hit.merge(&Hit::damage(5));
        assert_eq!(hit.damage, 15);
        assert_eq!(hit.paralyze, 30);

        hit.merge(&Hit::damage(0).paralyzing(5));
        assert_eq!(hit.paralyze, 5);
    }

    #[test]
    fn test_damage_floors_at_zero() {
        let mut entity = entity_with_hp(10);
        entity.hit = Hit::damage(15);
        resolve(&mut entity);
        assert_eq!(entity.hp, 0);
    }

    #[test]
    fn test_fatal_hit_leaves_one_hp() {
        let mut entity = entity_with_hp(5).with_traits(EntityTraits::FATAL_HIT_LEAVES_1HP);
        entity.hit = Hit::damage(3);
        resolve(&mut entity);
        assert_eq!(entity.hp, 2);

        let mut entity = entity_with_hp(5).with_traits(EntityTraits::FATAL_HIT_LEAVES_1HP);
        entity.hit = Hit::damage(10);
        resolve(&mut entity);
        assert_eq!(entity.hp, 1);

        // Already at 1 HP: no protection left
        entity.hit = Hit::damage(10);
        resolve(&mut entity);
        assert_eq!(entity.hp, 0);
    }

    #[test]
    fn test_paralyze_overrides_freeze() {
        let mut entity = entity_with_hp(100);
        entity.status.frozen = 10;
        entity.hit = Hit::damage(0).paralyzing(30);
        resolve(&mut entity);
        assert_eq!(entity.status.paralyzed, 30);
        assert_eq!(entity.status.frozen, 0);
    }

    #[test]
    fn test_heavy_hit_sets_angry() {
        let mut entity = entity_with_hp(1000);
        entity.hit = Hit::damage(299);
        resolve(&mut entity);
        assert!(!entity.is_angry);

        entity.hit = Hit::damage(300);
        resolve(&mut entity);
        assert!(entity.is_angry);
    }

    #[test]
    fn test_flinch_replaces_behavior() {
        let mut entity = entity_with_hp(100);
        entity.hit = Hit::damage(10).flinching();
        resolve(&mut entity);
        assert_eq!(entity.behavior_state.behavior.kind(), BehaviorKind::Flinch);
        assert_eq!(entity.behavior_state.elapsed, -1);
    }

    #[test]
    fn test_cannot_flinch_keeps_behavior() {
        let mut entity = entity_with_hp(100).with_traits(EntityTraits::CANNOT_FLINCH);
        entity.hit = Hit::damage(10).flinching();
        resolve(&mut entity);
        assert_eq!(entity.behavior_state.behavior.kind(), BehaviorKind::Idle);
    }

    #[test]
    fn test_drag_clears_stunning_statuses() {
        let mut entity = entity_with_hp(100);
        entity.status.frozen = 40;
        entity.status.confused = 40;
        entity.hit = Hit::damage(0).dragging(Direction::Right).paralyzing(30);
        resolve(&mut entity);

        assert!(entity.drag.is_some());
        assert_eq!(entity.status.frozen, 0);
        assert_eq!(entity.status.paralyzed, 0);
        assert_eq!(entity.status.confused, 40);
    }

    #[test]
    fn test_drag_cancels_move_in_progress() {
        let mut entity = entity_with_hp(100);
        entity.replace_behavior(Behavior::movement(Direction::Up));
        entity.future_tile_pos = TilePos::new(5, 1);
        entity.hit = Hit::damage(0).dragging(Direction::Right);
        resolve(&mut entity);

        assert!(entity.drag.is_some());
        assert_eq!(entity.future_tile_pos, None);
        assert_eq!(entity.behavior_state.behavior.kind(), BehaviorKind::Idle);
    }

    #[test]
    fn test_flinch_grants_flashing() {
        let mut entity = entity_with_hp(100);
        entity.hit = Hit::damage(10).flinching();
        resolve(&mut entity);
        assert_eq!(entity.status.flashing, FLINCH_FLASH_TICKS);
        assert!(entity.status.rejects_hits());

        // Non-flinching hits do not blink
        let mut entity = entity_with_hp(100);
        entity.hit = Hit::damage(10);
        resolve(&mut entity);
        assert_eq!(entity.status.flashing, 0);

        let mut entity = entity_with_hp(100).with_traits(EntityTraits::CANNOT_FLINCH);
        entity.hit = Hit::damage(10).flinching();
        resolve(&mut entity);
        assert_eq!(entity.status.flashing, 0);
    }

    #[test]
    fn test_cannot_slide_ignores_drag() {
        let mut entity = entity_with_hp(100).with_traits(EntityTraits::CANNOT_SLIDE);
        entity.hit = Hit::damage(0).dragging(Direction::Right).paralyzing(30);
        resolve(&mut entity);

        assert!(entity.drag.is_none());
        assert_eq!(entity.status.paralyzed, 30);
    }

    #[test]
    fn test_display_hp_eases_without_overshoot() {
        let mut entity = entity_with_hp(100);
        entity.hit = Hit::damage(80);
        resolve(&mut entity);
        assert_eq!(entity.hp, 20);
        // 80 / 8 + 4
        assert_eq!(entity.display_hp, 86);

        for _ in 0..100 {
            resolve(&mut entity);
            assert!(entity.display_hp >= entity.hp);
        }
        assert_eq!(entity.display_hp, 20);
    }

    #[test]
    fn test_resolution_consumes_hit() {
        let mut entity = entity_with_hp(100);
        entity.hit = Hit::damage(10);
        resolve(&mut entity);
        assert!(entity.hit.is_empty());

        resolve(&mut entity);
        assert_eq!(entity.hp, 90);
    }
}

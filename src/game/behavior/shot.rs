//! AirShot and its projectile.

use serde::{Serialize, Deserialize};

use super::{Appearance, Behavior, BehaviorImpl, Pose};
use crate::game::context::StepContext;
use crate::game::entity::{Entity, EntityTraits};
use crate::game::events::{DecorationKind, SoundKind};
use crate::game::field::Direction;
use crate::game::hit::Hit;

const LAUNCH_AT: i32 = 10;
const END_AT: i32 = 20;

/// Ticks a projectile spends on each tile.
const TICKS_PER_TILE: i32 = 4;

/// Projectiles fly over everything and never block or get hit.
pub(crate) const PROJECTILE_TRAITS: EntityTraits = EntityTraits(
    EntityTraits::CAN_STEP_ON_HOLE_LIKE.0
        | EntityTraits::IGNORES_TILE_EFFECTS.0
        | EntityTraits::CANNOT_FLINCH.0
        | EntityTraits::CANNOT_SLIDE.0
        | EntityTraits::INTANGIBLE.0
        | EntityTraits::IGNORES_TILE_OWNERSHIP.0,
);

/// Launches a `Shot` from the user's tile.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct AirShot {
    /// Damage of the projectile
    pub damage: i32,
}

impl AirShot {
    /// Create a launcher.
    pub fn new(damage: i32) -> Self {
        Self { damage }
    }
}

impl BehaviorImpl for AirShot {
    fn step(&mut self, elapsed: i32, entity: &mut Entity, ctx: &mut StepContext<'_>) {
        match elapsed {
            LAUNCH_AT => {
                let mut projectile = Entity::new(
                    entity.side,
                    entity.tile_pos,
                    Behavior::shot(self.damage, entity.forward()),
                )
                .with_hp(1)
                .with_traits(PROJECTILE_TRAITS);
                projectile.flip = entity.flip;

                ctx.add_sound(SoundKind::Buster);
                ctx.spawn(projectile);
            }
            END_AT => entity.set_next_behavior(Behavior::idle()),
            _ => {}
        }
    }

    fn appearance(&self, elapsed: i32) -> Appearance {
        Appearance::new(Pose::Shoot, elapsed)
    }
}

/// Projectile: hits the first enemy it shares a tile with, dragging it
/// away, and advances one tile every 4 ticks until it leaves the field.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Shot {
    /// Damage dealt
    pub damage: i32,
    /// Flight direction
    pub direction: Direction,
}

impl Shot {
    /// Create a projectile behavior.
    pub fn new(damage: i32, direction: Direction) -> Self {
        Self { damage, direction }
    }
}

impl BehaviorImpl for Shot {
    fn step(&mut self, elapsed: i32, entity: &mut Entity, ctx: &mut StepContext<'_>) {
        if let Some(&target) = ctx.enemies_at(entity.side, entity.tile_pos).first() {
            ctx.apply_hit(target, Hit::damage(self.damage).dragging(self.direction));
            ctx.add_jittered_decoration(DecorationKind::BusterHit, entity.tile_pos, entity.flip);
            entity.destroy();
            return;
        }

        if elapsed > 0 && elapsed % TICKS_PER_TILE == 0 {
            let moved = entity
                .tile_pos
                .step(self.direction)
                .is_some_and(|target| ctx.move_directly(entity, target));
            if !moved {
                entity.destroy();
            }
        }
    }

    fn appearance(&self, elapsed: i32) -> Appearance {
        Appearance::new(Pose::Projectile, elapsed)
    }
}

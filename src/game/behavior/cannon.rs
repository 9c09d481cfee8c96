//! Cannon: heavy hitscan chip.

use serde::{Serialize, Deserialize};

use super::{Appearance, Behavior, BehaviorImpl, Pose};
use crate::game::context::StepContext;
use crate::game::entity::Entity;
use crate::game::events::{DecorationKind, SoundKind};
use crate::game::hit::Hit;

const FIRE_AT: i32 = 16;
const END_AT: i32 = 33;

/// Fires one flinching hitscan shot down the row.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Cannon {
    /// Damage dealt
    pub damage: i32,
}

impl Cannon {
    /// Create a cannon shot.
    pub fn new(damage: i32) -> Self {
        Self { damage }
    }
}

impl BehaviorImpl for Cannon {
    fn step(&mut self, elapsed: i32, entity: &mut Entity, ctx: &mut StepContext<'_>) {
        match elapsed {
            FIRE_AT => {
                ctx.add_sound(SoundKind::Cannon);
                ctx.hitscan(entity, Hit::damage(self.damage).flinching(), DecorationKind::CannonHit);
            }
            END_AT => entity.set_next_behavior(Behavior::idle()),
            _ => {}
        }
    }

    fn appearance(&self, elapsed: i32) -> Appearance {
        Appearance::new(Pose::Shoot, elapsed)
    }
}

//! Vulcan: rapid hitscan burst.

use serde::{Serialize, Deserialize};

use super::{Appearance, Behavior, BehaviorImpl, Pose};
use crate::game::context::StepContext;
use crate::game::entity::Entity;
use crate::game::events::{DecorationKind, SoundKind};
use crate::game::hit::Hit;

/// Ticks between two shots.
const SHOT_INTERVAL: i32 = 8;

/// Fires `hits` hitscan shots, one every 8 ticks. Only the last one flinches.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Vulcan {
    /// Damage per shot
    pub damage: i32,
    /// Number of shots
    pub hits: u32,
}

impl Vulcan {
    /// Create a burst.
    pub fn new(damage: i32, hits: u32) -> Self {
        Self { damage, hits }
    }
}

impl BehaviorImpl for Vulcan {
    fn step(&mut self, elapsed: i32, entity: &mut Entity, ctx: &mut StepContext<'_>) {
        if elapsed <= 0 || elapsed % SHOT_INTERVAL != 0 {
            return;
        }

        let shot = (elapsed / SHOT_INTERVAL) as u32;
        if shot <= self.hits {
            let mut hit = Hit::damage(self.damage);
            if shot == self.hits {
                hit = hit.flinching();
            }
            ctx.add_sound(SoundKind::Buster);
            ctx.hitscan(entity, hit, DecorationKind::BusterHit);
        } else {
            entity.set_next_behavior(Behavior::idle());
        }
    }

    fn appearance(&self, elapsed: i32) -> Appearance {
        Appearance::new(Pose::Shoot, elapsed)
    }
}

//! Buster: the basic weapon.

use serde::{Serialize, Deserialize};

use super::{Appearance, Behavior, BehaviorImpl, Interrupts, Pose};
use crate::game::context::StepContext;
use crate::game::entity::Entity;
use crate::game::events::{DecorationKind, SoundKind};
use crate::game::hit::Hit;

/// Ticks the charge button must be held for a power shot.
pub const FULL_CHARGE_TICKS: u32 = 60;

const FIRE_AT: i32 = 5;
const END_AT: i32 = 10;
const CHARGED_END_AT: i32 = 20;

const DAMAGE: i32 = 1;
const CHARGED_DAMAGE: i32 = 10;

/// Fires one hitscan shot down the row.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Buster {
    /// Power shot (more damage, flinches)
    pub charged: bool,
}

impl Buster {
    /// Create a shot.
    pub fn new(charged: bool) -> Self {
        Self { charged }
    }

    fn end_at(&self) -> i32 {
        if self.charged {
            CHARGED_END_AT
        } else {
            END_AT
        }
    }
}

impl BehaviorImpl for Buster {
    fn step(&mut self, elapsed: i32, entity: &mut Entity, ctx: &mut StepContext<'_>) {
        if elapsed == FIRE_AT {
            let hit = if self.charged {
                Hit::damage(CHARGED_DAMAGE).flinching()
            } else {
                Hit::damage(DAMAGE)
            };
            ctx.add_sound(SoundKind::Buster);
            ctx.hitscan(entity, hit, DecorationKind::BusterHit);
        }
        if elapsed == self.end_at() {
            entity.set_next_behavior(Behavior::idle());
        }
    }

    fn appearance(&self, elapsed: i32) -> Appearance {
        Appearance::new(Pose::Shoot, elapsed)
    }

    fn interrupts(&self, elapsed: i32) -> Interrupts {
        Interrupts {
            on_move: elapsed > FIRE_AT,
            on_charge: false,
        }
    }
}

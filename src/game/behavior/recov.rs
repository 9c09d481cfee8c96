//! Recov: restore HP.

use serde::{Serialize, Deserialize};

use super::{Appearance, Behavior, BehaviorImpl, Pose};
use crate::game::context::StepContext;
use crate::game::entity::Entity;
use crate::game::events::{DecorationKind, SoundKind};

const HEAL_AT: i32 = 0;
const END_AT: i32 = 20;

/// Heals the user, capped at max HP.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Recov {
    /// HP restored
    pub heal: i32,
}

impl Recov {
    /// Create a heal.
    pub fn new(heal: i32) -> Self {
        Self { heal }
    }
}

impl BehaviorImpl for Recov {
    fn step(&mut self, elapsed: i32, entity: &mut Entity, ctx: &mut StepContext<'_>) {
        match elapsed {
            HEAL_AT => {
                entity.hp = (entity.hp + self.heal).min(entity.max_hp);
                ctx.add_decoration(DecorationKind::Sparkle, entity.tile_pos, entity.flip);
                ctx.add_sound(SoundKind::Recov);
            }
            END_AT => entity.set_next_behavior(Behavior::idle()),
            _ => {}
        }
    }

    fn appearance(&self, elapsed: i32) -> Appearance {
        Appearance::new(Pose::Cast, elapsed)
    }
}

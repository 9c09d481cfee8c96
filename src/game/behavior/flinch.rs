//! Flinch: reeling from a hit.

use serde::{Serialize, Deserialize};

use super::{Appearance, Behavior, BehaviorImpl, Pose};
use crate::game::context::StepContext;
use crate::game::entity::Entity;

const RECOVER_AT: i32 = 20;

/// Installed by resolution when a flinching hit lands.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Flinch;

impl BehaviorImpl for Flinch {
    fn step(&mut self, elapsed: i32, entity: &mut Entity, _ctx: &mut StepContext<'_>) {
        if elapsed == RECOVER_AT {
            entity.set_next_behavior(Behavior::idle());
        }
    }

    fn appearance(&self, elapsed: i32) -> Appearance {
        Appearance::new(Pose::Hurt, elapsed)
    }
}

//! Idle: standing still, waiting for input.

use serde::{Serialize, Deserialize};

use super::{Appearance, BehaviorImpl, Interrupts, Pose};
use crate::game::context::StepContext;
use crate::game::entity::Entity;
use crate::game::input::Intent;

/// Default behavior. Uses the front chip of the hand on a fresh use-chip
/// press; movement and charging are handled as interrupts.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Idle;

impl BehaviorImpl for Idle {
    fn step(&mut self, _elapsed: i32, entity: &mut Entity, ctx: &mut StepContext<'_>) {
        if !entity.intent.pressed_since(entity.last_intent, Intent::USE_CHIP) {
            return;
        }
        if let Some(chip) = ctx.take_chip(entity.side) {
            entity.set_next_behavior(chip.behavior());
        }
    }

    fn appearance(&self, elapsed: i32) -> Appearance {
        Appearance::new(Pose::Idle, elapsed)
    }

    fn interrupts(&self, _elapsed: i32) -> Interrupts {
        Interrupts {
            on_move: true,
            on_charge: true,
        }
    }
}

//! Move: a one-tile step.

use serde::{Serialize, Deserialize};

use super::{Appearance, Behavior, BehaviorImpl, Pose};
use crate::game::context::StepContext;
use crate::game::entity::Entity;
use crate::game::field::Direction;

/// Tick the target tile is reserved.
const RESERVE_AT: i32 = 0;
/// Tick the entity actually changes tile.
const COMMIT_AT: i32 = 2;
/// Tick the step is over.
const END_AT: i32 = 4;

/// Steps one tile in a direction.
///
/// The target is reserved first so nothing else can claim it, and entered
/// two ticks later.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Move {
    /// Where to step
    pub direction: Direction,
}

impl Move {
    /// Create a move.
    pub fn new(direction: Direction) -> Self {
        Self { direction }
    }
}

impl BehaviorImpl for Move {
    fn step(&mut self, elapsed: i32, entity: &mut Entity, ctx: &mut StepContext<'_>) {
        match elapsed {
            RESERVE_AT => {
                match entity.tile_pos.step(self.direction) {
                    Some(target) if ctx.can_move_to(entity, target) => {
                        entity.future_tile_pos = Some(target);
                    }
                    _ => entity.set_next_behavior(Behavior::idle()),
                }
            }
            COMMIT_AT => {
                let moved = entity
                    .future_tile_pos
                    .take()
                    .is_some_and(|target| ctx.move_directly(entity, target));
                if !moved {
                    entity.set_next_behavior(Behavior::idle());
                }
            }
            END_AT => entity.set_next_behavior(Behavior::idle()),
            _ => {}
        }
    }

    fn appearance(&self, elapsed: i32) -> Appearance {
        Appearance::new(Pose::Move, elapsed)
    }
}

//! Timestop
//!
//! A timestop pauses normal ticking: while the stack is non-empty only
//! entities flagged `runs_in_timestop` are stepped. Only the top record's
//! behavior advances, once per tick, and the record is popped when that
//! behavior reports completion.

use serde::{Serialize, Deserialize};

use crate::core::hash::StateHasher;
use crate::game::behavior::{Behavior, PROJECTILE_TRAITS};
use crate::game::context::StepContext;
use crate::game::entity::{Entity, EntityId};
use crate::game::events::SoundKind;
use crate::game::field::{ColumnSwap, Side, TilePos};
use crate::game::hit::Hit;

/// Whether a timestop keeps running after this tick.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TimestopProgress {
    /// Step again next tick
    Running,
    /// Pop it
    Done,
}

// =============================================================================
// AREA GRAB
// =============================================================================

const SELECT_AT: i32 = 0;
/// Last tick the opponent may cut in.
const COUNTER_WINDOW_END: i32 = 14;
const LAND_AT: i32 = 20;
const DONE_AT: i32 = 30;

/// Countdown armed on the grabbed column when the grab lands.
const GRAB_SWAP_DELAY: u32 = 1;

/// Rows the falling panels land on.
const PANEL_ROWS: [i32; 3] = [1, 2, 3];

/// Steals the opponent's frontmost column unless someone stands in it.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct AreaGrabTimestop {
    /// Damage dealt to enemies standing in the column
    pub damage: i32,
    /// Column picked at the start
    pub column: Option<u8>,
    /// Swap the column had before the grab; put back if the grab is blocked
    pub previous_swap: ColumnSwap,
}

impl AreaGrabTimestop {
    fn step(&mut self, elapsed: i32, side: Side, ctx: &mut StepContext<'_>) -> TimestopProgress {
        match elapsed {
            SELECT_AT => {
                let Some(x) = ctx.field().frontmost_enemy_column(side) else {
                    return TimestopProgress::Done;
                };
                self.column = Some(x);
                self.previous_swap = ctx.field().column(x).swap;
                ctx.field_mut().set_column_swap(x, ColumnSwap::Resolving);

                for y in PANEL_ROWS {
                    if let Some(pos) = TilePos::new(x as i32, y) {
                        let panel = Entity::new(side, pos, Behavior::area_grab_panel())
                            .with_hp(1)
                            .with_traits(PROJECTILE_TRAITS)
                            .running_in_timestop();
                        ctx.spawn(panel);
                    }
                }
            }
            LAND_AT => {
                if let Some(x) = self.column {
                    let enemies = ctx.enemies_in_column(side, x);
                    if enemies.is_empty() {
                        ctx.field_mut().set_column_swap(x, ColumnSwap::Countdown(GRAB_SWAP_DELAY));
                    } else {
                        for target in enemies {
                            ctx.apply_hit(target, Hit::damage(self.damage).flinching());
                        }
                        ctx.field_mut().set_column_swap(x, self.previous_swap);
                    }
                    ctx.add_sound(SoundKind::Land);
                }
            }
            DONE_AT => return TimestopProgress::Done,
            _ => {}
        }
        TimestopProgress::Running
    }
}

// =============================================================================
// TIMESTOP RECORD
// =============================================================================

/// Every timestop behavior.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum TimestopBehavior {
    /// Column grab
    AreaGrab(AreaGrabTimestop),
}

impl TimestopBehavior {
    /// Column grab dealing `damage` if blocked.
    pub fn area_grab(damage: i32) -> Self {
        TimestopBehavior::AreaGrab(AreaGrabTimestop {
            damage,
            column: None,
            previous_swap: ColumnSwap::Idle,
        })
    }

    /// Whether the opponent may still counter it.
    pub fn counterable(&self, elapsed: i32) -> bool {
        match self {
            TimestopBehavior::AreaGrab(_) => (0..=COUNTER_WINDOW_END).contains(&elapsed),
        }
    }

    fn tag(&self) -> u8 {
        match self {
            TimestopBehavior::AreaGrab(_) => 0,
        }
    }
}

/// One entry of the timestop stack.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Timestop {
    /// Entity that opened it
    pub owner: EntityId,
    /// Owning side
    pub side: Side,
    /// Active behavior
    pub behavior: TimestopBehavior,
    /// Ticks since it was pushed; -1 before its first step
    pub elapsed: i32,
}

impl Timestop {
    /// Create a record, not yet stepped.
    pub fn new(owner: EntityId, side: Side, behavior: TimestopBehavior) -> Self {
        Self {
            owner,
            side,
            behavior,
            elapsed: -1,
        }
    }

    /// Advance one tick.
    pub fn step(&mut self, ctx: &mut StepContext<'_>) -> TimestopProgress {
        self.elapsed += 1;
        match &mut self.behavior {
            TimestopBehavior::AreaGrab(grab) => grab.step(self.elapsed, self.side, ctx),
        }
    }

    /// Whether the opponent may still counter it.
    pub fn counterable(&self) -> bool {
        self.behavior.counterable(self.elapsed)
    }

    /// Hash the record.
    pub fn hash_into(&self, hasher: &mut StateHasher) {
        hasher.update_u64(self.owner.0);
        hasher.update_u8(self.side as u8);
        hasher.update_u8(self.behavior.tag());
        hasher.update_i32(self.elapsed);
        match self.behavior {
            TimestopBehavior::AreaGrab(grab) => {
                hasher.update_i32(grab.damage);
                hasher.update_u8(grab.column.map_or(u8::MAX, |x| x));
                grab.previous_swap.hash_into(hasher);
            }
        }
    }
}

// =============================================================================
// TESTS
// =============================================================================

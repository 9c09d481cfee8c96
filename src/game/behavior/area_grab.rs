//! AreaGrab: the chip that opens the column-grab timestop, and the
//! cosmetic panels that fall during it.

use serde::{Serialize, Deserialize};

use super::{Appearance, Behavior, BehaviorImpl, Pose};
use crate::game::context::StepContext;
use crate::game::entity::Entity;
use crate::game::events::DecorationKind;
use crate::game::timestop::TimestopBehavior;

const OPEN_AT: i32 = 0;
const END_AT: i32 = 1;

const LAND_AT: i32 = 20;

/// Opens an AreaGrab timestop owned by the user.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct AreaGrab {
    /// Damage dealt to anyone standing in the grabbed column
    pub damage: i32,
}

impl AreaGrab {
    /// Create the opener.
    pub fn new(damage: i32) -> Self {
        Self { damage }
    }
}

impl BehaviorImpl for AreaGrab {
    fn step(&mut self, elapsed: i32, entity: &mut Entity, ctx: &mut StepContext<'_>) {
        match elapsed {
            OPEN_AT => {
                ctx.push_timestop(entity.id, entity.side, TimestopBehavior::area_grab(self.damage));
            }
            END_AT => entity.set_next_behavior(Behavior::idle()),
            _ => {}
        }
    }

    fn appearance(&self, elapsed: i32) -> Appearance {
        Appearance::new(Pose::Cast, elapsed)
    }
}

/// A panel falling onto a grabbed column. Runs during timestops and
/// disappears in a dust cloud when it lands.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AreaGrabPanel;

impl BehaviorImpl for AreaGrabPanel {
    fn step(&mut self, elapsed: i32, entity: &mut Entity, ctx: &mut StepContext<'_>) {
        if elapsed == LAND_AT {
            ctx.add_decoration(DecorationKind::Dust, entity.tile_pos, entity.flip);
            entity.destroy();
        }
    }

    fn appearance(&self, elapsed: i32) -> Appearance {
        Appearance::new(Pose::Panel, elapsed)
    }
}

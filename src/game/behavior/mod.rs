//! Entity Behavior State Machine
//!
//! Every entity runs exactly one behavior at a time. A behavior is stepped
//! once per tick with its own elapsed counter (already incremented) and
//! drives the entity through fixed elapsed thresholds: at `elapsed == T`
//! it fires, spawns, or schedules the next behavior.
//!
//! A freshly installed behavior starts at elapsed -1, so its first step
//! sees elapsed 0.

use serde::{Serialize, Deserialize};

use crate::game::context::StepContext;
use crate::game::entity::{Entity, DRAG_TICKS_PER_TILE};
use crate::game::events::SoundKind;
use crate::game::field::Direction;
use crate::game::input::Intent;

mod idle;
mod movement;
mod buster;
mod cannon;
mod shot;
mod sword;
mod vulcan;
mod recov;
mod flinch;
mod area_grab;

pub use idle::Idle;
pub use movement::Move;
pub use buster::{Buster, FULL_CHARGE_TICKS};
pub use cannon::Cannon;
pub use shot::{AirShot, Shot};
pub(crate) use shot::PROJECTILE_TRAITS;
pub use sword::{Sword, SwordPattern};
pub use vulcan::Vulcan;
pub use recov::Recov;
pub use flinch::Flinch;
pub use area_grab::{AreaGrab, AreaGrabPanel};

// =============================================================================
// CONTRACT
// =============================================================================

/// Static properties of a behavior at a given elapsed tick.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct BehaviorTraits {
    /// A hit landing now is a counter hit
    pub counterable: bool,
}

/// Which inputs may cancel a behavior at a given elapsed tick.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Interrupts {
    /// Directional input starts a move
    pub on_move: bool,
    /// Charge input accumulates, and its release fires the basic weapon
    pub on_charge: bool,
}

/// Coarse pose for renderers.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum Pose {
    /// Standing
    Idle,
    /// Stepping between tiles
    Move,
    /// Firing a gun
    Shoot,
    /// Swinging a blade
    Slash,
    /// Throwing or casting
    Cast,
    /// Reeling from a hit
    Hurt,
    /// Flying projectile
    Projectile,
    /// Falling panel
    Panel,
}

/// What a renderer should draw for an entity.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Appearance {
    /// Pose
    pub pose: Pose,
    /// Animation frame within the pose
    pub frame: u32,
}

impl Appearance {
    pub(crate) fn new(pose: Pose, elapsed: i32) -> Self {
        Self {
            pose,
            frame: elapsed.max(0) as u32,
        }
    }
}

/// The contract every behavior variant implements.
pub trait BehaviorImpl {
    /// Advance one tick. `elapsed` has already been incremented.
    fn step(&mut self, elapsed: i32, entity: &mut Entity, ctx: &mut StepContext<'_>);

    /// Pure appearance query.
    fn appearance(&self, elapsed: i32) -> Appearance;

    /// Static properties at `elapsed`.
    fn traits(&self, _elapsed: i32) -> BehaviorTraits {
        BehaviorTraits::default()
    }

    /// Inputs that may cancel the behavior at `elapsed`.
    fn interrupts(&self, _elapsed: i32) -> Interrupts {
        Interrupts::default()
    }
}

// =============================================================================
// CLOSED VARIANT SET
// =============================================================================

/// Discriminant of a behavior, stable for hashing.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[repr(u8)]
#[allow(missing_docs)]
pub enum BehaviorKind {
    Idle = 0,
    Move = 1,
    Buster = 2,
    Cannon = 3,
    AirShot = 4,
    Shot = 5,
    Sword = 6,
    Vulcan = 7,
    Recov = 8,
    Flinch = 9,
    AreaGrab = 10,
    AreaGrabPanel = 11,
}

/// Every behavior an entity can run.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[allow(missing_docs)]
pub enum Behavior {
    Idle(Idle),
    Move(Move),
    Buster(Buster),
    Cannon(Cannon),
    AirShot(AirShot),
    Shot(Shot),
    Sword(Sword),
    Vulcan(Vulcan),
    Recov(Recov),
    Flinch(Flinch),
    AreaGrab(AreaGrab),
    AreaGrabPanel(AreaGrabPanel),
}

macro_rules! dispatch {
    ($self:expr, $inner:ident => $body:expr) => {
        match $self {
            Behavior::Idle($inner) => $body,
            Behavior::Move($inner) => $body,
            Behavior::Buster($inner) => $body,
            Behavior::Cannon($inner) => $body,
            Behavior::AirShot($inner) => $body,
            Behavior::Shot($inner) => $body,
            Behavior::Sword($inner) => $body,
            Behavior::Vulcan($inner) => $body,
            Behavior::Recov($inner) => $body,
            Behavior::Flinch($inner) => $body,
            Behavior::AreaGrab($inner) => $body,
            Behavior::AreaGrabPanel($inner) => $body,
        }
    };
}

impl Behavior {
    /// Standing still, waiting for input.
    pub fn idle() -> Self {
        Behavior::Idle(Idle)
    }

    /// One-tile step.
    pub fn movement(direction: Direction) -> Self {
        Behavior::Move(Move::new(direction))
    }

    /// Basic weapon shot.
    pub fn buster(charged: bool) -> Self {
        Behavior::Buster(Buster::new(charged))
    }

    /// Heavy hitscan shot.
    pub fn cannon(damage: i32) -> Self {
        Behavior::Cannon(Cannon::new(damage))
    }

    /// Launches a dragging projectile.
    pub fn air_shot(damage: i32) -> Self {
        Behavior::AirShot(AirShot::new(damage))
    }

    /// The projectile itself.
    pub fn shot(damage: i32, direction: Direction) -> Self {
        Behavior::Shot(Shot::new(damage, direction))
    }

    /// Melee swing over a tile pattern.
    pub fn sword(damage: i32, pattern: SwordPattern) -> Self {
        Behavior::Sword(Sword::new(damage, pattern))
    }

    /// Rapid hitscan burst.
    pub fn vulcan(damage: i32, hits: u32) -> Self {
        Behavior::Vulcan(Vulcan::new(damage, hits))
    }

    /// Self heal.
    pub fn recov(heal: i32) -> Self {
        Behavior::Recov(Recov::new(heal))
    }

    /// Reeling from a flinching hit.
    pub fn flinch() -> Self {
        Behavior::Flinch(Flinch)
    }

    /// Opens the column-grab timestop.
    pub fn area_grab(damage: i32) -> Self {
        Behavior::AreaGrab(AreaGrab::new(damage))
    }

    /// Cosmetic falling panel.
    pub fn area_grab_panel() -> Self {
        Behavior::AreaGrabPanel(AreaGrabPanel)
    }

    /// Discriminant.
    pub fn kind(&self) -> BehaviorKind {
        match self {
            Behavior::Idle(_) => BehaviorKind::Idle,
            Behavior::Move(_) => BehaviorKind::Move,
            Behavior::Buster(_) => BehaviorKind::Buster,
            Behavior::Cannon(_) => BehaviorKind::Cannon,
            Behavior::AirShot(_) => BehaviorKind::AirShot,
            Behavior::Shot(_) => BehaviorKind::Shot,
            Behavior::Sword(_) => BehaviorKind::Sword,
            Behavior::Vulcan(_) => BehaviorKind::Vulcan,
            Behavior::Recov(_) => BehaviorKind::Recov,
            Behavior::Flinch(_) => BehaviorKind::Flinch,
            Behavior::AreaGrab(_) => BehaviorKind::AreaGrab,
            Behavior::AreaGrabPanel(_) => BehaviorKind::AreaGrabPanel,
        }
    }
}

impl BehaviorImpl for Behavior {
    fn step(&mut self, elapsed: i32, entity: &mut Entity, ctx: &mut StepContext<'_>) {
        dispatch!(self, inner => inner.step(elapsed, entity, ctx))
    }

    fn appearance(&self, elapsed: i32) -> Appearance {
        dispatch!(self, inner => inner.appearance(elapsed))
    }

    fn traits(&self, elapsed: i32) -> BehaviorTraits {
        dispatch!(self, inner => inner.traits(elapsed))
    }

    fn interrupts(&self, elapsed: i32) -> Interrupts {
        dispatch!(self, inner => inner.interrupts(elapsed))
    }
}

// =============================================================================
// BEHAVIOR STATE
// =============================================================================

/// Active behavior plus its elapsed counter.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct BehaviorState {
    /// Active variant
    pub behavior: Behavior,
    /// Ticks since the variant was installed; -1 before its first step
    pub elapsed: i32,
}

impl BehaviorState {
    /// Install a behavior, not yet stepped.
    pub fn new(behavior: Behavior) -> Self {
        Self {
            behavior,
            elapsed: -1,
        }
    }

    /// Appearance of the active behavior.
    pub fn appearance(&self) -> Appearance {
        self.behavior.appearance(self.elapsed)
    }
}

impl Default for BehaviorState {
    fn default() -> Self {
        Self::new(Behavior::idle())
    }
}

// =============================================================================
// ENTITY STEP
// =============================================================================

/// Step one entity for one tick.
///
/// Counts status timers down, advances a forced drag, applies input
/// interrupts and finally steps the active behavior. Stunned or dragged
/// entities skip their behavior.
pub fn step_entity(entity: &mut Entity, ctx: &mut StepContext<'_>) {
    entity.status.decrement();

    if let Some(mut drag) = entity.drag {
        drag.elapsed += 1;
        entity.drag = Some(drag);
        if drag.elapsed % DRAG_TICKS_PER_TILE == 0 {
            let moved = entity
                .tile_pos
                .step(drag.direction)
                .is_some_and(|target| ctx.move_directly(entity, target));
            if !moved {
                entity.drag = None;
            }
        }
        return;
    }

    if entity.status.is_stunned() {
        return;
    }

    apply_interrupts(entity, ctx);

    let mut state = std::mem::take(&mut entity.behavior_state);
    state.elapsed += 1;
    state.behavior.step(state.elapsed, entity, ctx);
    entity.behavior_state = state;

    if let Some(next) = entity.next_behavior.take() {
        entity.behavior_state = BehaviorState::new(next);
    }
}

fn apply_interrupts(entity: &mut Entity, ctx: &mut StepContext<'_>) {
    let intent = if entity.status.confused > 0 {
        entity.intent.mirrored()
    } else {
        entity.intent
    };
    let state = &entity.behavior_state;
    let interrupts = state.behavior.interrupts(state.elapsed);

    if interrupts.on_charge {
        if intent.holds(Intent::CHARGE) {
            entity.charging_elapsed += 1;
            if entity.charging_elapsed == FULL_CHARGE_TICKS {
                ctx.add_sound(SoundKind::ChargeReady);
            }
        } else if intent.released_since(entity.last_intent, Intent::CHARGE) {
            let charged = entity.charging_elapsed >= FULL_CHARGE_TICKS;
            entity.charging_elapsed = 0;
            entity.replace_behavior(Behavior::buster(charged));
            return;
        }
    } else if !intent.holds(Intent::CHARGE) {
        entity.charging_elapsed = 0;
    }

    if interrupts.on_move && entity.status.immobilized == 0 {
        if let Some(direction) = intent.direction() {
            entity.replace_behavior(Behavior::movement(direction));
        }
    }
}

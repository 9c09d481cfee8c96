//! Intents and Intent Recording
//!
//! An intent is the 16-bit set of buttons a side holds during one tick.
//! It is the only per-tick data exchanged between peers, so everything the
//! simulation reacts to must be derivable from it.

use serde::{Serialize, Deserialize};

use crate::core::hash::{StateHash, StateHasher};
use crate::game::field::{Direction, Side};

// =============================================================================
// INTENT
// =============================================================================

/// Buttons held by one side during one tick.
///
/// Packed into a u16 so it fits the `Intent` packet unchanged.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(transparent)]
pub struct Intent(pub u16);

impl Intent {
    /// Size in bytes on the wire
    pub const SIZE: usize = 2;

    /// Nothing held
    pub const NONE: Intent = Intent(0);

    /// Move up
    pub const UP: u16 = 0x0001;
    /// Move down
    pub const DOWN: u16 = 0x0002;
    /// Move left
    pub const LEFT: u16 = 0x0004;
    /// Move right
    pub const RIGHT: u16 = 0x0008;
    /// Use the chip at the front of the hand
    pub const USE_CHIP: u16 = 0x0010;
    /// Confirm (menu navigation, unused by the simulation)
    pub const CONFIRM: u16 = 0x0020;
    /// Counter an opponent's timestop
    pub const CUT_IN: u16 = 0x0040;
    /// Refill the hand when the custom gauge is full
    pub const END_TURN: u16 = 0x0080;
    /// Charge the basic weapon
    pub const CHARGE: u16 = 0x0100;

    /// Every defined bit
    pub const ALL_BITS: u16 = 0x01ff;

    /// Create from raw bits. Undefined bits are dropped.
    pub const fn from_bits(bits: u16) -> Self {
        Self(bits & Self::ALL_BITS)
    }

    /// Raw bits.
    #[inline]
    pub const fn bits(self) -> u16 {
        self.0
    }

    /// Whether a button is held.
    #[inline]
    pub const fn holds(self, flag: u16) -> bool {
        self.0 & flag != 0
    }

    /// Builder: set a button.
    #[inline]
    pub const fn with(self, flag: u16) -> Self {
        Self(self.0 | flag)
    }

    /// Whether a button went from released to held between `previous` and `self`.
    #[inline]
    pub const fn pressed_since(self, previous: Intent, flag: u16) -> bool {
        self.holds(flag) && !previous.holds(flag)
    }

    /// Whether a button went from held to released between `previous` and `self`.
    #[inline]
    pub const fn released_since(self, previous: Intent, flag: u16) -> bool {
        !self.holds(flag) && previous.holds(flag)
    }

    /// Whether nothing is held.
    #[inline]
    pub const fn is_idle(self) -> bool {
        self.0 == 0
    }

    /// Resolve the held directional buttons to a single move direction.
    ///
    /// Opposite buttons cancel. When both axes are held the horizontal one wins,
    /// since the grid has no diagonal moves.
    pub fn direction(self) -> Option<Direction> {
        let dx = self.holds(Self::RIGHT) as i32 - self.holds(Self::LEFT) as i32;
        let dy = self.holds(Self::DOWN) as i32 - self.holds(Self::UP) as i32;

        match (dx, dy) {
            (1, _) => Some(Direction::Right),
            (-1, _) => Some(Direction::Left),
            (0, 1) => Some(Direction::Down),
            (0, -1) => Some(Direction::Up),
            _ => None,
        }
    }

    /// Swap up/down and left/right. Used while confused.
    pub fn mirrored(self) -> Intent {
        let mut bits = self.0 & !(Self::UP | Self::DOWN | Self::LEFT | Self::RIGHT);
        if self.holds(Self::UP) {
            bits |= Self::DOWN;
        }
        if self.holds(Self::DOWN) {
            bits |= Self::UP;
        }
        if self.holds(Self::LEFT) {
            bits |= Self::RIGHT;
        }
        if self.holds(Self::RIGHT) {
            bits |= Self::LEFT;
        }
        Intent(bits)
    }
}

impl From<u16> for Intent {
    fn from(bits: u16) -> Self {
        Intent::from_bits(bits)
    }
}

// =============================================================================
// INTENT LOG
// =============================================================================

/// One change in a side's intent.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct IntentDelta {
    /// First tick the intent applies to
    pub tick: u32,
    /// The new intent
    pub intent: Intent,
}

/// Delta-compressed intent record for one side.
///
/// Only ticks where the intent changed are stored. Used for replay and
/// for hashing the input history at match end.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct IntentLog {
    /// Side the intents belong to
    pub side: Side,

    /// Last tick recorded
    pub end_tick: u32,

    deltas: Vec<IntentDelta>,

    #[serde(skip)]
    last_intent: Intent,
}

impl IntentLog {
    /// Create an empty log for a side.
    pub fn new(side: Side) -> Self {
        Self {
            side,
            end_tick: 0,
            deltas: Vec::with_capacity(256),
            last_intent: Intent::NONE,
        }
    }

    /// Record the intent applied at `tick`.
    pub fn record(&mut self, tick: u32, intent: Intent) {
        self.end_tick = tick;

        if intent != self.last_intent {
            self.deltas.push(IntentDelta { tick, intent });
            self.last_intent = intent;
        }
    }

    /// Intent in force at `tick`.
    pub fn intent_at(&self, tick: u32) -> Intent {
        let idx = self.deltas.partition_point(|d| d.tick <= tick);
        if idx == 0 {
            Intent::NONE
        } else {
            self.deltas[idx - 1].intent
        }
    }

    /// Stored changes.
    pub fn deltas(&self) -> &[IntentDelta] {
        &self.deltas
    }

    /// Number of stored changes.
    pub fn delta_count(&self) -> usize {
        self.deltas.len()
    }

    /// Hash the recorded history.
    pub fn compute_hash(&self) -> StateHash {
        let mut hasher = StateHasher::for_intent_log();
        hasher.update_u8(self.side as u8);
        hasher.update_u32(self.end_tick);
        hasher.update_u32(self.deltas.len() as u32);
        for delta in &self.deltas {
            hasher.update_u32(delta.tick);
            hasher.update_u16(delta.intent.bits());
        }
        hasher.finalize()
    }

    /// Iterate (tick, intent) for every tick from 1 to `end_tick`.
    pub fn replay_iter(&self) -> impl Iterator<Item = (u32, Intent)> + '_ {
        (1..=self.end_tick).map(move |tick| (tick, self.intent_at(tick)))
    }
}

// =============================================================================
// TESTS
// =============================================================================

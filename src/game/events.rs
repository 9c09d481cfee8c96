//! Presentation & Battle Events
//!
//! Sounds and decorations are produced by the simulation so both peers agree
//! on them, but they never feed back into gameplay. Battle events summarize
//! what happened in a tick for logging and UI.

use serde::{Serialize, Deserialize};

use crate::core::hash::StateHasher;
use crate::game::entity::EntityId;
use crate::game::field::{Side, TilePos};

// =============================================================================
// DECORATIONS
// =============================================================================

/// Kind of a visual effect.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[repr(u8)]
pub enum DecorationKind {
    /// Small spark where a buster shot lands
    BusterHit = 0,
    /// Explosion where a heavy shot lands
    CannonHit = 1,
    /// Sword slash arc
    Slash = 2,
    /// Dust cloud from a landing panel
    Dust = 3,
    /// Healing sparkle
    Sparkle = 4,
}

impl DecorationKind {
    /// Ticks until the animation is complete.
    pub fn duration(self) -> i32 {
        match self {
            DecorationKind::BusterHit => 8,
            DecorationKind::CannonHit => 16,
            DecorationKind::Slash => 12,
            DecorationKind::Dust => 20,
            DecorationKind::Sparkle => 24,
        }
    }
}

/// A visual effect anchored to a tile.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Decoration {
    /// Unique id
    pub id: u32,
    /// Effect kind
    pub kind: DecorationKind,
    /// Ticks since start; negative while delayed
    pub elapsed: i32,
    /// Anchor tile
    pub tile_pos: TilePos,
    /// Pixel offset from the tile anchor
    pub offset: (i32, i32),
    /// Mirrored horizontally
    pub flip: bool,
}

impl Decoration {
    /// Whether the animation has finished.
    pub fn is_expired(&self) -> bool {
        self.elapsed >= self.kind.duration()
    }
}

// =============================================================================
// SOUNDS
// =============================================================================

/// Kind of a sound effect.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[repr(u8)]
pub enum SoundKind {
    /// Basic weapon fired
    Buster = 0,
    /// Basic weapon fully charged
    ChargeReady = 1,
    /// Heavy shot fired
    Cannon = 2,
    /// Sword swung
    Sword = 3,
    /// Something took damage
    Hurt = 4,
    /// Counter hit landed
    Counter = 5,
    /// HP restored
    Recov = 6,
    /// Timestop opened
    Timestop = 7,
    /// Panel landed
    Land = 8,
}

impl SoundKind {
    /// Ticks the sound is considered playing.
    pub fn duration(self) -> i32 {
        match self {
            SoundKind::Buster | SoundKind::Hurt => 10,
            SoundKind::ChargeReady | SoundKind::Counter => 20,
            SoundKind::Cannon | SoundKind::Sword | SoundKind::Land => 30,
            SoundKind::Recov => 40,
            SoundKind::Timestop => 60,
        }
    }
}

/// A sound effect.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Sound {
    /// Unique id
    pub id: u32,
    /// Sound kind
    pub kind: SoundKind,
    /// Ticks since start; negative while delayed
    pub elapsed: i32,
}

impl Sound {
    /// Whether the sound has finished.
    pub fn is_expired(&self) -> bool {
        self.elapsed >= self.kind.duration()
    }
}

// =============================================================================
// PRESENTATION QUEUE
// =============================================================================

/// All live sounds and decorations.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct Presentation {
    /// Live decorations, in creation order
    pub decorations: Vec<Decoration>,
    /// Live sounds, in creation order
    pub sounds: Vec<Sound>,
    next_id: u32,
}

impl Presentation {
    fn next_id(&mut self) -> u32 {
        let id = self.next_id;
        self.next_id = self.next_id.wrapping_add(1);
        id
    }

    /// Add a decoration. `delay` ticks pass before its animation starts.
    pub fn add_decoration(
        &mut self,
        kind: DecorationKind,
        tile_pos: TilePos,
        offset: (i32, i32),
        flip: bool,
        delay: i32,
    ) -> u32 {
        let id = self.next_id();
        self.decorations.push(Decoration {
            id,
            kind,
            elapsed: -delay,
            tile_pos,
            offset,
            flip,
        });
        id
    }

    /// Add a sound. `delay` ticks pass before it starts.
    pub fn add_sound(&mut self, kind: SoundKind, delay: i32) -> u32 {
        let id = self.next_id();
        self.sounds.push(Sound {
            id,
            kind,
            elapsed: -delay,
        });
        id
    }

    /// Age everything by one tick and drop what has finished.
    pub fn step(&mut self) {
        for decoration in &mut self.decorations {
            decoration.elapsed += 1;
        }
        for sound in &mut self.sounds {
            sound.elapsed += 1;
        }
        self.decorations.retain(|d| !d.is_expired());
        self.sounds.retain(|s| !s.is_expired());
    }

    /// Hash the queue.
    pub fn hash_into(&self, hasher: &mut StateHasher) {
        hasher.update_u32(self.next_id);
        hasher.update_u32(self.decorations.len() as u32);
        for d in &self.decorations {
            hasher.update_u32(d.id);
            hasher.update_u8(d.kind as u8);
            hasher.update_i32(d.elapsed);
            hasher.update_u8(d.tile_pos.index() as u8);
            hasher.update_i32(d.offset.0);
            hasher.update_i32(d.offset.1);
            hasher.update_bool(d.flip);
        }
        hasher.update_u32(self.sounds.len() as u32);
        for s in &self.sounds {
            hasher.update_u32(s.id);
            hasher.update_u8(s.kind as u8);
            hasher.update_i32(s.elapsed);
        }
    }
}

// =============================================================================
// BATTLE EVENTS
// =============================================================================

/// Something notable that happened during a tick.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum BattleEvent {
    /// A player used a chip
    ChipUsed {
        /// Who used it
        side: Side,
        /// Catalog index
        chip: u16,
    },
    /// A hit landed on a counterable behavior
    CounterHit {
        /// Entity that was countered
        target: EntityId,
    },
    /// A timestop was pushed
    TimestopStarted {
        /// Owning side
        side: Side,
        /// Stack depth after the push
        depth: usize,
    },
    /// A player refilled their hand
    HandRefilled {
        /// Who refilled
        side: Side,
        /// Hand size after refill
        hand_size: usize,
    },
    /// The battle is over
    MatchEnded {
        /// Winner, or None on a draw
        winner: Option<Side>,
        /// Tick the battle ended on
        tick: u32,
    },
}

// =============================================================================
// TESTS
// =============================================================================

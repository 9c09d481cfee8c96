//! Tile Field & Column Ownership
//!
//! Fixed 8x5 grid. Each tile has an owning side and a behavior that reacts
//! to entities entering and leaving it. Ownership can be swapped a whole
//! column at a time through a per-column countdown.

use serde::{Serialize, Deserialize};

use crate::core::hash::StateHasher;
use crate::game::entity::EntityTraits;

/// Number of tile columns.
pub const TILE_COLS: u8 = 8;

/// Number of tile rows.
pub const TILE_ROWS: u8 = 5;

/// Total number of tiles.
pub const TILE_COUNT: usize = TILE_COLS as usize * TILE_ROWS as usize;

/// Ticks a broken tile stays broken before it repairs itself.
pub const BROKEN_TILE_TICKS: u32 = 600;

/// Ticks before a stolen column returns to its original side.
pub const STOLEN_COLUMN_RETURN_TICKS: u32 = 900;

// =============================================================================
// SIDE
// =============================================================================

/// Allegiance of an entity or tile.
///
/// The offerer is the peer that opened the connection and always plays on
/// the left half of the field.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[repr(u8)]
pub enum Side {
    /// Left half, first in seed derivation
    Offerer = 0,
    /// Right half
    Answerer = 1,
}

impl Side {
    /// Both sides, in index order.
    pub const ALL: [Side; 2] = [Side::Offerer, Side::Answerer];

    /// The other side.
    #[inline]
    pub fn opponent(self) -> Side {
        match self {
            Side::Offerer => Side::Answerer,
            Side::Answerer => Side::Offerer,
        }
    }

    /// Index into per-side arrays.
    #[inline]
    pub fn index(self) -> usize {
        self as usize
    }

    /// Horizontal direction this side attacks towards.
    #[inline]
    pub fn forward(self) -> Direction {
        match self {
            Side::Offerer => Direction::Right,
            Side::Answerer => Direction::Left,
        }
    }
}

// =============================================================================
// DIRECTION
// =============================================================================

/// Cardinal direction on the grid.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(u8)]
pub enum Direction {
    /// Towards row 0
    Up = 0,
    /// Towards the last row
    Down = 1,
    /// Towards column 0
    Left = 2,
    /// Towards the last column
    Right = 3,
}

impl Direction {
    /// Grid offset as (dx, dy).
    #[inline]
    pub fn offset(self) -> (i32, i32) {
        match self {
            Direction::Up => (0, -1),
            Direction::Down => (0, 1),
            Direction::Left => (-1, 0),
            Direction::Right => (1, 0),
        }
    }
}

// =============================================================================
// TILE POSITION
// =============================================================================

/// Index of a tile in the grid (row-major).
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct TilePos(u8);

impl TilePos {
    /// Create from grid coordinates. Returns None when out of bounds.
    pub fn new(x: i32, y: i32) -> Option<TilePos> {
        if x < 0 || y < 0 || x >= TILE_COLS as i32 || y >= TILE_ROWS as i32 {
            return None;
        }
        Some(TilePos((y * TILE_COLS as i32 + x) as u8))
    }

    /// Create from a raw index. Returns None when out of bounds.
    pub fn from_index(index: usize) -> Option<TilePos> {
        if index < TILE_COUNT {
            Some(TilePos(index as u8))
        } else {
            None
        }
    }

    /// Raw row-major index.
    #[inline]
    pub fn index(self) -> usize {
        self.0 as usize
    }

    /// Column.
    #[inline]
    pub fn x(self) -> i32 {
        (self.0 % TILE_COLS) as i32
    }

    /// Row.
    #[inline]
    pub fn y(self) -> i32 {
        (self.0 / TILE_COLS) as i32
    }

    /// Both coordinates.
    #[inline]
    pub fn xy(self) -> (i32, i32) {
        (self.x(), self.y())
    }

    /// Position offset by (dx, dy), if still on the grid.
    pub fn offset_by(self, dx: i32, dy: i32) -> Option<TilePos> {
        TilePos::new(self.x() + dx, self.y() + dy)
    }

    /// Neighbor in a direction, if still on the grid.
    pub fn step(self, direction: Direction) -> Option<TilePos> {
        let (dx, dy) = direction.offset();
        self.offset_by(dx, dy)
    }
}

// =============================================================================
// TILES
// =============================================================================

/// Per-tile behavior.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum TileBehavior {
    /// Always steppable.
    Normal,
    /// Steppable; breaks when an entity that feels tile effects leaves.
    Cracked,
    /// Only hole-walkers may enter; repairs itself.
    Broken {
        /// Ticks until the tile becomes Normal again
        ticks_left: u32,
    },
    /// Only hole-walkers may enter; permanent.
    Hole,
}

impl TileBehavior {
    /// Stable tag for hashing.
    fn tag(self) -> u8 {
        match self {
            TileBehavior::Normal => 0,
            TileBehavior::Cracked => 1,
            TileBehavior::Broken { .. } => 2,
            TileBehavior::Hole => 3,
        }
    }
}

/// A single tile.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Tile {
    /// Owning side
    pub owner: Side,
    /// Current behavior
    pub behavior: TileBehavior,
}

impl Tile {
    /// Create a normal tile.
    pub fn new(owner: Side) -> Self {
        Self {
            owner,
            behavior: TileBehavior::Normal,
        }
    }

    /// Whether an entity with these traits may stand here.
    pub fn is_steppable(&self, traits: EntityTraits) -> bool {
        match self.behavior {
            TileBehavior::Normal | TileBehavior::Cracked => true,
            TileBehavior::Broken { .. } | TileBehavior::Hole => {
                traits.contains(EntityTraits::CAN_STEP_ON_HOLE_LIKE)
            }
        }
    }

    /// React to an entity entering.
    pub fn on_enter(&mut self, _traits: EntityTraits) {
        // No tile reacts to entry yet.
    }

    /// React to an entity leaving.
    pub fn on_leave(&mut self, traits: EntityTraits) {
        if traits.contains(EntityTraits::IGNORES_TILE_EFFECTS) {
            return;
        }
        if self.behavior == TileBehavior::Cracked {
            self.behavior = TileBehavior::Broken { ticks_left: BROKEN_TILE_TICKS };
        }
    }

    /// Advance one tick.
    fn step(&mut self) {
        if let TileBehavior::Broken { ticks_left } = &mut self.behavior {
            *ticks_left = ticks_left.saturating_sub(1);
            if *ticks_left == 0 {
                self.behavior = TileBehavior::Normal;
            }
        }
    }
}

// =============================================================================
// COLUMNS
// =============================================================================

/// Ownership-swap countdown for a column.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum ColumnSwap {
    /// No swap scheduled.
    Idle,
    /// Flip every tile when this reaches zero.
    Countdown(u32),
    /// An effect is currently deciding this column; never flips on its own.
    Resolving,
}

impl ColumnSwap {
    /// Hash the countdown state.
    pub fn hash_into(&self, hasher: &mut StateHasher) {
        match *self {
            ColumnSwap::Idle => hasher.update_u8(0),
            ColumnSwap::Countdown(ticks) => {
                hasher.update_u8(1);
                hasher.update_u32(ticks);
            }
            ColumnSwap::Resolving => hasher.update_u8(2),
        }
    }
}

/// Column-level state shared by all tiles in a column.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Column {
    /// Pending swap
    pub swap: ColumnSwap,
    /// Whether the column currently belongs to the side that did not start with it
    pub stolen: bool,
}

impl Default for Column {
    fn default() -> Self {
        Self {
            swap: ColumnSwap::Idle,
            stolen: false,
        }
    }
}

// =============================================================================
// FIELD
// =============================================================================

/// The whole tile grid.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Field {
    tiles: Vec<Tile>,
    columns: [Column; TILE_COLS as usize],
}

impl Default for Field {
    fn default() -> Self {
        Self::new()
    }
}

impl Field {
    /// Create the starting field: left half offerer, right half answerer.
    pub fn new() -> Self {
        let tiles = (0..TILE_COUNT)
            .map(|i| {
                let x = (i % TILE_COLS as usize) as u8;
                if x < TILE_COLS / 2 {
                    Tile::new(Side::Offerer)
                } else {
                    Tile::new(Side::Answerer)
                }
            })
            .collect();

        Self {
            tiles,
            columns: [Column::default(); TILE_COLS as usize],
        }
    }

    /// Get a tile.
    #[inline]
    pub fn tile(&self, pos: TilePos) -> &Tile {
        &self.tiles[pos.index()]
    }

    /// Get a tile mutably.
    #[inline]
    pub fn tile_mut(&mut self, pos: TilePos) -> &mut Tile {
        &mut self.tiles[pos.index()]
    }

    /// Iterate all tiles with their positions.
    pub fn tiles(&self) -> impl Iterator<Item = (TilePos, &Tile)> {
        self.tiles
            .iter()
            .enumerate()
            .filter_map(|(i, t)| TilePos::from_index(i).map(|p| (p, t)))
    }

    /// Get a column's state.
    pub fn column(&self, x: u8) -> &Column {
        &self.columns[x as usize]
    }

    /// Schedule (or cancel) a column swap.
    pub fn set_column_swap(&mut self, x: u8, swap: ColumnSwap) {
        self.columns[x as usize].swap = swap;
    }

    /// Owner of a whole column, if every tile in it agrees.
    pub fn column_owner(&self, x: u8) -> Option<Side> {
        let first = self.tiles[x as usize].owner;
        let uniform = (0..TILE_ROWS)
            .all(|y| self.tiles[y as usize * TILE_COLS as usize + x as usize].owner == first);
        uniform.then_some(first)
    }

    /// The opponent column closest to `side`'s half.
    ///
    /// Returns None when the opponent only has one column left.
    pub fn frontmost_enemy_column(&self, side: Side) -> Option<u8> {
        let enemy = side.opponent();
        let enemy_columns = (0..TILE_COLS)
            .filter(|x| self.column_owner(*x) == Some(enemy))
            .count();
        if enemy_columns <= 1 {
            return None;
        }

        match side {
            Side::Offerer => (0..TILE_COLS).find(|x| self.column_owner(*x) == Some(enemy)),
            Side::Answerer => (0..TILE_COLS).rev().find(|x| self.column_owner(*x) == Some(enemy)),
        }
    }

    /// Flip ownership of every tile in a column.
    fn flip_column(&mut self, x: u8) {
        for y in 0..TILE_ROWS {
            let tile = &mut self.tiles[y as usize * TILE_COLS as usize + x as usize];
            tile.owner = tile.owner.opponent();
        }

        let column = &mut self.columns[x as usize];
        column.stolen = !column.stolen;
        column.swap = if column.stolen {
            ColumnSwap::Countdown(STOLEN_COLUMN_RETURN_TICKS)
        } else {
            ColumnSwap::Idle
        };
    }

    /// Advance one tick: column countdowns, then per-tile behavior.
    pub fn step(&mut self) {
        for x in 0..TILE_COLS {
            match self.columns[x as usize].swap {
                ColumnSwap::Countdown(ticks) => {
                    let ticks = ticks.saturating_sub(1);
                    if ticks == 0 {
                        self.flip_column(x);
                    } else {
                        self.columns[x as usize].swap = ColumnSwap::Countdown(ticks);
                    }
                }
                ColumnSwap::Idle | ColumnSwap::Resolving => {}
            }
        }

        for tile in &mut self.tiles {
            tile.step();
        }
    }

    /// Hash the field.
    pub fn hash_into(&self, hasher: &mut StateHasher) {
        for tile in &self.tiles {
            hasher.update_u8(tile.owner as u8);
            hasher.update_u8(tile.behavior.tag());
            if let TileBehavior::Broken { ticks_left } = tile.behavior {
                hasher.update_u32(ticks_left);
            }
        }
        for column in &self.columns {
            column.swap.hash_into(hasher);
            hasher.update_bool(column.stolen);
        }
    }
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tile_pos_roundtrip() {
        for y in 0..TILE_ROWS as i32 {
            for x in 0..TILE_COLS as i32 {
                let pos = TilePos::new(x, y).unwrap();
                assert_eq!(pos.xy(), (x, y));
            }
        }
        assert!(TilePos::new(-1, 0).is_none());
        assert!(TilePos::new(TILE_COLS as i32, 0).is_none());
        assert!(TilePos::new(0, TILE_ROWS as i32).is_none());
    }

    #[test]
    fn test_initial_ownership() {
        let field = Field::new();
        assert_eq!(field.column_owner(0), Some(Side::Offerer));
        assert_eq!(field.column_owner(3), Some(Side::Offerer));
        assert_eq!(field.column_owner(4), Some(Side::Answerer));
        assert_eq!(field.column_owner(7), Some(Side::Answerer));
    }

    #[test]
    fn test_cracked_tile_breaks_on_leave() {
        let mut tile = Tile::new(Side::Offerer);
        tile.behavior = TileBehavior::Cracked;

        tile.on_leave(EntityTraits::NONE);
        assert_eq!(tile.behavior, TileBehavior::Broken { ticks_left: BROKEN_TILE_TICKS });
    }

    #[test]
    fn test_cracked_tile_survives_floating_entity() {
        let mut tile = Tile::new(Side::Offerer);
        tile.behavior = TileBehavior::Cracked;

        tile.on_leave(EntityTraits::IGNORES_TILE_EFFECTS);
        assert_eq!(tile.behavior, TileBehavior::Cracked);
    }

    #[test]
    fn test_broken_tile_steppability() {
        let mut tile = Tile::new(Side::Offerer);
        tile.behavior = TileBehavior::Hole;

        assert!(!tile.is_steppable(EntityTraits::NONE));
        assert!(tile.is_steppable(EntityTraits::CAN_STEP_ON_HOLE_LIKE));
    }

    #[test]
    fn test_broken_tile_repairs() {
        let mut field = Field::new();
        let pos = TilePos::new(1, 1).unwrap();
        field.tile_mut(pos).behavior = TileBehavior::Broken { ticks_left: 2 };

        field.step();
        assert_eq!(field.tile(pos).behavior, TileBehavior::Broken { ticks_left: 1 });
        field.step();
        assert_eq!(field.tile(pos).behavior, TileBehavior::Normal);
    }

    #[test]
    fn test_column_swap_countdown() {
        let mut field = Field::new();
        field.set_column_swap(4, ColumnSwap::Countdown(2));

        field.step();
        assert_eq!(field.column_owner(4), Some(Side::Answerer));

        field.step();
        assert_eq!(field.column_owner(4), Some(Side::Offerer));
        assert!(field.column(4).stolen);
        assert_eq!(field.column(4).swap, ColumnSwap::Countdown(STOLEN_COLUMN_RETURN_TICKS));
    }

    #[test]
    fn test_resolving_column_never_flips() {
        let mut field = Field::new();
        field.set_column_swap(4, ColumnSwap::Resolving);

        for _ in 0..10 {
            field.step();
        }
        assert_eq!(field.column_owner(4), Some(Side::Answerer));
    }

    #[test]
    fn test_stolen_column_returns() {
        let mut field = Field::new();
        field.set_column_swap(4, ColumnSwap::Countdown(1));
        field.step();
        assert_eq!(field.column_owner(4), Some(Side::Offerer));

        for _ in 0..STOLEN_COLUMN_RETURN_TICKS {
            field.step();
        }
        assert_eq!(field.column_owner(4), Some(Side::Answerer));
        assert!(!field.column(4).stolen);
        assert_eq!(field.column(4).swap, ColumnSwap::Idle);
    }

    #[test]
    fn test_frontmost_enemy_column() {
        let mut field = Field::new();
        assert_eq!(field.frontmost_enemy_column(Side::Offerer), Some(4));
        assert_eq!(field.frontmost_enemy_column(Side::Answerer), Some(3));

        // Take every answerer column but the last one
        for x in 4..7 {
            field.set_column_swap(x, ColumnSwap::Countdown(1));
        }
        field.step();
        assert_eq!(field.frontmost_enemy_column(Side::Offerer), None);
    }
}

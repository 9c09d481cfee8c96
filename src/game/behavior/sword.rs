//! Sword: melee swing over a tile pattern.

use serde::{Serialize, Deserialize};

use super::{Appearance, Behavior, BehaviorImpl, BehaviorTraits, Pose};
use crate::game::context::StepContext;
use crate::game::entity::Entity;
use crate::game::events::{DecorationKind, SoundKind};
use crate::game::field::TilePos;
use crate::game::hit::Hit;

const SLASH_AT: i32 = 9;
const END_AT: i32 = 20;

/// Tiles a sword covers, relative to its user.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum SwordPattern {
    /// One tile ahead
    Short,
    /// The three tiles of the column ahead
    Wide,
    /// Two tiles ahead
    Long,
}

impl SwordPattern {
    /// (forward, vertical) offsets covered.
    fn offsets(self) -> &'static [(i32, i32)] {
        match self {
            SwordPattern::Short => &[(1, 0)],
            SwordPattern::Wide => &[(1, -1), (1, 0), (1, 1)],
            SwordPattern::Long => &[(1, 0), (2, 0)],
        }
    }
}

/// Hits every enemy in its pattern at once. Can be countered during the
/// wind-up.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Sword {
    /// Damage dealt
    pub damage: i32,
    /// Covered tiles
    pub pattern: SwordPattern,
}

impl Sword {
    /// Create a swing.
    pub fn new(damage: i32, pattern: SwordPattern) -> Self {
        Self { damage, pattern }
    }

    fn covered_tiles(&self, entity: &Entity) -> Vec<TilePos> {
        let (dx, _) = entity.forward().offset();
        self.pattern
            .offsets()
            .iter()
            .filter_map(|&(forward, vertical)| entity.tile_pos.offset_by(forward * dx, vertical))
            .collect()
    }
}

impl BehaviorImpl for Sword {
    fn step(&mut self, elapsed: i32, entity: &mut Entity, ctx: &mut StepContext<'_>) {
        match elapsed {
            SLASH_AT => {
                ctx.add_sound(SoundKind::Sword);
                let tiles = self.covered_tiles(entity);
                if let Some(first) = tiles.first() {
                    ctx.add_decoration(DecorationKind::Slash, *first, entity.flip);
                }
                for tile in tiles {
                    for target in ctx.enemies_at(entity.side, tile) {
                        ctx.apply_hit(target, Hit::damage(self.damage).flinching());
                    }
                }
            }
            END_AT => entity.set_next_behavior(Behavior::idle()),
            _ => {}
        }
    }

    fn appearance(&self, elapsed: i32) -> Appearance {
        Appearance::new(Pose::Slash, elapsed)
    }

    fn traits(&self, elapsed: i32) -> BehaviorTraits {
        BehaviorTraits {
            counterable: elapsed < SLASH_AT,
        }
    }
}

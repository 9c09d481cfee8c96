//! Chip Catalog
//!
//! Chips are the one-shot attacks a player draws into their hand. The
//! catalog is read once from JSON and never changes afterwards; each entry's
//! `kind` is looked up in a registration table that knows how to build the
//! behavior (and, for timestop chips, the timestop) the chip starts.

use std::collections::BTreeMap;
use std::fmt;

use serde::Deserialize;
use thiserror::Error;

use crate::game::behavior::{Behavior, SwordPattern};
use crate::game::timestop::TimestopBehavior;

/// Catalog shipped with the crate.
const BUILTIN_CATALOG: &str = include_str!("../../data/chips.json");

/// Errors from loading a chip catalog.
#[derive(Debug, Error)]
pub enum CatalogError {
    /// Document is not valid catalog JSON
    #[error("Invalid catalog JSON: {0}")]
    Json(#[from] serde_json::Error),

    /// Entry names a kind with no registered behavior
    #[error("Chip {index} has unknown kind '{kind}'")]
    UnknownKind {
        /// Entry index
        index: u16,
        /// Offending kind
        kind: String,
    },

    /// Two entries share an index
    #[error("Duplicate chip index {0}")]
    DuplicateIndex(u16),
}

// =============================================================================
// REGISTRATION TABLE
// =============================================================================

/// Builds the behavior a chip starts on its user.
pub type BehaviorFactory = fn(&Chip) -> Behavior;

/// Builds the timestop a chip opens.
pub type TimestopFactory = fn(&Chip) -> TimestopBehavior;

struct Registration {
    kind: &'static str,
    behavior: BehaviorFactory,
    timestop: Option<TimestopFactory>,
}

const REGISTRY: &[Registration] = &[
    Registration {
        kind: "cannon",
        behavior: |chip| Behavior::cannon(chip.damage),
        timestop: None,
    },
    Registration {
        kind: "air_shot",
        behavior: |chip| Behavior::air_shot(chip.damage),
        timestop: None,
    },
    Registration {
        kind: "sword",
        behavior: |chip| Behavior::sword(chip.damage, SwordPattern::Short),
        timestop: None,
    },
    Registration {
        kind: "wide_sword",
        behavior: |chip| Behavior::sword(chip.damage, SwordPattern::Wide),
        timestop: None,
    },
    Registration {
        kind: "long_sword",
        behavior: |chip| Behavior::sword(chip.damage, SwordPattern::Long),
        timestop: None,
    },
    Registration {
        kind: "vulcan",
        behavior: |chip| Behavior::vulcan(chip.damage, chip.hits),
        timestop: None,
    },
    Registration {
        kind: "recov",
        behavior: |chip| Behavior::recov(chip.heal),
        timestop: None,
    },
    Registration {
        kind: "area_grab",
        behavior: |chip| Behavior::area_grab(chip.damage),
        timestop: Some(|chip| TimestopBehavior::area_grab(chip.damage)),
    },
];

fn lookup(kind: &str) -> Option<&'static Registration> {
    REGISTRY.iter().find(|r| r.kind == kind)
}

// =============================================================================
// CHIP
// =============================================================================

#[derive(Deserialize)]
struct CatalogDocument {
    chips: Vec<ChipEntry>,
}

#[derive(Deserialize)]
struct ChipEntry {
    index: u16,
    name: String,
    kind: String,
    damage: i32,
    #[serde(default)]
    hits: u32,
    #[serde(default)]
    heal: i32,
}

/// An immutable catalog entry.
#[derive(Clone)]
pub struct Chip {
    /// Catalog index (what hands and folders store)
    pub index: u16,
    /// Display name
    pub name: String,
    /// Base damage
    pub damage: i32,
    /// Hits for multi-hit chips
    pub hits: u32,
    /// HP restored by healing chips
    pub heal: i32,
    factory: BehaviorFactory,
    timestop: Option<TimestopFactory>,
}

impl Chip {
    /// Behavior the user switches to.
    pub fn behavior(&self) -> Behavior {
        (self.factory)(self)
    }

    /// Whether using this chip opens a timestop.
    pub fn opens_timestop(&self) -> bool {
        self.timestop.is_some()
    }

    /// Timestop this chip opens, if any.
    pub fn timestop_behavior(&self) -> Option<TimestopBehavior> {
        self.timestop.map(|factory| factory(self))
    }
}

impl fmt::Debug for Chip {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Chip")
            .field("index", &self.index)
            .field("name", &self.name)
            .field("damage", &self.damage)
            .field("hits", &self.hits)
            .field("heal", &self.heal)
            .field("timestop", &self.opens_timestop())
            .finish()
    }
}

// =============================================================================
// CATALOG
// =============================================================================

/// Every known chip, keyed by index.
#[derive(Clone, Debug, Default)]
pub struct ChipCatalog {
    chips: BTreeMap<u16, Chip>,
}

impl ChipCatalog {
    /// Parse a catalog document.
    pub fn from_json(json: &str) -> Result<Self, CatalogError> {
        let document: CatalogDocument = serde_json::from_str(json)?;
        let mut chips = BTreeMap::new();

        for entry in document.chips {
            let registration = lookup(&entry.kind).ok_or_else(|| CatalogError::UnknownKind {
                index: entry.index,
                kind: entry.kind.clone(),
            })?;

            let chip = Chip {
                index: entry.index,
                name: entry.name,
                damage: entry.damage,
                hits: entry.hits.max(1),
                heal: entry.heal,
                factory: registration.behavior,
                timestop: registration.timestop,
            };

            if chips.insert(entry.index, chip).is_some() {
                return Err(CatalogError::DuplicateIndex(entry.index));
            }
        }

        Ok(Self { chips })
    }

    /// The catalog embedded in the crate.
    pub fn builtin() -> Result<Self, CatalogError> {
        Self::from_json(BUILTIN_CATALOG)
    }

    /// Look up a chip.
    pub fn get(&self, index: u16) -> Option<&Chip> {
        self.chips.get(&index)
    }

    /// Number of chips.
    pub fn len(&self) -> usize {
        self.chips.len()
    }

    /// Whether the catalog is empty.
    pub fn is_empty(&self) -> bool {
        self.chips.is_empty()
    }

    /// All chips in index order.
    pub fn iter(&self) -> impl Iterator<Item = &Chip> {
        self.chips.values()
    }
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::game::behavior::BehaviorKind;

    #[test]
    fn test_builtin_catalog_loads() {
        let catalog = ChipCatalog::builtin().unwrap();
        assert!(!catalog.is_empty());

        let cannon = catalog.get(0).unwrap();
        assert_eq!(cannon.name, "Cannon");
        assert_eq!(cannon.behavior().kind(), BehaviorKind::Cannon);
        assert!(!cannon.opens_timestop());
    }

    #[test]
    fn test_area_grab_opens_timestop() {
        let catalog = ChipCatalog::builtin().unwrap();
        let grab = catalog.iter().find(|c| c.name == "AreaGrab").unwrap();
        assert!(grab.opens_timestop());
        assert!(grab.timestop_behavior().is_some());
        assert_eq!(grab.behavior().kind(), BehaviorKind::AreaGrab);
    }

    #[test]
    fn test_unknown_kind_rejected() {
        let json = r#"{ "chips": [ { "index": 0, "name": "X", "kind": "laser", "damage": 1 } ] }"#;
        assert!(matches!(
            ChipCatalog::from_json(json),
            Err(CatalogError::UnknownKind { index: 0, .. })
        ));
    }

    #[test]
    fn test_duplicate_index_rejected() {
        let json = r#"{ "chips": [
            { "index": 3, "name": "A", "kind": "cannon", "damage": 1 },
            { "index": 3, "name": "B", "kind": "cannon", "damage": 2 }
        ] }"#;
        assert!(matches!(ChipCatalog::from_json(json), Err(CatalogError::DuplicateIndex(3))));
    }

    #[test]
    fn test_malformed_json_rejected() {
        assert!(matches!(ChipCatalog::from_json("{"), Err(CatalogError::Json(_))));
    }
}

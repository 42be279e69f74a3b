//! Block definitions backing palette entries.

use serde::{Deserialize, Serialize};

/// Category tag for a selectable block.
///
/// Used by frontends to group the palette; the converter itself only cares
/// about it for display and summaries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Category {
    /// Air / no block (the transparent entry)
    Air,
    /// Wool blocks
    Wool,
    /// Concrete blocks
    Concrete,
    /// Terracotta blocks
    Terracotta,
    /// Stained glass
    Glass,
    /// Everything else
    #[default]
    Other,
}

impl std::fmt::Display for Category {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Category::Air => write!(f, "air"),
            Category::Wool => write!(f, "wool"),
            Category::Concrete => write!(f, "concrete"),
            Category::Terracotta => write!(f, "terracotta"),
            Category::Glass => write!(f, "glass"),
            Category::Other => write!(f, "other"),
        }
    }
}

/// One placeable block as described by a block-list file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlockDef {
    /// Namespaced block identifier, e.g. `minecraft:white_wool`
    pub id: String,
    /// Human readable display name
    #[serde(default)]
    pub name: String,
    /// Icon image file name, relative to the icon root
    #[serde(default)]
    pub icon: String,
    /// Category tag used for grouping in frontends
    #[serde(default)]
    pub category: Category,
    /// The block burns away when exposed to fire
    #[serde(default)]
    pub burnable: bool,
    /// Endermen can pick the block up
    #[serde(default)]
    pub enderman_pickable: bool,
    /// The block cannot float and needs a support block beneath it
    #[serde(default)]
    pub need_support: bool,
}

impl BlockDef {
    /// Definition of the air block used for transparent pixels.
    pub fn air() -> Self {
        Self {
            id: "minecraft:air".to_string(),
            name: "Air".to_string(),
            icon: String::new(),
            category: Category::Air,
            burnable: false,
            enderman_pickable: false,
            need_support: false,
        }
    }

    /// Default support block placed under unsupported blocks and bridges.
    pub fn glass_support() -> Self {
        Self {
            id: "minecraft:glass".to_string(),
            name: "Glass".to_string(),
            icon: String::new(),
            category: Category::Glass,
            burnable: false,
            enderman_pickable: false,
            need_support: false,
        }
    }
}

//! Palette model: shade tiers, color ids and the block palette itself.
//!
//! A palette is an ordered list of entries, one selectable block per base
//! color. The fixed partition comes from the bundled block list and the
//! RGB color table; the custom partition is user supplied and carries its
//! own colors. Entry 0 is always air and stands for "no block".

use serde::Deserialize;
use std::collections::HashMap;
use std::path::Path;
use thiserror::Error;

use crate::color::{format_hex_rgb, parse_hex_rgb};
use crate::colortable::ColorTable;
use crate::models::block::{BlockDef, Category};

/// Shade tier of a rendered map pixel.
///
/// The in-game renderer multiplies a base color by one of four brightness
/// levels. `Low`/`Normal`/`High` are selected by the height delta to the
/// northern neighbor; `Lowest` only ever appears inside map-data files and
/// cannot be produced by block geometry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[repr(u8)]
pub enum ShadeTier {
    /// Darker shade: the column is lower than its northern neighbor
    Low = 0,
    /// Base shade: same height as the northern neighbor (or no neighbor)
    Normal = 1,
    /// Lighter shade: the column is higher than its northern neighbor
    High = 2,
    /// Map-file-only shade, unreachable through block placement
    Lowest = 3,
}

impl ShadeTier {
    /// Brightness multiplier applied to the base color, out of 255.
    pub fn multiplier(self) -> u32 {
        match self {
            ShadeTier::Low => 180,
            ShadeTier::Normal => 220,
            ShadeTier::High => 255,
            ShadeTier::Lowest => 135,
        }
    }

    /// Height delta to the northern neighbor that renders this tier, or
    /// `None` for the geometrically unreachable tier.
    pub fn delta(self) -> Option<i32> {
        match self {
            ShadeTier::Low => Some(-1),
            ShadeTier::Normal => Some(0),
            ShadeTier::High => Some(1),
            ShadeTier::Lowest => None,
        }
    }

    /// Decode a tier from the low two bits of a color id.
    pub fn from_index(i: u8) -> Self {
        match i & 3 {
            0 => ShadeTier::Low,
            1 => ShadeTier::Normal,
            2 => ShadeTier::High,
            _ => ShadeTier::Lowest,
        }
    }
}

/// Apply a shade tier to a base color (integer floor, like the game).
pub fn shade(base: [u8; 3], tier: ShadeTier) -> [u8; 3] {
    let m = tier.multiplier();
    [
        (base[0] as u32 * m / 255) as u8,
        (base[1] as u32 * m / 255) as u8,
        (base[2] as u32 * m / 255) as u8,
    ]
}

/// A shaded palette color: base color id times four plus the tier index.
///
/// This is the value stored in an [`IndexGrid`](crate::models::grid::IndexGrid)
/// cell and, for bases below 64, the byte written into map-data files.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ColorId(pub u16);

impl ColorId {
    /// The transparent "no block" id.
    pub const AIR: ColorId = ColorId(0);

    /// Compose an id from a base color index and a shade tier.
    pub fn new(base: u16, tier: ShadeTier) -> Self {
        ColorId(base * 4 + tier as u16)
    }

    /// Base color index (the palette entry's color group).
    pub fn base(self) -> u16 {
        self.0 / 4
    }

    /// Shade tier encoded in the low two bits.
    pub fn tier(self) -> ShadeTier {
        ShadeTier::from_index((self.0 & 3) as u8)
    }

    /// Whether this id stands for "no block".
    pub fn is_air(self) -> bool {
        self.base() == 0
    }

    /// Same base color, different tier.
    pub fn with_tier(self, tier: ShadeTier) -> Self {
        ColorId::new(self.base(), tier)
    }
}

/// Where a palette entry came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryOrigin {
    /// Bundled block list, colors defined by the protected color tables
    Fixed,
    /// User supplied block list, color carried inline
    Custom,
}

/// One selectable block with its base map color.
#[derive(Debug, Clone, PartialEq)]
pub struct PaletteEntry {
    /// The block placed for this color
    pub block: BlockDef,
    /// Base color at full brightness (the `High` tier)
    pub rgb: [u8; 3],
    /// Base color index; groups the four shaded rows in the color tables
    pub base: u16,
    /// Disabled entries are invisible to the matcher
    pub enabled: bool,
    /// Fixed or custom partition
    pub origin: EntryOrigin,
}

impl PaletteEntry {
    /// Whether this is the transparent air entry.
    pub fn is_air(&self) -> bool {
        self.base == 0
    }
}

/// Error when loading or editing a palette.
#[derive(Debug, Clone, PartialEq, Error)]
#[non_exhaustive]
pub enum PaletteError {
    /// The block-list file itself is not valid JSON
    #[error("malformed block list: {0}")]
    Syntax(String),
    /// One entry in the block list is malformed
    #[error("invalid block entry {key}: {message}")]
    Parse { key: String, message: String },
    /// A fixed entry references a base color the color table doesn't define
    #[error("block '{block_id}' references base color {base} missing from the color table")]
    UnknownBlock { block_id: String, base: u16 },
    /// Two enabled entries share the same color
    #[error("blocks '{first}' and '{second}' both use color {color}")]
    DuplicateColor { first: String, second: String, color: String },
    /// Nothing is enabled; matching would be undefined
    #[error("no enabled palette entries")]
    NoEnabledEntries,
    /// Entry index out of range
    #[error("no palette entry at index {0}")]
    BadIndex(usize),
}

/// Non-fatal problem discovered while loading a palette.
#[derive(Debug, Clone, PartialEq)]
pub struct PaletteWarning {
    pub message: String,
}

impl PaletteWarning {
    pub fn missing_icon(block_id: &str, icon: &str) -> Self {
        Self { message: format!("block '{}' icon '{}' not found, using fallback", block_id, icon) }
    }
}

/// JSON shape of one fixed block-list entry.
#[derive(Debug, Deserialize)]
struct FixedEntryDef {
    base_color: u16,
    #[serde(default = "default_enabled")]
    enabled: bool,
    #[serde(flatten)]
    block: BlockDef,
}

/// JSON shape of one custom block-list entry (carries its own color).
#[derive(Debug, Deserialize)]
struct CustomEntryDef {
    color: String,
    #[serde(default = "default_enabled")]
    enabled: bool,
    #[serde(flatten)]
    block: BlockDef,
}

fn default_enabled() -> bool {
    true
}

#[derive(Debug, Deserialize)]
struct BlockListFile {
    blocks: Vec<serde_json::Value>,
}

/// The full, ordered block palette.
#[derive(Debug, Clone)]
pub struct Palette {
    entries: Vec<PaletteEntry>,
    support: BlockDef,
    next_base: u16,
}

impl Palette {
    /// Load the fixed palette from a block-list JSON string and the
    /// verified RGB color table.
    ///
    /// Entry 0 (air) is created implicitly. Every listed block must
    /// reference a base color the table defines; enabled entries must have
    /// pairwise distinct colors. Returns the palette together with any
    /// non-fatal warnings.
    pub fn load_fixed(
        json: &str,
        rgb_table: &ColorTable,
    ) -> Result<(Palette, Vec<PaletteWarning>), PaletteError> {
        let file: BlockListFile =
            serde_json::from_str(json).map_err(|e| PaletteError::Syntax(e.to_string()))?;

        let mut palette = Palette {
            entries: vec![PaletteEntry {
                block: BlockDef::air(),
                rgb: [0, 0, 0],
                base: 0,
                enabled: true,
                origin: EntryOrigin::Fixed,
            }],
            support: BlockDef::glass_support(),
            next_base: (rgb_table.len() as u16 / 4).max(1),
        };

        for (i, raw) in file.blocks.iter().enumerate() {
            let def: FixedEntryDef =
                serde_json::from_value(raw.clone()).map_err(|e| PaletteError::Parse {
                    key: entry_key(i, raw),
                    message: e.to_string(),
                })?;

            // The High tier row is the raw base color
            let row = rgb_table
                .row(ColorId::new(def.base_color, ShadeTier::High))
                .ok_or(PaletteError::UnknownBlock {
                    block_id: def.block.id.clone(),
                    base: def.base_color,
                })?;
            let rgb = [row[0].round() as u8, row[1].round() as u8, row[2].round() as u8];

            palette.entries.push(PaletteEntry {
                block: def.block,
                rgb,
                base: def.base_color,
                enabled: def.enabled,
                origin: EntryOrigin::Fixed,
            });
        }

        palette.check_unique_colors()?;
        Ok((palette, Vec::new()))
    }

    /// Merge a custom block list into this palette.
    ///
    /// Custom entries carry their own `#RRGGBB` color and are appended after
    /// the fixed partition with freshly assigned base indices.
    pub fn merge_custom(&mut self, json: &str) -> Result<Vec<PaletteWarning>, PaletteError> {
        let file: BlockListFile =
            serde_json::from_str(json).map_err(|e| PaletteError::Syntax(e.to_string()))?;

        let mut added = Vec::new();
        for (i, raw) in file.blocks.iter().enumerate() {
            let def: CustomEntryDef =
                serde_json::from_value(raw.clone()).map_err(|e| PaletteError::Parse {
                    key: entry_key(i, raw),
                    message: e.to_string(),
                })?;

            let rgb = parse_hex_rgb(&def.color).map_err(|e| PaletteError::Parse {
                key: entry_key(i, raw),
                message: e.to_string(),
            })?;

            added.push(PaletteEntry {
                block: def.block,
                rgb,
                base: 0, // assigned below, after all entries parsed
                enabled: def.enabled,
                origin: EntryOrigin::Custom,
            });
        }

        // Assign bases only once the whole file parsed, so a malformed
        // trailing entry cannot leave a half-merged palette behind.
        let rollback_len = self.entries.len();
        let rollback_base = self.next_base;
        for mut entry in added {
            entry.base = self.next_base;
            self.next_base += 1;
            self.entries.push(entry);
        }

        if let Err(e) = self.check_unique_colors() {
            self.entries.truncate(rollback_len);
            self.next_base = rollback_base;
            return Err(e);
        }
        Ok(Vec::new())
    }

    /// Check icon files against an icon root directory.
    ///
    /// A missing icon is a warning, not an error: the entry stays enabled
    /// and frontends fall back to a flat color swatch.
    pub fn verify_icons(&self, icon_root: &Path) -> Vec<PaletteWarning> {
        let mut warnings = Vec::new();
        for entry in &self.entries {
            if entry.is_air() || entry.block.icon.is_empty() {
                continue;
            }
            if !icon_root.join(&entry.block.icon).is_file() {
                warnings.push(PaletteWarning::missing_icon(&entry.block.id, &entry.block.icon));
            }
        }
        warnings
    }

    /// Enable or disable an entry. Enabling re-checks color uniqueness.
    pub fn set_enabled(&mut self, index: usize, enabled: bool) -> Result<(), PaletteError> {
        if index >= self.entries.len() {
            return Err(PaletteError::BadIndex(index));
        }
        if index == 0 {
            // Air is always available
            return Ok(());
        }
        let before = self.entries[index].enabled;
        self.entries[index].enabled = enabled;
        if enabled && !before {
            if let Err(e) = self.check_unique_colors() {
                self.entries[index].enabled = false;
                return Err(e);
            }
        }
        Ok(())
    }

    /// Disable entries the conversion flags rule out: burnable blocks when
    /// fire protection is on, enderman-pickable blocks when mob protection
    /// is on.
    pub fn apply_protection(&mut self, fire_proof: bool, enderman_proof: bool) {
        for entry in self.entries.iter_mut().skip(1) {
            if fire_proof && entry.block.burnable {
                entry.enabled = false;
            }
            if enderman_proof && entry.block.enderman_pickable {
                entry.enabled = false;
            }
        }
    }

    /// All entries in insertion order (entry 0 is air).
    pub fn entries(&self) -> &[PaletteEntry] {
        &self.entries
    }

    /// Enabled non-air entries in insertion order.
    pub fn enabled_entries(&self) -> impl Iterator<Item = &PaletteEntry> {
        self.entries.iter().filter(|e| e.enabled && !e.is_air())
    }

    /// The block used for bridges and support layers.
    pub fn support_block(&self) -> &BlockDef {
        &self.support
    }

    /// Override the support block.
    pub fn set_support_block(&mut self, block: BlockDef) {
        self.support = block;
    }

    /// Resolve a shaded color id to its palette entry.
    ///
    /// Returns the first enabled entry with the id's base color; ties are
    /// impossible while the uniqueness invariant holds, and disabled
    /// entries are never returned.
    pub fn resolve(&self, id: ColorId) -> Option<&PaletteEntry> {
        if id.is_air() {
            return self.entries.first();
        }
        self.entries.iter().find(|e| e.enabled && e.base == id.base())
    }

    /// Resolve an exact base color to its enabled entry.
    pub fn resolve_color(&self, rgb: [u8; 3]) -> Option<&PaletteEntry> {
        self.entries.iter().find(|e| e.enabled && !e.is_air() && e.rgb == rgb)
    }

    /// The shaded RGB color a given id renders as.
    pub fn shaded_rgb(&self, id: ColorId) -> Option<[u8; 3]> {
        if id.is_air() {
            return None;
        }
        self.entries
            .iter()
            .find(|e| e.base == id.base())
            .map(|e| shade(e.rgb, id.tier()))
    }

    /// Count of distinct enabled base colors (air excluded).
    pub fn distinct_enabled_colors(&self) -> usize {
        let mut seen = std::collections::HashSet::new();
        for e in self.enabled_entries() {
            seen.insert(e.rgb);
        }
        seen.len()
    }

    fn check_unique_colors(&self) -> Result<(), PaletteError> {
        let mut by_color: HashMap<[u8; 3], &str> = HashMap::new();
        for entry in self.enabled_entries() {
            if let Some(first) = by_color.insert(entry.rgb, &entry.block.id) {
                return Err(PaletteError::DuplicateColor {
                    first: first.to_string(),
                    second: entry.block.id.clone(),
                    color: format_hex_rgb(entry.rgb),
                });
            }
        }
        Ok(())
    }
}

/// Best-effort key for error messages: index plus block id when present.
fn entry_key(index: usize, raw: &serde_json::Value) -> String {
    match raw.get("id").and_then(|v| v.as_str()) {
        Some(id) => format!("blocks[{}] ('{}')", index, id),
        None => format!("blocks[{}]", index),
    }
}

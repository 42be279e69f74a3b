//! Native map-data file export.
//!
//! Each map item file covers a fixed 128x128 raster. A larger image spans
//! a contiguous run of file indices starting at a caller-chosen offset,
//! tiles ordered row-major. Every file is an independent gzip NBT
//! compound, loadable on its own.

use std::path::Path;

use fastnbt::{ByteArray, Value};

use crate::export::{compound, write_gzip_nbt, ExportError, ExportSummary};
use crate::models::grid::IndexGrid;
use crate::models::palette::Palette;
use crate::progress::{ProgressSink, Stage};

/// Side length of one map file.
pub const MAP_SIZE: u32 = 128;

/// Largest base color index that still fits the 8-bit map color encoding.
pub const MAX_MAP_BASE: u16 = 63;

/// Map-data export settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MapDataConfig {
    /// Index of the first `map_<n>.dat` file; must be non-negative
    pub first_index: i64,
    /// Minecraft data version stamped into each file
    pub data_version: i32,
    /// Write maps as locked so the game never redraws them
    pub locked: bool,
    pub x_center: i32,
    pub z_center: i32,
}

impl Default for MapDataConfig {
    fn default() -> Self {
        Self { first_index: 0, data_version: 2586, locked: true, x_center: 0, z_center: 0 }
    }
}

/// Serialize a quantized grid into `map_<n>.dat` files under `dir`.
pub fn export_map_data(
    grid: &IndexGrid,
    palette: &Palette,
    dir: &Path,
    cfg: &MapDataConfig,
    progress: &dyn ProgressSink,
) -> Result<ExportSummary, ExportError> {
    if cfg.first_index < 0 {
        return Err(ExportError::NegativeMapOffset(cfg.first_index));
    }
    for &id in grid.ids() {
        if id.base() > MAX_MAP_BASE {
            return Err(ExportError::MapBaseOutOfRange(id.base()));
        }
    }

    let tiles_x = grid.width().div_ceil(MAP_SIZE);
    let tiles_z = grid.height().div_ceil(MAP_SIZE);
    let total_tiles = tiles_x * tiles_z;

    let mut summary = ExportSummary {
        size: (grid.width(), 1, grid.height()),
        ..Default::default()
    };

    for tile in 0..total_tiles {
        let tx = tile % tiles_x;
        let tz = tile / tiles_x;
        let mut colors = vec![0i8; (MAP_SIZE * MAP_SIZE) as usize];

        for py in 0..MAP_SIZE {
            for px in 0..MAP_SIZE {
                let x = tx * MAP_SIZE + px;
                let z = tz * MAP_SIZE + py;
                if x >= grid.width() || z >= grid.height() {
                    continue;
                }
                let id = grid.get(x, z);
                colors[(py * MAP_SIZE + px) as usize] = id.0 as u8 as i8;
            }
        }

        let data = compound([
            ("scale", Value::Byte(0)),
            ("dimension", Value::String("minecraft:overworld".to_string())),
            ("trackingPosition", Value::Byte(0)),
            ("unlimitedTracking", Value::Byte(0)),
            ("locked", Value::Byte(cfg.locked as i8)),
            ("xCenter", Value::Int(cfg.x_center)),
            ("zCenter", Value::Int(cfg.z_center)),
            ("banners", Value::List(Vec::new())),
            ("frames", Value::List(Vec::new())),
            ("colors", Value::ByteArray(ByteArray::new(colors))),
        ]);
        let root = compound([
            ("DataVersion", Value::Int(cfg.data_version)),
            ("data", data),
        ]);

        let path = dir.join(format!("map_{}.dat", cfg.first_index + tile as i64));
        write_gzip_nbt(&path, &root)?;
        summary.files.push(path);
        progress.report(Stage::Export, (tile + 1) as f32 / total_tiles as f32);
    }

    // Material summary: one block per colored pixel
    for &id in grid.ids() {
        if id.is_air() {
            continue;
        }
        summary.total_blocks += 1;
        if let Some(entry) = palette.resolve(id) {
            *summary.block_counts.entry(entry.block.id.clone()).or_insert(0) += 1;
        }
    }

    Ok(summary)
}

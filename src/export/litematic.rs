//! Litematic container export.
//!
//! A litematic is a gzip-compressed NBT compound: metadata strings, an
//! enclosing bounding box, and one region whose block states are packed
//! into a bit array indexed by a block-state palette. Index 0 of the
//! palette is air, which is also the implicit value of every unset entry.

use std::path::Path;

use fastnbt::{LongArray, Value};

use crate::export::{compound, write_gzip_nbt, ExportError, ExportMeta, ExportSummary};
use crate::models::volume::VoxelVolume;
use crate::progress::{ProgressSink, Stage};

/// Litematic-specific settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LitematicInfo {
    pub meta: ExportMeta,
    /// Minecraft data version stamped into the container
    pub data_version: i32,
}

impl Default for LitematicInfo {
    fn default() -> Self {
        Self { meta: ExportMeta::default(), data_version: 2586 }
    }
}

/// Container format version written into the `Version` tag.
const LITEMATIC_VERSION: i32 = 5;

/// Serialize a volume into a `.litematic` file.
pub fn export_litematic(
    volume: &VoxelVolume,
    path: &Path,
    info: &LitematicInfo,
    progress: &dyn ProgressSink,
) -> Result<ExportSummary, ExportError> {
    if volume.is_empty() {
        return Err(ExportError::EmptyVolume);
    }

    let (sx, sy, sz) = volume.size();
    let palette = volume.block_ids();
    let states = pack_block_states(volume);
    progress.report(Stage::Export, 0.5);

    let palette_list: Vec<Value> = palette
        .iter()
        .map(|id| compound([("Name", Value::String(id.clone()))]))
        .collect();

    let size_tag = || {
        compound([
            ("x", Value::Int(sx as i32)),
            ("y", Value::Int(sy as i32)),
            ("z", Value::Int(sz as i32)),
        ])
    };

    let region = compound([
        (
            "Position",
            compound([("x", Value::Int(0)), ("y", Value::Int(0)), ("z", Value::Int(0))]),
        ),
        ("Size", size_tag()),
        ("BlockStatePalette", Value::List(palette_list)),
        ("BlockStates", Value::LongArray(LongArray::new(states))),
        ("Entities", Value::List(Vec::new())),
        ("TileEntities", Value::List(Vec::new())),
        ("PendingBlockTicks", Value::List(Vec::new())),
        ("PendingFluidTicks", Value::List(Vec::new())),
    ]);

    let metadata = compound([
        ("Name", Value::String(info.meta.name.clone())),
        ("Author", Value::String(info.meta.author.clone())),
        ("Description", Value::String(info.meta.description.clone())),
        ("RegionCount", Value::Int(1)),
        ("TimeCreated", Value::Long(info.meta.timestamp_ms as i64)),
        ("TimeModified", Value::Long(info.meta.timestamp_ms as i64)),
        ("EnclosingSize", size_tag()),
        ("TotalBlocks", Value::Long(volume.len() as i64)),
        ("TotalVolume", Value::Long(sx as i64 * sy as i64 * sz as i64)),
    ]);

    let root = compound([
        ("MinecraftDataVersion", Value::Int(info.data_version)),
        ("Version", Value::Int(LITEMATIC_VERSION)),
        ("Metadata", metadata),
        (
            "Regions",
            compound([(info.meta.region_name.as_str(), region)]),
        ),
    ]);

    write_gzip_nbt(path, &root)?;
    progress.report(Stage::Export, 1.0);

    let mut summary = ExportSummary::from_volume(volume);
    summary.files.push(path.to_path_buf());
    Ok(summary)
}

/// Bits per entry: enough for the palette, never fewer than two.
fn bits_for(palette_len: usize) -> u32 {
    if palette_len <= 1 {
        return 2;
    }
    (usize::BITS - (palette_len - 1).leading_zeros()).max(2)
}

/// Pack block states into the litematic bit stream.
///
/// Entry `i` occupies bits `[i * bits, (i + 1) * bits)` of the little-endian
/// long array and may span a long boundary. Index order is x fastest, then
/// z, then y.
fn pack_block_states(volume: &VoxelVolume) -> Vec<i64> {
    let (sx, sy, sz) = volume.size();
    let bits = bits_for(volume.block_ids().len()) as u64;
    let entry_count = sx as u64 * sy as u64 * sz as u64;
    let mut longs = vec![0u64; ((entry_count * bits + 63) / 64) as usize];

    for ((x, y, z), state) in volume.iter() {
        let index = (y as u64 * sz as u64 + z as u64) * sx as u64 + x as u64;
        let bit = index * bits;
        let slot = (bit / 64) as usize;
        let offset = bit % 64;
        let value = state as u64;

        longs[slot] |= value << offset;
        if offset + bits > 64 {
            longs[slot + 1] |= value >> (64 - offset);
        }
    }

    longs.into_iter().map(|l| l as i64).collect()
}

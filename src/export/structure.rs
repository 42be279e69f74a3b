//! Vanilla structure export.
//!
//! The structure format stores a palette of block states and a sparse
//! block list with explicit positions, gzip-compressed. Air positions are
//! simply absent, so structure blocks load as void and don't overwrite
//! terrain.

use std::path::Path;

use fastnbt::Value;

use crate::export::{compound, write_gzip_nbt, ExportError, ExportSummary};
use crate::models::volume::VoxelVolume;
use crate::progress::{ProgressSink, Stage};

/// Structure-specific settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StructureInfo {
    /// Minecraft data version stamped into the file
    pub data_version: i32,
}

impl Default for StructureInfo {
    fn default() -> Self {
        Self { data_version: 2586 }
    }
}

/// Serialize a volume into a vanilla `.nbt` structure file.
pub fn export_structure(
    volume: &VoxelVolume,
    path: &Path,
    info: &StructureInfo,
    progress: &dyn ProgressSink,
) -> Result<ExportSummary, ExportError> {
    if volume.is_empty() {
        return Err(ExportError::EmptyVolume);
    }

    let (sx, sy, sz) = volume.size();

    // Only palette entries that are actually placed get exported
    let mut remap = vec![None::<i32>; volume.block_ids().len()];
    let mut palette_list = Vec::new();
    let mut blocks = Vec::new();

    for ((x, y, z), idx) in volume.iter() {
        let state = match remap[idx as usize] {
            Some(state) => state,
            None => {
                let state = palette_list.len() as i32;
                palette_list.push(compound([(
                    "Name",
                    Value::String(volume.block_ids()[idx as usize].clone()),
                )]));
                remap[idx as usize] = Some(state);
                state
            }
        };
        blocks.push(compound([
            (
                "pos",
                Value::List(vec![
                    Value::Int(x as i32),
                    Value::Int(y as i32),
                    Value::Int(z as i32),
                ]),
            ),
            ("state", Value::Int(state)),
        ]));
    }
    progress.report(Stage::Export, 0.5);

    let root = compound([
        ("DataVersion", Value::Int(info.data_version)),
        (
            "size",
            Value::List(vec![
                Value::Int(sx as i32),
                Value::Int(sy as i32),
                Value::Int(sz as i32),
            ]),
        ),
        ("palette", Value::List(palette_list)),
        ("blocks", Value::List(blocks)),
        ("entities", Value::List(Vec::new())),
    ]);

    write_gzip_nbt(path, &root)?;
    progress.report(Stage::Export, 1.0);

    let mut summary = ExportSummary::from_volume(volume);
    summary.files.push(path.to_path_buf());
    Ok(summary)
}

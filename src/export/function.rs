//! Block-placement script export.
//!
//! Writes one `setblock` command per voxel, with coordinates relative to
//! the execution position. Emission order is bottom-to-top, then north to
//! south, then west to east, so support blocks are always placed before
//! anything that rests on them.

use std::io::Write;
use std::path::Path;

use crate::export::{write_atomic, ExportError, ExportMeta, ExportSummary};
use crate::models::volume::VoxelVolume;
use crate::progress::{ProgressSink, Stage};

/// Serialize a volume into an `.mcfunction` placement script.
pub fn export_function(
    volume: &VoxelVolume,
    path: &Path,
    meta: &ExportMeta,
    progress: &dyn ProgressSink,
) -> Result<ExportSummary, ExportError> {
    if volume.is_empty() {
        return Err(ExportError::EmptyVolume);
    }

    // Volume iteration is x-major; placement must be y-major
    let mut voxels: Vec<((u32, u32, u32), u16)> = volume.iter().collect();
    voxels.sort_by_key(|&((x, y, z), _)| (y, z, x));

    write_atomic(path, |w| {
        writeln!(w, "# {}", meta.name)?;
        writeln!(w, "# author: {}", meta.author)?;
        writeln!(w, "# blocks: {}", voxels.len())?;
        for ((x, y, z), idx) in &voxels {
            let id = &volume.block_ids()[*idx as usize];
            writeln!(w, "setblock ~{} ~{} ~{} {}", x, y, z, id)?;
        }
        Ok(())
    })?;
    progress.report(Stage::Export, 1.0);

    let mut summary = ExportSummary::from_volume(volume);
    summary.files.push(path.to_path_buf());
    Ok(summary)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::colortable::{ColorSpace, ColorTable};
    use crate::models::palette::Palette;
    use crate::models::volume::{ColumnMap, VoxelVolume};
    use crate::progress::NullProgress;

    fn test_volume() -> VoxelVolume {
        let table = ColorTable::generate(ColorSpace::Rgb, &[[0, 0, 0], [200, 30, 30]]);
        let json = r#"{"blocks": [{"id": "minecraft:red_concrete", "base_color": 1}]}"#;
        let (palette, _) = Palette::load_fixed(json, &table).unwrap();
        let mut volume = VoxelVolume::from_columns(&ColumnMap::new(2, 1), &palette).unwrap();
        let red = volume.intern("minecraft:red_concrete");
        let glass = volume.support_index();
        // Support under a floating block, plus one ground block
        volume.set(1, 0, 0, glass);
        volume.set(1, 1, 0, red);
        volume.set(0, 0, 0, red);
        volume
    }

    #[test]
    fn test_supports_are_placed_before_what_they_hold() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("art.mcfunction");
        export_function(&test_volume(), &path, &ExportMeta::default(), &NullProgress::new())
            .unwrap();

        let script = std::fs::read_to_string(&path).unwrap();
        let lines: Vec<&str> =
            script.lines().filter(|l| l.starts_with("setblock")).collect();
        assert_eq!(lines.len(), 3);
        // y=0 rows first, the supported block last
        assert_eq!(lines[0], "setblock ~0 ~0 ~0 minecraft:red_concrete");
        assert_eq!(lines[1], "setblock ~1 ~0 ~0 minecraft:glass");
        assert_eq!(lines[2], "setblock ~1 ~1 ~0 minecraft:red_concrete");
    }

    #[test]
    fn test_header_carries_metadata() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("art.mcfunction");
        let meta = ExportMeta { name: "castle".to_string(), ..Default::default() };
        let summary =
            export_function(&test_volume(), &path, &meta, &NullProgress::new()).unwrap();

        let script = std::fs::read_to_string(&path).unwrap();
        assert!(script.starts_with("# castle\n"));
        assert_eq!(summary.total_blocks, 3);
        assert_eq!(summary.block_counts["minecraft:glass"], 1);
    }
}

//! Serializers for the supported exchange formats.
//!
//! Every writer consumes a finished volume or index grid, never mutates
//! it, and produces a summary next to the bytes. Output is written to a
//! sibling temporary file and renamed into place on success, so a failed
//! or interrupted export never leaves a corrupt file at the target path.

pub mod function;
pub mod litematic;
pub mod mapdat;
pub mod structure;

pub use function::export_function;
pub use litematic::{export_litematic, LitematicInfo};
pub use mapdat::{export_map_data, MapDataConfig};
pub use structure::{export_structure, StructureInfo};

use std::collections::BTreeMap;
use std::collections::HashMap;
use std::fs::{self, File};
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};
use thiserror::Error;

use fastnbt::Value;

use crate::models::volume::VoxelVolume;

/// Error during serialization.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum ExportError {
    /// Filesystem failure, with the target path for context
    #[error("cannot write {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    /// NBT encoding failure
    #[error("NBT encoding failed: {0}")]
    Nbt(String),
    /// Map-data files index from a non-negative offset
    #[error("map file offset must be non-negative, got {0}")]
    NegativeMapOffset(i64),
    /// Map-data colors are bytes; base colors must stay below 64
    #[error("base color {0} does not fit the 8-bit map color space")]
    MapBaseOutOfRange(u16),
    /// Nothing to write
    #[error("volume is empty, nothing to export")]
    EmptyVolume,
}

/// Shared export metadata strings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExportMeta {
    pub name: String,
    pub author: String,
    pub description: String,
    pub region_name: String,
    /// Milliseconds since the epoch; the caller owns the clock
    pub timestamp_ms: u64,
}

impl Default for ExportMeta {
    fn default() -> Self {
        Self {
            name: "Map art generated by mapart".to_string(),
            author: "mapart".to_string(),
            description: "Converted image".to_string(),
            region_name: "map art".to_string(),
            timestamp_ms: 0,
        }
    }
}

/// What an export produced: dimensions, totals and the written files.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ExportSummary {
    /// Bounding size (x, y, z); (width, 1, height) for map-data files
    pub size: (u32, u32, u32),
    /// Total placed blocks (or colored pixels for map-data files)
    pub total_blocks: u64,
    /// Count per block identifier
    pub block_counts: BTreeMap<String, u64>,
    /// Files written, in creation order
    pub files: Vec<PathBuf>,
}

impl ExportSummary {
    /// Tally a finished volume.
    pub fn from_volume(volume: &VoxelVolume) -> Self {
        let mut block_counts: BTreeMap<String, u64> = BTreeMap::new();
        for (_, idx) in volume.iter() {
            let id = &volume.block_ids()[idx as usize];
            *block_counts.entry(id.clone()).or_insert(0) += 1;
        }
        Self {
            size: volume.size(),
            total_blocks: volume.len() as u64,
            block_counts,
            files: Vec::new(),
        }
    }
}

/// Write a file atomically: everything goes to `<path>.tmp` first and the
/// temporary is renamed over the target only after a successful flush.
pub(crate) fn write_atomic<F>(path: &Path, write: F) -> Result<(), ExportError>
where
    F: FnOnce(&mut dyn Write) -> io::Result<()>,
{
    let tmp = tmp_path(path);
    let io_err = |source: io::Error| ExportError::Io { path: path.to_path_buf(), source };

    let result = (|| {
        let file = File::create(&tmp)?;
        let mut writer = BufWriter::new(file);
        write(&mut writer)?;
        writer.flush()?;
        // BufWriter drops here, closing the handle before the rename
        drop(writer);
        fs::rename(&tmp, path)
    })();

    if let Err(source) = result {
        let _ = fs::remove_file(&tmp);
        return Err(io_err(source));
    }
    Ok(())
}

fn tmp_path(path: &Path) -> PathBuf {
    let mut name = path.file_name().unwrap_or_default().to_os_string();
    name.push(".tmp");
    path.with_file_name(name)
}

/// Serialize an NBT value and gzip it into an atomic file write.
pub(crate) fn write_gzip_nbt(path: &Path, root: &Value) -> Result<(), ExportError> {
    let bytes = fastnbt::to_bytes(root).map_err(|e| ExportError::Nbt(e.to_string()))?;
    write_atomic(path, |w| {
        let mut encoder = flate2::write::GzEncoder::new(w, flate2::Compression::default());
        encoder.write_all(&bytes)?;
        encoder.finish()?;
        Ok(())
    })
}

/// Shorthand for an NBT compound from (key, value) pairs.
pub(crate) fn compound<const N: usize>(entries: [(&str, Value); N]) -> Value {
    let mut map = HashMap::with_capacity(N);
    for (k, v) in entries {
        map.insert(k.to_string(), v);
    }
    Value::Compound(map)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_write_atomic_leaves_no_tmp_on_success() {
        let dir = tempfile::tempdir().unwrap();
        let target = dir.path().join("out.bin");
        write_atomic(&target, |w| w.write_all(b"payload")).unwrap();
        assert_eq!(fs::read(&target).unwrap(), b"payload");
        assert!(!tmp_path(&target).exists());
    }

    #[test]
    fn test_write_atomic_failure_leaves_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let target = dir.path().join("out.bin");
        let err = write_atomic(&target, |_| {
            Err(io::Error::new(io::ErrorKind::Other, "writer exploded"))
        })
        .unwrap_err();
        assert!(matches!(err, ExportError::Io { .. }));
        assert!(!target.exists());
        assert!(!tmp_path(&target).exists());
    }

    #[test]
    fn test_gzip_nbt_round_trips() {
        let dir = tempfile::tempdir().unwrap();
        let target = dir.path().join("data.nbt");
        let root = compound([("hello", Value::String("world".to_string()))]);
        write_gzip_nbt(&target, &root).unwrap();

        let raw = fs::read(&target).unwrap();
        let mut decoder = flate2::read::GzDecoder::new(&raw[..]);
        let mut bytes = Vec::new();
        io::Read::read_to_end(&mut decoder, &mut bytes).unwrap();
        let back: Value = fastnbt::from_bytes(&bytes).unwrap();
        assert_eq!(back, root);
    }
}

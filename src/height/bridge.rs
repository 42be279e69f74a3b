//! Support bridging between adjacent columns.
//!
//! Map art is walked along its columns, so a tall step between two
//! neighboring columns can make the build unclimbable. Bridging inserts
//! support blocks into the lower column, spaced a fixed interval apart, so
//! every step on the way up stays within the traversal limit.

use thiserror::Error;

use crate::models::volume::VoxelVolume;
use crate::progress::{CancelToken, ProgressSink, Stage};

/// Bridging parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BridgeConfig {
    /// Largest height difference that needs no bridge
    pub max_step: i32,
    /// Vertical spacing between inserted support blocks
    pub interval: i32,
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self { max_step: 1, interval: 3 }
    }
}

/// Invalid bridging parameters.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[non_exhaustive]
pub enum BridgeError {
    #[error("max step must be positive, got {0}")]
    NonPositiveMaxStep(i32),
    #[error("bridge interval must be positive, got {0}")]
    NonPositiveInterval(i32),
    /// The cancellation token was raised
    #[error("bridging cancelled")]
    Cancelled,
}

/// Insert support bridges wherever adjacent columns step too far.
///
/// Support positions are derived from the surface blocks alone, never from
/// previously inserted supports, so running this twice with the same
/// parameters yields the same volume.
pub fn build_bridges(
    volume: &VoxelVolume,
    cfg: &BridgeConfig,
    progress: &dyn ProgressSink,
    cancel: &CancelToken,
) -> Result<VoxelVolume, BridgeError> {
    if cfg.max_step <= 0 {
        return Err(BridgeError::NonPositiveMaxStep(cfg.max_step));
    }
    if cfg.interval <= 0 {
        return Err(BridgeError::NonPositiveInterval(cfg.interval));
    }

    let (width, _, depth) = volume.size();
    let mut out = volume.clone();
    let support = out.support_index();
    let interval = cfg.interval as u32;

    for x in 0..width {
        if cancel.is_cancelled() {
            return Err(BridgeError::Cancelled);
        }
        for z in 0..depth.saturating_sub(1) {
            let (Some(a), Some(b)) = (volume.surface_top(x, z), volume.surface_top(x, z + 1))
            else {
                continue;
            };
            if (a as i64 - b as i64).unsigned_abs() <= cfg.max_step as u64 {
                continue;
            }

            // Fill the lower column upward toward the higher surface
            let (low, high, low_z) = if a < b { (a, b, z) } else { (b, a, z + 1) };
            let mut y = low + interval;
            while y < high {
                out.set(x, y, low_z, support);
                y += interval;
            }
        }
        progress.report(Stage::Bridge, (x + 1) as f32 / width as f32);
    }

    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::volume::VoxelVolume;
    use crate::progress::NullProgress;

    /// Two columns along z: surfaces at y=0 and y=9.
    fn cliff_volume() -> VoxelVolume {
        let mut volume = VoxelVolume::from_columns(
            &crate::models::volume::ColumnMap::new(1, 2),
            &test_palette(),
        )
        .unwrap();
        let stone = volume.intern("minecraft:stone");
        volume.set(0, 0, 0, stone);
        volume.set(0, 9, 1, stone);
        volume
    }

    fn test_palette() -> crate::models::palette::Palette {
        let table = crate::colortable::ColorTable::generate(
            crate::colortable::ColorSpace::Rgb,
            &[[0, 0, 0], [200, 30, 30]],
        );
        let json = r#"{"blocks": [{"id": "minecraft:red_concrete", "base_color": 1}]}"#;
        crate::models::palette::Palette::load_fixed(json, &table).unwrap().0
    }

    fn run(volume: &VoxelVolume, cfg: &BridgeConfig) -> Result<VoxelVolume, BridgeError> {
        build_bridges(volume, cfg, &NullProgress::new(), &CancelToken::new())
    }

    #[test]
    fn test_bridges_inserted_at_interval() {
        let volume = cliff_volume();
        let cfg = BridgeConfig { max_step: 1, interval: 3 };
        let bridged = run(&volume, &cfg).unwrap();

        let support = bridged.support_index();
        // Lower column (z=0): supports at 3 and 6, not at 9
        assert_eq!(bridged.get(0, 3, 0), Some(support));
        assert_eq!(bridged.get(0, 6, 0), Some(support));
        assert_eq!(bridged.get(0, 9, 0), None);
        assert_eq!(bridged.len(), volume.len() + 2);
    }

    #[test]
    fn test_bridging_is_idempotent() {
        let volume = cliff_volume();
        let cfg = BridgeConfig { max_step: 1, interval: 3 };
        let once = run(&volume, &cfg).unwrap();
        let twice = run(&once, &cfg).unwrap();
        assert_eq!(once, twice);
    }

    #[test]
    fn test_small_steps_need_no_bridge() {
        let volume = cliff_volume();
        let cfg = BridgeConfig { max_step: 10, interval: 3 };
        let bridged = run(&volume, &cfg).unwrap();
        assert_eq!(bridged.len(), volume.len());
    }

    #[test]
    fn test_bad_config_is_rejected() {
        let volume = cliff_volume();
        assert_eq!(
            run(&volume, &BridgeConfig { max_step: 0, interval: 3 }).unwrap_err(),
            BridgeError::NonPositiveMaxStep(0)
        );
        assert_eq!(
            run(&volume, &BridgeConfig { max_step: 1, interval: -2 }).unwrap_err(),
            BridgeError::NonPositiveInterval(-2)
        );
    }

    #[test]
    fn test_empty_columns_are_skipped() {
        let volume = VoxelVolume::from_columns(
            &crate::models::volume::ColumnMap::new(3, 3),
            &test_palette(),
        )
        .unwrap();
        let bridged = run(&volume, &BridgeConfig::default()).unwrap();
        assert!(bridged.is_empty());
    }
}

//! Height column synthesis for sloped map art.
//!
//! Every quantized pixel becomes one block whose height, relative to the
//! block north of it, renders the pixel's shade tier. The output must be
//! exact: the game reconstructs color purely from height deltas, so a
//! wrong delta silently recolors a pixel. An extra anchor row north of the
//! image absorbs the first row's deltas.

use thiserror::Error;

use crate::height::{extract_chains_from_grid, naive_heights, place_chain, support_shift};
use crate::models::grid::IndexGrid;
use crate::models::palette::{Palette, ShadeTier};
use crate::models::volume::ColumnMap;

/// Error during height synthesis.
#[derive(Debug, Clone, PartialEq, Error)]
#[non_exhaustive]
pub enum SynthesizeError {
    /// A stored id cannot be produced by any block arrangement: either it
    /// carries the map-file-only shade, or a chain start demands a delta
    /// with no northern block to be relative to. Flat/file-only grids
    /// routed through the 3D synthesizer trip this.
    #[error("color id {id} at ({x}, {z}) has no achievable shading geometry")]
    InvalidColorGeometry { x: u32, z: u32, id: u16 },
}

/// Synthesize height columns from a quantized grid.
///
/// The returned map is one row deeper than the grid: row 0 holds the
/// anchor blocks. Heights use the conservative anchored walk; running the
/// compressor afterwards (even lossless) usually lowers them.
pub fn synthesize(grid: &IndexGrid, palette: &Palette) -> Result<ColumnMap, SynthesizeError> {
    let mut map = ColumnMap::new(grid.width(), grid.height() + 1);

    for chain in extract_chains_from_grid(grid) {
        // Validate before computing anything: every tier must be
        // geometrically reachable from its predecessor.
        for (i, id) in chain.ids.iter().enumerate() {
            let z = chain.start_z + i as u32;
            let reachable = match id.tier() {
                ShadeTier::Lowest => false,
                // The first block after an air gap has no northern block,
                // so only the base shade renders there.
                tier => chain.anchored || i > 0 || tier == ShadeTier::Normal,
            };
            if !reachable {
                return Err(SynthesizeError::InvalidColorGeometry { x: chain.x, z, id: id.0 });
            }
        }

        let (anchor_y, heights) = naive_heights(&chain.deltas());
        let shift = support_shift(&chain, anchor_y, &heights, palette);
        let heights: Vec<u32> = heights.iter().map(|h| h + shift).collect();
        place_chain(&mut map, palette, &chain, anchor_y + shift, &heights);
    }

    Ok(map)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::colortable::{ColorSpace, ColorTable};
    use crate::height::render_from_heights;
    use crate::models::grid::IndexGrid;
    use crate::models::palette::{ColorId, Palette};

    const BASES: [[u8; 3]; 3] = [[0, 0, 0], [200, 30, 30], [30, 30, 200]];

    fn palette() -> Palette {
        let table = ColorTable::generate(ColorSpace::Rgb, &BASES);
        let json = r#"{"blocks": [
            {"id": "minecraft:red_concrete", "base_color": 1},
            {"id": "minecraft:blue_concrete", "base_color": 2}
        ]}"#;
        Palette::load_fixed(json, &table).unwrap().0
    }

    fn palette_with_glowstone() -> Palette {
        let table = ColorTable::generate(ColorSpace::Rgb, &BASES);
        let json = r#"{"blocks": [
            {"id": "minecraft:glowstone", "base_color": 1, "need_support": true},
            {"id": "minecraft:blue_concrete", "base_color": 2}
        ]}"#;
        Palette::load_fixed(json, &table).unwrap().0
    }

    fn grid_from_tiers(tiers: &[ShadeTier]) -> IndexGrid {
        let mut grid = IndexGrid::filled_air(1, tiers.len() as u32);
        for (z, &tier) in tiers.iter().enumerate() {
            grid.set(0, z as u32, ColorId::new(1, tier));
        }
        grid
    }

    #[test]
    fn test_shading_rule_round_trips() {
        let palette = palette();
        let grid = grid_from_tiers(&[
            ShadeTier::High,
            ShadeTier::Normal,
            ShadeTier::Low,
            ShadeTier::Low,
            ShadeTier::High,
        ]);
        let columns = synthesize(&grid, &palette).unwrap();
        assert_eq!(render_from_heights(&columns), grid);
    }

    #[test]
    fn test_anchor_row_is_present() {
        let palette = palette();
        let grid = grid_from_tiers(&[ShadeTier::High]);
        let columns = synthesize(&grid, &palette).unwrap();
        assert_eq!(columns.depth(), 2);
        // Anchor below, block one above it
        let anchor = columns.column(0, 0).surface().unwrap();
        let block = columns.column(0, 1).surface().unwrap();
        assert_eq!(block.0, anchor.0 + 1);
    }

    #[test]
    fn test_air_column_stays_empty() {
        let palette = palette();
        let grid = IndexGrid::filled_air(1, 1);
        let columns = synthesize(&grid, &palette).unwrap();
        assert!(columns.column(0, 0).is_empty());
        assert!(columns.column(0, 1).is_empty());
    }

    #[test]
    fn test_lowest_tier_is_rejected() {
        let palette = palette();
        let mut grid = IndexGrid::filled_air(1, 1);
        grid.set(0, 0, ColorId::new(1, ShadeTier::Lowest));
        let err = synthesize(&grid, &palette).unwrap_err();
        assert!(matches!(err, SynthesizeError::InvalidColorGeometry { x: 0, z: 0, .. }));
    }

    #[test]
    fn test_non_normal_chain_start_after_air_is_rejected() {
        let palette = palette();
        let mut grid = IndexGrid::filled_air(1, 3);
        grid.set(0, 0, ColorId::new(1, ShadeTier::Normal));
        // air at z = 1, then a High-tier block with nothing north of it
        grid.set(0, 2, ColorId::new(1, ShadeTier::High));
        let err = synthesize(&grid, &palette).unwrap_err();
        assert!(matches!(err, SynthesizeError::InvalidColorGeometry { x: 0, z: 2, .. }));
    }

    #[test]
    fn test_unsupported_block_gets_support_layer() {
        let palette = palette_with_glowstone();
        // A Low tier forces the glowstone below the anchor; the shift and
        // the support layer keep it off the floor
        let grid = grid_from_tiers(&[ShadeTier::Low]);
        let columns = synthesize(&grid, &palette).unwrap();
        let column = columns.column(0, 1);
        assert_eq!(column.layers().len(), 2);
        let (surface_y, _) = column.surface().unwrap();
        assert!(surface_y >= 1);
        assert_eq!(column.layers()[0].y, surface_y - 1);
    }

    #[test]
    fn test_adjacent_column_pairs_keep_rule_for_wide_grids() {
        let palette = palette();
        let mut grid = IndexGrid::filled_air(3, 4);
        let tiers =
            [ShadeTier::Normal, ShadeTier::High, ShadeTier::Low, ShadeTier::Normal];
        for x in 0..3 {
            for (z, &tier) in tiers.iter().enumerate() {
                let base = 1 + ((x + z as u32) % 2) as u16;
                grid.set(x, z as u32, ColorId::new(base, tier));
            }
        }
        let columns = synthesize(&grid, &palette).unwrap();
        assert_eq!(render_from_heights(&columns), grid);
    }
}

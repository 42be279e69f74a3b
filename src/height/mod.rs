//! The 3D pipeline: height synthesis, compression and bridging.
//!
//! A map column renders its shade from the height delta to the column one
//! step north, so a quantized image row becomes a chain of relative height
//! constraints: `High` means strictly above the northern neighbor, `Low`
//! strictly below, `Normal` level with it. The helpers here turn chains of
//! constraints into concrete heights; the submodules build columns out of
//! them, shrink them under a budget and keep the result climbable.

pub mod bridge;
pub mod compress;
pub mod synthesize;

pub use bridge::{build_bridges, BridgeConfig, BridgeError};
pub use compress::{compress, CompressConfig, CompressError, CompressionMode, MIN_VIABLE_HEIGHT};
pub use synthesize::{synthesize, SynthesizeError};

use crate::models::grid::IndexGrid;
use crate::models::palette::{ColorId, Palette, ShadeTier};
use crate::models::volume::{ColumnMap, Layer, LayerKind};

/// A maximal run of non-air blocks along one image column.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct Chain {
    pub x: u32,
    /// Image row of the first block (column-map z is this plus one)
    pub start_z: u32,
    /// Shaded ids, one per block, in north-to-south order
    pub ids: Vec<ColorId>,
    /// Chains starting at image row 0 get an anchor block north of the map
    pub anchored: bool,
}

impl Chain {
    /// Height deltas, one per block, relative to the previous block (or
    /// the anchor for the first block of an anchored chain).
    pub fn deltas(&self) -> Vec<i32> {
        self.ids.iter().map(|id| id.tier().delta().unwrap_or(0)).collect()
    }
}

/// Split an index grid into per-column chains.
pub(crate) fn extract_chains_from_grid(grid: &IndexGrid) -> Vec<Chain> {
    let mut chains = Vec::new();
    for x in 0..grid.width() {
        let mut current: Option<Chain> = None;
        for z in 0..grid.height() {
            let id = grid.get(x, z);
            if id.is_air() {
                if let Some(chain) = current.take() {
                    chains.push(chain);
                }
                continue;
            }
            match current.as_mut() {
                Some(chain) => chain.ids.push(id),
                None => {
                    current = Some(Chain { x, start_z: z, ids: vec![id], anchored: z == 0 });
                }
            }
        }
        if let Some(chain) = current.take() {
            chains.push(chain);
        }
    }
    chains
}

/// Recover chains from synthesized columns (anchor row excluded).
pub(crate) fn extract_chains_from_columns(columns: &ColumnMap) -> Vec<Chain> {
    let mut chains = Vec::new();
    for x in 0..columns.width() {
        let mut current: Option<Chain> = None;
        for z in 1..columns.depth() {
            let surface = columns.column(x, z).surface();
            match surface {
                None => {
                    if let Some(chain) = current.take() {
                        chains.push(chain);
                    }
                }
                Some((_, id)) => match current.as_mut() {
                    Some(chain) => chain.ids.push(id),
                    None => {
                        current =
                            Some(Chain { x, start_z: z - 1, ids: vec![id], anchored: z == 1 });
                    }
                },
            }
        }
        if let Some(chain) = current.take() {
            chains.push(chain);
        }
    }
    chains
}

/// Conservative height assignment: walk the deltas from an anchor placed
/// high enough that no descent can drop below zero.
///
/// Returns the anchor height and one height per block.
pub(crate) fn naive_heights(deltas: &[i32]) -> (u32, Vec<u32>) {
    let anchor = deltas.iter().filter(|&&d| d < 0).count() as i64;
    let mut heights = Vec::with_capacity(deltas.len());
    let mut y = anchor;
    for &d in deltas {
        y += d as i64;
        debug_assert!(y >= 0);
        heights.push(y as u32);
    }
    (anchor as u32, heights)
}

/// Minimal feasible height assignment for a chain of delta constraints.
///
/// Only the sign of each delta is fixed by the shading rule; the magnitude
/// is free. A backward pass computes how much descent room each position
/// still needs, then a forward pass keeps every block as low as that room
/// allows. The result preserves every delta sign, so rendering is
/// unchanged, and no valid assignment has a lower maximum.
pub(crate) fn minimal_heights(deltas: &[i32]) -> (u32, Vec<u32>) {
    let n = deltas.len();
    // need[i] = descent room required at block i; index n is a sentinel
    // for the anchor slot handled below.
    let mut need = vec![0u32; n];
    for i in (0..n.saturating_sub(1)).rev() {
        need[i] = match deltas[i + 1] {
            d if d < 0 => need[i + 1] + 1,
            0 => need[i + 1],
            _ => 0,
        };
    }
    let anchor_need = match deltas.first().copied() {
        Some(d) if d < 0 => need.first().copied().unwrap_or(0) + 1,
        Some(0) => need.first().copied().unwrap_or(0),
        _ => 0,
    };

    let mut heights = Vec::with_capacity(n);
    let mut prev = anchor_need;
    for (i, &d) in deltas.iter().enumerate() {
        let y = if d > 0 {
            (prev + 1).max(need[i])
        } else if d < 0 {
            need[i]
        } else {
            prev
        };
        heights.push(y);
        prev = y;
    }
    (anchor_need, heights)
}

/// Extra lift needed so that no block requiring a support block beneath it
/// sits at height zero. The anchor shares the first block's entry.
pub(crate) fn support_shift(chain: &Chain, anchor_y: u32, heights: &[u32], palette: &Palette) -> u32 {
    let needs = |id: ColorId| {
        palette.resolve(id).map(|e| e.block.need_support).unwrap_or(false)
    };
    let mut shift = 0;
    if chain.anchored && anchor_y == 0 && needs(chain.ids[0]) {
        shift = 1;
    }
    for (id, &y) in chain.ids.iter().zip(heights) {
        if y == 0 && needs(*id) {
            shift = 1;
        }
    }
    shift
}

/// Write one chain into the column map: anchor block (if anchored),
/// surface blocks, and support layers under blocks that need them.
pub(crate) fn place_chain(
    map: &mut ColumnMap,
    palette: &Palette,
    chain: &Chain,
    anchor_y: u32,
    heights: &[u32],
) {
    let needs = |id: ColorId| {
        palette.resolve(id).map(|e| e.block.need_support).unwrap_or(false)
    };

    if chain.anchored {
        // The anchor reuses the first block's base at the normal shade; it
        // sits north of the visible map, so its own color never renders.
        let anchor_id = chain.ids[0].with_tier(ShadeTier::Normal);
        let column = map.column_mut(chain.x, 0);
        if needs(anchor_id) && anchor_y > 0 {
            column.push(Layer { y: anchor_y - 1, kind: LayerKind::Support });
        }
        column.push(Layer { y: anchor_y, kind: LayerKind::Surface(anchor_id) });
    }

    for (i, (&id, &y)) in chain.ids.iter().zip(heights).enumerate() {
        let z = chain.start_z + 1 + i as u32;
        let column = map.column_mut(chain.x, z);
        if needs(id) && y > 0 {
            column.push(Layer { y: y - 1, kind: LayerKind::Support });
        }
        column.push(Layer { y, kind: LayerKind::Surface(id) });
    }
}

/// Reconstruct the rendered shaded ids purely from column heights.
///
/// This is the in-game rule run in reverse: a column's tier comes from the
/// sign of the height delta to the column one step north, with no northern
/// block rendering at the base shade. Used to verify that synthesis and
/// lossless compression are color-preserving.
pub fn render_from_heights(columns: &ColumnMap) -> IndexGrid {
    let width = columns.width();
    let height = columns.depth() - 1;
    let mut grid = IndexGrid::filled_air(width, height);

    for x in 0..width {
        for z_img in 0..height {
            let z = z_img + 1;
            let Some((y, id)) = columns.column(x, z).surface() else {
                continue;
            };
            let tier = match columns.column(x, z - 1).surface() {
                None => ShadeTier::Normal,
                Some((north_y, _)) => match y.cmp(&north_y) {
                    std::cmp::Ordering::Greater => ShadeTier::High,
                    std::cmp::Ordering::Equal => ShadeTier::Normal,
                    std::cmp::Ordering::Less => ShadeTier::Low,
                },
            };
            grid.set(x, z_img, id.with_tier(tier));
        }
    }
    grid
}

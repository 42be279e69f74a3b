//! Height compression: fitting synthesized columns under a height budget.
//!
//! Lossless mode rewrites every chain to its minimal feasible heights.
//! Only the delta signs carry color, so this never changes what the map
//! renders. Lossy mode additionally demotes individual shade steps to the
//! base tier, trading per-pixel color accuracy for height, one step per
//! round, until the tallest column fits or the round budget runs out.

use thiserror::Error;

use crate::height::{
    extract_chains_from_columns, minimal_heights, naive_heights, place_chain, support_shift, Chain,
};
use crate::models::palette::{Palette, ShadeTier};
use crate::models::volume::ColumnMap;
use crate::progress::{CancelToken, ProgressSink, Stage};

/// Budgets below this cannot hold real map art; the lossy search would
/// thrash instead of converging, so they are rejected before any work.
pub const MIN_VIABLE_HEIGHT: u32 = 10;

/// How column heights may be rewritten.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CompressionMode {
    /// Keep the synthesized heights as they are
    #[default]
    None,
    /// Minimal-height rewrite; rendered colors are untouched
    Lossless,
    /// Demote shade steps until the budget holds; colors may shift a tier
    Lossy,
}

/// Compression settings.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CompressConfig {
    pub mode: CompressionMode,
    /// Tallest allowed top-of-column height
    pub max_height: u32,
    /// Upper bound on lossy demotion rounds
    pub max_rounds: u32,
}

impl Default for CompressConfig {
    fn default() -> Self {
        Self { mode: CompressionMode::None, max_height: 256, max_rounds: 4096 }
    }
}

/// Error during compression.
#[derive(Debug, Clone, PartialEq, Error)]
#[non_exhaustive]
pub enum CompressError {
    /// The requested budget is below the viable minimum
    #[error("max height {requested} is below the viable minimum of {minimum}")]
    HeightTooLow { requested: u32, minimum: u32 },
    /// The lossy search ran out of rounds before fitting the budget
    #[error("no configuration under height {max_height} found in {rounds} rounds (best was {achieved})")]
    Unconverged { rounds: u32, max_height: u32, achieved: u32 },
    /// The cancellation token was raised mid-search
    #[error("compression cancelled")]
    Cancelled,
}

/// Compress synthesized columns according to the configured mode.
///
/// The input is never mutated: callers keep their uncompressed columns,
/// and a cancelled or failed run leaves nothing half-rewritten.
pub fn compress(
    columns: &ColumnMap,
    palette: &Palette,
    cfg: &CompressConfig,
    progress: &dyn ProgressSink,
    cancel: &CancelToken,
) -> Result<ColumnMap, CompressError> {
    match cfg.mode {
        CompressionMode::None => Ok(columns.clone()),
        CompressionMode::Lossless => {
            let chains = extract_chains_from_columns(columns);
            let rebuilt = rebuild(columns, palette, &chains, minimal_heights);
            progress.report(Stage::Compress, 1.0);
            Ok(rebuilt)
        }
        CompressionMode::Lossy => {
            if cfg.max_height < MIN_VIABLE_HEIGHT {
                return Err(CompressError::HeightTooLow {
                    requested: cfg.max_height,
                    minimum: MIN_VIABLE_HEIGHT,
                });
            }
            lossy_search(columns, palette, cfg, progress, cancel)
        }
    }
}

/// Rebuild a column map from chains with a given height assignment.
fn rebuild(
    columns: &ColumnMap,
    palette: &Palette,
    chains: &[Chain],
    assign: fn(&[i32]) -> (u32, Vec<u32>),
) -> ColumnMap {
    let mut map = ColumnMap::new(columns.width(), columns.depth());
    for chain in chains {
        let (anchor_y, heights) = assign(&chain.deltas());
        let shift = support_shift(chain, anchor_y, &heights, palette);
        let heights: Vec<u32> = heights.iter().map(|h| h + shift).collect();
        place_chain(&mut map, palette, chain, anchor_y + shift, &heights);
    }
    map
}

/// Top-of-column height a chain reaches under an assignment, support
/// shift included.
fn chain_peak(chain: &Chain, palette: &Palette, assign: fn(&[i32]) -> (u32, Vec<u32>)) -> u32 {
    let (anchor_y, heights) = assign(&chain.deltas());
    let shift = support_shift(chain, anchor_y, &heights, palette);
    heights.iter().copied().max().unwrap_or(0).max(anchor_y) + shift
}

/// Iterative lossy search.
///
/// Chains are handled independently in (x, start row) order. While a chain
/// overshoots the budget, one shade step is demoted to the base tier per
/// round: the ascent closest below the peak when the peak is pushed up
/// from behind, otherwise the first descent after the peak (the peak is
/// then only tall because of descent room reserved ahead). Either demotion
/// strictly lowers the peak, so the search is monotone and terminates; it
/// fails only if the round budget runs out first.
fn lossy_search(
    columns: &ColumnMap,
    palette: &Palette,
    cfg: &CompressConfig,
    progress: &dyn ProgressSink,
    cancel: &CancelToken,
) -> Result<ColumnMap, CompressError> {
    let mut chains = extract_chains_from_columns(columns);
    let total = chains.len();
    let mut rounds = 0u32;

    for i in 0..chains.len() {
        loop {
            if cancel.is_cancelled() {
                return Err(CompressError::Cancelled);
            }
            let peak = chain_peak(&chains[i], palette, naive_heights);
            if peak <= cfg.max_height {
                break;
            }
            if rounds >= cfg.max_rounds {
                let achieved = chains
                    .iter()
                    .map(|c| chain_peak(c, palette, naive_heights))
                    .max()
                    .unwrap_or(0);
                return Err(CompressError::Unconverged {
                    rounds,
                    max_height: cfg.max_height,
                    achieved,
                });
            }
            demote_one_step(&mut chains[i]);
            rounds += 1;
        }
        progress.report(Stage::Compress, (i + 1) as f32 / total.max(1) as f32);
    }

    progress.report(Stage::Compress, 1.0);
    Ok(rebuild(columns, palette, &chains, naive_heights))
}

/// Demote one shade step of an over-budget chain to the base tier.
fn demote_one_step(chain: &mut Chain) {
    let deltas = chain.deltas();
    let (anchor_y, heights) = naive_heights(&deltas);

    // First position where the walk peaks
    let peak = heights.iter().copied().max().unwrap_or(0).max(anchor_y);
    let peak_pos = heights.iter().position(|&h| h == peak).unwrap_or(0);

    // An ascent at or before the peak lowers everything from there on;
    // failing that, a descent after the peak frees reserved anchor room.
    let target = (0..=peak_pos)
        .rev()
        .find(|&i| deltas[i] > 0)
        .or_else(|| (peak_pos + 1..deltas.len()).find(|&i| deltas[i] < 0));

    if let Some(i) = target {
        chain.ids[i] = chain.ids[i].with_tier(ShadeTier::Normal);
    }
}

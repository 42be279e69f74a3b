//! Image quantization: pixels in, palette indices out.
//!
//! The quantizer owns the per-conversion configuration (algorithm, dither
//! switch, transparency strategy, map mode) as explicit values; nothing in
//! the pipeline reads ambient state, so conversions are reentrant and
//! independent images may run concurrently.

use image::Rgba;
use rayon::prelude::*;
use std::sync::atomic::{AtomicUsize, Ordering};
use thiserror::Error;

use crate::colortable::ColorTable;
use crate::dither::error_diffuse;
use crate::matcher::{CandidateSet, MapMode, MatchAlgorithm, MatchError};
use crate::models::grid::{IndexGrid, PixelGrid};
use crate::models::palette::{Palette, ShadeTier};
use crate::progress::{CancelToken, ProgressSink, Stage};

/// Minimum number of distinct enabled colors for a meaningful conversion.
pub const MIN_DISTINCT_COLORS: usize = 2;

/// Alpha below which a pixel counts as transparent for the air strategy.
pub const AIR_ALPHA_CUTOFF: u8 = 128;

/// How transparent and semi-transparent input pixels are handled.
///
/// Applied once per pixel during import, before any matching; the matcher
/// itself only ever sees opaque colors or "no block".
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum TransparencyStrategy {
    /// Replace every non-opaque pixel wholesale with a background color
    Background([u8; 3]),
    /// Pixels below the alpha cutoff become air (no block)
    Air,
    /// Alpha-composite every pixel onto a background color
    Composite([u8; 3]),
    /// Ignore alpha entirely and use the RGB channels as-is
    Opaque,
}

impl TransparencyStrategy {
    /// Resolve one RGBA sample to an opaque color or "no block".
    pub fn apply(self, px: Rgba<u8>) -> Option<[f32; 3]> {
        let [r, g, b, a] = px.0;
        match self {
            TransparencyStrategy::Background(bg) => {
                if a < 255 {
                    Some([bg[0] as f32, bg[1] as f32, bg[2] as f32])
                } else {
                    Some([r as f32, g as f32, b as f32])
                }
            }
            TransparencyStrategy::Air => {
                if a < AIR_ALPHA_CUTOFF {
                    None
                } else {
                    Some([r as f32, g as f32, b as f32])
                }
            }
            TransparencyStrategy::Composite(bg) => {
                let alpha = a as f32 / 255.0;
                Some([
                    r as f32 * alpha + bg[0] as f32 * (1.0 - alpha),
                    g as f32 * alpha + bg[1] as f32 * (1.0 - alpha),
                    b as f32 * alpha + bg[2] as f32 * (1.0 - alpha),
                ])
            }
            TransparencyStrategy::Opaque => Some([r as f32, g as f32, b as f32]),
        }
    }
}

/// Per-conversion quantization settings.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct QuantizeConfig {
    pub algorithm: MatchAlgorithm,
    pub dither: bool,
    pub transparency: TransparencyStrategy,
    pub mode: MapMode,
}

impl Default for QuantizeConfig {
    fn default() -> Self {
        Self {
            algorithm: MatchAlgorithm::default(),
            dither: false,
            transparency: TransparencyStrategy::Air,
            mode: MapMode::Flat,
        }
    }
}

/// Error during quantization.
#[derive(Debug, Clone, PartialEq, Error)]
#[non_exhaustive]
pub enum QuantizeError {
    /// The input grid holds zero pixels
    #[error("image has no pixels")]
    EmptyImage,
    /// Not enough distinct enabled colors to quantize against
    #[error("only {distinct} distinct enabled colors, at least {required} required")]
    InsufficientPalette { distinct: usize, required: usize },
    /// Candidate set construction failed
    #[error(transparent)]
    Match(#[from] MatchError),
    /// The cancellation token was raised
    #[error("conversion cancelled")]
    Cancelled,
}

/// A configured quantizer: candidate sets are built once per conversion
/// and shared read-only across worker threads.
#[derive(Debug)]
pub struct Quantizer {
    full: CandidateSet,
    normal_only: CandidateSet,
    dither: bool,
    transparency: TransparencyStrategy,
    mode: MapMode,
}

impl Quantizer {
    /// Build a quantizer for one palette snapshot and configuration.
    ///
    /// Fails fast, before any pixel work: an empty enabled subset and a
    /// palette below the quality floor are both configuration errors.
    pub fn new(
        palette: &Palette,
        table: &ColorTable,
        cfg: &QuantizeConfig,
    ) -> Result<Self, QuantizeError> {
        let full = CandidateSet::build(palette, table, cfg.algorithm, cfg.mode.tiers())?;
        let distinct = palette.distinct_enabled_colors();
        if distinct < MIN_DISTINCT_COLORS {
            return Err(QuantizeError::InsufficientPalette {
                distinct,
                required: MIN_DISTINCT_COLORS,
            });
        }
        let normal_only = CandidateSet::build(palette, table, cfg.algorithm, &[ShadeTier::Normal])?;
        Ok(Self {
            full,
            normal_only,
            dither: cfg.dither,
            transparency: cfg.transparency,
            mode: cfg.mode,
        })
    }

    /// Quantize a whole image into an index grid.
    ///
    /// Reports per-row progress on `Stage::Quantize` and honors the cancel
    /// token at row granularity. Without dithering, rows are matched in
    /// parallel; with dithering the scan is sequential because each pixel's
    /// correction depends on the pixels before it.
    pub fn quantize(
        &self,
        grid: &PixelGrid,
        progress: &dyn ProgressSink,
        cancel: &CancelToken,
    ) -> Result<IndexGrid, QuantizeError> {
        if grid.is_empty() {
            return Err(QuantizeError::EmptyImage);
        }

        let width = grid.width();
        let height = grid.height();
        let samples = self.prepare(grid);

        let ids = if self.dither {
            self.quantize_sequential(width, height, &samples, progress, cancel)?
        } else {
            self.quantize_parallel(width, height, &samples, progress, cancel)?
        };

        Ok(IndexGrid::from_ids(width, height, ids))
    }

    /// Apply the transparency strategy to every sample.
    fn prepare(&self, grid: &PixelGrid) -> Vec<Option<[f32; 3]>> {
        let mut samples = Vec::with_capacity((grid.width() * grid.height()) as usize);
        for z in 0..grid.height() {
            for x in 0..grid.width() {
                samples.push(self.transparency.apply(grid.pixel(x, z)));
            }
        }
        samples
    }

    /// Candidate set for a pixel position.
    ///
    /// In sloped mode, the first block after a transparent run has no
    /// northern neighbor inside the build, so the game renders it at the
    /// base shade; restricting it to normal-tier candidates keeps the
    /// stored index and the in-game color identical. Row 0 keeps the full
    /// set because the anchor row north of the image absorbs its delta.
    fn set_for(&self, x: u32, z: u32, width: u32, samples: &[Option<[f32; 3]>]) -> &CandidateSet {
        if self.mode == MapMode::Sloped
            && z > 0
            && samples[((z - 1) * width + x) as usize].is_none()
        {
            &self.normal_only
        } else {
            &self.full
        }
    }

    fn quantize_sequential(
        &self,
        width: u32,
        height: u32,
        samples: &[Option<[f32; 3]>],
        progress: &dyn ProgressSink,
        cancel: &CancelToken,
    ) -> Result<Vec<crate::models::palette::ColorId>, QuantizeError> {
        let mut current_row = u32::MAX;
        let mut cancelled = false;

        let ids = error_diffuse(width, height, samples, |x, z, rgb| {
            if z != current_row {
                current_row = z;
                if cancel.is_cancelled() {
                    cancelled = true;
                }
                progress.report(Stage::Quantize, z as f32 / height as f32);
            }
            self.set_for(x, z, width, samples).closest_with_rgb(rgb)
        });

        if cancelled || cancel.is_cancelled() {
            return Err(QuantizeError::Cancelled);
        }
        progress.report(Stage::Quantize, 1.0);
        Ok(ids)
    }

    fn quantize_parallel(
        &self,
        width: u32,
        height: u32,
        samples: &[Option<[f32; 3]>],
        progress: &dyn ProgressSink,
        cancel: &CancelToken,
    ) -> Result<Vec<crate::models::palette::ColorId>, QuantizeError> {
        let done = AtomicUsize::new(0);

        let rows: Vec<Option<Vec<_>>> = (0..height as usize)
            .into_par_iter()
            .map(|z| {
                if cancel.is_cancelled() {
                    return None;
                }
                let z = z as u32;
                let mut row = Vec::with_capacity(width as usize);
                for x in 0..width {
                    let idx = (z * width + x) as usize;
                    let id = match samples[idx] {
                        None => crate::models::palette::ColorId::AIR,
                        Some(rgb) => self.set_for(x, z, width, samples).closest(rgb),
                    };
                    row.push(id);
                }
                let finished = done.fetch_add(1, Ordering::Relaxed) + 1;
                progress.report(Stage::Quantize, finished as f32 / height as f32);
                Some(row)
            })
            .collect();

        let mut ids = Vec::with_capacity((width * height) as usize);
        for row in rows {
            match row {
                Some(mut r) => ids.append(&mut r),
                None => return Err(QuantizeError::Cancelled),
            }
        }
        Ok(ids)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::colortable::{ColorSpace, ColorTable};
    use crate::models::palette::{ColorId, Palette};
    use crate::progress::{CollectingProgress, NullProgress};
    use image::RgbaImage;

    const BASES: [[u8; 3]; 3] = [[0, 0, 0], [255, 0, 0], [0, 0, 255]];

    fn red_blue() -> (Palette, ColorTable) {
        let table = ColorTable::generate(ColorSpace::Rgb, &BASES);
        let json = r#"{"blocks": [
            {"id": "minecraft:red_wool", "base_color": 1},
            {"id": "minecraft:blue_wool", "base_color": 2}
        ]}"#;
        let (palette, _) = Palette::load_fixed(json, &table).unwrap();
        (palette, table)
    }

    fn solid_image(w: u32, h: u32, rgba: [u8; 4]) -> PixelGrid {
        PixelGrid::from_image(RgbaImage::from_pixel(w, h, Rgba(rgba)))
    }

    #[test]
    fn test_all_red_image_quantizes_to_red_everywhere() {
        let (palette, _) = red_blue();
        let grid = solid_image(2, 2, [255, 0, 0, 255]);

        for algorithm in [
            MatchAlgorithm::Rgb,
            MatchAlgorithm::RgbPlus,
            MatchAlgorithm::Hsv,
            MatchAlgorithm::Lab,
            MatchAlgorithm::Xyz,
        ] {
            let table = ColorTable::generate(algorithm.space(), &BASES);
            for dither in [false, true] {
                let cfg = QuantizeConfig { algorithm, dither, ..Default::default() };
                let quantizer = Quantizer::new(&palette, &table, &cfg).unwrap();
                let out = quantizer
                    .quantize(&grid, &NullProgress::new(), &CancelToken::new())
                    .unwrap();
                assert!(
                    out.ids().iter().all(|id| id.base() == 1),
                    "algorithm {:?} dither {} strayed from red",
                    algorithm,
                    dither
                );
            }
        }
    }

    #[test]
    fn test_empty_image_is_an_error() {
        let (palette, table) = red_blue();
        let cfg = QuantizeConfig::default();
        let quantizer = Quantizer::new(&palette, &table, &cfg).unwrap();
        let err = quantizer
            .quantize(&solid_image(0, 0, [0, 0, 0, 255]), &NullProgress::new(), &CancelToken::new())
            .unwrap_err();
        assert_eq!(err, QuantizeError::EmptyImage);
    }

    #[test]
    fn test_insufficient_palette_is_an_error() {
        let (mut palette, table) = red_blue();
        palette.set_enabled(2, false).unwrap();
        let err = Quantizer::new(&palette, &table, &QuantizeConfig::default()).unwrap_err();
        assert_eq!(err, QuantizeError::InsufficientPalette { distinct: 1, required: 2 });
    }

    #[test]
    fn test_fully_transparent_pixel_becomes_air() {
        let (palette, table) = red_blue();
        let cfg = QuantizeConfig { transparency: TransparencyStrategy::Air, ..Default::default() };
        let quantizer = Quantizer::new(&palette, &table, &cfg).unwrap();
        let out = quantizer
            .quantize(&solid_image(1, 1, [0, 0, 0, 0]), &NullProgress::new(), &CancelToken::new())
            .unwrap();
        assert_eq!(out.get(0, 0), ColorId::AIR);
    }

    #[test]
    fn test_background_strategy_replaces_semi_transparent() {
        let (palette, table) = red_blue();
        let cfg = QuantizeConfig {
            transparency: TransparencyStrategy::Background([0, 0, 255]),
            ..Default::default()
        };
        let quantizer = Quantizer::new(&palette, &table, &cfg).unwrap();
        // Half-transparent red lands on the blue background color
        let out = quantizer
            .quantize(&solid_image(1, 1, [255, 0, 0, 120]), &NullProgress::new(), &CancelToken::new())
            .unwrap();
        assert_eq!(out.get(0, 0).base(), 2);
    }

    #[test]
    fn test_dither_toggle_preserves_dimensions() {
        let (palette, table) = red_blue();
        let mut image = RgbaImage::new(4, 3);
        for (i, px) in image.pixels_mut().enumerate() {
            *px = Rgba([(i * 20) as u8, 0, (255 - i * 20) as u8, 255]);
        }
        let grid = PixelGrid::from_image(image);

        for dither in [false, true] {
            let cfg = QuantizeConfig { dither, ..Default::default() };
            let quantizer = Quantizer::new(&palette, &table, &cfg).unwrap();
            let out =
                quantizer.quantize(&grid, &NullProgress::new(), &CancelToken::new()).unwrap();
            assert_eq!(out.width(), 4);
            assert_eq!(out.height(), 3);
        }
    }

    #[test]
    fn test_cancelled_before_start_returns_cancelled() {
        let (palette, table) = red_blue();
        let cfg = QuantizeConfig::default();
        let quantizer = Quantizer::new(&palette, &table, &cfg).unwrap();
        let cancel = CancelToken::new();
        cancel.cancel();
        let err = quantizer
            .quantize(&solid_image(4, 4, [255, 0, 0, 255]), &NullProgress::new(), &cancel)
            .unwrap_err();
        assert_eq!(err, QuantizeError::Cancelled);
    }

    #[test]
    fn test_progress_reports_reach_completion() {
        let (palette, table) = red_blue();
        let cfg = QuantizeConfig { dither: true, ..Default::default() };
        let quantizer = Quantizer::new(&palette, &table, &cfg).unwrap();
        let sink = CollectingProgress::new();
        quantizer
            .quantize(&solid_image(2, 5, [255, 0, 0, 255]), &sink, &CancelToken::new())
            .unwrap();
        let events = sink.events();
        assert!(!events.is_empty());
        assert_eq!(events.last().unwrap(), &(Stage::Quantize, 1.0));
    }

    #[test]
    fn test_sloped_chain_start_after_air_is_normal_tier() {
        let (palette, table) = red_blue();
        // Column: opaque, transparent, opaque. The pixel after the hole
        // must come out at the normal tier even though 180-red would be a
        // closer match in the full set.
        let mut image = RgbaImage::new(1, 3);
        image.put_pixel(0, 0, Rgba([255, 0, 0, 255]));
        image.put_pixel(0, 1, Rgba([0, 0, 0, 0]));
        image.put_pixel(0, 2, Rgba([180, 0, 0, 255]));
        let grid = PixelGrid::from_image(image);

        let cfg = QuantizeConfig { mode: MapMode::Sloped, ..Default::default() };
        let quantizer = Quantizer::new(&palette, &table, &cfg).unwrap();
        let out = quantizer.quantize(&grid, &NullProgress::new(), &CancelToken::new()).unwrap();

        assert!(out.get(0, 1).is_air());
        assert_eq!(out.get(0, 2).tier(), ShadeTier::Normal);
    }
}

//! Closest-color matching against the enabled palette.
//!
//! All algorithms share one shape: convert the pixel into the algorithm's
//! color space, measure a distance against every candidate, keep the
//! minimum. Ties break toward the earlier candidate, so matching is a pure,
//! deterministic function of (pixel, candidate set).

use thiserror::Error;

use crate::color::{
    dist_sq_cie94, dist_sq_euclid, dist_sq_redmean, hsv_to_cone, rgb_to_hsv, rgb_to_lab,
    rgb_to_xyz,
};
use crate::colortable::{ColorSpace, ColorTable};
use crate::models::palette::{shade, ColorId, EntryOrigin, Palette, ShadeTier};

/// Selectable matching algorithm.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum MatchAlgorithm {
    /// Euclidean distance in sRGB
    Rgb,
    /// Weighted ("redmean") distance in sRGB
    #[default]
    RgbPlus,
    /// Euclidean distance on the HSV cone
    Hsv,
    /// CIE94 color difference in L*a*b*
    Lab,
    /// Euclidean distance in XYZ
    Xyz,
}

impl MatchAlgorithm {
    /// Parse an algorithm name.
    pub fn from_str(s: &str) -> Option<MatchAlgorithm> {
        match s.to_lowercase().as_str() {
            "rgb" => Some(MatchAlgorithm::Rgb),
            "rgb+" | "rgbplus" | "rgb-weighted" => Some(MatchAlgorithm::RgbPlus),
            "hsv" => Some(MatchAlgorithm::Hsv),
            "lab" => Some(MatchAlgorithm::Lab),
            "xyz" => Some(MatchAlgorithm::Xyz),
            _ => None,
        }
    }

    /// The color table this algorithm matches in.
    pub fn space(self) -> ColorSpace {
        match self {
            MatchAlgorithm::Rgb | MatchAlgorithm::RgbPlus => ColorSpace::Rgb,
            MatchAlgorithm::Hsv => ColorSpace::Hsv,
            MatchAlgorithm::Lab => ColorSpace::Lab,
            MatchAlgorithm::Xyz => ColorSpace::Xyz,
        }
    }

    /// Convert a raw sRGB triple into this algorithm's coordinates.
    fn to_coords(self, rgb: [f32; 3]) -> [f32; 3] {
        match self {
            MatchAlgorithm::Rgb | MatchAlgorithm::RgbPlus => rgb,
            MatchAlgorithm::Hsv => hsv_to_cone(rgb_to_hsv(rgb)),
            MatchAlgorithm::Lab => rgb_to_lab(rgb),
            MatchAlgorithm::Xyz => rgb_to_xyz(rgb),
        }
    }

    fn distance_sq(self, a: [f32; 3], b: [f32; 3]) -> f32 {
        match self {
            MatchAlgorithm::Rgb => dist_sq_euclid(a, b),
            MatchAlgorithm::RgbPlus => dist_sq_redmean(a, b),
            MatchAlgorithm::Hsv => dist_sq_euclid(a, b),
            MatchAlgorithm::Lab => dist_sq_cie94(a, b),
            MatchAlgorithm::Xyz => dist_sq_euclid(a, b),
        }
    }
}

/// Which shade tiers are reachable in a conversion.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MapMode {
    /// Every block at the same height: only the base shade exists
    #[default]
    Flat,
    /// Full 3D map art: low, normal and high shades are all reachable
    Sloped,
}

impl MapMode {
    /// Tiers the matcher may hand out in this mode.
    pub fn tiers(self) -> &'static [ShadeTier] {
        match self {
            MapMode::Flat => &[ShadeTier::Normal],
            MapMode::Sloped => &[ShadeTier::Low, ShadeTier::Normal, ShadeTier::High],
        }
    }
}

/// Error when building a candidate set.
#[derive(Debug, Clone, PartialEq, Error)]
#[non_exhaustive]
pub enum MatchError {
    /// Matching over an empty enabled subset is undefined
    #[error("no enabled palette entries to match against")]
    NoEnabledEntries,
    /// A fixed entry's shaded color is missing from the color table
    #[error("block '{block_id}' has no row for base color {base} in the color table")]
    UnknownBlock { block_id: String, base: u16 },
    /// The supplied table is for a different space than the algorithm
    #[error("algorithm needs the {expected} table, got {found}")]
    WrongTable { expected: ColorSpace, found: ColorSpace },
}

/// One matchable shaded color.
#[derive(Debug, Clone, Copy)]
struct Candidate {
    id: ColorId,
    /// Coordinates in the algorithm's space
    coords: [f32; 3],
    /// Shaded sRGB color, kept for error diffusion
    rgb: [f32; 3],
}

/// An immutable snapshot of everything the matcher needs: the enabled
/// entries of a palette, expanded over the allowed shade tiers, with
/// coordinates taken from the verified color table (fixed entries) or
/// computed on the fly (custom entries).
#[derive(Debug, Clone)]
pub struct CandidateSet {
    algorithm: MatchAlgorithm,
    candidates: Vec<Candidate>,
}

impl CandidateSet {
    /// Build a candidate set for one algorithm and tier selection.
    ///
    /// Candidates keep palette insertion order, tiers in id order within
    /// each entry; the matcher's tie-break inherits that order.
    pub fn build(
        palette: &Palette,
        table: &ColorTable,
        algorithm: MatchAlgorithm,
        tiers: &[ShadeTier],
    ) -> Result<Self, MatchError> {
        if table.space() != algorithm.space() {
            return Err(MatchError::WrongTable {
                expected: algorithm.space(),
                found: table.space(),
            });
        }

        let mut candidates = Vec::new();
        for entry in palette.enabled_entries() {
            for &tier in tiers {
                let id = ColorId::new(entry.base, tier);
                let shaded = shade(entry.rgb, tier);
                let rgb = [shaded[0] as f32, shaded[1] as f32, shaded[2] as f32];

                let coords = match entry.origin {
                    EntryOrigin::Fixed => {
                        let row = table.row(id).ok_or_else(|| MatchError::UnknownBlock {
                            block_id: entry.block.id.clone(),
                            base: entry.base,
                        })?;
                        // HSV tables store (h, s, v); distances run on the cone
                        match algorithm {
                            MatchAlgorithm::Hsv => hsv_to_cone(row),
                            _ => row,
                        }
                    }
                    EntryOrigin::Custom => algorithm.to_coords(rgb),
                };

                candidates.push(Candidate { id, coords, rgb });
            }
        }

        if candidates.is_empty() {
            return Err(MatchError::NoEnabledEntries);
        }

        Ok(Self { algorithm, candidates })
    }

    /// Number of candidates.
    pub fn len(&self) -> usize {
        self.candidates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.candidates.is_empty()
    }

    /// Match one sRGB color, returning the closest candidate id.
    pub fn closest(&self, rgb: [f32; 3]) -> ColorId {
        self.closest_with_rgb(rgb).0
    }

    /// Match one sRGB color, returning the id and the candidate's shaded
    /// sRGB color (used by the ditherer to compute quantization error).
    pub fn closest_with_rgb(&self, rgb: [f32; 3]) -> (ColorId, [f32; 3]) {
        let coords = self.algorithm.to_coords(rgb);
        // Strict less-than keeps the earliest candidate on ties
        let mut best = &self.candidates[0];
        let mut best_d = self.algorithm.distance_sq(coords, best.coords);
        for candidate in &self.candidates[1..] {
            let d = self.algorithm.distance_sq(coords, candidate.coords);
            if d < best_d {
                best = candidate;
                best_d = d;
            }
        }
        (best.id, best.rgb)
    }
}

//! Color-space transforms and distance metrics.
//!
//! Everything in this module is a pure function of its inputs. The matcher
//! and the color-table generator share these conversions so that a table
//! loaded from disk and a color converted on the fly can never disagree.
//!
//! Supported spaces:
//! - RGB (sRGB, 0-255 per channel)
//! - HSV (hue in degrees, saturation/value in 0-1)
//! - XYZ (linear, D65 illuminant)
//! - LAB (CIE L*a*b*, D65 reference white)

use thiserror::Error;

/// Error type for color string parsing failures
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ColorError {
    /// Input string was empty
    #[error("empty color string")]
    Empty,
    /// Input string doesn't start with '#'
    #[error("color must start with '#'")]
    MissingHash,
    /// Invalid length (must be 3 or 6 hex chars after #)
    #[error("invalid color length {0}, expected 3 or 6")]
    InvalidLength(usize),
    /// Contains non-hex characters
    #[error("invalid hex character '{0}'")]
    InvalidHex(char),
}

/// Parse a `#RGB` or `#RRGGBB` hex string into an RGB triple.
///
/// Alpha digits are rejected: palette base colors are opaque by definition,
/// transparency is expressed through the dedicated air entry.
pub fn parse_hex_rgb(s: &str) -> Result<[u8; 3], ColorError> {
    if s.is_empty() {
        return Err(ColorError::Empty);
    }
    if !s.starts_with('#') {
        return Err(ColorError::MissingHash);
    }

    let hex = &s[1..];
    for c in hex.chars() {
        if !c.is_ascii_hexdigit() {
            return Err(ColorError::InvalidHex(c));
        }
    }

    match hex.len() {
        3 => {
            // #RGB -> #RRGGBB (doubled digits)
            let mut chars = hex.chars();
            let r = hex_digit(chars.next().unwrap())? * 17;
            let g = hex_digit(chars.next().unwrap())? * 17;
            let b = hex_digit(chars.next().unwrap())? * 17;
            Ok([r, g, b])
        }
        6 => {
            let r = hex_pair(&hex[0..2])?;
            let g = hex_pair(&hex[2..4])?;
            let b = hex_pair(&hex[4..6])?;
            Ok([r, g, b])
        }
        n => Err(ColorError::InvalidLength(n)),
    }
}

/// Parse a single hex digit (0-9, A-F, a-f) to u8 (0-15)
fn hex_digit(c: char) -> Result<u8, ColorError> {
    match c {
        '0'..='9' => Ok(c as u8 - b'0'),
        'a'..='f' => Ok(c as u8 - b'a' + 10),
        'A'..='F' => Ok(c as u8 - b'A' + 10),
        _ => Err(ColorError::InvalidHex(c)),
    }
}

/// Parse a two-character hex string to u8 (0-255)
fn hex_pair(s: &str) -> Result<u8, ColorError> {
    let mut chars = s.chars();
    let high = hex_digit(chars.next().unwrap())?;
    let low = hex_digit(chars.next().unwrap())?;
    Ok(high * 16 + low)
}

/// Format an RGB triple as a `#RRGGBB` hex string.
pub fn format_hex_rgb(rgb: [u8; 3]) -> String {
    format!("#{:02X}{:02X}{:02X}", rgb[0], rgb[1], rgb[2])
}

/// sRGB gamma expansion (inverse companding).
fn srgb_to_linear(c: f32) -> f32 {
    if c <= 0.04045 {
        c / 12.92
    } else {
        ((c + 0.055) / 1.055).powf(2.4)
    }
}

/// Convert an sRGB color to XYZ (D65 illuminant).
pub fn rgb_to_xyz(rgb: [f32; 3]) -> [f32; 3] {
    let r = srgb_to_linear(rgb[0] / 255.0);
    let g = srgb_to_linear(rgb[1] / 255.0);
    let b = srgb_to_linear(rgb[2] / 255.0);

    // sRGB to XYZ matrix, D65 illuminant
    let x = r * 0.4124564 + g * 0.3575761 + b * 0.1804375;
    let y = r * 0.2126729 + g * 0.7151522 + b * 0.0721750;
    let z = r * 0.0193339 + g * 0.1191920 + b * 0.9503041;

    [x, y, z]
}

// D65 reference white point
const WHITE_X: f32 = 0.95047;
const WHITE_Y: f32 = 1.00000;
const WHITE_Z: f32 = 1.08883;

/// LAB f function for XYZ to LAB conversion.
fn lab_f(t: f32) -> f32 {
    const DELTA: f32 = 6.0 / 29.0;
    if t > DELTA * DELTA * DELTA {
        t.cbrt()
    } else {
        t / (3.0 * DELTA * DELTA) + 4.0 / 29.0
    }
}

/// Convert XYZ to CIE L*a*b* (D65 reference white).
pub fn xyz_to_lab(xyz: [f32; 3]) -> [f32; 3] {
    let fx = lab_f(xyz[0] / WHITE_X);
    let fy = lab_f(xyz[1] / WHITE_Y);
    let fz = lab_f(xyz[2] / WHITE_Z);

    let l = 116.0 * fy - 16.0;
    let a = 500.0 * (fx - fy);
    let b = 200.0 * (fy - fz);

    [l, a, b]
}

/// Convert an sRGB color straight to LAB.
pub fn rgb_to_lab(rgb: [f32; 3]) -> [f32; 3] {
    xyz_to_lab(rgb_to_xyz(rgb))
}

/// Convert an sRGB color to HSV.
///
/// Hue is in degrees `[0, 360)`, saturation and value in `[0, 1]`.
/// Achromatic colors get hue 0.
pub fn rgb_to_hsv(rgb: [f32; 3]) -> [f32; 3] {
    let r = rgb[0] / 255.0;
    let g = rgb[1] / 255.0;
    let b = rgb[2] / 255.0;

    let max = r.max(g).max(b);
    let min = r.min(g).min(b);
    let delta = max - min;

    let h = if delta <= f32::EPSILON {
        0.0
    } else if max == r {
        60.0 * ((g - b) / delta).rem_euclid(6.0)
    } else if max == g {
        60.0 * ((b - r) / delta + 2.0)
    } else {
        60.0 * ((r - g) / delta + 4.0)
    };

    let s = if max <= f32::EPSILON { 0.0 } else { delta / max };

    [h, s, max]
}

/// Project HSV onto cone coordinates so Euclidean distance is meaningful.
///
/// The hue circle is embedded in the plane scaled by saturation and value,
/// which keeps dark or desaturated colors close together regardless of hue.
pub fn hsv_to_cone(hsv: [f32; 3]) -> [f32; 3] {
    let rad = hsv[0].to_radians();
    let radius = hsv[1] * hsv[2];
    [radius * rad.cos(), radius * rad.sin(), hsv[2]]
}

/// Squared Euclidean distance between two coordinate triples.
pub fn dist_sq_euclid(a: [f32; 3], b: [f32; 3]) -> f32 {
    let d0 = a[0] - b[0];
    let d1 = a[1] - b[1];
    let d2 = a[2] - b[2];
    d0 * d0 + d1 * d1 + d2 * d2
}

/// Squared weighted RGB distance ("redmean" approximation).
///
/// Cheap perceptual correction for plain RGB distance: red and blue are
/// weighted by the mean red level of the pair, green is always weighted
/// highest. Inputs are raw sRGB channel values in 0-255.
pub fn dist_sq_redmean(a: [f32; 3], b: [f32; 3]) -> f32 {
    let rmean = (a[0] + b[0]) / 2.0;
    let dr = a[0] - b[0];
    let dg = a[1] - b[1];
    let db = a[2] - b[2];
    (2.0 + rmean / 256.0) * dr * dr + 4.0 * dg * dg + (2.0 + (255.0 - rmean) / 256.0) * db * db
}

/// Squared CIE94 color difference between two LAB triples.
///
/// Graphic-arts weighting (kL = 1, K1 = 0.045, K2 = 0.015). The hue term
/// is clamped at zero to absorb rounding when the chroma difference
/// dominates.
pub fn dist_sq_cie94(lab1: [f32; 3], lab2: [f32; 3]) -> f32 {
    let dl = lab1[0] - lab2[0];
    let da = lab1[1] - lab2[1];
    let db = lab1[2] - lab2[2];

    let c1 = (lab1[1] * lab1[1] + lab1[2] * lab1[2]).sqrt();
    let c2 = (lab2[1] * lab2[1] + lab2[2] * lab2[2]).sqrt();
    let dc = c1 - c2;

    let dh_sq = (da * da + db * db - dc * dc).max(0.0);

    let sc = 1.0 + 0.045 * c1;
    let sh = 1.0 + 0.015 * c1;

    dl * dl + (dc / sc) * (dc / sc) + dh_sq / (sh * sh)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_hex_rgb_six_digits() {
        assert_eq!(parse_hex_rgb("#FF8000").unwrap(), [255, 128, 0]);
        assert_eq!(parse_hex_rgb("#000000").unwrap(), [0, 0, 0]);
    }

    #[test]
    fn test_parse_hex_rgb_three_digits() {
        // Each digit is doubled
        assert_eq!(parse_hex_rgb("#F00").unwrap(), [255, 0, 0]);
        assert_eq!(parse_hex_rgb("#abc").unwrap(), [0xAA, 0xBB, 0xCC]);
    }

    #[test]
    fn test_parse_hex_rgb_rejects_bad_input() {
        assert_eq!(parse_hex_rgb(""), Err(ColorError::Empty));
        assert_eq!(parse_hex_rgb("FF8000"), Err(ColorError::MissingHash));
        assert_eq!(parse_hex_rgb("#FF80"), Err(ColorError::InvalidLength(4)));
        assert_eq!(parse_hex_rgb("#GG0000"), Err(ColorError::InvalidHex('G')));
    }

    #[test]
    fn test_format_hex_round_trip() {
        assert_eq!(format_hex_rgb([255, 128, 0]), "#FF8000");
        assert_eq!(parse_hex_rgb(&format_hex_rgb([1, 2, 3])).unwrap(), [1, 2, 3]);
    }

    #[test]
    fn test_lab_conversion_black() {
        // Black should be L=0, a=0, b=0
        let lab = rgb_to_lab([0.0, 0.0, 0.0]);
        assert!(lab[0] < 1.0, "Black L should be ~0, got {}", lab[0]);
        assert!(lab[1].abs() < 1.0, "Black a should be ~0, got {}", lab[1]);
        assert!(lab[2].abs() < 1.0, "Black b should be ~0, got {}", lab[2]);
    }

    #[test]
    fn test_lab_conversion_white() {
        // White should be L=100, a=0, b=0
        let lab = rgb_to_lab([255.0, 255.0, 255.0]);
        assert!(lab[0] > 99.0, "White L should be ~100, got {}", lab[0]);
        assert!(lab[1].abs() < 1.0, "White a should be ~0, got {}", lab[1]);
        assert!(lab[2].abs() < 1.0, "White b should be ~0, got {}", lab[2]);
    }

    #[test]
    fn test_lab_conversion_red() {
        // Red should have high L, strongly positive a
        let lab = rgb_to_lab([255.0, 0.0, 0.0]);
        assert!(lab[0] > 50.0, "Red L should be > 50, got {}", lab[0]);
        assert!(lab[1] > 50.0, "Red a should be positive, got {}", lab[1]);
    }

    #[test]
    fn test_hsv_primaries() {
        let red = rgb_to_hsv([255.0, 0.0, 0.0]);
        assert!(red[0].abs() < 0.5, "Red hue should be 0, got {}", red[0]);
        assert!((red[1] - 1.0).abs() < 1e-5);
        assert!((red[2] - 1.0).abs() < 1e-5);

        let green = rgb_to_hsv([0.0, 255.0, 0.0]);
        assert!((green[0] - 120.0).abs() < 0.5, "Green hue should be 120, got {}", green[0]);

        let blue = rgb_to_hsv([0.0, 0.0, 255.0]);
        assert!((blue[0] - 240.0).abs() < 0.5, "Blue hue should be 240, got {}", blue[0]);
    }

    #[test]
    fn test_hsv_achromatic_hue_is_zero() {
        let gray = rgb_to_hsv([128.0, 128.0, 128.0]);
        assert_eq!(gray[0], 0.0);
        assert_eq!(gray[1], 0.0);
    }

    #[test]
    fn test_hsv_cone_keeps_dark_hues_together() {
        // Nearly-black red and nearly-black green are visually identical;
        // in cone coordinates they must be much closer than the saturated pair.
        let dark_red = hsv_to_cone(rgb_to_hsv([10.0, 0.0, 0.0]));
        let dark_green = hsv_to_cone(rgb_to_hsv([0.0, 10.0, 0.0]));
        let red = hsv_to_cone(rgb_to_hsv([255.0, 0.0, 0.0]));
        let green = hsv_to_cone(rgb_to_hsv([0.0, 255.0, 0.0]));

        let dark = dist_sq_euclid(dark_red, dark_green);
        let bright = dist_sq_euclid(red, green);
        assert!(dark < bright / 100.0, "dark={} bright={}", dark, bright);
    }

    #[test]
    fn test_cie94_orders_like_perception() {
        let black = rgb_to_lab([0.0, 0.0, 0.0]);
        let white = rgb_to_lab([255.0, 255.0, 255.0]);
        let dark_gray = rgb_to_lab([30.0, 30.0, 30.0]);

        let bw = dist_sq_cie94(black, white);
        let bg = dist_sq_cie94(black, dark_gray);
        assert!(bg < bw, "black-gray ({}) should be less than black-white ({})", bg, bw);
    }

    #[test]
    fn test_cie94_identity_is_zero() {
        let c = rgb_to_lab([120.0, 45.0, 200.0]);
        assert_eq!(dist_sq_cie94(c, c), 0.0);
    }

    #[test]
    fn test_redmean_weights_green_highest() {
        // Equal channel deltas: the green delta must cost the most
        let base = [100.0, 100.0, 100.0];
        let dr = dist_sq_redmean(base, [110.0, 100.0, 100.0]);
        let dg = dist_sq_redmean(base, [100.0, 110.0, 100.0]);
        let db = dist_sq_redmean(base, [100.0, 100.0, 110.0]);
        assert!(dg > dr && dg > db, "dr={} dg={} db={}", dr, dg, db);
    }
}

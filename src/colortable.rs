//! Checksum-protected color-definition tables.
//!
//! One table per supported color space maps every shaded palette color
//! (base color id times four tiers) into that space. The tables ship with
//! the application and are treated as immutable inputs: a corrupt table is
//! a fatal, per-table error, never silently recomputed or substituted.
//!
//! Binary layout (little endian):
//!
//! ```text
//! magic   4 bytes  "MCTB"
//! space   4 bytes  "RGB\0" | "HSV\0" | "LAB\0" | "XYZ\0"
//! rows    u32      row count (4 per base color)
//! data    rows * 3 * f32
//! crc     u32      CRC32 of all preceding bytes
//! ```

use std::fs;
use std::path::Path;
use thiserror::Error;

use crate::color::{rgb_to_hsv, rgb_to_lab, rgb_to_xyz};
use crate::models::palette::{shade, ColorId, ShadeTier};

const MAGIC: [u8; 4] = *b"MCTB";

/// The color spaces a table can be expressed in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ColorSpace {
    Rgb,
    Hsv,
    Lab,
    Xyz,
}

impl ColorSpace {
    /// Three-letter tag stored in the table header.
    pub fn tag(self) -> [u8; 4] {
        match self {
            ColorSpace::Rgb => *b"RGB\0",
            ColorSpace::Hsv => *b"HSV\0",
            ColorSpace::Lab => *b"LAB\0",
            ColorSpace::Xyz => *b"XYZ\0",
        }
    }

    fn from_tag(tag: [u8; 4]) -> Option<Self> {
        match &tag {
            b"RGB\0" => Some(ColorSpace::Rgb),
            b"HSV\0" => Some(ColorSpace::Hsv),
            b"LAB\0" => Some(ColorSpace::Lab),
            b"XYZ\0" => Some(ColorSpace::Xyz),
            _ => None,
        }
    }

    /// Conventional file name for the shipped table of this space.
    pub fn file_name(self) -> &'static str {
        match self {
            ColorSpace::Rgb => "RGB.mct",
            ColorSpace::Hsv => "HSV.mct",
            ColorSpace::Lab => "LAB.mct",
            ColorSpace::Xyz => "XYZ.mct",
        }
    }
}

impl std::fmt::Display for ColorSpace {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ColorSpace::Rgb => write!(f, "RGB"),
            ColorSpace::Hsv => write!(f, "HSV"),
            ColorSpace::Lab => write!(f, "LAB"),
            ColorSpace::Xyz => write!(f, "XYZ"),
        }
    }
}

/// Error when loading a color table.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum ColorTableError {
    #[error("cannot read color table: {0}")]
    Io(#[from] std::io::Error),
    /// The file does not start with the table magic
    #[error("not a color table (bad magic)")]
    BadMagic,
    /// The file holds a different color space than requested
    #[error("color table is for space {found}, expected {expected}")]
    SpaceMismatch { expected: ColorSpace, found: String },
    /// The file ends before the declared row count
    #[error("color table truncated: expected {expected} bytes, got {got}")]
    Truncated { expected: usize, got: usize },
    /// The stored checksum does not match the content
    #[error("{space} color table is corrupt (checksum mismatch)")]
    ChecksumMismatch { space: ColorSpace },
}

/// An immutable table of per-space coordinates, one row per shaded color.
#[derive(Debug, Clone, PartialEq)]
pub struct ColorTable {
    space: ColorSpace,
    rows: Vec<[f32; 3]>,
}

impl ColorTable {
    /// Build a table from a list of base colors.
    ///
    /// Row `base * 4 + tier` holds the shaded color converted into the
    /// table's space. Base 0 is conventionally air; its rows are kept so
    /// that indexing stays uniform, but they are never matched against.
    pub fn generate(space: ColorSpace, base_colors: &[[u8; 3]]) -> Self {
        let mut rows = Vec::with_capacity(base_colors.len() * 4);
        for base in base_colors {
            for tier in [ShadeTier::Low, ShadeTier::Normal, ShadeTier::High, ShadeTier::Lowest] {
                let s = shade(*base, tier);
                let rgb = [s[0] as f32, s[1] as f32, s[2] as f32];
                rows.push(match space {
                    ColorSpace::Rgb => rgb,
                    ColorSpace::Hsv => rgb_to_hsv(rgb),
                    ColorSpace::Lab => rgb_to_lab(rgb),
                    ColorSpace::Xyz => rgb_to_xyz(rgb),
                });
            }
        }
        Self { space, rows }
    }

    /// Serialize the table into its binary container.
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(16 + self.rows.len() * 12);
        out.extend_from_slice(&MAGIC);
        out.extend_from_slice(&self.space.tag());
        out.extend_from_slice(&(self.rows.len() as u32).to_le_bytes());
        for row in &self.rows {
            for v in row {
                out.extend_from_slice(&v.to_le_bytes());
            }
        }
        let mut crc = flate2::Crc::new();
        crc.update(&out);
        out.extend_from_slice(&crc.sum().to_le_bytes());
        out
    }

    /// Parse and verify a table from bytes.
    ///
    /// The caller states which space it expects; a table for any other
    /// space is rejected rather than silently substituted.
    pub fn from_bytes(bytes: &[u8], expected: ColorSpace) -> Result<Self, ColorTableError> {
        if bytes.len() < 12 || bytes[0..4] != MAGIC {
            return Err(ColorTableError::BadMagic);
        }

        let mut tag = [0u8; 4];
        tag.copy_from_slice(&bytes[4..8]);
        let space = ColorSpace::from_tag(tag).ok_or_else(|| ColorTableError::SpaceMismatch {
            expected,
            found: String::from_utf8_lossy(&tag[..3]).into_owned(),
        })?;
        if space != expected {
            return Err(ColorTableError::SpaceMismatch { expected, found: space.to_string() });
        }

        let count = u32::from_le_bytes(bytes[8..12].try_into().unwrap()) as usize;
        let expected_len = 12 + count * 12 + 4;
        if bytes.len() != expected_len {
            return Err(ColorTableError::Truncated { expected: expected_len, got: bytes.len() });
        }

        let body = &bytes[..expected_len - 4];
        let stored = u32::from_le_bytes(bytes[expected_len - 4..].try_into().unwrap());
        let mut crc = flate2::Crc::new();
        crc.update(body);
        if crc.sum() != stored {
            return Err(ColorTableError::ChecksumMismatch { space });
        }

        let mut rows = Vec::with_capacity(count);
        for i in 0..count {
            let off = 12 + i * 12;
            let row = [
                f32::from_le_bytes(bytes[off..off + 4].try_into().unwrap()),
                f32::from_le_bytes(bytes[off + 4..off + 8].try_into().unwrap()),
                f32::from_le_bytes(bytes[off + 8..off + 12].try_into().unwrap()),
            ];
            rows.push(row);
        }

        Ok(Self { space, rows })
    }

    /// Load and verify a table file.
    pub fn load_file(path: &Path, expected: ColorSpace) -> Result<Self, ColorTableError> {
        let bytes = fs::read(path)?;
        Self::from_bytes(&bytes, expected)
    }

    /// The space this table is expressed in.
    pub fn space(&self) -> ColorSpace {
        self.space
    }

    /// Number of rows (shaded colors).
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    /// Whether the table holds no rows.
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Coordinates of one shaded color, if the id is in range.
    pub fn row(&self, id: ColorId) -> Option<[f32; 3]> {
        self.rows.get(id.0 as usize).copied()
    }
}

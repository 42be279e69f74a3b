//! Data model types shared across the conversion pipeline.

pub mod block;
pub mod grid;
pub mod palette;
pub mod volume;

pub use block::{BlockDef, Category};
pub use grid::{IndexGrid, PixelGrid};
pub use palette::{ColorId, EntryOrigin, Palette, PaletteEntry, PaletteError, PaletteWarning, ShadeTier};
pub use volume::{ColumnMap, HeightColumn, Layer, LayerKind, VolumeError, VoxelVolume};

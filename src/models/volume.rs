//! Height columns and the sparse voxel volume.

use std::collections::BTreeMap;
use thiserror::Error;

use crate::models::palette::{ColorId, Palette};

/// What a voxel layer is made of.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LayerKind {
    /// A colored block carrying a shaded palette color
    Surface(ColorId),
    /// A support block (under unsupported blocks, or part of a bridge)
    Support,
}

/// One voxel layer inside a column.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Layer {
    /// Absolute height of the layer
    pub y: u32,
    pub kind: LayerKind,
}

/// The vertical voxel stack at one (x, z) position.
///
/// Layers are kept sorted by strictly increasing height.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct HeightColumn {
    layers: Vec<Layer>,
}

impl HeightColumn {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a layer. Layers must be pushed bottom-up.
    pub fn push(&mut self, layer: Layer) {
        debug_assert!(
            self.layers.last().map_or(true, |top| top.y < layer.y),
            "layers must strictly increase in height"
        );
        self.layers.push(layer);
    }

    pub fn layers(&self) -> &[Layer] {
        &self.layers
    }

    pub fn is_empty(&self) -> bool {
        self.layers.is_empty()
    }

    /// Height of the topmost layer, if any.
    pub fn top(&self) -> Option<u32> {
        self.layers.last().map(|l| l.y)
    }

    /// The colored block of this column (columns hold at most one).
    pub fn surface(&self) -> Option<(u32, ColorId)> {
        self.layers.iter().rev().find_map(|l| match l.kind {
            LayerKind::Surface(id) => Some((l.y, id)),
            LayerKind::Support => None,
        })
    }
}

/// All columns of a synthesized map: `depth` is the image height plus one
/// extra northern anchor row at z = 0.
#[derive(Debug, Clone, PartialEq)]
pub struct ColumnMap {
    width: u32,
    depth: u32,
    columns: Vec<HeightColumn>,
}

impl ColumnMap {
    pub fn new(width: u32, depth: u32) -> Self {
        Self { width, depth, columns: vec![HeightColumn::new(); (width * depth) as usize] }
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn depth(&self) -> u32 {
        self.depth
    }

    pub fn column(&self, x: u32, z: u32) -> &HeightColumn {
        &self.columns[(z * self.width + x) as usize]
    }

    pub fn column_mut(&mut self, x: u32, z: u32) -> &mut HeightColumn {
        &mut self.columns[(z * self.width + x) as usize]
    }

    /// Tallest top height across all columns (0 for an all-air map).
    pub fn max_height(&self) -> u32 {
        self.columns.iter().filter_map(|c| c.top()).max().unwrap_or(0)
    }
}

/// Error when assembling a voxel volume.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum VolumeError {
    /// A column surface id does not resolve to an enabled palette entry
    #[error("color id {0} does not resolve to an enabled palette entry")]
    UnresolvedColor(u16),
}

/// A sparse voxel volume: block ids interned into a local list, voxels
/// keyed by position. Index 0 of the id list is always air.
#[derive(Debug, Clone, PartialEq)]
pub struct VoxelVolume {
    ids: Vec<String>,
    support_index: u16,
    voxels: BTreeMap<(u32, u32, u32), u16>,
    size: (u32, u32, u32),
}

impl VoxelVolume {
    /// Assemble a volume from synthesized (and possibly compressed and
    /// bridged) columns. Every surface id must resolve through the palette.
    pub fn from_columns(columns: &ColumnMap, palette: &Palette) -> Result<Self, VolumeError> {
        let mut volume = VoxelVolume {
            ids: vec!["minecraft:air".to_string()],
            support_index: 0,
            voxels: BTreeMap::new(),
            size: (columns.width(), 0, columns.depth()),
        };
        volume.support_index = volume.intern(&palette.support_block().id.clone());

        for z in 0..columns.depth() {
            for x in 0..columns.width() {
                for layer in columns.column(x, z).layers() {
                    let index = match layer.kind {
                        LayerKind::Support => volume.support_index,
                        LayerKind::Surface(id) => {
                            let entry = palette
                                .resolve(id)
                                .ok_or(VolumeError::UnresolvedColor(id.0))?;
                            let block_id = entry.block.id.clone();
                            volume.intern(&block_id)
                        }
                    };
                    volume.set(x, layer.y, z, index);
                }
            }
        }

        Ok(volume)
    }

    /// Intern a block id, returning its index in the local list.
    pub fn intern(&mut self, id: &str) -> u16 {
        if let Some(pos) = self.ids.iter().position(|existing| existing == id) {
            return pos as u16;
        }
        self.ids.push(id.to_string());
        (self.ids.len() - 1) as u16
    }

    /// Place a block. Re-placing the same block at the same position is a
    /// no-op, which is what makes bridging idempotent.
    pub fn set(&mut self, x: u32, y: u32, z: u32, index: u16) {
        debug_assert!((index as usize) < self.ids.len());
        self.voxels.insert((x, y, z), index);
        self.size.0 = self.size.0.max(x + 1);
        self.size.1 = self.size.1.max(y + 1);
        self.size.2 = self.size.2.max(z + 1);
    }

    pub fn get(&self, x: u32, y: u32, z: u32) -> Option<u16> {
        self.voxels.get(&(x, y, z)).copied()
    }

    /// The interned block id list (index 0 is air).
    pub fn block_ids(&self) -> &[String] {
        &self.ids
    }

    /// Index of the support block in the id list.
    pub fn support_index(&self) -> u16 {
        self.support_index
    }

    /// Deterministic iteration in (x, y, z) lexicographic order.
    pub fn iter(&self) -> impl Iterator<Item = ((u32, u32, u32), u16)> + '_ {
        self.voxels.iter().map(|(&pos, &idx)| (pos, idx))
    }

    /// Number of placed voxels.
    pub fn len(&self) -> usize {
        self.voxels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.voxels.is_empty()
    }

    /// Bounding size (x, y, z); at least the column map's footprint.
    pub fn size(&self) -> (u32, u32, u32) {
        self.size
    }

    /// Top height of the non-support blocks in one column.
    ///
    /// Bridging recomputes this on every run; ignoring support voxels here
    /// is what keeps repeated bridging from stacking new supports.
    pub fn surface_top(&self, x: u32, z: u32) -> Option<u32> {
        self.voxels
            .range((x, 0, z)..=(x, u32::MAX, z))
            .filter(|(&(_, _, vz), &idx)| vz == z && idx != self.support_index)
            .map(|(&(_, y, _), _)| y)
            .max()
    }
}

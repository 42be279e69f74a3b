//! mapart - library for converting raster images into palette-constrained
//! voxel map art
//!
//! This library provides functionality to:
//! - Match image pixels onto a fixed block palette in several color spaces
//! - Quantize whole images, with optional error-diffusion dithering
//! - Synthesize, compress and bridge height columns for 3D map art
//! - Serialize the result as a litematic, a vanilla structure, a
//!   block-placement script or native map-data files
//!
//! The GUI, CLI and file pickers are external collaborators: they load the
//! inputs, own the progress sink and the cancellation token, and call into
//! the pipeline one stage at a time.

pub mod color;
pub mod colortable;
pub mod dither;
pub mod export;
pub mod height;
pub mod matcher;
pub mod models;
pub mod progress;
pub mod quantize;

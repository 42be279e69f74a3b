//! Floyd-Steinberg error diffusion.
//!
//! The scan is serpentine: left to right on even rows, right to left on odd
//! rows, so diffusion artifacts don't drift in one direction. Because every
//! pixel's correction depends on the corrections before it, the pass is
//! inherently sequential within one image; the carried error lives in an
//! explicit two-row accumulator rather than in the image itself.
//!
//! Transparent ("no block") pixels take no part in diffusion: they are never
//! matched, and error headed their way is dropped.

use crate::models::palette::ColorId;

/// Carried quantization error for the current and the following row.
struct ErrorBuffer {
    current: Vec<[f32; 3]>,
    next: Vec<[f32; 3]>,
}

impl ErrorBuffer {
    fn new(width: usize) -> Self {
        Self { current: vec![[0.0; 3]; width], next: vec![[0.0; 3]; width] }
    }

    /// Roll to the next row: carried errors for it become current.
    fn advance(&mut self) {
        std::mem::swap(&mut self.current, &mut self.next);
        for e in self.next.iter_mut() {
            *e = [0.0; 3];
        }
    }

    fn add_current(&mut self, x: usize, err: [f32; 3], weight: f32) {
        let e = &mut self.current[x];
        e[0] += err[0] * weight;
        e[1] += err[1] * weight;
        e[2] += err[2] * weight;
    }

    fn add_next(&mut self, x: usize, err: [f32; 3], weight: f32) {
        let e = &mut self.next[x];
        e[0] += err[0] * weight;
        e[1] += err[1] * weight;
        e[2] += err[2] * weight;
    }
}

/// Run error diffusion over prepared samples.
///
/// `samples` is row-major, `None` marking transparent pixels. `match_px`
/// maps an (x, z, error-adjusted color) to the chosen id and that
/// candidate's actual sRGB color; it is called exactly once per opaque
/// pixel, in scan order.
pub fn error_diffuse<F>(
    width: u32,
    height: u32,
    samples: &[Option<[f32; 3]>],
    mut match_px: F,
) -> Vec<ColorId>
where
    F: FnMut(u32, u32, [f32; 3]) -> (ColorId, [f32; 3]),
{
    let w = width as usize;
    let mut ids = vec![ColorId::AIR; w * height as usize];
    let mut errors = ErrorBuffer::new(w);

    for z in 0..height {
        let reverse = z % 2 == 1;
        for step in 0..width {
            let x = if reverse { width - 1 - step } else { step };
            let idx = (z * width + x) as usize;

            let Some(rgb) = samples[idx] else {
                continue;
            };

            let carried = errors.current[x as usize];
            let adjusted = [
                (rgb[0] + carried[0]).clamp(0.0, 255.0),
                (rgb[1] + carried[1]).clamp(0.0, 255.0),
                (rgb[2] + carried[2]).clamp(0.0, 255.0),
            ];

            let (id, matched) = match_px(x, z, adjusted);
            ids[idx] = id;

            let err = [
                adjusted[0] - matched[0],
                adjusted[1] - matched[1],
                adjusted[2] - matched[2],
            ];

            // Floyd-Steinberg kernel, mirrored on reverse rows:
            //        *   7/16
            // 3/16  5/16  1/16
            let forward: i64 = if reverse { -1 } else { 1 };
            let xi = x as i64;

            distribute(&mut errors, samples, width, height, z, xi + forward, 0, err, 7.0 / 16.0);
            distribute(&mut errors, samples, width, height, z, xi - forward, 1, err, 3.0 / 16.0);
            distribute(&mut errors, samples, width, height, z, xi, 1, err, 5.0 / 16.0);
            distribute(&mut errors, samples, width, height, z, xi + forward, 1, err, 1.0 / 16.0);
        }
        errors.advance();
    }

    ids
}

/// Push a weighted share of the error to a neighbor, dropping it when the
/// target is outside the image or transparent.
#[allow(clippy::too_many_arguments)]
fn distribute(
    errors: &mut ErrorBuffer,
    samples: &[Option<[f32; 3]>],
    width: u32,
    height: u32,
    z: u32,
    x: i64,
    dz: u32,
    err: [f32; 3],
    weight: f32,
) {
    if x < 0 || x >= width as i64 || z + dz >= height {
        return;
    }
    let idx = ((z + dz) * width + x as u32) as usize;
    if samples[idx].is_none() {
        return;
    }
    if dz == 0 {
        errors.add_current(x as usize, err, weight);
    } else {
        errors.add_next(x as usize, err, weight);
    }
}

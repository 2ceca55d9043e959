//! Contrast-limited adaptive histogram equalisation (CLAHE).
//!
//! Each RGB channel is equalised independently over an 8×8 tile grid. Tile
//! histograms are clipped at `clip_limit · tile_pixels` with the excess
//! redistributed evenly; per-pixel output is bilinearly interpolated between
//! the four nearest tile mappings.

use image::{Rgb, RgbImage};

use crate::error::FilterError;
use crate::registry::{Filter, FilterDescriptor, FilterOutput, RunContext};

pub const DEFAULT_GRID: u32 = 8;
pub const DEFAULT_CLIP_LIMIT: f64 = 0.01;

const BINS: usize = 256;

pub struct ClaheFilter {
    descriptor: FilterDescriptor,
    grid: u32,
    clip_limit: f64,
}

impl ClaheFilter {
    pub fn new() -> Self {
        Self::with_params(DEFAULT_GRID, DEFAULT_CLIP_LIMIT)
    }

    pub fn with_params(grid: u32, clip_limit: f64) -> Self {
        Self {
            descriptor: FilterDescriptor::new(
                "adaptive_histograph_equalisation",
                "Adaptive Contrast",
                "Boosts local contrast tile by tile while limiting noise amplification.",
            ),
            grid: grid.max(1),
            clip_limit,
        }
    }
}

impl Default for ClaheFilter {
    fn default() -> Self {
        Self::new()
    }
}

/// Tile boundaries splitting `len` into `tiles` near-equal spans.
fn spans(len: u32, tiles: u32) -> Vec<(u32, u32)> {
    (0..tiles)
        .map(|t| (t * len / tiles, (t + 1) * len / tiles))
        .collect()
}

/// Clipped-histogram equalisation lookup table for one tile.
fn tile_lut(histogram: &mut [u32; BINS], pixels: u32, clip_limit: f64) -> [u8; BINS] {
    let clip = ((clip_limit * pixels as f64) as u32).max(1);

    let mut excess = 0u32;
    for bin in histogram.iter_mut() {
        if *bin > clip {
            excess += *bin - clip;
            *bin = clip;
        }
    }

    let share = excess / BINS as u32;
    let remainder = (excess % BINS as u32) as usize;
    histogram.iter_mut().for_each(|bin| *bin += share);
    if remainder > 0 {
        let step = BINS / remainder;
        for i in (0..BINS).step_by(step).take(remainder) {
            histogram[i] += 1;
        }
    }

    let total: u32 = histogram.iter().sum();
    let mut lut = [0u8; BINS];
    let mut cdf = 0u32;
    for (value, bin) in histogram.iter().enumerate() {
        cdf += bin;
        lut[value] = if total == 0 {
            value as u8
        } else {
            ((cdf as f64 * 255.0 / total as f64).round()).min(255.0) as u8
        };
    }
    lut
}

/// Lower tile index and interpolation weight for a pixel coordinate.
#[inline]
fn tile_coord(pos: u32, len: u32, tiles: u32) -> (usize, usize, f32) {
    let g = (pos as f32 + 0.5) / len as f32 * tiles as f32 - 0.5;
    let lo = g.floor().clamp(0.0, (tiles - 1) as f32) as usize;
    let hi = (lo + 1).min(tiles as usize - 1);
    let frac = (g - lo as f32).clamp(0.0, 1.0);
    (lo, hi, frac)
}

/// Equalise one channel of `image` into `out`.
fn equalise_channel(image: &RgbImage, out: &mut RgbImage, channel: usize, grid: u32, clip_limit: f64) {
    let (w, h) = image.dimensions();
    let tiles_x = grid.min(w);
    let tiles_y = grid.min(h);
    let xs = spans(w, tiles_x);
    let ys = spans(h, tiles_y);

    let mut luts = vec![[0u8; BINS]; (tiles_x * tiles_y) as usize];
    for (ty, &(y0, y1)) in ys.iter().enumerate() {
        for (tx, &(x0, x1)) in xs.iter().enumerate() {
            let mut histogram = [0u32; BINS];
            for y in y0..y1 {
                for x in x0..x1 {
                    histogram[image.get_pixel(x, y).0[channel] as usize] += 1;
                }
            }
            let pixels = (x1 - x0) * (y1 - y0);
            luts[ty * tiles_x as usize + tx] = tile_lut(&mut histogram, pixels, clip_limit);
        }
    }

    for y in 0..h {
        let (ty0, ty1, fy) = tile_coord(y, h, tiles_y);
        for x in 0..w {
            let (tx0, tx1, fx) = tile_coord(x, w, tiles_x);
            let v = image.get_pixel(x, y).0[channel] as usize;
            let lut = |tx: usize, ty: usize| luts[ty * tiles_x as usize + tx][v] as f32;

            let top = lut(tx0, ty0) * (1.0 - fx) + lut(tx1, ty0) * fx;
            let bottom = lut(tx0, ty1) * (1.0 - fx) + lut(tx1, ty1) * fx;
            let value = top * (1.0 - fy) + bottom * fy;

            out.get_pixel_mut(x, y).0[channel] = value.round().clamp(0.0, 255.0) as u8;
        }
    }
}

impl Filter for ClaheFilter {
    fn descriptor(&self) -> &FilterDescriptor {
        &self.descriptor
    }

    fn apply(&self, image: &RgbImage, _ctx: &mut RunContext) -> Result<FilterOutput, FilterError> {
        let (w, h) = image.dimensions();
        if w == 0 || h == 0 {
            return Err(FilterError::ImageTooSmall {
                filter: self.descriptor.name.clone(),
                width: w,
                height: h,
            });
        }

        let mut out = RgbImage::from_pixel(w, h, Rgb([0, 0, 0]));
        for channel in 0..3 {
            equalise_channel(image, &mut out, channel, self.grid, self.clip_limit);
        }
        Ok(FilterOutput::Image(out))
    }
}

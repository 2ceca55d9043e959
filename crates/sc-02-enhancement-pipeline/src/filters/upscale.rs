//! 2× Lanczos3 upscale.

use image::imageops::{self, FilterType};
use image::RgbImage;

use crate::error::FilterError;
use crate::registry::{Filter, FilterDescriptor, FilterOutput, RunContext};

pub const SCALE_FACTOR: u32 = 2;

/// Largest output the filter will allocate.
pub const MAX_OUTPUT_PIXELS: u64 = 40_000_000;

pub struct UpscaleFilter {
    descriptor: FilterDescriptor,
}

impl UpscaleFilter {
    pub fn new() -> Self {
        Self {
            descriptor: FilterDescriptor::new(
                "super_res_upscale",
                "Upscale 2x",
                "Doubles the resolution with Lanczos resampling.",
            ),
        }
    }
}

impl Default for UpscaleFilter {
    fn default() -> Self {
        Self::new()
    }
}

impl Filter for UpscaleFilter {
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

        let (out_w, out_h) = (w as u64 * SCALE_FACTOR as u64, h as u64 * SCALE_FACTOR as u64);
        let pixels = out_w * out_h;
        if pixels > MAX_OUTPUT_PIXELS || out_w > u32::MAX as u64 || out_h > u32::MAX as u64 {
            return Err(FilterError::ImageTooLarge {
                filter: self.descriptor.name.clone(),
                pixels,
                max: MAX_OUTPUT_PIXELS,
            });
        }

        Ok(FilterOutput::Image(imageops::resize(
            image,
            out_w as u32,
            out_h as u32,
            FilterType::Lanczos3,
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgb;

    #[test]
    fn test_doubles_dimensions() {
        let image = RgbImage::from_pixel(12, 7, Rgb([10, 200, 30]));
        match UpscaleFilter::new()
            .apply(&image, &mut RunContext::default())
            .unwrap()
        {
            FilterOutput::Image(out) => {
                assert_eq!(out.dimensions(), (24, 14));
                // flat input stays flat
                assert!(out.pixels().all(|p| (p.0[1] as i32 - 200).abs() <= 1));
            }
            FilterOutput::Measurement => panic!("expected image"),
        }
    }

    #[test]
    fn test_rejects_oversized_output() {
        // 4000x3000 -> 48 MP
        let image = RgbImage::new(4000, 3000);
        let err = UpscaleFilter::new()
            .apply(&image, &mut RunContext::default())
            .unwrap_err();
        assert!(matches!(err, FilterError::ImageTooLarge { pixels: 48_000_000, .. }));
    }
}

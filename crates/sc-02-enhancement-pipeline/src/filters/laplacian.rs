//! Sharpness measurement via variance of the Laplacian.
//!
//! Low variance means few edges, i.e. a blurry image.

use image::RgbImage;

use super::plane::{luma, Plane};
use crate::error::FilterError;
use crate::registry::{Filter, FilterDescriptor, FilterOutput, RunContext};

pub struct LaplacianVarianceFilter {
    descriptor: FilterDescriptor,
}

impl LaplacianVarianceFilter {
    pub fn new() -> Self {
        Self {
            descriptor: FilterDescriptor::new(
                "laplacian_variance",
                "Sharpness Estimate",
                "Measures image sharpness so later filters can adapt their strength.",
            ),
        }
    }
}

impl Default for LaplacianVarianceFilter {
    fn default() -> Self {
        Self::new()
    }
}

/// Variance of the 4-neighbour Laplacian of the luma plane.
pub fn laplacian_variance(image: &RgbImage) -> f64 {
    let gray = luma(image);
    let (w, h) = (gray.width, gray.height);
    let mut response = Plane::filled(w, h, 0.0);

    for y in 0..h as isize {
        for x in 0..w as isize {
            let centre = gray.at_clamped(x, y);
            response.data[y as usize * w + x as usize] = gray.at_clamped(x - 1, y)
                + gray.at_clamped(x + 1, y)
                + gray.at_clamped(x, y - 1)
                + gray.at_clamped(x, y + 1)
                - 4.0 * centre;
        }
    }

    response.variance()
}

impl Filter for LaplacianVarianceFilter {
    fn descriptor(&self) -> &FilterDescriptor {
        &self.descriptor
    }

    fn apply(&self, image: &RgbImage, ctx: &mut RunContext) -> Result<FilterOutput, FilterError> {
        let (w, h) = image.dimensions();
        if w == 0 || h == 0 {
            return Err(FilterError::ImageTooSmall {
                filter: self.descriptor.name.clone(),
                width: w,
                height: h,
            });
        }

        let sharpness = laplacian_variance(image);
        tracing::debug!(sharpness, "Measured Laplacian variance");
        ctx.sharpness = Some(sharpness);
        Ok(FilterOutput::Measurement)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgb;

    #[test]
    fn test_flat_image_has_zero_sharpness() {
        let image = RgbImage::from_pixel(10, 10, Rgb([90, 90, 90]));
        assert!(laplacian_variance(&image) < 1e-9);
    }

    #[test]
    fn test_checkerboard_sharper_than_gradient() {
        let checker = RgbImage::from_fn(32, 32, |x, y| {
            if (x + y) % 2 == 0 {
                Rgb([255, 255, 255])
            } else {
                Rgb([0, 0, 0])
            }
        });
        let gradient = RgbImage::from_fn(32, 32, |x, _| Rgb([(x * 8) as u8; 3]));
        assert!(laplacian_variance(&checker) > laplacian_variance(&gradient));
    }

    #[test]
    fn test_sets_context_and_returns_measurement() {
        let image = RgbImage::from_fn(8, 8, |x, y| Rgb([(x * y) as u8, 0, 0]));
        let mut ctx = RunContext::default();
        let output = LaplacianVarianceFilter::new().apply(&image, &mut ctx).unwrap();

        assert_eq!(output, FilterOutput::Measurement);
        assert!(ctx.sharpness.is_some());
    }

    #[test]
    fn test_single_pixel_image() {
        let image = RgbImage::from_pixel(1, 1, Rgb([10, 20, 30]));
        assert!(laplacian_variance(&image) < 1e-9);
    }
}

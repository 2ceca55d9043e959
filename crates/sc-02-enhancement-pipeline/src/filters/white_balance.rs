//! LAB-space white balance.
//!
//! Works on 8-bit-scaled CIELAB (`L` in 0..255, `a`/`b` offset by 128) and
//! pulls the mean chroma toward neutral, weighted by lightness:
//!
//! ```text
//! a' = a - (mean(a) - 128) * (L / 255) * 0.8
//! b' = b - (mean(b) - 128) * (L / 255) * 0.8
//! ```

use image::{Rgb, RgbImage};

use crate::error::FilterError;
use crate::registry::{Filter, FilterDescriptor, FilterOutput, RunContext};

/// How strongly the chroma cast is removed.
const CORRECTION_STRENGTH: f32 = 0.8;

// D65 reference white
const XN: f32 = 0.950_456;
const ZN: f32 = 1.088_754;

pub struct WhiteBalanceFilter {
    descriptor: FilterDescriptor,
}

impl WhiteBalanceFilter {
    pub fn new() -> Self {
        Self {
            descriptor: FilterDescriptor::new(
                "white_balance",
                "White Balance",
                "Removes colour casts by neutralising the average chroma in LAB space.",
            ),
        }
    }
}

impl Default for WhiteBalanceFilter {
    fn default() -> Self {
        Self::new()
    }
}

impl Filter for WhiteBalanceFilter {
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

        let lab: Vec<[f32; 3]> = image.pixels().map(|p| rgb_to_lab8(p.0)).collect();
        let n = lab.len() as f32;
        let mean_a = lab.iter().map(|p| p[1]).sum::<f32>() / n;
        let mean_b = lab.iter().map(|p| p[2]).sum::<f32>() / n;

        let mut out = RgbImage::new(w, h);
        for (dst, &[l, a, b]) in out.pixels_mut().zip(lab.iter()) {
            let weight = (l / 255.0) * CORRECTION_STRENGTH;
            let a = (a - (mean_a - 128.0) * weight).clamp(0.0, 255.0);
            let b = (b - (mean_b - 128.0) * weight).clamp(0.0, 255.0);
            *dst = Rgb(lab8_to_rgb([l, a, b]));
        }

        Ok(FilterOutput::Image(out))
    }
}

#[inline]
fn srgb_to_linear(c: f32) -> f32 {
    if c <= 0.040_45 {
        c / 12.92
    } else {
        ((c + 0.055) / 1.055).powf(2.4)
    }
}

#[inline]
fn linear_to_srgb(c: f32) -> f32 {
    if c <= 0.003_130_8 {
        c * 12.92
    } else {
        1.055 * c.powf(1.0 / 2.4) - 0.055
    }
}

#[inline]
fn lab_f(t: f32) -> f32 {
    if t > 0.008_856 {
        t.cbrt()
    } else {
        7.787 * t + 16.0 / 116.0
    }
}

#[inline]
fn lab_f_inv(t: f32) -> f32 {
    let t3 = t * t * t;
    if t3 > 0.008_856 {
        t3
    } else {
        (t - 16.0 / 116.0) / 7.787
    }
}

/// sRGB → CIELAB with 8-bit channel scaling.
fn rgb_to_lab8(rgb: [u8; 3]) -> [f32; 3] {
    let r = srgb_to_linear(rgb[0] as f32 / 255.0);
    let g = srgb_to_linear(rgb[1] as f32 / 255.0);
    let b = srgb_to_linear(rgb[2] as f32 / 255.0);

    let x = (0.412_453 * r + 0.357_580 * g + 0.180_423 * b) / XN;
    let y = 0.212_671 * r + 0.715_160 * g + 0.072_169 * b;
    let z = (0.019_334 * r + 0.119_193 * g + 0.950_227 * b) / ZN;

    let (fx, fy, fz) = (lab_f(x), lab_f(y), lab_f(z));
    let l = if y > 0.008_856 {
        116.0 * fy - 16.0
    } else {
        903.3 * y
    };

    [
        l * 255.0 / 100.0,
        500.0 * (fx - fy) + 128.0,
        200.0 * (fy - fz) + 128.0,
    ]
}

/// Inverse of [`rgb_to_lab8`].
fn lab8_to_rgb(lab: [f32; 3]) -> [u8; 3] {
    let l = lab[0] * 100.0 / 255.0;
    let a = lab[1] - 128.0;
    let b = lab[2] - 128.0;

    let fy = (l + 16.0) / 116.0;
    let fx = fy + a / 500.0;
    let fz = fy - b / 200.0;

    let x = lab_f_inv(fx) * XN;
    let y = if l > 903.3 * 0.008_856 {
        fy * fy * fy
    } else {
        l / 903.3
    };
    let z = lab_f_inv(fz) * ZN;

    let r = 3.240_479 * x - 1.537_150 * y - 0.498_535 * z;
    let g = -0.969_256 * x + 1.875_992 * y + 0.041_556 * z;
    let bl = 0.055_648 * x - 0.204_043 * y + 1.057_311 * z;

    [r, g, bl].map(|c| (linear_to_srgb(c.clamp(0.0, 1.0)) * 255.0).round().clamp(0.0, 255.0) as u8)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn apply(image: &RgbImage) -> RgbImage {
        match WhiteBalanceFilter::new()
            .apply(image, &mut RunContext::default())
            .unwrap()
        {
            FilterOutput::Image(img) => img,
            FilterOutput::Measurement => panic!("white balance must produce an image"),
        }
    }

    #[test]
    fn test_lab_round_trip() {
        for rgb in [[0, 0, 0], [255, 255, 255], [200, 40, 90], [12, 180, 240]] {
            let back = lab8_to_rgb(rgb_to_lab8(rgb));
            for c in 0..3 {
                assert!(
                    (back[c] as i32 - rgb[c] as i32).abs() <= 1,
                    "{rgb:?} -> {back:?}"
                );
            }
        }
    }

    #[test]
    fn test_gray_is_neutral() {
        let lab = rgb_to_lab8([128, 128, 128]);
        assert!((lab[1] - 128.0).abs() < 0.5);
        assert!((lab[2] - 128.0).abs() < 0.5);
    }

    #[test]
    fn test_reduces_blue_cast() {
        // underwater-style cast: strong blue/green
        let image = RgbImage::from_fn(16, 16, |x, _| Rgb([40 + x as u8, 120, 200]));
        let out = apply(&image);

        let cast = |img: &RgbImage| {
            let n = (img.width() * img.height()) as f32;
            img.pixels().map(|p| rgb_to_lab8(p.0)[2]).sum::<f32>() / n - 128.0
        };
        assert!(cast(&out).abs() < cast(&image).abs());
    }

    #[test]
    fn test_gray_image_unchanged() {
        let image = RgbImage::from_pixel(8, 8, Rgb([100, 100, 100]));
        let out = apply(&image);
        for (a, b) in image.pixels().zip(out.pixels()) {
            for c in 0..3 {
                assert!((a.0[c] as i32 - b.0[c] as i32).abs() <= 1);
            }
        }
    }
}

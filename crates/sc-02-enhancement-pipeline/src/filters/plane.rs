//! Single-channel float planes and separable convolution.
//!
//! Borders replicate the edge pixel.

use image::{Rgb, RgbImage};
use rayon::prelude::*;

/// A row-major single-channel image.
#[derive(Debug, Clone, PartialEq)]
pub struct Plane {
    pub width: usize,
    pub height: usize,
    pub data: Vec<f32>,
}

impl Plane {
    pub fn filled(width: usize, height: usize, value: f32) -> Self {
        Self {
            width,
            height,
            data: vec![value; width * height],
        }
    }

    #[inline]
    pub fn at_clamped(&self, x: isize, y: isize) -> f32 {
        let x = x.clamp(0, self.width as isize - 1) as usize;
        let y = y.clamp(0, self.height as isize - 1) as usize;
        self.data[y * self.width + x]
    }

    pub fn mean(&self) -> f64 {
        if self.data.is_empty() {
            return 0.0;
        }
        self.data.iter().map(|&v| v as f64).sum::<f64>() / self.data.len() as f64
    }

    pub fn variance(&self) -> f64 {
        if self.data.is_empty() {
            return 0.0;
        }
        let mean = self.mean();
        self.data
            .iter()
            .map(|&v| {
                let d = v as f64 - mean;
                d * d
            })
            .sum::<f64>()
            / self.data.len() as f64
    }
}

/// Split an RGB image into three planes scaled to `[0, 1]`.
pub fn split_rgb(image: &RgbImage) -> [Plane; 3] {
    let (w, h) = (image.width() as usize, image.height() as usize);
    let mut planes = [
        Plane::filled(w, h, 0.0),
        Plane::filled(w, h, 0.0),
        Plane::filled(w, h, 0.0),
    ];
    for (i, px) in image.pixels().enumerate() {
        for (c, plane) in planes.iter_mut().enumerate() {
            plane.data[i] = px.0[c] as f32 / 255.0;
        }
    }
    planes
}

/// Inverse of [`split_rgb`], clamping to the valid range.
pub fn merge_rgb(planes: &[Plane; 3]) -> RgbImage {
    let (w, h) = (planes[0].width, planes[0].height);
    RgbImage::from_fn(w as u32, h as u32, |x, y| {
        let i = y as usize * w + x as usize;
        Rgb([
            to_u8(planes[0].data[i]),
            to_u8(planes[1].data[i]),
            to_u8(planes[2].data[i]),
        ])
    })
}

/// BT.601 luma in `[0, 255]`.
pub fn luma(image: &RgbImage) -> Plane {
    let (w, h) = (image.width() as usize, image.height() as usize);
    let data = image
        .pixels()
        .map(|p| 0.299 * p.0[0] as f32 + 0.587 * p.0[1] as f32 + 0.114 * p.0[2] as f32)
        .collect();
    Plane {
        width: w,
        height: h,
        data,
    }
}

#[inline]
fn to_u8(v: f32) -> u8 {
    (v * 255.0).round().clamp(0.0, 255.0) as u8
}

/// Normalised 1-D Gaussian of odd length `size`.
pub fn gaussian_kernel(size: usize, sigma: f32) -> Vec<f32> {
    let size = size.max(1) | 1;
    let radius = (size / 2) as isize;
    let sigma = sigma.max(f32::EPSILON);
    let mut kernel: Vec<f32> = (-radius..=radius)
        .map(|i| (-(i * i) as f32 / (2.0 * sigma * sigma)).exp())
        .collect();
    let sum: f32 = kernel.iter().sum();
    kernel.iter_mut().for_each(|k| *k /= sum);
    kernel
}

/// Convolve with a symmetric separable kernel (horizontal then vertical).
pub fn convolve_separable(plane: &Plane, kernel: &[f32]) -> Plane {
    let (w, h) = (plane.width, plane.height);
    if w == 0 || h == 0 {
        return plane.clone();
    }
    let radius = (kernel.len() / 2) as isize;

    let mut horizontal = vec![0.0f32; w * h];
    horizontal
        .par_chunks_mut(w)
        .enumerate()
        .for_each(|(y, row)| {
            for (x, out) in row.iter_mut().enumerate() {
                *out = kernel
                    .iter()
                    .enumerate()
                    .map(|(k, weight)| {
                        weight * plane.at_clamped(x as isize + k as isize - radius, y as isize)
                    })
                    .sum();
            }
        });
    let horizontal = Plane {
        width: w,
        height: h,
        data: horizontal,
    };

    let mut vertical = vec![0.0f32; w * h];
    vertical.par_chunks_mut(w).enumerate().for_each(|(y, row)| {
        for (x, out) in row.iter_mut().enumerate() {
            *out = kernel
                .iter()
                .enumerate()
                .map(|(k, weight)| {
                    weight * horizontal.at_clamped(x as isize, y as isize + k as isize - radius)
                })
                .sum();
        }
    });

    Plane {
        width: w,
        height: h,
        data: vertical,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_gaussian_kernel_normalised_and_symmetric() {
        let k = gaussian_kernel(5, 5.0 / 3.0);
        assert_eq!(k.len(), 5);
        assert!((k.iter().sum::<f32>() - 1.0).abs() < 1e-5);
        assert_eq!(k[0], k[4]);
        assert!(k[2] > k[1]);
    }

    #[test]
    fn test_even_kernel_size_rounds_up() {
        assert_eq!(gaussian_kernel(4, 1.0).len(), 5);
    }

    #[test]
    fn test_convolving_constant_is_identity() {
        let plane = Plane::filled(7, 5, 0.25);
        let out = convolve_separable(&plane, &gaussian_kernel(5, 1.0));
        assert!(out.data.iter().all(|v| (v - 0.25).abs() < 1e-6));
    }

    #[test]
    fn test_split_merge_round_trip() {
        let img = RgbImage::from_fn(6, 4, |x, y| Rgb([x as u8 * 40, y as u8 * 60, 7]));
        assert_eq!(merge_rgb(&split_rgb(&img)), img);
    }

    #[test]
    fn test_variance() {
        let plane = Plane {
            width: 4,
            height: 1,
            data: vec![0.0, 0.0, 2.0, 2.0],
        };
        assert!((plane.mean() - 1.0).abs() < 1e-12);
        assert!((plane.variance() - 1.0).abs() < 1e-12);
    }
}

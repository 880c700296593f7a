//! Percentile-stretch normalization of raw reflectance bands.
//!
//! Converts three equally shaped bands of raw sensor samples into an 8-bit
//! RGB image suitable for display and persistence.
//!
//! # Algorithm
//!
//! ```text
//! [red, green, blue] ──► percentiles(low, high) over all samples
//!                    ──► clip(value, low, high)
//!                    ──► (value - low) / (high - low + ε) × 255
//!                    ──► u8
//! ```
//!
//! The percentiles are computed once per call across the stacked samples of
//! all three bands, not per band, so the colour balance of the scene is kept.

use image::{imageops, RgbImage};
use ndarray::Array2;
use thiserror::Error;

/// Default lower percentile for the stretch.
pub const DEFAULT_LOW_PERCENTILE: f64 = 2.0;

/// Default upper percentile for the stretch.
pub const DEFAULT_HIGH_PERCENTILE: f64 = 98.0;

/// Guards the rescale against a zero-width range on uniform scenes.
const EPSILON: f64 = 1e-8;

/// Errors raised while normalizing band data.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum NormalizeError {
    /// The three bands do not share a shape.
    #[error("band shapes differ: {red:?}, {green:?}, {blue:?}")]
    ShapeMismatch {
        red: (usize, usize),
        green: (usize, usize),
        blue: (usize, usize),
    },

    /// The bands contain no samples.
    #[error("bands are empty")]
    Empty,

    /// Percentiles outside 0..=100 or in the wrong order.
    #[error("invalid percentile range {low}..{high}")]
    InvalidPercentiles { low: f64, high: f64 },
}

/// Stretch parameters for [`normalize`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Stretch {
    pub low_percentile: f64,
    pub high_percentile: f64,
}

impl Default for Stretch {
    fn default() -> Self {
        Self {
            low_percentile: DEFAULT_LOW_PERCENTILE,
            high_percentile: DEFAULT_HIGH_PERCENTILE,
        }
    }
}

impl Stretch {
    pub fn new(low_percentile: f64, high_percentile: f64) -> Self {
        Self {
            low_percentile,
            high_percentile,
        }
    }
}

/// Normalizes three raw bands into an 8-bit RGB image.
///
/// The output has the same height and width as the input bands. Every
/// output sample is in `0..=255` by construction; a uniform scene maps to
/// an all-zero image.
///
/// # Arguments
///
/// * `bands` - Red, green and blue samples, all of the same shape
/// * `stretch` - Percentiles used to clip before rescaling
pub fn normalize(bands: [&Array2<f32>; 3], stretch: Stretch) -> Result<RgbImage, NormalizeError> {
    let [red, green, blue] = bands;
    if red.dim() != green.dim() || red.dim() != blue.dim() {
        return Err(NormalizeError::ShapeMismatch {
            red: red.dim(),
            green: green.dim(),
            blue: blue.dim(),
        });
    }
    if red.is_empty() {
        return Err(NormalizeError::Empty);
    }

    let Stretch {
        low_percentile,
        high_percentile,
    } = stretch;
    if !(0.0..=100.0).contains(&low_percentile)
        || !(0.0..=100.0).contains(&high_percentile)
        || low_percentile > high_percentile
    {
        return Err(NormalizeError::InvalidPercentiles {
            low: low_percentile,
            high: high_percentile,
        });
    }

    let mut stacked: Vec<f64> = bands
        .iter()
        .flat_map(|band| band.iter())
        .filter(|v| v.is_finite())
        .map(|&v| v as f64)
        .collect();
    stacked.sort_unstable_by(|a, b| a.total_cmp(b));

    // A scene without finite samples has no range to stretch; it renders black.
    let (low, high) = if stacked.is_empty() {
        (0.0, 0.0)
    } else {
        (
            percentile(&stacked, low_percentile),
            percentile(&stacked, high_percentile),
        )
    };
    let (low, high) = if low.is_finite() && high.is_finite() && low <= high {
        (low, high)
    } else {
        (0.0, 0.0)
    };

    let (height, width) = red.dim();
    let scale = |value: f32| -> u8 {
        if !value.is_finite() {
            return 0;
        }
        let clipped = (value as f64).clamp(low, high);
        ((clipped - low) / (high - low + EPSILON) * 255.0) as u8
    };

    Ok(RgbImage::from_fn(width as u32, height as u32, |x, y| {
        let (row, col) = (y as usize, x as usize);
        image::Rgb([
            scale(red[[row, col]]),
            scale(green[[row, col]]),
            scale(blue[[row, col]]),
        ])
    }))
}

/// Resizes an image to exactly `resolution × resolution`.
///
/// Images already at the target size are returned unchanged. Nearest
/// neighbour sampling keeps the output samples drawn from the input.
pub fn fit_to_resolution(image: RgbImage, resolution: u32) -> RgbImage {
    if image.width() == resolution && image.height() == resolution {
        return image;
    }
    imageops::resize(&image, resolution, resolution, imageops::FilterType::Nearest)
}

/// Linear-interpolated percentile of an ascending, non-empty slice.
fn percentile(sorted: &[f64], pct: f64) -> f64 {
    let rank = pct / 100.0 * (sorted.len() - 1) as f64;
    let lower = rank.floor() as usize;
    let upper = rank.ceil() as usize;
    let weight = rank - lower as f64;
    sorted[lower] + (sorted[upper] - sorted[lower]) * weight
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ramp(rows: usize, cols: usize, offset: f32) -> Array2<f32> {
        Array2::from_shape_fn((rows, cols), |(r, c)| (r * cols + c) as f32 + offset)
    }

    #[test]
    fn test_percentile_interpolates() {
        let values = [0.0, 10.0, 20.0, 30.0, 40.0];
        assert_eq!(percentile(&values, 0.0), 0.0);
        assert_eq!(percentile(&values, 100.0), 40.0);
        assert_eq!(percentile(&values, 50.0), 20.0);
        assert!((percentile(&values, 10.0) - 4.0).abs() < 1e-9);
    }

    #[test]
    fn test_output_matches_band_shape() {
        let band = ramp(4, 6, 0.0);
        let image = normalize([&band, &band, &band], Stretch::default()).unwrap();
        assert_eq!(image.width(), 6);
        assert_eq!(image.height(), 4);
    }

    #[test]
    fn test_full_stretch_spans_range() {
        let band = ramp(10, 10, 100.0);
        let image = normalize([&band, &band, &band], Stretch::new(0.0, 100.0)).unwrap();
        assert_eq!(image.get_pixel(0, 0)[0], 0);
        // (high - low) / (high - low + ε) × 255 truncates just below 255.
        assert!(image.get_pixel(9, 9)[0] >= 254);
    }

    #[test]
    fn test_outliers_are_clipped() {
        let mut band = Array2::<f32>::from_elem((10, 10), 500.0);
        band[[0, 0]] = 1_000_000.0;
        band[[9, 9]] = -1_000_000.0;
        let image = normalize([&band, &band, &band], Stretch::default()).unwrap();
        // Clipping collapses the outliers onto the scene's flat value.
        assert_eq!(image.get_pixel(0, 0)[0], image.get_pixel(5, 5)[0]);
        assert_eq!(image.get_pixel(9, 9)[0], image.get_pixel(5, 5)[0]);
    }

    #[test]
    fn test_uniform_scene_is_black() {
        let band = Array2::<f32>::from_elem((8, 8), 1234.0);
        let image = normalize([&band, &band, &band], Stretch::default()).unwrap();
        assert!(image.pixels().all(|p| p.0 == [0, 0, 0]));
    }

    #[test]
    fn test_equal_percentiles_are_deterministic() {
        let band = ramp(8, 8, 0.0);
        let first = normalize([&band, &band, &band], Stretch::new(50.0, 50.0)).unwrap();
        let second = normalize([&band, &band, &band], Stretch::new(50.0, 50.0)).unwrap();
        assert_eq!(first, second);
        assert!(first.pixels().all(|p| p.0 == [0, 0, 0]));
    }

    #[test]
    fn test_percentiles_shared_across_bands() {
        let dark = Array2::<f32>::from_elem((4, 4), 0.0);
        let bright = Array2::<f32>::from_elem((4, 4), 1000.0);
        let image = normalize([&bright, &dark, &dark], Stretch::new(0.0, 100.0)).unwrap();
        let pixel = image.get_pixel(2, 2);
        assert!(pixel[0] >= 254);
        assert_eq!(pixel[1], 0);
        assert_eq!(pixel[2], 0);
    }

    #[test]
    fn test_nan_samples_render_black() {
        let mut band = ramp(4, 4, 0.0);
        band[[1, 1]] = f32::NAN;
        let image = normalize([&band, &band, &band], Stretch::default()).unwrap();
        assert_eq!(image.get_pixel(1, 1).0, [0, 0, 0]);
    }

    #[test]
    fn test_infinite_sample_renders_black() {
        let mut band = ramp(8, 8, 1.0);
        band[[0, 0]] = f32::INFINITY;
        let image = normalize([&band, &band, &band], Stretch::new(0.0, 100.0)).unwrap();
        assert_eq!(image.dimensions(), (8, 8));
        assert_eq!(image.get_pixel(0, 0).0, [0, 0, 0]);
        // The stretch covers the finite samples only.
        assert_eq!(image.get_pixel(1, 0)[0], 0);
        assert!(image.get_pixel(7, 7)[0] >= 254);
    }

    #[test]
    fn test_negative_infinity_is_excluded_from_stretch() {
        let mut band = ramp(8, 8, 1.0);
        band[[7, 7]] = f32::NEG_INFINITY;
        let image = normalize([&band, &band, &band], Stretch::new(0.0, 100.0)).unwrap();
        assert_eq!(image.get_pixel(7, 7).0, [0, 0, 0]);
        assert!(image.get_pixel(6, 7)[0] >= 254);
    }

    #[test]
    fn test_non_finite_scene_is_black() {
        let nan = Array2::<f32>::from_elem((4, 4), f32::NAN);
        let inf = Array2::<f32>::from_elem((4, 4), f32::INFINITY);
        let image = normalize([&nan, &inf, &nan], Stretch::default()).unwrap();
        assert_eq!(image.dimensions(), (4, 4));
        assert!(image.pixels().all(|p| p.0 == [0, 0, 0]));
    }

    #[test]
    fn test_shape_mismatch_rejected() {
        let a = ramp(4, 4, 0.0);
        let b = ramp(4, 5, 0.0);
        let result = normalize([&a, &b, &a], Stretch::default());
        assert!(matches!(result, Err(NormalizeError::ShapeMismatch { .. })));
    }

    #[test]
    fn test_empty_rejected() {
        let empty = Array2::<f32>::zeros((0, 0));
        let result = normalize([&empty, &empty, &empty], Stretch::default());
        assert_eq!(result, Err(NormalizeError::Empty));
    }

    #[test]
    fn test_inverted_percentiles_rejected() {
        let band = ramp(2, 2, 0.0);
        let result = normalize([&band, &band, &band], Stretch::new(98.0, 2.0));
        assert!(matches!(
            result,
            Err(NormalizeError::InvalidPercentiles { .. })
        ));
    }

    #[test]
    fn test_fit_to_resolution() {
        let small = RgbImage::from_pixel(3, 5, image::Rgb([7, 8, 9]));
        let fitted = fit_to_resolution(small, 16);
        assert_eq!(fitted.dimensions(), (16, 16));
        assert!(fitted.pixels().all(|p| p.0 == [7, 8, 9]));
    }

    mod property_tests {
        use super::*;
        use proptest::prelude::*;

        proptest! {
            #[test]
            fn test_shape_and_range_hold(
                rows in 1usize..12,
                cols in 1usize..12,
                seed in any::<u32>(),
                low in 0.0..50.0_f64,
                span in 0.0..50.0_f64,
            ) {
                let band = |k: u32| Array2::from_shape_fn((rows, cols), |(r, c)| {
                    let mixed = (r as u32 * 31 + c as u32 * 17 + k)
                        .wrapping_mul(seed | 1);
                    (mixed % 65_536) as f32 - 1_000.0
                });
                let (red, green, blue) = (band(1), band(2), band(3));
                let resolution = 8;
                let image = fit_to_resolution(
                    normalize([&red, &green, &blue], Stretch::new(low, low + span))?,
                    resolution,
                );
                prop_assert_eq!(image.dimensions(), (resolution, resolution));
                prop_assert_eq!(image.as_raw().len(), (resolution * resolution * 3) as usize);
            }

            #[test]
            fn test_non_finite_samples_never_fail(
                rows in 1usize..10,
                cols in 1usize..10,
                samples in prop::collection::vec(
                    prop_oneof![
                        4 => -1.0e6..1.0e6_f32,
                        1 => Just(f32::INFINITY),
                        1 => Just(f32::NEG_INFINITY),
                        1 => Just(f32::NAN),
                    ],
                    100,
                ),
                low in 0.0..50.0_f64,
                span in 0.0..50.0_f64,
            ) {
                let band = |k: usize| Array2::from_shape_fn((rows, cols), |(r, c)| {
                    samples[(r * cols + c + k * 7) % samples.len()]
                });
                let (red, green, blue) = (band(0), band(1), band(2));
                let image = normalize([&red, &green, &blue], Stretch::new(low, low + span))?;
                prop_assert_eq!(image.dimensions(), (cols as u32, rows as u32));
                let fitted = fit_to_resolution(image, 6);
                prop_assert_eq!(fitted.dimensions(), (6, 6));
            }

            #[test]
            fn test_constant_scene_never_fails(value in -1.0e6..1.0e6_f32, pct in 0.0..100.0_f64) {
                let band = Array2::from_elem((5, 5), value);
                let image = normalize([&band, &band, &band], Stretch::new(pct, pct))?;
                prop_assert!(image.pixels().all(|p| p.0 == [0, 0, 0]));
            }
        }
    }
}

use crate::error::MatchError;
use crate::traits::{ImageSignature, SignatureGenerator};
use image::GrayImage;

pub const DEFAULT_GRID_SIZE: usize = 9;
pub const DEFAULT_WORD_LENGTH: usize = 3;

const NEIGHBOURS: [(isize, isize); 8] = [
    (-1, -1),
    (0, -1),
    (1, -1),
    (-1, 0),
    (1, 0),
    (-1, 1),
    (0, 1),
    (1, 1),
];

const IDENTICAL_TOLERANCE: f32 = 2.0;
const STRONG_DIFFERENCE: f32 = 32.0;

/// Grid luminance signature: mean brightness at `grid_size²` sample points, each compared with
/// its eight neighbours and quantized to `-2..=2`.
#[derive(Debug, Clone, Copy)]
pub struct GridSignature {
    pub grid_size: usize,
    pub k: usize,
}

impl Default for GridSignature {
    fn default() -> Self {
        Self {
            grid_size: DEFAULT_GRID_SIZE,
            k: DEFAULT_WORD_LENGTH,
        }
    }
}

impl SignatureGenerator for GridSignature {
    fn signature_len(&self) -> usize {
        self.grid_size * self.grid_size * NEIGHBOURS.len()
    }

    fn signature_of(&self, image: &GrayImage) -> Result<ImageSignature, MatchError> {
        let (width, height) = image.dimensions();
        if width == 0 || height == 0 {
            return Err(MatchError::InvalidArgument("image has no pixels".to_string()));
        }

        let means = self.grid_means(image);
        let grid = self.grid_size as isize;
        let mut signature = Vec::with_capacity(self.signature_len());

        for row in 0..grid {
            for col in 0..grid {
                let center = means[(row * grid + col) as usize];
                for (dx, dy) in NEIGHBOURS {
                    let (x, y) = (col + dx, row + dy);
                    let difference = if x < 0 || y < 0 || x >= grid || y >= grid {
                        0.0
                    } else {
                        means[(y * grid + x) as usize] - center
                    };
                    signature.push(quantize(difference));
                }
            }
        }

        let words = words_from_signature(&signature, self.k);
        Ok(ImageSignature { signature, words })
    }
}

impl GridSignature {
    fn grid_means(&self, image: &GrayImage) -> Vec<f32> {
        let (width, height) = image.dimensions();
        let patch = ((width.min(height) as f32 / 20.0).round() as u32).max(2);
        let half = patch / 2;
        let steps = self.grid_size as u32 + 1;

        let mut means = Vec::with_capacity(self.grid_size * self.grid_size);
        for row in 1..steps {
            let cy = (u64::from(row) * u64::from(height) / u64::from(steps)) as u32;
            for col in 1..steps {
                let cx = (u64::from(col) * u64::from(width) / u64::from(steps)) as u32;
                means.push(patch_mean(image, cx, cy, half));
            }
        }
        means
    }
}

fn patch_mean(image: &GrayImage, cx: u32, cy: u32, half: u32) -> f32 {
    let (width, height) = image.dimensions();
    let x_range = cx.saturating_sub(half)..(cx + half).min(width - 1) + 1;
    let y_range = cy.saturating_sub(half)..(cy + half).min(height - 1) + 1;

    let mut total = 0f32;
    let mut count = 0f32;
    for y in y_range {
        for x in x_range.clone() {
            total += f32::from(image.get_pixel(x, y).0[0]);
            count += 1.0;
        }
    }
    total / count
}

fn quantize(difference: f32) -> i32 {
    let magnitude = difference.abs();
    let level = if magnitude < IDENTICAL_TOLERANCE {
        0
    } else if magnitude < STRONG_DIFFERENCE {
        1
    } else {
        2
    };
    if difference < 0.0 {
        -level
    } else {
        level
    }
}

/// One token per signature cell.
///
/// Cell `i` takes the `k` values starting at `i` (wrapping), clips them to `-1..=1`, reads them
/// as a base-3 number and offsets it by `i * 3^k` so equal neighbourhoods at different cells
/// never collide.
pub fn words_from_signature(signature: &[i32], k: usize) -> Vec<String> {
    let n = signature.len();
    let span = 3u64.pow(k as u32);

    (0..n)
        .map(|cell| {
            let code = (0..k).fold(0u64, |acc, offset| {
                let value = signature[(cell + offset) % n].clamp(-1, 1) + 1;
                acc * 3 + value as u64
            });
            (cell as u64 * span + code).to_string()
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Luma;

    fn stripes() -> GrayImage {
        GrayImage::from_fn(60, 40, |x, _| Luma([if x < 30 { 20 } else { 220 }]))
    }

    #[test]
    fn signature_is_deterministic_with_expected_length() -> Result<(), MatchError> {
        let generator = GridSignature::default();
        let first = generator.signature_of(&stripes())?;
        let second = generator.signature_of(&stripes())?;
        assert_eq!(first, second);
        assert_eq!(first.signature.len(), generator.signature_len());
        assert_eq!(first.words.len(), generator.signature_len());
        assert!(first.signature.iter().all(|value| (-2..=2).contains(value)));
        Ok(())
    }

    #[test]
    fn flat_image_has_all_zero_signature() -> Result<(), MatchError> {
        let generator = GridSignature { grid_size: 3, k: 2 };
        let flat = GrayImage::from_pixel(30, 30, Luma([128]));
        let result = generator.signature_of(&flat)?;
        assert!(result.signature.iter().all(|value| *value == 0));
        Ok(())
    }

    #[test]
    fn empty_image_is_rejected() {
        let generator = GridSignature::default();
        let result = generator.signature_of(&GrayImage::new(0, 0));
        assert!(matches!(result, Err(MatchError::InvalidArgument(_))));
    }

    #[test]
    fn words_are_unique_per_cell() {
        let words = words_from_signature(&[0, 0, 0, 0], 2);
        assert_eq!(words, vec!["4", "13", "22", "31"]);

        let words = words_from_signature(&[2, -2, 1, 0], 1);
        assert_eq!(words, vec!["2", "3", "8", "10"]);
    }
}

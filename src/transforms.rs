/// Test-time image transform: resize, scale to [0, 1], normalize, CHW layout
use std::path::PathBuf;

use image::imageops::{self, FilterType};
use image::RgbImage;
use ndarray::Array3;

use crate::config::VisConfig;
use crate::errors::{VisError, VisResult};

/// Model input for one image, tagged with the file it was read from
#[derive(Debug, Clone)]
pub struct ImageTensor {
    /// Shape (3, height, width)
    pub data: Array3<f32>,
    /// Image path relative to the dataset root
    pub source: PathBuf,
}

#[derive(Debug, Clone)]
pub struct TestTransform {
    /// (height, width)
    pub input_size: [u32; 2],
    alpha: [f32; 3],
    beta: [f32; 3],
}

impl TestTransform {
    pub fn new(input_size: [u32; 2], mean: [f32; 3], std: [f32; 3]) -> VisResult<Self> {
        if let Some(s) = std.iter().find(|s| **s <= 0.0) {
            return Err(VisError::Config(format!(
                "normalization std must be positive, got {}",
                s
            )));
        }

        // x' = (x / 255 - mean) / std = x * alpha + beta
        let mut alpha = [0.0; 3];
        let mut beta = [0.0; 3];
        for c in 0..3 {
            alpha[c] = 1.0 / (255.0 * std[c]);
            beta[c] = -mean[c] / std[c];
        }

        Ok(Self { input_size, alpha, beta })
    }

    pub fn from_config(config: &VisConfig) -> VisResult<Self> {
        Self::new(
            config.transform_size(),
            config.test_augmentation.mean,
            config.test_augmentation.std,
        )
    }

    pub fn apply(&self, image: &RgbImage, source: PathBuf) -> ImageTensor {
        let [height, width] = self.input_size;
        let resized = if image.dimensions() == (width, height) {
            image.clone()
        } else {
            imageops::resize(image, width, height, FilterType::Triangle)
        };

        let data = Array3::from_shape_fn((3, height as usize, width as usize), |(c, y, x)| {
            let value = resized.get_pixel(x as u32, y as u32).0[c] as f32;
            value * self.alpha[c] + self.beta[c]
        });

        ImageTensor { data, source }
    }
}

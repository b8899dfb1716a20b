//! Bounded, aspect-preserving image normalization.

use image::imageops::FilterType;
use image::{DynamicImage, GenericImageView};
use std::path::{Path, PathBuf};

use crate::config::ImageConfig;
use crate::error::{InferenceError, ItemResult};

/// Result of normalizing an image.
#[derive(Debug, Clone)]
pub struct NormalizedImage {
    /// Decoded (and possibly resampled) pixel data
    pub image: DynamicImage,
    /// Width after normalization
    pub width: u32,
    /// Height after normalization
    pub height: u32,
    /// Whether the source exceeded the bounds and was downscaled
    pub resized: bool,
}

/// Loads images and fits them inside a maximum bounding box.
#[derive(Debug, Clone, Copy)]
pub struct ImageNormalizer {
    max_width: u32,
    max_height: u32,
}

impl Default for ImageNormalizer {
    fn default() -> Self {
        Self::new(1250, 1750)
    }
}

impl ImageNormalizer {
    pub fn new(max_width: u32, max_height: u32) -> Self {
        Self {
            max_width,
            max_height,
        }
    }

    pub fn from_config(config: &ImageConfig) -> Self {
        Self::new(config.max_width, config.max_height)
    }

    /// Load `path` and downscale it to fit the bounds, keeping the aspect ratio.
    ///
    /// Images already within bounds are returned untouched. Oversized images
    /// are resampled with a Lanczos filter; nothing is ever upscaled.
    pub fn resize(&self, path: &Path) -> ItemResult<NormalizedImage> {
        let image = load(path)?;
        let (width, height) = image.dimensions();
        let (new_width, new_height) = fit_within(width, height, self.max_width, self.max_height);

        if (new_width, new_height) == (width, height) {
            return Ok(NormalizedImage {
                image,
                width,
                height,
                resized: false,
            });
        }

        tracing::debug!(
            "Resizing {} from {width}x{height} to {new_width}x{new_height}",
            path.display()
        );
        let image = image.resize_exact(new_width, new_height, FilterType::Lanczos3);
        Ok(NormalizedImage {
            image,
            width: new_width,
            height: new_height,
            resized: true,
        })
    }

    /// Run [`resize`](Self::resize) on the blocking pool.
    pub async fn resize_blocking(&self, path: PathBuf) -> ItemResult<NormalizedImage> {
        let normalizer = *self;
        let task_path = path.clone();
        tokio::task::spawn_blocking(move || normalizer.resize(&task_path))
            .await
            .map_err(|e| InferenceError::image_load(&path, format!("Task join error: {e}")))?
    }
}

/// Compute the dimensions of `width`x`height` fitted inside `max_width`x`max_height`.
///
/// Returns the input unchanged when it is already within bounds. Otherwise
/// each side is `min(bound, floor(other_bound * ratio))`, clamped to at least 1.
pub fn fit_within(width: u32, height: u32, max_width: u32, max_height: u32) -> (u32, u32) {
    if width <= max_width && height <= max_height {
        return (width, height);
    }

    let aspect_ratio = width as f64 / height.max(1) as f64;
    let new_width = max_width.min((max_height as f64 * aspect_ratio).floor() as u32);
    let new_height = max_height.min((max_width as f64 / aspect_ratio).floor() as u32);
    (new_width.max(1), new_height.max(1))
}

fn load(path: &Path) -> ItemResult<DynamicImage> {
    let reader = image::ImageReader::open(path)
        .map_err(|e| InferenceError::image_load(path, e))?
        .with_guessed_format()
        .map_err(|e| InferenceError::image_load(path, format!("Cannot detect image format: {e}")))?;
    reader
        .decode()
        .map_err(|e| InferenceError::image_load(path, e))
}

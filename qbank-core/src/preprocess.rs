use bytes::Bytes;
use image::{GrayImage, codecs::jpeg::JpegEncoder, imageops::FilterType};
use imageproc::contrast::{ThresholdType, otsu_level, threshold_mut};
use rayon::prelude::*;
use snafu::{OptionExt, ResultExt};
use tracing::*;

use crate::{config::PreprocessConfig, consts::*, error::*};

/// Image handed to the OCR engine.
#[derive(Debug, Clone)]
pub struct PreparedImage {
    pub bytes: Bytes,
    /// `false` when preprocessing failed and `bytes` is the untouched input
    pub enhanced: bool,
}

#[derive(Debug, Clone, Default)]
pub struct ImagePreprocessor {
    config: PreprocessConfig,
}

impl ImagePreprocessor {
    pub fn new(config: PreprocessConfig) -> Self {
        Self { config }
    }

    /// Upscale, grayscale and contrast-boost an image for OCR.
    ///
    /// Never fails: any decode or encode error returns the original bytes.
    #[instrument(skip_all, fields(size = payload.len()))]
    pub fn prepare(&self, payload: &Bytes) -> PreparedImage {
        match self.enhance(payload) {
            Ok(bytes) => PreparedImage {
                bytes: Bytes::from(bytes),
                enhanced: true,
            },
            Err(err) => {
                warn!("preprocess image error, using original: {}", err);
                PreparedImage {
                    bytes: payload.clone(),
                    enhanced: false,
                }
            }
        }
    }

    fn enhance(&self, payload: &[u8]) -> Result<Vec<u8>, QbankError> {
        let image = image::load_from_memory(payload).context(ImageSnafu { stage: "decode" })?;

        let scale = upscale_factor(image.width().min(image.height()));
        let image = if scale > 1.0 {
            let width = (image.width() as f32 * scale).round() as u32;
            let height = (image.height() as f32 * scale).round() as u32;
            image.resize_exact(width, height, FilterType::Lanczos3)
        } else {
            image
        };
        debug!(
            "preprocess scale {} to {}x{}",
            scale,
            image.width(),
            image.height()
        );

        let rgb = image.to_rgb8();
        let factor = contrast_factor(self.config.contrast);
        let luma = rgb
            .as_raw()
            .par_chunks_exact(3)
            .map(|px| {
                let gray = px[0] as f32 * LUMA_WEIGHTS[0]
                    + px[1] as f32 * LUMA_WEIGHTS[1]
                    + px[2] as f32 * LUMA_WEIGHTS[2];
                apply_contrast(gray, factor)
            })
            .collect::<Vec<u8>>();

        let mut gray = GrayImage::from_raw(rgb.width(), rgb.height(), luma).context(
            ExtractionFailureSnafu {
                stage: "grayscale",
                message: "pixel buffer does not match image size",
            },
        )?;

        if self.config.binarize {
            let level = otsu_level(&gray);
            threshold_mut(&mut gray, level, ThresholdType::Binary);
        }

        let mut encoded = Vec::new();
        JpegEncoder::new_with_quality(&mut encoded, self.config.jpeg_quality)
            .encode_image(&gray)
            .context(ImageSnafu { stage: "encode" })?;

        Ok(encoded)
    }
}

/// Scale factor for an image whose shorter side is `min_side` pixels.
pub fn upscale_factor(min_side: u32) -> f32 {
    UPSCALE_TIERS
        .iter()
        .find(|(bound, _)| min_side < *bound)
        .map(|(_, scale)| *scale)
        .unwrap_or(1.0)
}

/// Linear contrast factor for a boost `c` on the `-255..=255` scale.
pub fn contrast_factor(contrast: f32) -> f32 {
    let contrast = contrast.clamp(-255.0, 255.0);
    259.0 * (contrast + 255.0) / (255.0 * (259.0 - contrast))
}

fn apply_contrast(gray: f32, factor: f32) -> u8 {
    (factor * (gray - 128.0) + 128.0).round().clamp(0.0, 255.0) as u8
}

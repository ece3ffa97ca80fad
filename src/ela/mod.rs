// SPDX-License-Identifier: GPL-3.0-or-later
//! Error level analysis.
//!
//! An image is recompressed as a JPEG at a fixed quality and compared against the original. Areas
//! that were already compressed at a similar quality change very little, while areas that were
//! edited or generated after the last compression tend to stand out. The differences are
//! amplified and rendered as a heatmap.
use image::codecs::png::PngEncoder;
use image::{ColorType, Rgb};
use rayon::prelude::*;
use tracing::{debug, instrument};

use std::error::Error as StdError;
use std::fmt;

use crate::image_buffer::{DifferenceMap, SourceImage};

mod jpeg;
mod settings;

pub(crate) use settings::{HeatmapSettings, HeatmapStyle};

/// Prefix for heatmaps so they can be used directly as an image source in a browser.
pub(crate) const DATA_URI_PREFIX: &str = "data:image/png;base64,";

#[derive(Debug)]
pub(crate) enum HeatmapError {
    /// There are no pixels to analyze.
    Empty,

    /// Either the recompressed JPEG or the final PNG couldn't be encoded.
    Encode(image::ImageError),

    /// The recompressed JPEG couldn't be decoded.
    Decode(image::ImageError),

    /// The recompressed JPEG decoded to a different size than the source.
    SizeMismatch {
        expected: (u32, u32),
        actual: (u32, u32),
    },
}

impl fmt::Display for HeatmapError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Self::Empty => write!(f, "image has no pixels"),
            Self::Encode(e) => write!(f, "unable to encode image: {}", e),
            Self::Decode(e) => write!(f, "unable to decode recompressed image: {}", e),
            Self::SizeMismatch { expected, actual } => write!(
                f,
                "recompressed image is {}x{}, expected {}x{}",
                actual.0, actual.1, expected.0, expected.1
            ),
        }
    }
}

impl StdError for HeatmapError {
    fn source(&self) -> Option<&(dyn StdError + 'static)> {
        match self {
            Self::Encode(e) | Self::Decode(e) => Some(e),
            Self::Empty | Self::SizeMismatch { .. } => None,
        }
    }
}

/// Compute the amplified absolute difference between two images of the same size.
///
/// Each channel is multiplied by `amplification` and clamped to `[0, 255]`.
pub(crate) fn difference_map(
    original: &SourceImage,
    recompressed: &SourceImage,
    amplification: f32,
) -> DifferenceMap {
    assert_eq!(original.dimensions(), recompressed.dimensions());
    let (width, height) = original.dimensions();
    let mut difference = DifferenceMap::new(width, height);
    let samples: &mut [u8] = &mut difference;
    samples
        .par_iter_mut()
        .zip(original.as_raw().par_iter())
        .zip(recompressed.as_raw().par_iter())
        .for_each(|((out, a), b)| {
            let delta = (*a as i16 - *b as i16).abs() as f32;
            *out = (delta * amplification).round().min(u8::MAX as f32) as u8;
        });
    difference
}

/// The intensity of a difference pixel, as used by the single-channel styles.
fn intensity(pixel: &Rgb<u8>) -> u8 {
    pixel.0.iter().copied().max().unwrap_or_default()
}

/// Turn a difference map into a viewable image.
fn render(mut difference: DifferenceMap, style: HeatmapStyle) -> SourceImage {
    match style {
        HeatmapStyle::Channels => (),
        HeatmapStyle::Grayscale => {
            for pixel in difference.pixels_mut() {
                let value = intensity(pixel);
                *pixel = Rgb([value; 3]);
            }
        }
        HeatmapStyle::Gradient(gradient) => {
            // There are only 256 possible intensities, so evaluate the gradient once for each.
            let colors: Vec<Rgb<u8>> = (0..=u8::MAX)
                .map(|value| {
                    let unit_value = value as f64 / u8::MAX as f64;
                    Rgb(gradient.eval_continuous(unit_value).as_array())
                })
                .collect();
            for pixel in difference.pixels_mut() {
                *pixel = colors[intensity(pixel) as usize];
            }
        }
    }
    difference
}

/// Generate the rendered (but not yet encoded) heatmap for an image.
pub(crate) fn render_heatmap(
    image: &SourceImage,
    settings: &HeatmapSettings,
) -> Result<SourceImage, HeatmapError> {
    if image.width() == 0 || image.height() == 0 {
        return Err(HeatmapError::Empty);
    }
    let recompressed = jpeg::recompress(image, settings.quality)?;
    let difference = difference_map(image, &recompressed, settings.amplification);
    Ok(render(difference, settings.style))
}

fn encode_png(image: &SourceImage) -> Result<Vec<u8>, HeatmapError> {
    let mut png_buf = Vec::new();
    PngEncoder::new(&mut png_buf)
        .encode(image.as_raw(), image.width(), image.height(), ColorType::Rgb8)
        .map_err(HeatmapError::Encode)?;
    Ok(png_buf)
}

/// Generate an ELA heatmap for an image, encoded as a base64 PNG data URI.
///
/// The output has the same dimensions as the input, and identical inputs always produce identical
/// output.
#[instrument(level = "debug", skip(image, settings), fields(width = image.width(), height = image.height()))]
pub(crate) fn heatmap(
    image: &SourceImage,
    settings: &HeatmapSettings,
) -> Result<String, HeatmapError> {
    let rendered = render_heatmap(image, settings)?;
    let png_bytes = encode_png(&rendered)?;
    debug!(png_size = png_bytes.len(), "rendered heatmap");
    let mut data_uri = String::with_capacity(DATA_URI_PREFIX.len() + png_bytes.len() * 4 / 3 + 4);
    data_uri.push_str(DATA_URI_PREFIX);
    base64::encode_config_buf(&png_bytes, base64::STANDARD, &mut data_uri);
    Ok(data_uri)
}

// SPDX-License-Identifier: GPL-3.0-or-later
use image::codecs::jpeg::JpegEncoder as ImageJpegEncoder;
use image::{ColorType, ImageFormat};
use tracing::trace;

#[cfg(feature = "mozjpeg")]
use mozjpeg::{ColorSpace, Compress};

use crate::image_buffer::SourceImage;

use super::HeatmapError;

#[cfg(feature = "mozjpeg")]
fn encode_jpeg_mozjpeg(image: &SourceImage, quality: u8) -> Result<Vec<u8>, HeatmapError> {
    use image::error::{EncodingError, ImageError, ImageFormatHint};
    trace!("using mozjpeg to recompress image");
    let encoding_error = |message: &'static str| {
        HeatmapError::Encode(ImageError::Encoding(EncodingError::new(
            ImageFormatHint::Exact(ImageFormat::Jpeg),
            message,
        )))
    };
    let mut jpeg_encoder = Compress::new(ColorSpace::JCS_RGB);
    jpeg_encoder.set_quality(quality as f32);
    jpeg_encoder.set_mem_dest();
    jpeg_encoder.set_size(image.width() as usize, image.height() as usize);
    jpeg_encoder.start_compress();
    if !jpeg_encoder.write_scanlines(image.as_raw()) {
        return Err(encoding_error("mozjpeg was unable to write every scanline"));
    }
    jpeg_encoder.finish_compress();
    jpeg_encoder
        .data_to_vec()
        .map_err(|_| encoding_error("mozjpeg did not produce any output"))
}

#[cfg_attr(feature = "mozjpeg", allow(dead_code))]
fn encode_jpeg_image(image: &SourceImage, quality: u8) -> Result<Vec<u8>, HeatmapError> {
    trace!("using image crate to recompress image");
    let mut jpeg_buf = Vec::new();
    let mut encoder = ImageJpegEncoder::new_with_quality(&mut jpeg_buf, quality);
    encoder
        .encode(
            image.as_raw(),
            image.width(),
            image.height(),
            ColorType::Rgb8,
        )
        .map_err(HeatmapError::Encode)?;
    Ok(jpeg_buf)
}

#[cfg(not(feature = "mozjpeg"))]
fn encode_jpeg(image: &SourceImage, quality: u8) -> Result<Vec<u8>, HeatmapError> {
    encode_jpeg_image(image, quality)
}

#[cfg(feature = "mozjpeg")]
fn encode_jpeg(image: &SourceImage, quality: u8) -> Result<Vec<u8>, HeatmapError> {
    encode_jpeg_mozjpeg(image, quality)
}

/// Round-trip an image through JPEG at the given quality.
///
/// The recompressed image is guaranteed to have the same dimensions as the source.
pub(super) fn recompress(image: &SourceImage, quality: u8) -> Result<SourceImage, HeatmapError> {
    let jpeg_bytes = encode_jpeg(image, quality)?;
    trace!(encoded_size = jpeg_bytes.len(), quality, "encoded JPEG");
    let recompressed = image::load_from_memory_with_format(&jpeg_bytes, ImageFormat::Jpeg)
        .map_err(HeatmapError::Decode)?
        .to_rgb8();
    if recompressed.dimensions() != image.dimensions() {
        return Err(HeatmapError::SizeMismatch {
            expected: image.dimensions(),
            actual: recompressed.dimensions(),
        });
    }
    Ok(recompressed)
}

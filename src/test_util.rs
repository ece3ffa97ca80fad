// SPDX-License-Identifier: GPL-3.0-or-later
//! Fixtures and stand-in collaborators shared by the unit tests.
use async_trait::async_trait;
use bytes::Bytes;
use image::{DynamicImage, ImageFormat, Rgb};
use rand_chacha::ChaCha8Rng;
use rand_core::{RngCore, SeedableRng};
use url::Url;

use std::sync::Mutex;

use crate::archive::{object_key, Archive};
use crate::classifier::{Classifier, Preprocessing, Tensor};
use crate::image_buffer::SourceImage;

/// A classifier that gives every image the same score.
#[derive(Debug)]
pub(crate) struct FixedClassifier(pub(crate) f32);

impl Classifier for FixedClassifier {
    fn preprocessing(&self) -> Preprocessing {
        Preprocessing { resize: 8, crop: 8 }
    }

    fn score(&self, _tensor: &Tensor) -> anyhow::Result<f32> {
        Ok(self.0)
    }
}

/// An archive that remembers the keys of everything stored in it, or refuses everything.
#[derive(Debug, Default)]
pub(crate) struct RecordingArchive {
    pub(crate) refuse: bool,
    pub(crate) stored: Mutex<Vec<String>>,
}

impl RecordingArchive {
    pub(crate) fn refusing() -> Self {
        Self {
            refuse: true,
            ..Self::default()
        }
    }

    pub(crate) fn stored_count(&self) -> usize {
        self.stored.lock().unwrap().len()
    }
}

#[async_trait]
impl Archive for RecordingArchive {
    async fn store(&self, image: Bytes, content_type: &str) -> anyhow::Result<Url> {
        if self.refuse {
            anyhow::bail!("archive is full");
        }
        let key = object_key(&image, content_type);
        self.stored.lock().unwrap().push(key.clone());
        Ok(Url::parse("memory:///")?.join(&key)?)
    }
}

pub(crate) fn solid(width: u32, height: u32, color: [u8; 3]) -> SourceImage {
    SourceImage::from_pixel(width, height, Rgb(color))
}

/// Uniform random noise, the worst case for JPEG compression.
pub(crate) fn noise(width: u32, height: u32, seed: u64) -> SourceImage {
    let mut rng = ChaCha8Rng::seed_from_u64(seed);
    let mut samples = vec![0u8; (width * height * 3) as usize];
    rng.fill_bytes(&mut samples);
    SourceImage::from_raw(width, height, samples).expect("buffer is the right size")
}

pub(crate) fn encode(image: &SourceImage, format: ImageFormat) -> Vec<u8> {
    let mut encoded = Vec::new();
    DynamicImage::ImageRgb8(image.clone())
        .write_to(&mut encoded, format)
        .expect("test images should encode");
    encoded
}

/// A big-endian TIFF structure with a single `Make` tag set to "ACM".
pub(crate) fn minimal_exif() -> Vec<u8> {
    let mut tiff = Vec::new();
    // Header, with the first IFD immediately after it
    tiff.extend_from_slice(b"MM\x00\x2a\x00\x00\x00\x08");
    // One entry
    tiff.extend_from_slice(&1u16.to_be_bytes());
    // Make, ASCII, four bytes (fits inline)
    tiff.extend_from_slice(&0x010fu16.to_be_bytes());
    tiff.extend_from_slice(&2u16.to_be_bytes());
    tiff.extend_from_slice(&4u32.to_be_bytes());
    tiff.extend_from_slice(b"ACM\x00");
    // No next IFD
    tiff.extend_from_slice(&0u32.to_be_bytes());
    tiff
}

/// Insert an APP1 Exif segment right after the start-of-image marker of a JPEG.
pub(crate) fn with_exif(jpeg: &[u8], tiff: &[u8]) -> Vec<u8> {
    assert_eq!(&jpeg[..2], &[0xff, 0xd8], "not a JPEG");
    let mut payload = b"Exif\x00\x00".to_vec();
    payload.extend_from_slice(tiff);
    let segment_length = (payload.len() + 2) as u16;
    let mut output = vec![0xff, 0xd8, 0xff, 0xe1];
    output.extend_from_slice(&segment_length.to_be_bytes());
    output.extend_from_slice(&payload);
    output.extend_from_slice(&jpeg[2..]);
    output
}

// SPDX-License-Identifier: GPL-3.0-or-later
use image::{ImageBuffer, Rgb};

/// Decoded uploads. Every format is converted to 8-bit RGB before any analysis.
pub type SourceImage = ImageBuffer<Rgb<u8>, Vec<u8>>;

/// Amplified per-channel differences between an image and its recompressed copy.
pub type DifferenceMap = ImageBuffer<Rgb<u8>, Vec<u8>>;

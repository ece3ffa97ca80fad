// SPDX-License-Identifier: GPL-3.0-or-later
use serde::de::{self, Deserialize, Deserializer};

use std::str::FromStr;

use crate::settings::gradient;

fn default_quality() -> u8 {
    90
}

fn default_amplification() -> f32 {
    15.0
}

/// How the amplified difference map is turned into a viewable image.
#[derive(Clone, Copy, Debug)]
pub(crate) enum HeatmapStyle {
    /// Show the per-channel differences directly as colors.
    Channels,

    /// Collapse each pixel to its largest channel difference, shown in grey.
    Grayscale,

    /// Collapse each pixel to its largest channel difference, then color it with a gradient.
    Gradient(colorous::Gradient),
}

impl Default for HeatmapStyle {
    fn default() -> Self {
        Self::Channels
    }
}

impl PartialEq for HeatmapStyle {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::Channels, Self::Channels) => true,
            (Self::Grayscale, Self::Grayscale) => true,
            (Self::Gradient(left), Self::Gradient(right)) => gradient::same_gradient(left, right),
            _ => false,
        }
    }
}

impl FromStr for HeatmapStyle {
    type Err = &'static str;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match &s.trim().to_ascii_lowercase() as &str {
            "channels" => Ok(Self::Channels),
            "grayscale" | "greyscale" => Ok(Self::Grayscale),
            name => gradient::from_str(name)
                .map(Self::Gradient)
                .ok_or("unknown heatmap style"),
        }
    }
}

impl<'de> Deserialize<'de> for HeatmapStyle {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let style_name = String::deserialize(deserializer)?;
        style_name.parse().map_err(|_| {
            de::Error::invalid_value(
                de::Unexpected::Str(&style_name),
                &"\"channels\", \"grayscale\", or the name of a colorous gradient",
            )
        })
    }
}

fn deserialize_quality<'de, D>(deserializer: D) -> Result<u8, D::Error>
where
    D: Deserializer<'de>,
{
    let quality = u8::deserialize(deserializer)?;
    if (1..=100).contains(&quality) {
        Ok(quality)
    } else {
        Err(de::Error::invalid_value(
            de::Unexpected::Unsigned(quality.into()),
            &"a JPEG quality between 1 and 100",
        ))
    }
}

fn deserialize_amplification<'de, D>(deserializer: D) -> Result<f32, D::Error>
where
    D: Deserializer<'de>,
{
    let amplification = f32::deserialize(deserializer)?;
    if amplification.is_finite() && amplification > 0.0 {
        Ok(amplification)
    } else {
        Err(de::Error::invalid_value(
            de::Unexpected::Float(amplification.into()),
            &"a positive amplification factor",
        ))
    }
}

#[derive(Clone, Copy, Debug, serde::Deserialize, PartialEq)]
pub(crate) struct HeatmapSettings {
    /// The JPEG quality the image is recompressed at, from 1 to 100. Defaults to 90.
    #[serde(
        default = "default_quality",
        deserialize_with = "deserialize_quality"
    )]
    pub(crate) quality: u8,

    /// How much the differences are multiplied by before being clamped. Defaults to 15.
    #[serde(
        default = "default_amplification",
        deserialize_with = "deserialize_amplification"
    )]
    pub(crate) amplification: f32,

    #[serde(default)]
    pub(crate) style: HeatmapStyle,
}

impl Default for HeatmapSettings {
    fn default() -> Self {
        Self {
            quality: default_quality(),
            amplification: default_amplification(),
            style: HeatmapStyle::default(),
        }
    }
}

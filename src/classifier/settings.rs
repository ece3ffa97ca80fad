// SPDX-License-Identifier: GPL-3.0-or-later
use serde::Deserialize;

use std::convert::TryFrom;
use std::path::PathBuf;

use super::Preprocessing;

fn default_weights() -> PathBuf {
    PathBuf::from("model.weights")
}

fn default_resize() -> u32 {
    256
}

fn default_crop() -> u32 {
    224
}

#[derive(Clone, Debug, Deserialize, PartialEq)]
pub(crate) struct ClassifierSettings {
    /// Path to the model weights. Defaults to `model.weights` in the current directory.
    ///
    /// If the file doesn't exist, the service still starts with untrained weights.
    #[serde(default = "default_weights")]
    pub(crate) weights: PathBuf,

    /// The length images' shorter side is resized to before cropping. Defaults to 256.
    #[serde(default = "default_resize")]
    pub(crate) resize: u32,

    /// The side length of the square crop taken from the center of the resized image. This is
    /// also the input size of the model. Defaults to 224.
    #[serde(default = "default_crop")]
    pub(crate) crop: u32,
}

impl Default for ClassifierSettings {
    fn default() -> Self {
        Self {
            weights: default_weights(),
            resize: default_resize(),
            crop: default_crop(),
        }
    }
}

impl TryFrom<&ClassifierSettings> for Preprocessing {
    type Error = anyhow::Error;

    fn try_from(settings: &ClassifierSettings) -> Result<Self, Self::Error> {
        if settings.crop == 0 {
            anyhow::bail!("classifier crop size must be larger than 0");
        }
        if settings.crop > settings.resize {
            anyhow::bail!(
                "classifier crop size ({}) is larger than the resize length ({})",
                settings.crop,
                settings.resize
            );
        }
        Ok(Self {
            resize: settings.resize,
            crop: settings.crop,
        })
    }
}

// SPDX-License-Identifier: GPL-3.0-or-later
use serde::Serialize;

use std::fmt;

use crate::image_buffer::SourceImage;

mod linear;
mod preprocess;
mod settings;

pub(crate) use linear::LinearClassifier;
pub(crate) use preprocess::{preprocess, Preprocessing, Tensor};
pub(crate) use settings::ClassifierSettings;

/// Scores above this are considered authentic.
const AUTHENTIC_THRESHOLD: f64 = 0.5;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub(crate) enum Label {
    Authentic,
    AiGenerated,
}

/// The outcome of classifying an image.
#[derive(Clone, Copy, Debug, PartialEq, Serialize)]
pub(crate) struct Verdict {
    pub(crate) label: Label,

    /// How confident the classifier is in `label`, as a percentage rounded to two decimal places.
    pub(crate) confidence: f64,
}

impl Verdict {
    /// Turn a model score (the probability of an image being authentic) into a verdict.
    ///
    /// Because the label is whichever side of 0.5 the score is on, the confidence is never below
    /// 50%.
    pub(crate) fn from_score(score: f32) -> anyhow::Result<Self> {
        if !(0.0..=1.0).contains(&score) {
            anyhow::bail!("classifier score {} is not a probability", score);
        }
        let score = score as f64;
        let (label, probability) = if score > AUTHENTIC_THRESHOLD {
            (Label::Authentic, score)
        } else {
            (Label::AiGenerated, 1.0 - score)
        };
        Ok(Self {
            label,
            confidence: (probability * 100.0 * 100.0).round() / 100.0,
        })
    }
}

/// A pretrained model that decides how likely an image is to be authentic.
///
/// Implementations are loaded once at startup and shared between every request, so scoring must
/// not mutate any state.
pub(crate) trait Classifier: fmt::Debug + Send + Sync {
    /// How images should be prepared for this model.
    fn preprocessing(&self) -> Preprocessing;

    /// The probability (from 0 to 1) that the image the tensor was created from is authentic.
    fn score(&self, tensor: &Tensor) -> anyhow::Result<f32>;

    fn classify(&self, image: &SourceImage) -> anyhow::Result<Verdict> {
        let tensor = preprocess(image, self.preprocessing())?;
        let score = self.score(&tensor)?;
        tracing::debug!(score, "classified image");
        Verdict::from_score(score)
    }
}

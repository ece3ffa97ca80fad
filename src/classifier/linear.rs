// SPDX-License-Identifier: GPL-3.0-or-later
use anyhow::Context as _;
use bytes::{Buf, Bytes};
use ndarray::{Array3, Zip};
use rand_chacha::ChaCha8Rng;
use rand_core::{RngCore, SeedableRng};
use tracing::{info, warn};

use std::convert::TryFrom;
use std::fs;
use std::io;
use std::mem::size_of;

use super::{Classifier, ClassifierSettings, Preprocessing, Tensor};

const UNTRAINED_SEED: u64 = 0x5eed_1a6e;

/// A logistic regression over the preprocessed image.
///
/// The weights file is a flat sequence of little-endian `f32` values: one weight for every element
/// of the input tensor (in channel, row, column order) followed by the bias.
#[derive(Clone, Debug)]
pub(crate) struct LinearClassifier {
    weights: Array3<f32>,
    bias: f32,
    preprocessing: Preprocessing,
}

impl LinearClassifier {
    /// A classifier with small random weights from a fixed seed, used when no trained weights
    /// are available.
    ///
    /// The weights are drawn uniformly from `±1/√n` for `n` inputs, so scores stay near 0.5 but
    /// still vary from image to image. The same seed always gives the same weights.
    pub(crate) fn untrained(preprocessing: Preprocessing) -> Self {
        let shape = preprocessing.tensor_shape();
        let bound = 1.0 / ((shape.0 * shape.1 * shape.2) as f32).sqrt();
        let mut rng = ChaCha8Rng::seed_from_u64(UNTRAINED_SEED);
        let weights = Array3::from_shape_simple_fn(shape, || {
            let unit = rng.next_u32() as f32 / u32::MAX as f32;
            (unit * 2.0 - 1.0) * bound
        });
        Self {
            weights,
            bias: 0.0,
            preprocessing,
        }
    }

    pub(crate) fn from_bytes(mut data: Bytes, preprocessing: Preprocessing) -> anyhow::Result<Self> {
        let shape = preprocessing.tensor_shape();
        let weight_count = shape.0 * shape.1 * shape.2;
        let expected_length = (weight_count + 1) * size_of::<f32>();
        if data.len() != expected_length {
            anyhow::bail!(
                "expected {} bytes of weights for a {}x{} input, found {}",
                expected_length,
                preprocessing.crop,
                preprocessing.crop,
                data.len()
            );
        }
        let weights: Vec<f32> = (0..weight_count).map(|_| data.get_f32_le()).collect();
        let bias = data.get_f32_le();
        Ok(Self {
            weights: Array3::from_shape_vec(shape, weights)?,
            bias,
            preprocessing,
        })
    }

    /// Load the classifier described by the settings.
    ///
    /// A missing weights file isn't an error; an untrained classifier is used instead.
    pub(crate) fn load(settings: &ClassifierSettings) -> anyhow::Result<Self> {
        let preprocessing = Preprocessing::try_from(settings)?;
        match fs::read(&settings.weights) {
            Ok(data) => {
                let classifier = Self::from_bytes(Bytes::from(data), preprocessing)
                    .with_context(|| format!("Invalid weights file {:?}", settings.weights))?;
                info!(path = ?settings.weights, "loaded classifier weights");
                Ok(classifier)
            }
            Err(err) if err.kind() == io::ErrorKind::NotFound => {
                warn!(
                    path = ?settings.weights,
                    "classifier weights not found, serving with untrained weights"
                );
                Ok(Self::untrained(preprocessing))
            }
            Err(err) => Err(err)
                .with_context(|| format!("Unable to read weights file {:?}", settings.weights)),
        }
    }
}

fn sigmoid(x: f32) -> f32 {
    1.0 / (1.0 + (-x).exp())
}

impl Classifier for LinearClassifier {
    fn preprocessing(&self) -> Preprocessing {
        self.preprocessing
    }

    fn score(&self, tensor: &Tensor) -> anyhow::Result<f32> {
        if tensor.dim() != self.weights.dim() {
            anyhow::bail!(
                "input tensor has shape {:?}, the model expects {:?}",
                tensor.dim(),
                self.weights.dim()
            );
        }
        let logit = Zip::from(tensor)
            .and(&self.weights)
            .fold(self.bias, |acc, x, w| acc + x * w);
        Ok(sigmoid(logit))
    }
}

#[cfg(test)]
mod test {
    use super::{sigmoid, LinearClassifier};
    use crate::classifier::{Classifier, ClassifierSettings, Label, Preprocessing};
    use crate::test_util;
    use bytes::{BufMut, Bytes, BytesMut};
    use float_cmp::{approx_eq, F32Margin};
    use std::io::Write;

    const SMALL: Preprocessing = Preprocessing { resize: 8, crop: 4 };

    /// Weights that only look at the red channel, plus a bias.
    fn red_weights(weight: f32, bias: f32) -> Bytes {
        let (channels, rows, columns) = SMALL.tensor_shape();
        let mut data = BytesMut::new();
        for channel in 0..channels {
            for _ in 0..(rows * columns) {
                data.put_f32_le(if channel == 0 { weight } else { 0.0 });
            }
        }
        data.put_f32_le(bias);
        data.freeze()
    }

    #[test]
    fn untrained_is_repeatable() {
        let first = LinearClassifier::untrained(SMALL);
        let second = LinearClassifier::untrained(SMALL);
        assert_eq!(first.weights, second.weights);
        let bound = 1.0 / (first.weights.len() as f32).sqrt();
        assert!(first.weights.iter().all(|w| w.abs() <= bound));
        let image = test_util::noise(16, 16, 9);
        assert_eq!(
            first.classify(&image).unwrap(),
            second.classify(&image).unwrap()
        );
    }

    #[test]
    fn untrained_is_not_degenerate() {
        let classifier = LinearClassifier::untrained(Preprocessing {
            resize: 256,
            crop: 224,
        });
        let scores: Vec<f32> = (0..4)
            .map(|seed| {
                let tensor = crate::classifier::preprocess(
                    &test_util::noise(64, 64, seed),
                    classifier.preprocessing(),
                )
                .unwrap();
                classifier.score(&tensor).unwrap()
            })
            .collect();
        assert!(scores.iter().all(|score| *score != 0.5), "{:?}", scores);
        assert!(scores.windows(2).any(|pair| pair[0] != pair[1]), "{:?}", scores);
    }

    #[test]
    fn bias_only() {
        let classifier = LinearClassifier::from_bytes(red_weights(0.0, 4.0), SMALL).unwrap();
        let tensor = crate::classifier::preprocess(&test_util::noise(8, 8, 2), SMALL).unwrap();
        let score = classifier.score(&tensor).unwrap();
        assert!(approx_eq!(f32, score, sigmoid(4.0), F32Margin::default()));
        let verdict = classifier.classify(&test_util::noise(8, 8, 2)).unwrap();
        assert_eq!(verdict.label, Label::Authentic);
    }

    #[test]
    fn weights_are_applied() {
        let classifier = LinearClassifier::from_bytes(red_weights(0.5, 0.0), SMALL).unwrap();
        let red = classifier
            .classify(&test_util::solid(8, 8, [255, 0, 0]))
            .unwrap();
        let black = classifier
            .classify(&test_util::solid(8, 8, [0, 0, 0]))
            .unwrap();
        assert_eq!(red.label, Label::Authentic);
        assert_eq!(black.label, Label::AiGenerated);
        assert!(red.confidence > 99.0);
        assert!(black.confidence > 99.0);
    }

    #[test]
    fn wrong_length() {
        let mut data = BytesMut::from(&red_weights(1.0, 1.0)[..]);
        data.put_f32_le(0.0);
        assert!(LinearClassifier::from_bytes(data.freeze(), SMALL).is_err());
        assert!(LinearClassifier::from_bytes(Bytes::new(), SMALL).is_err());
    }

    #[test]
    fn mismatched_tensor() {
        let classifier = LinearClassifier::untrained(SMALL);
        let other = Preprocessing { resize: 8, crop: 6 };
        let tensor = crate::classifier::preprocess(&test_util::noise(8, 8, 2), other).unwrap();
        assert!(classifier.score(&tensor).is_err());
    }

    #[test]
    fn load_file() {
        let mut weights_file = tempfile::NamedTempFile::new().unwrap();
        weights_file.write_all(&red_weights(0.0, -3.0)).unwrap();
        let settings = ClassifierSettings {
            weights: weights_file.path().to_path_buf(),
            resize: SMALL.resize,
            crop: SMALL.crop,
        };
        let classifier = LinearClassifier::load(&settings).unwrap();
        let verdict = classifier
            .classify(&test_util::solid(4, 4, [1, 2, 3]))
            .unwrap();
        assert_eq!(verdict.label, Label::AiGenerated);
        assert!(verdict.confidence > 90.0);
    }

    #[test]
    fn load_missing_file() {
        let directory = tempfile::tempdir().unwrap();
        let settings = ClassifierSettings {
            weights: directory.path().join("nothing-here.weights"),
            resize: SMALL.resize,
            crop: SMALL.crop,
        };
        let classifier = LinearClassifier::load(&settings).unwrap();
        assert_eq!(classifier.weights, LinearClassifier::untrained(SMALL).weights);
    }

    #[test]
    fn load_bad_file() {
        let mut weights_file = tempfile::NamedTempFile::new().unwrap();
        weights_file.write_all(b"not weights").unwrap();
        let settings = ClassifierSettings {
            weights: weights_file.path().to_path_buf(),
            resize: SMALL.resize,
            crop: SMALL.crop,
        };
        assert!(LinearClassifier::load(&settings).is_err());
    }
}

// SPDX-License-Identifier: GPL-3.0-or-later
use image::imageops::{self, FilterType};
use ndarray::Array3;
use tracing::trace;

use crate::image_buffer::SourceImage;

/// Normalized model input, laid out as channel, row, column.
pub(crate) type Tensor = Array3<f32>;

/// Per-channel means of the ImageNet training set.
const MEAN: [f32; 3] = [0.485, 0.456, 0.406];

/// Per-channel standard deviations of the ImageNet training set.
const STD: [f32; 3] = [0.229, 0.224, 0.225];

/// How images are sized before being handed to a model.
#[derive(Clone, Copy, Debug, PartialEq)]
pub(crate) struct Preprocessing {
    /// The length of the shorter side after resizing.
    pub(crate) resize: u32,

    /// The side of the square taken from the center after resizing.
    pub(crate) crop: u32,
}

impl Preprocessing {
    /// The shape of the tensors produced by [preprocess].
    pub(crate) fn tensor_shape(&self) -> (usize, usize, usize) {
        (3, self.crop as usize, self.crop as usize)
    }
}

/// The square region of the source image that ends up in the model input.
///
/// This is the center crop of the image after its shorter side is resized to
/// `preprocessing.resize`, mapped back to source coordinates. Cropping before resizing keeps the
/// resize proportional to the crop, not to the image's aspect ratio.
#[derive(Clone, Copy, Debug, PartialEq)]
struct SourceCrop {
    left: u32,
    top: u32,
    side: u32,
}

impl SourceCrop {
    fn new(width: u32, height: u32, preprocessing: Preprocessing) -> Self {
        let short = width.min(height);
        let side = (preprocessing.crop as f64 * short as f64 / preprocessing.resize as f64)
            .round()
            .max(1.0)
            .min(short as f64) as u32;
        Self {
            left: ((width - side) as f64 / 2.0).round() as u32,
            top: ((height - side) as f64 / 2.0).round() as u32,
            side,
        }
    }
}

/// Center crop, resize, and normalize an image into a model input tensor.
pub(crate) fn preprocess(image: &SourceImage, preprocessing: Preprocessing) -> anyhow::Result<Tensor> {
    let (width, height) = image.dimensions();
    if width == 0 || height == 0 {
        anyhow::bail!("cannot classify an image with no pixels");
    }
    if preprocessing.crop == 0 || preprocessing.crop > preprocessing.resize {
        anyhow::bail!(
            "cannot crop {0}x{0} from an image resized to {1}",
            preprocessing.crop,
            preprocessing.resize
        );
    }
    let source_crop = SourceCrop::new(width, height, preprocessing);
    let region = imageops::crop_imm(
        image,
        source_crop.left,
        source_crop.top,
        source_crop.side,
        source_crop.side,
    )
    .to_image();
    let crop = preprocessing.crop;
    let resized = imageops::resize(&region, crop, crop, FilterType::Triangle);
    trace!(width, height, ?source_crop, "cropped classifier input");
    Ok(Array3::from_shape_fn(
        preprocessing.tensor_shape(),
        |(channel, y, x)| {
            let value = resized.get_pixel(x as u32, y as u32)[channel] as f32 / u8::MAX as f32;
            (value - MEAN[channel]) / STD[channel]
        },
    ))
}

#[cfg(test)]
mod test {
    use super::{preprocess, Preprocessing, SourceCrop, MEAN, STD};
    use crate::test_util;
    use float_cmp::{approx_eq, F32Margin};

    const SMALL: Preprocessing = Preprocessing {
        resize: 32,
        crop: 24,
    };

    #[test]
    fn default_shape() {
        let preprocessing = Preprocessing {
            resize: 256,
            crop: 224,
        };
        let tensor = preprocess(&test_util::noise(300, 200, 1), preprocessing).unwrap();
        assert_eq!(tensor.dim(), (3, 224, 224));
    }

    #[test]
    fn tiny_image_upscales() {
        let tensor = preprocess(&test_util::solid(1, 1, [0, 0, 0]), SMALL).unwrap();
        assert_eq!(tensor.dim(), (3, 24, 24));
    }

    #[test]
    fn source_crop() {
        let preprocessing = Preprocessing {
            resize: 256,
            crop: 224,
        };
        // 512 on the short side maps 224 back to 448
        assert_eq!(
            SourceCrop::new(512, 1024, preprocessing),
            SourceCrop {
                left: 32,
                top: 288,
                side: 448
            }
        );
        assert_eq!(
            SourceCrop::new(300, 200, preprocessing),
            SourceCrop {
                left: 63,
                top: 13,
                side: 175
            }
        );
        // Never smaller than a pixel, or larger than the image.
        assert_eq!(SourceCrop::new(1, 4000, preprocessing).side, 1);
        assert_eq!(
            SourceCrop::new(10, 10, Preprocessing { resize: 4, crop: 4 }).side,
            10
        );
    }

    #[test]
    fn extreme_aspect_ratio() {
        let preprocessing = Preprocessing {
            resize: 256,
            crop: 224,
        };
        let image = test_util::solid(1, 4000, [200, 100, 50]);
        let crop = SourceCrop::new(1, 4000, preprocessing);
        // Only the crop is resized, so the work doesn't grow with the long side.
        assert_eq!((crop.left, crop.side), (0, 1));
        assert_eq!(crop.top, 2000);
        let tensor = preprocess(&image, preprocessing).unwrap();
        assert_eq!(tensor.dim(), (3, 224, 224));
        let expected = (200.0 / 255.0 - MEAN[0]) / STD[0];
        assert!(tensor
            .index_axis(ndarray::Axis(0), 0)
            .iter()
            .all(|value| approx_eq!(f32, *value, expected, F32Margin::default())));
    }

    #[test]
    fn bad_preprocessing() {
        let image = test_util::solid(8, 8, [0, 0, 0]);
        assert!(preprocess(&image, Preprocessing { resize: 8, crop: 16 }).is_err());
        assert!(preprocess(&image, Preprocessing { resize: 8, crop: 0 }).is_err());
    }

    #[test]
    fn normalization() {
        let tensor = preprocess(&test_util::solid(40, 60, [255, 0, 255]), SMALL).unwrap();
        let expected = [
            (1.0 - MEAN[0]) / STD[0],
            (0.0 - MEAN[1]) / STD[1],
            (1.0 - MEAN[2]) / STD[2],
        ];
        for ((channel, _, _), value) in tensor.indexed_iter() {
            assert!(
                approx_eq!(f32, *value, expected[channel], F32Margin::default()),
                "channel {} was {}, expected {}",
                channel,
                value,
                expected[channel]
            );
        }
    }

    #[test]
    fn empty_image() {
        let image = crate::image_buffer::SourceImage::new(0, 3);
        assert!(preprocess(&image, SMALL).is_err());
    }
}

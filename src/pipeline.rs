// SPDX-License-Identifier: GPL-3.0-or-later
use anyhow::Context as _;
use bytes::Bytes;
use futures::FutureExt;
use serde::Serialize;
use tokio::task::spawn_blocking;
use tracing::{debug, instrument};
use url::Url;

use std::sync::Arc;

use crate::archive::Archive;
use crate::classifier::{Classifier, Verdict};
use crate::ela::{self, HeatmapSettings};
use crate::error::AnalysisError;
use crate::metadata::{self, MetadataReport};
use crate::util::flatten_join_result;

pub(crate) const INVALID_FILE: &str = "Invalid file. Images only.";

/// An uploaded file that claims to be an image.
#[derive(Clone, Debug)]
pub(crate) struct Upload {
    content_type: String,
    bytes: Bytes,
}

impl Upload {
    /// Accept an upload, as long as its declared content type is an image type.
    pub(crate) fn new(content_type: Option<&str>, bytes: Bytes) -> Result<Self, AnalysisError> {
        match content_type {
            Some(content_type) if content_type.trim().to_ascii_lowercase().starts_with("image/") => {
                Ok(Self {
                    content_type: content_type.trim().to_string(),
                    bytes,
                })
            }
            _ => Err(AnalysisError::Input(INVALID_FILE)),
        }
    }
}

#[derive(Clone, Debug, Serialize)]
pub(crate) struct Source {
    /// Where the original was archived, if archiving is enabled.
    pub(crate) original_image_url: Option<Url>,
}

#[derive(Clone, Debug, Serialize)]
pub(crate) struct Evidence {
    /// The ELA heatmap as a PNG data URI.
    pub(crate) heatmap_image: String,

    pub(crate) metadata: MetadataReport,
}

/// The result of a successful analysis.
#[derive(Clone, Debug, Serialize)]
pub(crate) struct Report {
    pub(crate) status: &'static str,
    pub(crate) source: Source,
    pub(crate) verdict: Verdict,
    pub(crate) evidence: Evidence,
}

/// Everything computed from the image itself.
struct Examination {
    verdict: Verdict,
    heatmap_image: String,
    metadata: MetadataReport,
}

/// The CPU-bound part of an analysis. Decoding failures are reported separately from everything
/// else.
fn examine(
    image_bytes: &[u8],
    heatmap_settings: &HeatmapSettings,
    classifier: &dyn Classifier,
) -> Result<Examination, AnalysisError> {
    let image = image::load_from_memory(image_bytes)?.to_rgb8();
    debug!(width = image.width(), height = image.height(), "decoded image");
    let heatmap_image =
        ela::heatmap(&image, heatmap_settings).context("Unable to generate ELA heatmap")?;
    let verdict = classifier
        .classify(&image)
        .context("Unable to classify image")?;
    let metadata = metadata::extract(image_bytes);
    Ok(Examination {
        verdict,
        heatmap_image,
        metadata,
    })
}

/// Runs every analysis step for an upload.
///
/// The classifier is shared between every request, and is never modified after startup.
#[derive(Debug)]
pub(crate) struct Analyzer {
    heatmap_settings: HeatmapSettings,
    classifier: Arc<dyn Classifier>,
    archive: Option<Arc<dyn Archive>>,
}

impl Analyzer {
    pub(crate) fn new(
        heatmap_settings: HeatmapSettings,
        classifier: Arc<dyn Classifier>,
        archive: Option<Arc<dyn Archive>>,
    ) -> Self {
        Self {
            heatmap_settings,
            classifier,
            archive,
        }
    }

    /// Analyze an upload.
    ///
    /// The original is only archived once the analysis has succeeded, so failed requests never
    /// leave anything behind.
    #[instrument(
        level = "info",
        skip(self, upload),
        fields(content_type = %upload.content_type, size = upload.bytes.len())
    )]
    pub(crate) async fn analyze(&self, upload: Upload) -> Result<Report, AnalysisError> {
        let heatmap_settings = self.heatmap_settings;
        let classifier = Arc::clone(&self.classifier);
        let image_bytes = upload.bytes.clone();
        let examination = spawn_blocking(move || {
            examine(&image_bytes, &heatmap_settings, classifier.as_ref())
        })
        .map(flatten_join_result::<_, AnalysisError, AnalysisError>)
        .await?;
        let original_image_url = match &self.archive {
            Some(archive) => Some(
                archive
                    .store(upload.bytes, &upload.content_type)
                    .await
                    .context("Unable to archive original image")?,
            ),
            None => None,
        };
        debug!(verdict = ?examination.verdict, "analysis complete");
        Ok(Report {
            status: "success",
            source: Source { original_image_url },
            verdict: examination.verdict,
            evidence: Evidence {
                heatmap_image: examination.heatmap_image,
                metadata: examination.metadata,
            },
        })
    }
}

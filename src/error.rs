// SPDX-License-Identifier: GPL-3.0-or-later
use http::StatusCode;
use tokio::task::JoinError;

use std::error::Error as StdError;
use std::fmt;

/// Message returned to clients for any failure that isn't their fault.
pub(crate) const PROCESSING_FAILED: &str = "Server failed to process the image.";

pub(crate) const FILE_TOO_LARGE: &str = "File too large.";

/// Reasons an analysis request can fail.
#[derive(Debug)]
pub(crate) enum AnalysisError {
    /// The upload itself was unacceptable (not an image, or missing).
    Input(&'static str),

    /// The uploaded file is larger than the configured limit, in bytes.
    TooLarge(u64),

    /// The upload claimed to be an image, but it couldn't be decoded.
    Decode(image::ImageError),

    /// Anything that went wrong after the image was decoded.
    Processing(anyhow::Error),
}

impl AnalysisError {
    /// The HTTP status this error is reported with.
    pub(crate) fn status(&self) -> StatusCode {
        match self {
            Self::Input(_) => StatusCode::BAD_REQUEST,
            Self::TooLarge(_) => StatusCode::PAYLOAD_TOO_LARGE,
            Self::Decode(_) | Self::Processing(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// The message that is safe to show to the client.
    ///
    /// Only client errors describe themselves; everything else is the same generic message.
    pub(crate) fn public_message(&self) -> &'static str {
        match self {
            Self::Input(message) => message,
            Self::TooLarge(_) => FILE_TOO_LARGE,
            Self::Decode(_) | Self::Processing(_) => PROCESSING_FAILED,
        }
    }
}

impl fmt::Display for AnalysisError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Self::Input(message) => write!(f, "rejected upload: {}", message),
            Self::TooLarge(limit) => write!(f, "upload is larger than {} bytes", limit),
            Self::Decode(e) => write!(f, "unable to decode image: {}", e),
            Self::Processing(e) => write!(f, "unable to process image: {:#}", e),
        }
    }
}

impl StdError for AnalysisError {
    fn source(&self) -> Option<&(dyn StdError + 'static)> {
        match self {
            Self::Input(_) | Self::TooLarge(_) => None,
            Self::Decode(e) => Some(e),
            Self::Processing(e) => Some(&**e),
        }
    }
}

impl From<image::ImageError> for AnalysisError {
    fn from(e: image::ImageError) -> Self {
        Self::Decode(e)
    }
}

impl From<JoinError> for AnalysisError {
    fn from(e: JoinError) -> Self {
        Self::Processing(anyhow::Error::new(e).context("Analysis task was cancelled"))
    }
}

impl From<anyhow::Error> for AnalysisError {
    fn from(e: anyhow::Error) -> Self {
        Self::Processing(e)
    }
}

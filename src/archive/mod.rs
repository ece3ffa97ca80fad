// SPDX-License-Identifier: GPL-3.0-or-later
use async_trait::async_trait;
use bytes::Bytes;
use sha2::{Digest, Sha256};
use url::Url;

use std::fmt;
use std::sync::Arc;

mod directory;
#[cfg(feature = "http_archive")]
mod http_store;
mod settings;

pub(crate) use directory::DirectoryArchive;
#[cfg(feature = "http_archive")]
pub(crate) use http_store::HttpArchive;
pub(crate) use settings::ArchiveSettings;

/// Durable storage for uploaded originals.
#[async_trait]
pub(crate) trait Archive: fmt::Debug + Send + Sync {
    /// Store an image, returning where it can be found later.
    async fn store(&self, image: Bytes, content_type: &str) -> anyhow::Result<Url>;
}

/// The file extension to use for a given image content type.
fn extension(content_type: &str) -> String {
    let essence = content_type
        .split(';')
        .next()
        .unwrap_or_default()
        .trim()
        .to_ascii_lowercase();
    match essence.strip_prefix("image/") {
        Some("jpeg") | Some("pjpeg") | Some("jpg") => "jpg".to_string(),
        Some("svg+xml") => "svg".to_string(),
        Some(subtype)
            if !subtype.is_empty() && subtype.chars().all(|c| c.is_ascii_alphanumeric()) =>
        {
            subtype.to_string()
        }
        _ => "bin".to_string(),
    }
}

/// The name an image is stored under.
///
/// Names are derived from the image contents, so storing the same image twice is harmless.
pub(crate) fn object_key(image: &[u8], content_type: &str) -> String {
    format!(
        "{}.{}",
        hex::encode(Sha256::digest(image)),
        extension(content_type)
    )
}

/// Create the archive described by the settings, if archiving is enabled.
pub(crate) fn from_settings(settings: &ArchiveSettings) -> anyhow::Result<Option<Arc<dyn Archive>>> {
    Ok(match settings {
        ArchiveSettings::Disabled => None,
        ArchiveSettings::Directory { path } => {
            Some(Arc::new(DirectoryArchive::new(path.clone())?) as Arc<dyn Archive>)
        }
        #[cfg(feature = "http_archive")]
        ArchiveSettings::Http { url } => {
            Some(Arc::new(HttpArchive::new(url.clone())?) as Arc<dyn Archive>)
        }
        #[cfg(not(feature = "http_archive"))]
        ArchiveSettings::Http { .. } => {
            anyhow::bail!("HTTP archive configured, but HTTP archive support has not been enabled")
        }
    })
}

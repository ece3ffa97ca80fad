// SPDX-License-Identifier: GPL-3.0-or-later
use anyhow::{anyhow, Context as _};
use async_trait::async_trait;
use bytes::Bytes;
use tracing::{debug, instrument, warn};
use url::Url;

use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};

use super::{object_key, Archive};

/// Distinguishes partial files when the same image is stored by concurrent requests.
static PARTIAL_COUNTER: AtomicU64 = AtomicU64::new(0);

/// A file being written. It is removed when dropped unless it was persisted first.
struct PartialFile {
    path: PathBuf,
    persisted: bool,
}

impl PartialFile {
    fn new(directory: &Path, key: &str) -> Self {
        let count = PARTIAL_COUNTER.fetch_add(1, Ordering::Relaxed);
        Self {
            path: directory.join(format!(".{}.{}.partial", key, count)),
            persisted: false,
        }
    }

    /// Move the file to its final location.
    async fn persist(mut self, destination: &Path) -> io::Result<()> {
        tokio::fs::rename(&self.path, destination).await?;
        self.persisted = true;
        Ok(())
    }
}

impl Drop for PartialFile {
    fn drop(&mut self) {
        if self.persisted {
            return;
        }
        match fs::remove_file(&self.path) {
            Ok(()) => debug!(path = ?self.path, "removed partial file"),
            Err(err) if err.kind() == io::ErrorKind::NotFound => (),
            Err(err) => warn!(path = ?self.path, error = %err, "unable to remove partial file"),
        }
    }
}

/// Stores images in a local directory.
#[derive(Clone, Debug)]
pub(crate) struct DirectoryArchive {
    root: PathBuf,
}

impl DirectoryArchive {
    /// Create an archive in the given directory, creating the directory if needed.
    pub(crate) fn new(root: PathBuf) -> anyhow::Result<Self> {
        fs::create_dir_all(&root)
            .with_context(|| format!("Unable to create archive directory {:?}", root))?;
        // File URLs need absolute paths
        let root = fs::canonicalize(&root)
            .with_context(|| format!("Unable to resolve archive directory {:?}", root))?;
        Ok(Self { root })
    }
}

#[async_trait]
impl Archive for DirectoryArchive {
    #[instrument(level = "debug", skip(self, image), fields(size = image.len()))]
    async fn store(&self, image: Bytes, content_type: &str) -> anyhow::Result<Url> {
        let key = object_key(&image, content_type);
        let destination = self.root.join(&key);
        let partial = PartialFile::new(&self.root, &key);
        tokio::fs::write(&partial.path, &image)
            .await
            .with_context(|| format!("Unable to write {:?}", partial.path))?;
        partial
            .persist(&destination)
            .await
            .with_context(|| format!("Unable to move archived image to {:?}", destination))?;
        debug!(path = ?destination, "archived image");
        Url::from_file_path(&destination)
            .map_err(|_| anyhow!("{:?} cannot be expressed as a URL", destination))
    }
}

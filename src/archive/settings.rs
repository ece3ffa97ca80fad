// SPDX-License-Identifier: GPL-3.0-or-later
use serde::Deserialize;
use url::Url;

use std::path::PathBuf;

/// Where uploaded originals are kept.
#[derive(Clone, Debug, Deserialize, PartialEq)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub(crate) enum ArchiveSettings {
    /// Don't keep the originals.
    Disabled,

    /// Keep the originals in a local directory.
    Directory { path: PathBuf },

    /// Upload the originals to an HTTP server with `PUT` requests.
    Http { url: Url },
}

impl Default for ArchiveSettings {
    fn default() -> Self {
        Self::Disabled
    }
}

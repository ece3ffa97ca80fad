// SPDX-License-Identifier: GPL-3.0-or-later
use anyhow::Context as _;
use serde::Deserialize;
use tracing::{info, warn};

use std::fs;
use std::io;
use std::path::Path;

mod cli;
pub(crate) mod gradient;

use crate::archive::ArchiveSettings;
use crate::classifier::ClassifierSettings;
use crate::ela::HeatmapSettings;
use crate::server::ServerSettings;
pub(crate) use cli::Args;

const DEFAULT_CONFIG_PATH: &str = "config.toml";

#[derive(Debug, Default, Deserialize, PartialEq)]
pub(crate) struct Settings {
    /// Settings for the HTTP server.
    #[serde(default)]
    pub(crate) server: ServerSettings,

    /// How heatmaps are generated.
    #[serde(default)]
    pub(crate) heatmap: HeatmapSettings,

    #[serde(default)]
    pub(crate) classifier: ClassifierSettings,

    /// Where originals are archived, if anywhere.
    #[serde(default)]
    pub(crate) archive: ArchiveSettings,
}

impl Settings {
    /// Load the settings from the file given on the command line.
    ///
    /// If no file was given and there's no `config.toml` in the current directory, the defaults
    /// are used. A file given explicitly must exist.
    pub(crate) fn load(args: &Args) -> anyhow::Result<Self> {
        let path = args
            .config_path
            .as_deref()
            .unwrap_or_else(|| Path::new(DEFAULT_CONFIG_PATH));
        match fs::read(path) {
            Ok(data) => {
                info!(path = %path.display(), "loading configuration");
                toml::from_slice(&data)
                    .with_context(|| format!("Invalid configuration in {}", path.display()))
            }
            Err(e) if e.kind() == io::ErrorKind::NotFound && args.config_path.is_none() => {
                warn!(path = %path.display(), "configuration file not found, using defaults");
                Ok(Self::default())
            }
            Err(e) => Err(e)
                .with_context(|| format!("Unable to read configuration file {}", path.display())),
        }
    }
}

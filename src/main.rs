// SPDX-License-Identifier: GPL-3.0-or-later
use anyhow::Context as _;
use structopt::StructOpt;
use tracing::{debug, info, info_span};
use tracing_futures::Instrument;
use tracing_subscriber::EnvFilter;

use std::net::SocketAddr;
use std::sync::Arc;

mod archive;
mod classifier;
mod ela;
mod error;
mod image_buffer;
mod metadata;
mod pipeline;
mod server;
mod settings;
#[cfg(test)]
mod test_util;
mod util;

use crate::classifier::{Classifier, LinearClassifier};
use crate::pipeline::Analyzer;
use crate::settings::{Args, Settings};

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "unable to listen for shutdown signal");
        // Without a signal to wait on, keep serving until the process is killed.
        futures::future::pending::<()>().await;
    }
    info!("shutting down");
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(env_filter).init();
    let args = Args::from_args();
    let settings = Settings::load(&args)?;
    debug!(?settings, "loaded settings");

    // Load the model before accepting any requests.
    let classifier: Arc<dyn Classifier> = Arc::new(
        LinearClassifier::load(&settings.classifier).context("Unable to load the classifier")?,
    );
    let archive = archive::from_settings(&settings.archive)
        .context("Unable to set up the archive for uploaded images")?;
    let analyzer = Arc::new(Analyzer::new(settings.heatmap, classifier, archive));

    let routes = server::routes(analyzer, &settings.server);
    let bind_address: SocketAddr = settings.server.into();
    let (address, server) = warp::serve(routes)
        .try_bind_with_graceful_shutdown(bind_address, shutdown_signal())
        .with_context(|| format!("Unable to bind to {}", bind_address))?;
    info!(%address, "listening");
    server.instrument(info_span!("warp_server")).await;
    Ok(())
}

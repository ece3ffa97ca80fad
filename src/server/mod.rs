// SPDX-License-Identifier: GPL-3.0-or-later
//! The HTTP surface: a single multipart upload endpoint.
use bytes::{Buf, BufMut, Bytes, BytesMut};
use futures::TryStreamExt;
use http::StatusCode;
use serde::Serialize;
use tracing::{debug, error, warn};
use warp::multipart::FormData;
use warp::reply::Response;
use warp::{reject, Filter, Rejection, Reply};

use std::convert::Infallible;
use std::sync::Arc;

use crate::error::{AnalysisError, FILE_TOO_LARGE};
use crate::pipeline::{Analyzer, Upload, INVALID_FILE};

mod settings;

pub(crate) use settings::ServerSettings;

/// The multipart field the image is uploaded in.
const FILE_FIELD: &str = "file";

const NO_FILE: &str = "No file uploaded.";

const NOT_FOUND: &str = "Not found.";

const METHOD_NOT_ALLOWED: &str = "Method not allowed.";

#[derive(Debug, Serialize)]
struct ErrorDetail {
    detail: &'static str,
}

fn error_response(error: &AnalysisError) -> Response {
    let status = error.status();
    if status.is_server_error() {
        error!(error = %error, "failed to analyze upload");
    } else {
        debug!(error = %error, "rejected upload");
    }
    let body = warp::reply::json(&ErrorDetail {
        detail: error.public_message(),
    });
    warp::reply::with_status(body, status).into_response()
}

/// Pull the uploaded file out of a form, along with its declared content type.
///
/// Reading stops as soon as the file grows past `max_size` bytes.
async fn read_file(form: FormData, max_size: u64) -> Result<(Option<String>, Bytes), AnalysisError> {
    futures::pin_mut!(form);
    while let Some(part) = form.try_next().await.map_err(|e| {
        warn!(error = %e, "malformed multipart body");
        AnalysisError::Input(INVALID_FILE)
    })? {
        if part.name() != FILE_FIELD {
            debug!(field = part.name(), "skipping unknown form field");
            continue;
        }
        let content_type = part.content_type().map(str::to_string);
        let chunks = part.stream();
        futures::pin_mut!(chunks);
        let mut contents = BytesMut::new();
        while let Some(chunk) = chunks.try_next().await.map_err(|e| {
            warn!(error = %e, "unable to read uploaded file");
            AnalysisError::Input(INVALID_FILE)
        })? {
            if (contents.len() + chunk.remaining()) as u64 > max_size {
                return Err(AnalysisError::TooLarge(max_size));
            }
            contents.put(chunk);
        }
        return Ok((content_type, contents.freeze()));
    }
    Err(AnalysisError::Input(NO_FILE))
}

async fn analyze_upload(
    analyzer: Arc<Analyzer>,
    max_size: u64,
    form: FormData,
) -> Result<Response, Infallible> {
    let result = async {
        let (content_type, contents) = read_file(form, max_size).await?;
        let upload = Upload::new(content_type.as_deref(), contents)?;
        analyzer.analyze(upload).await
    }
    .await;
    Ok(match result {
        Ok(report) => warp::reply::with_status(warp::reply::json(&report), StatusCode::OK)
            .into_response(),
        Err(e) => error_response(&e),
    })
}

/// Give warp's own rejections the same JSON shape as every other error.
async fn handle_rejection(rejection: Rejection) -> Result<Response, Infallible> {
    let (status, detail) = if rejection.is_not_found() {
        (StatusCode::NOT_FOUND, NOT_FOUND)
    } else if rejection.find::<reject::PayloadTooLarge>().is_some() {
        (StatusCode::PAYLOAD_TOO_LARGE, FILE_TOO_LARGE)
    } else if rejection.find::<reject::MethodNotAllowed>().is_some() {
        (StatusCode::METHOD_NOT_ALLOWED, METHOD_NOT_ALLOWED)
    } else {
        // Everything else on the upload route is a body that isn't a usable multipart form.
        (StatusCode::BAD_REQUEST, INVALID_FILE)
    };
    debug!(?rejection, %status, "rejected request");
    let body = warp::reply::json(&ErrorDetail { detail });
    Ok(warp::reply::with_status(body, status).into_response())
}

/// Create the routes for the service.
pub(crate) fn routes(
    analyzer: Arc<Analyzer>,
    settings: &ServerSettings,
) -> impl Filter<Extract = impl Reply, Error = Infallible> + Clone {
    let analyzer = warp::any().map(move || Arc::clone(&analyzer));
    let max_size = settings.max_upload_size;
    warp::path!("api" / "analyze")
        .and(warp::post())
        .and(analyzer)
        .and(warp::any().map(move || max_size))
        .and(warp::multipart::form().max_length(settings.body_limit()))
        .and_then(analyze_upload)
        .recover(handle_rejection)
        .with(warp::trace::request())
}

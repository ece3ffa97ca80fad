// SPDX-License-Identifier: GPL-3.0-or-later
use anyhow::Context as _;
use async_trait::async_trait;
use bytes::Bytes;
use http::header::{CONTENT_LENGTH, CONTENT_TYPE};
use http::{Method, Request};
use hyper::client::HttpConnector;
use hyper::{Body, Client};
use tracing::{debug, instrument};
use url::Url;

use super::{object_key, Archive};

/// Stores images on an HTTP server, one `PUT` per image.
///
/// Any object store that accepts unauthenticated `PUT`s of whole objects works (MinIO and nginx's
/// WebDAV module, for example).
#[derive(Clone, Debug)]
pub(crate) struct HttpArchive {
    client: Client<HttpConnector>,
    base: Url,
}

impl HttpArchive {
    pub(crate) fn new(mut base: Url) -> anyhow::Result<Self> {
        if base.scheme() != "http" {
            anyhow::bail!(
                "Only plain HTTP archive URLs are supported, not {:?}",
                base.scheme()
            );
        }
        // Make sure joining object keys appends to the path instead of replacing the last segment.
        if !base.path().ends_with('/') {
            let directory_path = format!("{}/", base.path());
            base.set_path(&directory_path);
        }
        Ok(Self {
            client: Client::new(),
            base,
        })
    }
}

#[async_trait]
impl Archive for HttpArchive {
    #[instrument(level = "debug", skip(self, image), fields(size = image.len()))]
    async fn store(&self, image: Bytes, content_type: &str) -> anyhow::Result<Url> {
        let object_url = self.base.join(&object_key(&image, content_type))?;
        let request = Request::builder()
            .method(Method::PUT)
            .uri(object_url.as_str())
            .header(CONTENT_TYPE, content_type)
            .header(CONTENT_LENGTH, image.len())
            .body(Body::from(image))?;
        let response = self
            .client
            .request(request)
            .await
            .with_context(|| format!("Unable to upload image to {}", object_url))?;
        let status = response.status();
        if !status.is_success() {
            anyhow::bail!("Archive server responded to {} with {}", object_url, status);
        }
        debug!(url = %object_url, %status, "archived image");
        Ok(object_url)
    }
}

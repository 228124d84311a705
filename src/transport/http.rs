// SPDX-License-Identifier: GPL-3.0-only
use async_trait::async_trait;
use reqwest::Client;
use tracing::debug;

use crate::transport::traits::{HttpRequest, HttpResponse, Method, Transport, TransportError};

/// [`Transport`] backed by a shared reqwest client.
///
/// No client-level timeout is configured; per-attempt deadlines belong to
/// the request executor.
#[derive(Debug, Clone)]
pub struct ReqwestTransport {
    client: Client,
    base_url: String,
}

impl ReqwestTransport {
    pub fn new(base_url: impl Into<String>) -> anyhow::Result<Self> {
        let client = Client::builder()
            .user_agent(concat!("cartsync/", env!("CARGO_PKG_VERSION")))
            .build()?;

        Ok(Self {
            client,
            base_url: base_url.into(),
        })
    }

    fn build_request(&self, request: &HttpRequest) -> reqwest::RequestBuilder {
        let url = format!(
            "{}/{}",
            self.base_url.trim_end_matches('/'),
            request.path.trim_start_matches('/')
        );
        let mut builder = match request.method {
            Method::Get => self.client.get(&url),
            Method::Post => self.client.post(&url),
            Method::Put => self.client.put(&url),
            Method::Delete => self.client.delete(&url),
        };

        builder = builder.header("X-Request-Id", request.request_id.to_string());
        if let Some(ref token) = request.bearer {
            builder = builder.header("Authorization", format!("Bearer {}", token));
        }
        if let Some(ref body) = request.body {
            builder = builder.json(body);
        }

        builder
    }
}

#[async_trait]
impl Transport for ReqwestTransport {
    async fn send(&self, request: &HttpRequest) -> Result<HttpResponse, TransportError> {
        debug!(method = %request.method, path = %request.path, request_id = %request.request_id, "Sending request");

        let response = self
            .build_request(request)
            .send()
            .await
            .map_err(|e| TransportError::Connection(e.to_string()))?;

        let status = response.status().as_u16();
        let body = response
            .text()
            .await
            .map_err(|e| TransportError::Connection(e.to_string()))?;

        Ok(HttpResponse { status, body })
    }
}

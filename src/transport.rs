use std::time::Duration;

use async_trait::async_trait;

use crate::{request::UpstreamResponse, OutboundRequest, TransportError};

/// Performs a single HTTP attempt.
///
/// Implementations report any received response as `Ok`, whatever its status;
/// `Err` means no response was obtained.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn send(
        &self,
        request: &OutboundRequest,
        timeout: Duration,
    ) -> Result<UpstreamResponse, TransportError>;
}

/// [`Transport`] backed by a shared `reqwest` client.
#[derive(Clone, Debug, Default)]
pub struct ReqwestTransport {
    http: reqwest::Client,
}

impl ReqwestTransport {
    pub fn new(http: reqwest::Client) -> Self {
        Self { http }
    }
}

#[async_trait]
impl Transport for ReqwestTransport {
    async fn send(
        &self,
        request: &OutboundRequest,
        timeout: Duration,
    ) -> Result<UpstreamResponse, TransportError> {
        let response = self
            .http
            .request(request.method().clone(), request.url())
            .headers(request.headers().clone())
            .timeout(timeout)
            .body(request.body().to_vec())
            .send()
            .await?;

        let status = response.status();
        let headers = response.headers().clone();
        let body = response.bytes().await?;

        Ok(UpstreamResponse {
            status,
            headers,
            body: body.to_vec(),
        })
    }
}

use std::{fmt, sync::Arc};

use serde_json::json;

use crate::{
    provider::Provider, request::UpstreamResponse, transport::Transport, Forwarder, Generation,
    Prompt, RelayConfig, RelayError, Result,
};

#[cfg(feature = "raw-mode")]
use crate::raw::RawGeneration;

/// Serverless-style entry point: turns an inbound prompt request into one
/// upstream generation call.
#[derive(Clone)]
pub struct Relay {
    config: RelayConfig,
    forwarder: Forwarder,
}

impl fmt::Debug for Relay {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Relay")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

/// Status code and JSON body to send back to the original caller.
#[derive(Clone, Debug, PartialEq)]
pub struct HandlerResponse {
    pub status: u16,
    pub body: serde_json::Value,
}

impl HandlerResponse {
    fn text(text: String) -> Self {
        Self {
            status: 200,
            body: json!({ "text": text }),
        }
    }

    fn error(err: &RelayError) -> Self {
        Self {
            status: err.status_code(),
            body: json!({ "error": err.client_message() }),
        }
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    /// Body serialized for the response.
    pub fn body_string(&self) -> String {
        self.body.to_string()
    }
}

impl Relay {
    /// Creates a relay backed by a fresh `reqwest` client.
    pub fn new(config: RelayConfig) -> Self {
        let forwarder = Forwarder::new(config.options.clone());
        Self { config, forwarder }
    }

    /// Creates a relay whose upstream attempts go through `transport`.
    pub fn with_transport(config: RelayConfig, transport: Arc<dyn Transport>) -> Self {
        let forwarder = Forwarder::with_transport(transport, config.options.clone());
        Self { config, forwarder }
    }

    pub fn config(&self) -> &RelayConfig {
        &self.config
    }

    /// Sends `prompt` upstream and returns the generated text.
    pub async fn generate(&self, prompt: &Prompt) -> Result<Generation> {
        let provider = self.config.build_provider()?;
        self.generate_with(provider.as_ref(), prompt).await
    }

    /// Sends `prompt` upstream and returns the whole success document.
    #[cfg(feature = "raw-mode")]
    pub async fn generate_raw(&self, prompt: &Prompt) -> Result<RawGeneration> {
        let provider = self.config.build_provider()?;
        let response = self.forward(provider.as_ref(), prompt).await?;
        crate::provider::decode_object(&response).map(RawGeneration)
    }

    /// Handles one inbound request.
    ///
    /// Checks run in order: method must be `POST`, a credential must be
    /// configured, then the body must carry a prompt. An empty body counts as
    /// missing. Failures map to a status code and an `{"error": ...}` body.
    pub async fn handle(&self, method: &str, body: impl AsRef<[u8]>) -> HandlerResponse {
        match self.handle_inner(method, body.as_ref()).await {
            Ok(generation) => HandlerResponse::text(generation.text),
            Err(err) => {
                #[cfg(feature = "tracing")]
                log_failure(&err);
                HandlerResponse::error(&err)
            }
        }
    }

    async fn handle_inner(&self, method: &str, body: &[u8]) -> Result<Generation> {
        if !method.eq_ignore_ascii_case("POST") {
            return Err(RelayError::MethodNotAllowed {
                method: method.to_owned(),
            });
        }
        let provider = self.config.build_provider()?;
        if body.iter().all(u8::is_ascii_whitespace) {
            return Err(RelayError::BadRequest("Missing request body.".to_owned()));
        }
        let prompt = Prompt::from_json_slice(body)?;
        self.generate_with(provider.as_ref(), &prompt).await
    }

    async fn forward(&self, provider: &dyn Provider, prompt: &Prompt) -> Result<UpstreamResponse> {
        let request = provider.build_request(prompt)?;
        self.forwarder
            .execute(&request)
            .await
            .map_err(|err| provider.classify_error(err))
    }

    async fn generate_with(&self, provider: &dyn Provider, prompt: &Prompt) -> Result<Generation> {
        let response = self.forward(provider, prompt).await?;
        let text = provider.extract_text(&response)?;

        Ok(Generation {
            text,
            provider: provider.kind(),
            model: prompt
                .model
                .clone()
                .unwrap_or_else(|| provider.model().to_owned()),
        })
    }
}

#[cfg(feature = "tracing")]
fn log_failure(err: &RelayError) {
    if err.status_code() >= 500 {
        tracing::warn!(kind = ?err.kind(), "relay request failed: {err}");
    } else {
        tracing::debug!(kind = ?err.kind(), "relay request rejected: {err}");
    }
}

#[cfg(test)]
mod tests {
    use super::{HandlerResponse, Relay};
    use crate::{ProviderKind, RelayConfig, RelayError};

    #[tokio::test]
    async fn non_post_is_rejected_before_anything_else() {
        let relay = Relay::new(RelayConfig::default());
        let response = relay.handle("GET", "").await;
        assert_eq!(response.status, 405);
        assert!(!response.is_success());
    }

    #[tokio::test]
    async fn missing_key_is_reported_before_body_parsing() {
        let relay = Relay::new(RelayConfig::default());
        let response = relay.handle("POST", "not json").await;
        assert_eq!(response.status, 500);
        assert_eq!(
            response.body["error"],
            "Server configuration error: API key missing."
        );
    }

    #[tokio::test]
    async fn empty_body_is_bad_request() {
        let relay = Relay::new(RelayConfig::new(ProviderKind::Gemini, "key"));
        for body in ["", "  \n"] {
            let response = relay.handle("post", body).await;
            assert_eq!(response.status, 400);
        }
    }

    #[test]
    fn error_body_uses_client_message() {
        let response = HandlerResponse::error(&RelayError::BadRequest("nope".to_owned()));
        assert_eq!(response.status, 400);
        assert_eq!(response.body_string(), r#"{"error":"nope"}"#);
    }
}

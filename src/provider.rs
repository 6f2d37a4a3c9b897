use std::{fmt, str::FromStr};

use serde::{de::DeserializeOwned, Deserialize};

use crate::{
    gemini::Gemini, openai::OpenAi, request::UpstreamResponse, OutboundRequest, Prompt,
    RelayError, Result,
};

/// Upstream API families the relay can talk to.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub enum ProviderKind {
    #[default]
    Gemini,
    OpenAi,
}

impl ProviderKind {
    /// Environment variable holding this provider's API key.
    pub fn api_key_var(self) -> &'static str {
        match self {
            Self::Gemini => "GEMINI_API_KEY",
            Self::OpenAi => "OPENAI_API_KEY",
        }
    }

    pub fn default_model(self) -> &'static str {
        match self {
            Self::Gemini => "gemini-2.0-flash",
            Self::OpenAi => "gpt-4o",
        }
    }

    pub fn default_base_url(self) -> &'static str {
        match self {
            Self::Gemini => "https://generativelanguage.googleapis.com",
            Self::OpenAi => "https://api.openai.com",
        }
    }

    /// Display name used in caller-facing messages.
    pub fn label(self) -> &'static str {
        match self {
            Self::Gemini => "Gemini",
            Self::OpenAi => "OpenAI",
        }
    }

    pub(crate) fn build(
        self,
        api_key: &str,
        model: String,
        base_url: String,
    ) -> Box<dyn Provider> {
        match self {
            Self::Gemini => Box::new(Gemini::new(api_key, model, base_url)),
            Self::OpenAi => Box::new(OpenAi::new(api_key, model, base_url)),
        }
    }
}

impl fmt::Display for ProviderKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Gemini => "gemini",
            Self::OpenAi => "openai",
        })
    }
}

impl FromStr for ProviderKind {
    type Err = RelayError;

    fn from_str(value: &str) -> Result<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "gemini" | "google" => Ok(Self::Gemini),
            "openai" => Ok(Self::OpenAi),
            other => Err(RelayError::Config(format!("unknown provider '{other}'"))),
        }
    }
}

/// Per-provider payload mapping around the forwarder.
pub trait Provider: Send + Sync + fmt::Debug {
    fn kind(&self) -> ProviderKind;

    /// Model used when the prompt does not override it.
    fn model(&self) -> &str;

    /// Builds the upstream call for `prompt`.
    fn build_request(&self, prompt: &Prompt) -> Result<OutboundRequest>;

    /// Extracts generated text from a success response.
    fn extract_text(&self, response: &UpstreamResponse) -> Result<String>;

    /// Replaces raw HTTP failures with the message reported by upstream.
    fn classify_error(&self, error: RelayError) -> RelayError {
        match error {
            RelayError::Http { status, body } => RelayError::Upstream {
                status,
                message: upstream_message(&body)
                    .unwrap_or_else(|| format!("Error from {} API", self.kind().label())),
            },
            RelayError::RetriesExhausted { attempts, last } => RelayError::RetriesExhausted {
                attempts,
                last: Box::new(self.classify_error(*last)),
            },
            RelayError::DeadlineExceeded { deadline_ms, last } => RelayError::DeadlineExceeded {
                deadline_ms,
                last: last.map(|last| Box::new(self.classify_error(*last))),
            },
            other => other,
        }
    }
}

#[derive(Deserialize)]
struct ErrorEnvelope {
    error: ErrorBody,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum ErrorBody {
    Detailed {
        #[serde(default)]
        message: Option<String>,
    },
    Plain(String),
}

/// `error.message` (or a plain string `error`) from an upstream error body.
pub(crate) fn upstream_message(body: &str) -> Option<String> {
    let envelope: ErrorEnvelope = serde_json::from_str(body).ok()?;
    let message = match envelope.error {
        ErrorBody::Detailed { message } => message?,
        ErrorBody::Plain(message) => message,
    };
    let message = message.trim();
    (!message.is_empty()).then(|| message.to_owned())
}

/// Decodes a success body that must be a JSON object of shape `T`.
pub(crate) fn decode_object<T: DeserializeOwned>(response: &UpstreamResponse) -> Result<T> {
    let value: serde_json::Value = serde_json::from_slice(&response.body).map_err(|err| {
        RelayError::InvalidResponse(format!("body is not JSON: {err}; body: {}", response.text()))
    })?;
    if !value.is_object() {
        return Err(RelayError::InvalidResponse(format!(
            "expected a JSON object, got: {value}"
        )));
    }
    serde_json::from_value(value)
        .map_err(|err| RelayError::InvalidResponse(format!("unexpected response layout: {err}")))
}

/// Model names end up in URL paths and payloads; only plain identifiers are accepted.
pub(crate) fn is_valid_model(model: &str) -> bool {
    !model.is_empty()
        && !model.contains("..")
        && model
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.'))
}

/// Picks the model for one call. An invalid per-request override is the
/// caller's fault; an invalid configured model is a server-side one.
pub(crate) fn resolve_model<'a>(
    configured: &'a str,
    requested: Option<&'a str>,
) -> Result<&'a str> {
    match requested {
        Some(model) if is_valid_model(model) => Ok(model),
        Some(model) => Err(RelayError::BadRequest(format!(
            "invalid model name '{model}'"
        ))),
        None if is_valid_model(configured) => Ok(configured),
        None => Err(RelayError::Config(format!(
            "configured model '{configured}' is invalid"
        ))),
    }
}

pub(crate) fn endpoint(base_url: &str, path: &str) -> String {
    format!("{}/{}", base_url.trim_end_matches('/'), path.trim_start_matches('/'))
}

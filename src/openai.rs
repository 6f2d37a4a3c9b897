//! OpenAI chat completions adapter.

use std::fmt;

use reqwest::header;
use serde::{Deserialize, Serialize};

use crate::{
    provider::{decode_object, endpoint, resolve_model, Provider, ProviderKind},
    request::UpstreamResponse,
    OutboundRequest, Prompt, PromptInput, RelayError, Result,
};

#[derive(Clone)]
pub struct OpenAi {
    authorization: String,
    model: String,
    base_url: String,
}

impl fmt::Debug for OpenAi {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OpenAi")
            .field("authorization", &"<redacted>")
            .field("model", &self.model)
            .field("base_url", &self.base_url)
            .finish()
    }
}

impl OpenAi {
    /// Creates an adapter from an API key; the `Bearer ` prefix is optional.
    pub fn new(
        api_key: impl AsRef<str>,
        model: impl Into<String>,
        base_url: impl Into<String>,
    ) -> Self {
        Self {
            authorization: normalize_bearer_authorization(api_key.as_ref()),
            model: model.into(),
            base_url: base_url.into(),
        }
    }
}

#[derive(Serialize)]
struct ChatCompletionRequest<'a> {
    model: &'a str,
    messages: [ChatMessage<'a>; 1],
}

#[derive(Serialize)]
struct ChatMessage<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Debug, Deserialize)]
struct ChatCompletionResponse {
    #[serde(default)]
    choices: Option<Vec<Choice>>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    #[serde(default)]
    message: Option<ResponseMessage>,
    #[serde(default)]
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ResponseMessage {
    #[serde(default)]
    content: Option<String>,
    #[serde(default)]
    refusal: Option<String>,
}

impl Provider for OpenAi {
    fn kind(&self) -> ProviderKind {
        ProviderKind::OpenAi
    }

    fn model(&self) -> &str {
        &self.model
    }

    fn build_request(&self, prompt: &Prompt) -> Result<OutboundRequest> {
        let model = resolve_model(&self.model, prompt.model.as_deref())?;
        let PromptInput::Text(text) = &prompt.input else {
            return Err(RelayError::BadRequest(
                "structured \"contents\" are only supported by the gemini provider".to_owned(),
            ));
        };

        let payload = ChatCompletionRequest {
            model,
            messages: [ChatMessage {
                role: "user",
                content: text,
            }],
        };
        OutboundRequest::post_json(endpoint(&self.base_url, "v1/chat/completions"), &payload)?
            .with_header(header::AUTHORIZATION, &self.authorization, true)
    }

    fn extract_text(&self, response: &UpstreamResponse) -> Result<String> {
        let decoded: ChatCompletionResponse = decode_object(response)?;
        let choice = decoded
            .choices
            .and_then(|choices| choices.into_iter().next())
            .ok_or_else(|| RelayError::EmptyGeneration("response has no choices".to_owned()))?;

        let message = choice.message.ok_or_else(|| {
            RelayError::EmptyGeneration("choice has no message".to_owned())
        })?;
        match message.content {
            Some(content) if !content.is_empty() => Ok(content),
            _ => Err(RelayError::EmptyGeneration(
                match (message.refusal, choice.finish_reason) {
                    (Some(refusal), _) => format!("model refused: {refusal}"),
                    (None, Some(reason)) => format!("message has no content (finish reason {reason})"),
                    (None, None) => "message has no content".to_owned(),
                },
            )),
        }
    }
}

fn normalize_bearer_authorization(token: &str) -> String {
    let trimmed = token.trim();
    let prefix = trimmed.get(..7);
    if prefix.is_some_and(|value| value.eq_ignore_ascii_case("bearer ")) {
        trimmed.to_owned()
    } else {
        format!("Bearer {trimmed}")
    }
}

//! Google Gemini `generateContent` adapter.

use std::fmt;

use reqwest::header::HeaderName;
use serde::{Deserialize, Serialize};

use crate::{
    provider::{decode_object, endpoint, resolve_model, Provider, ProviderKind},
    request::UpstreamResponse,
    OutboundRequest, Prompt, PromptInput, RelayError, Result,
};

#[derive(Clone)]
pub struct Gemini {
    api_key: String,
    model: String,
    base_url: String,
}

impl fmt::Debug for Gemini {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Gemini")
            .field("api_key", &"<redacted>")
            .field("model", &self.model)
            .field("base_url", &self.base_url)
            .finish()
    }
}

impl Gemini {
    pub fn new(
        api_key: impl AsRef<str>,
        model: impl Into<String>,
        base_url: impl Into<String>,
    ) -> Self {
        Self {
            api_key: api_key.as_ref().trim().to_owned(),
            model: model.into(),
            base_url: base_url.into(),
        }
    }
}

#[derive(Serialize)]
struct GenerateContentRequest<'a> {
    contents: Contents<'a>,
}

#[derive(Serialize)]
#[serde(untagged)]
enum Contents<'a> {
    Typed(Vec<Content<'a>>),
    Raw(&'a serde_json::Value),
}

#[derive(Serialize)]
struct Content<'a> {
    role: &'static str,
    parts: Vec<Part<'a>>,
}

#[derive(Serialize)]
struct Part<'a> {
    text: &'a str,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GenerateContentResponse {
    #[serde(default)]
    candidates: Option<Vec<Candidate>>,
    #[serde(default)]
    prompt_feedback: Option<PromptFeedback>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Candidate {
    #[serde(default)]
    content: Option<CandidateContent>,
    #[serde(default)]
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Option<Vec<ResponsePart>>,
}

#[derive(Debug, Deserialize)]
struct ResponsePart {
    #[serde(default)]
    text: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PromptFeedback {
    #[serde(default)]
    block_reason: Option<String>,
}

impl Provider for Gemini {
    fn kind(&self) -> ProviderKind {
        ProviderKind::Gemini
    }

    fn model(&self) -> &str {
        &self.model
    }

    fn build_request(&self, prompt: &Prompt) -> Result<OutboundRequest> {
        let model = resolve_model(&self.model, prompt.model.as_deref())?;
        let url = endpoint(
            &self.base_url,
            &format!("v1beta/models/{model}:generateContent"),
        );

        let contents = match &prompt.input {
            PromptInput::Text(text) => Contents::Typed(vec![Content {
                role: "user",
                parts: vec![Part { text }],
            }]),
            PromptInput::Contents(raw) => Contents::Raw(raw),
        };

        OutboundRequest::post_json(url, &GenerateContentRequest { contents })?.with_header(
            HeaderName::from_static("x-goog-api-key"),
            &self.api_key,
            true,
        )
    }

    /// Concatenates the text parts of the first candidate.
    fn extract_text(&self, response: &UpstreamResponse) -> Result<String> {
        let decoded: GenerateContentResponse = decode_object(response)?;

        let block_reason = decoded
            .prompt_feedback
            .and_then(|feedback| feedback.block_reason);
        let Some(candidate) = decoded
            .candidates
            .and_then(|candidates| candidates.into_iter().next())
        else {
            return Err(RelayError::EmptyGeneration(match block_reason {
                Some(reason) => format!("prompt blocked: {reason}"),
                None => "response has no candidates".to_owned(),
            }));
        };

        let text: String = candidate
            .content
            .and_then(|content| content.parts)
            .unwrap_or_default()
            .into_iter()
            .filter_map(|part| part.text)
            .collect();

        if text.is_empty() {
            return Err(RelayError::EmptyGeneration(match candidate.finish_reason {
                Some(reason) => format!("candidate has no text (finish reason {reason})"),
                None => "candidate has no text".to_owned(),
            }));
        }
        Ok(text)
    }
}

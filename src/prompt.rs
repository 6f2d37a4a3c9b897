use serde::Deserialize;

use crate::{RelayError, Result};

/// What the caller wants generated.
#[derive(Clone, Debug, PartialEq)]
pub enum PromptInput {
    /// A single user prompt.
    Text(String),
    /// Gemini-style structured `contents`, forwarded untouched.
    Contents(serde_json::Value),
}

/// A prompt plus an optional per-request model override.
#[derive(Clone, Debug, PartialEq)]
pub struct Prompt {
    pub input: PromptInput,
    pub model: Option<String>,
}

impl Prompt {
    /// Builds a plain text prompt.
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            input: PromptInput::Text(text.into()),
            model: None,
        }
    }

    /// Builds a prompt from Gemini `contents`.
    pub fn contents(contents: serde_json::Value) -> Self {
        Self {
            input: PromptInput::Contents(contents),
            model: None,
        }
    }

    /// Overrides the configured model for this prompt only.
    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = Some(model.into());
        self
    }

    /// Parses an inbound JSON request body.
    ///
    /// Accepted fields, by precedence: `prompt`, `contents`, then the first
    /// entry of `messages`. `model` is optional.
    pub fn from_json_slice(body: &[u8]) -> Result<Self> {
        let request: PromptRequest = serde_json::from_slice(body)
            .map_err(|err| RelayError::BadRequest(format!("invalid JSON body: {err}")))?;
        request.into_prompt()
    }
}

impl From<&str> for Prompt {
    fn from(text: &str) -> Self {
        Self::text(text)
    }
}

impl From<String> for Prompt {
    fn from(text: String) -> Self {
        Self::text(text)
    }
}

#[derive(Debug, Deserialize)]
struct PromptRequest {
    #[serde(default)]
    prompt: Option<String>,
    #[serde(default)]
    contents: Option<serde_json::Value>,
    #[serde(default)]
    messages: Option<Vec<ChatMessage>>,
    #[serde(default)]
    model: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ChatMessage {
    #[serde(default)]
    content: Option<String>,
}

impl PromptRequest {
    fn into_prompt(self) -> Result<Prompt> {
        let model = self
            .model
            .map(|model| model.trim().to_owned())
            .filter(|model| !model.is_empty());

        let input = if let Some(prompt) = non_blank(self.prompt) {
            PromptInput::Text(prompt)
        } else if let Some(contents) = self.contents {
            match contents.as_array() {
                Some(items) if !items.is_empty() => PromptInput::Contents(contents),
                _ => {
                    return Err(RelayError::BadRequest(
                        "\"contents\" must be a non-empty array".to_owned(),
                    ))
                }
            }
        } else {
            let first = self
                .messages
                .and_then(|messages| messages.into_iter().next())
                .and_then(|message| non_blank(message.content));
            match first {
                Some(prompt) => PromptInput::Text(prompt),
                None => return Err(missing_prompt()),
            }
        };

        Ok(Prompt { input, model })
    }
}

fn non_blank(value: Option<String>) -> Option<String> {
    value.filter(|value| !value.trim().is_empty())
}

fn missing_prompt() -> RelayError {
    RelayError::BadRequest("Missing \"prompt\" in request body.".to_owned())
}

//! `genai-relay` forwards text prompts to generative-AI HTTP APIs.
//!
//! The crate is built around a retrying [`Forwarder`] that executes one
//! [`OutboundRequest`] against an unreliable upstream, plus thin provider
//! adapters for Google Gemini and OpenAI chat completions:
//! - [`Relay::generate`]: prompt in, generated text out
//! - [`Relay::handle`]: serverless-style handler (method + body in, status + JSON out)
//! - [`Forwarder::execute`]: the retry loop on its own

mod config;
mod error;
mod forwarder;
mod gemini;
mod openai;
mod options;
mod prompt;
mod provider;
mod relay;
mod request;
mod transport;
mod types;

#[cfg(feature = "raw-mode")]
pub mod raw;

pub use config::RelayConfig;
pub use error::{FailureKind, RelayError, TransportError, TransportErrorKind};
pub use forwarder::{CallOutcome, Forwarder};
pub use gemini::Gemini;
pub use openai::OpenAi;
pub use options::{ClientOptions, RetryPolicy};
pub use prompt::{Prompt, PromptInput};
pub use provider::{Provider, ProviderKind};
pub use relay::{HandlerResponse, Relay};
pub use request::{OutboundRequest, UpstreamResponse};
pub use transport::{ReqwestTransport, Transport};
pub use types::Generation;

pub type Result<T> = std::result::Result<T, RelayError>;

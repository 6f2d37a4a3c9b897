use std::fmt;

/// Error type returned by this crate.
#[derive(Debug, thiserror::Error)]
pub enum RelayError {
    /// The inbound request used a method other than `POST`.
    #[error("method {method} not allowed, only POST is supported")]
    MethodNotAllowed { method: String },
    /// The inbound request body is unusable.
    #[error("bad request: {0}")]
    BadRequest(String),
    /// No API key is configured for the selected provider.
    #[error("configuration error: {var} is not set")]
    MissingApiKey { var: &'static str },
    /// The relay has invalid configuration.
    #[error("configuration error: {0}")]
    Config(String),
    /// No response was received from upstream.
    #[error(transparent)]
    Transport(TransportError),
    /// Non-success HTTP status code with raw response body.
    #[error("http error {status}: {body}")]
    Http { status: u16, body: String },
    /// Non-success HTTP status code with the message reported by the provider.
    #[error("upstream error {status}: {message}")]
    Upstream { status: u16, message: String },
    /// A transient failure persisted through every attempt of the retry policy.
    #[error("retries exhausted after {attempts} attempts: {last}")]
    RetriesExhausted {
        attempts: u32,
        /// Failure observed on the final attempt.
        last: Box<RelayError>,
    },
    /// The overall call deadline elapsed.
    #[error("deadline of {deadline_ms} ms exceeded{}", last_failure_suffix(.last))]
    DeadlineExceeded {
        deadline_ms: u64,
        /// Last retryable failure received before the deadline, if any.
        last: Option<Box<RelayError>>,
    },
    /// A success response whose body does not have the expected shape.
    #[error("invalid upstream response shape: {0}")]
    InvalidResponse(String),
    /// A well-formed success response that carries no generated text.
    #[error("empty or malformed generation: {0}")]
    EmptyGeneration(String),
}

/// Coarse classification of a [`RelayError`].
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum FailureKind {
    /// Bad inbound request, never forwarded.
    Client,
    /// Missing or invalid relay configuration.
    Configuration,
    /// Rate limiting, server errors and transport failures.
    Transient,
    /// Upstream rejected the request; retrying cannot help.
    PermanentUpstream,
    /// Success status with a body that could not be decoded.
    InvalidResponse,
    /// Success payload without generated content.
    EmptyGeneration,
}

impl RelayError {
    pub fn kind(&self) -> FailureKind {
        match self {
            Self::MethodNotAllowed { .. } | Self::BadRequest(_) => FailureKind::Client,
            Self::MissingApiKey { .. } | Self::Config(_) => FailureKind::Configuration,
            Self::Transport(err) if err.is_retryable() => FailureKind::Transient,
            Self::Transport(_) => FailureKind::PermanentUpstream,
            Self::Http { status, .. } | Self::Upstream { status, .. } => {
                if is_retryable_status(*status) {
                    FailureKind::Transient
                } else {
                    FailureKind::PermanentUpstream
                }
            }
            Self::RetriesExhausted { .. } | Self::DeadlineExceeded { .. } => {
                FailureKind::Transient
            }
            Self::InvalidResponse(_) => FailureKind::InvalidResponse,
            Self::EmptyGeneration(_) => FailureKind::EmptyGeneration,
        }
    }

    /// Whether the forwarder would retry this failure if it saw it on an attempt.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Transport(err) => err.is_retryable(),
            Self::Http { status, .. } | Self::Upstream { status, .. } => {
                is_retryable_status(*status)
            }
            _ => false,
        }
    }

    /// HTTP status to report to the original caller.
    pub fn status_code(&self) -> u16 {
        match self {
            Self::MethodNotAllowed { .. } => 405,
            Self::BadRequest(_) => 400,
            Self::MissingApiKey { .. }
            | Self::Config(_)
            | Self::InvalidResponse(_)
            | Self::EmptyGeneration(_) => 500,
            Self::Transport(err) if err.is_timeout() => 504,
            Self::Transport(_) => 502,
            Self::Http { status, .. } | Self::Upstream { status, .. } => *status,
            Self::RetriesExhausted { last, .. } => last.status_code(),
            Self::DeadlineExceeded { .. } => 504,
        }
    }

    /// Message safe to return to the original caller.
    pub fn client_message(&self) -> String {
        match self {
            Self::MethodNotAllowed { .. } => {
                "Method Not Allowed. Only POST requests are supported.".to_owned()
            }
            Self::BadRequest(message) => message.clone(),
            Self::MissingApiKey { .. } => {
                "Server configuration error: API key missing.".to_owned()
            }
            Self::Config(_) => "Server configuration error.".to_owned(),
            Self::Http { .. } => "Error from AI API.".to_owned(),
            Self::Upstream { message, .. } => message.clone(),
            Self::RetriesExhausted { attempts, last } => {
                format!(
                    "AI API request failed after {attempts} attempts: {}",
                    last.client_message()
                )
            }
            Self::DeadlineExceeded { deadline_ms, last } => match last {
                Some(last) => format!(
                    "AI API request did not complete within {deadline_ms} ms: {}",
                    last.client_message()
                ),
                None => format!("AI API request did not complete within {deadline_ms} ms."),
            },
            Self::InvalidResponse(_) | Self::EmptyGeneration(_) => {
                "The AI failed to generate a valid response.".to_owned()
            }
            Self::Transport(_) => "Internal server error processing AI request.".to_owned(),
        }
    }
}

fn last_failure_suffix(last: &Option<Box<RelayError>>) -> String {
    match last {
        Some(last) => format!(", last failure: {last}"),
        None => String::new(),
    }
}

pub(crate) fn is_retryable_status(status: u16) -> bool {
    status == 429 || status >= 500
}

/// Failure to obtain any HTTP response for one attempt.
#[derive(Debug, thiserror::Error)]
#[error("transport error ({kind}): {message}")]
pub struct TransportError {
    kind: TransportErrorKind,
    message: String,
    #[source]
    source: Option<reqwest::Error>,
}

/// What went wrong while performing one attempt.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum TransportErrorKind {
    Timeout,
    Connect,
    Request,
    Body,
    /// The request could not be built; nothing was sent.
    Builder,
    Other,
}

impl fmt::Display for TransportErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Timeout => "timeout",
            Self::Connect => "connect",
            Self::Request => "request",
            Self::Body => "body",
            Self::Builder => "builder",
            Self::Other => "other",
        };
        f.write_str(name)
    }
}

impl TransportError {
    pub fn new(kind: TransportErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            source: None,
        }
    }

    pub fn kind(&self) -> TransportErrorKind {
        self.kind
    }

    pub fn is_timeout(&self) -> bool {
        self.kind == TransportErrorKind::Timeout
    }

    /// Every failure to reach upstream is retryable except a request that was never built.
    pub fn is_retryable(&self) -> bool {
        self.kind != TransportErrorKind::Builder
    }
}

impl From<reqwest::Error> for TransportError {
    fn from(err: reqwest::Error) -> Self {
        let kind = if err.is_timeout() {
            TransportErrorKind::Timeout
        } else if err.is_builder() {
            TransportErrorKind::Builder
        } else if err.is_connect() {
            TransportErrorKind::Connect
        } else if err.is_body() || err.is_decode() {
            TransportErrorKind::Body
        } else if err.is_request() {
            TransportErrorKind::Request
        } else {
            TransportErrorKind::Other
        };
        Self {
            kind,
            message: err.to_string(),
            source: Some(err),
        }
    }
}

impl From<TransportError> for RelayError {
    fn from(err: TransportError) -> Self {
        Self::Transport(err)
    }
}

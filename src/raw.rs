//! Raw upstream response passthrough.
//!
//! Enabled with the `raw-mode` feature.

/// Full JSON document returned by upstream on success.
#[derive(Clone, Debug, PartialEq)]
pub struct RawGeneration(pub serde_json::Value);

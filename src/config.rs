use std::{fmt, str::FromStr};

use crate::{
    provider::{resolve_model, Provider},
    ClientOptions, ProviderKind, RelayError, Result,
};

/// Explicit relay configuration.
///
/// A missing API key is accepted here and reported per request as a
/// configuration failure, so a misconfigured deployment still answers callers.
#[derive(Clone, Default)]
pub struct RelayConfig {
    pub provider: ProviderKind,
    pub api_key: Option<String>,
    /// Overrides [`ProviderKind::default_model`].
    pub model: Option<String>,
    /// Overrides [`ProviderKind::default_base_url`].
    pub base_url: Option<String>,
    pub options: ClientOptions,
}

impl fmt::Debug for RelayConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RelayConfig")
            .field("provider", &self.provider)
            .field("api_key", &self.api_key.as_ref().map(|_| "<redacted>"))
            .field("model", &self.model)
            .field("base_url", &self.base_url)
            .field("options", &self.options)
            .finish()
    }
}

impl RelayConfig {
    pub fn new(provider: ProviderKind, api_key: impl Into<String>) -> Self {
        Self {
            provider,
            api_key: Some(api_key.into()),
            ..Self::default()
        }
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = Some(model.into());
        self
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = Some(base_url.into());
        self
    }

    pub fn with_options(mut self, options: ClientOptions) -> Self {
        self.options = options;
        self
    }

    /// Reads configuration from process environment variables.
    ///
    /// Reads:
    /// - `GENAI_RELAY_PROVIDER`: `gemini` (default) or `openai`
    /// - `GEMINI_API_KEY` / `OPENAI_API_KEY`: credential of the selected provider
    /// - `GENAI_RELAY_MODEL`, `GENAI_RELAY_BASE_URL`
    /// - `GENAI_RELAY_TIMEOUT_MS`, `GENAI_RELAY_DEADLINE_MS`
    /// - `GENAI_RELAY_MAX_ATTEMPTS`, `GENAI_RELAY_INITIAL_DELAY_MS`,
    ///   `GENAI_RELAY_BACKOFF_MULTIPLIER`, `GENAI_RELAY_MAX_DELAY_MS`
    ///
    /// Unset or blank variables keep their defaults; unparseable values are
    /// returned as [`RelayError::Config`].
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Same as [`RelayConfig::from_env`], reading values through `lookup`.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |name: &str| {
            lookup(name)
                .map(|value| value.trim().to_owned())
                .filter(|value| !value.is_empty())
        };

        let provider = match get("GENAI_RELAY_PROVIDER") {
            Some(value) => value.parse()?,
            None => ProviderKind::default(),
        };

        let mut options = ClientOptions::default();
        if let Some(value) = parse_var(&get, "GENAI_RELAY_TIMEOUT_MS")? {
            options.timeout_ms = value;
        }
        options.deadline_ms = parse_var(&get, "GENAI_RELAY_DEADLINE_MS")?;
        if let Some(value) = parse_var(&get, "GENAI_RELAY_MAX_ATTEMPTS")? {
            options.retry.max_attempts = value;
        }
        if let Some(value) = parse_var(&get, "GENAI_RELAY_INITIAL_DELAY_MS")? {
            options.retry.initial_delay_ms = value;
        }
        if let Some(value) = parse_var::<f64, _>(&get, "GENAI_RELAY_BACKOFF_MULTIPLIER")? {
            if !(value.is_finite() && value > 0.0) {
                return Err(RelayError::Config(format!(
                    "GENAI_RELAY_BACKOFF_MULTIPLIER='{value}' must be a positive number"
                )));
            }
            options.retry.backoff_multiplier = value;
        }
        options.retry.max_delay_ms = parse_var(&get, "GENAI_RELAY_MAX_DELAY_MS")?;

        Ok(Self {
            provider,
            api_key: get(provider.api_key_var()),
            model: get("GENAI_RELAY_MODEL"),
            base_url: get("GENAI_RELAY_BASE_URL"),
            options,
        })
    }

    pub fn model(&self) -> &str {
        self.model
            .as_deref()
            .unwrap_or_else(|| self.provider.default_model())
    }

    pub fn base_url(&self) -> &str {
        self.base_url
            .as_deref()
            .unwrap_or_else(|| self.provider.default_base_url())
    }

    /// Builds the provider adapter, failing when no credential is configured
    /// or the configured model is not a plain identifier.
    pub(crate) fn build_provider(&self) -> Result<Box<dyn Provider>> {
        let api_key = self
            .api_key
            .as_deref()
            .map(str::trim)
            .filter(|key| !key.is_empty())
            .ok_or(RelayError::MissingApiKey {
                var: self.provider.api_key_var(),
            })?;
        let model = resolve_model(self.model(), None)?;
        Ok(self
            .provider
            .build(api_key, model.to_owned(), self.base_url().to_owned()))
    }
}

fn parse_var<T, G>(get: &G, name: &str) -> Result<Option<T>>
where
    T: FromStr,
    T::Err: fmt::Display,
    G: Fn(&str) -> Option<String>,
{
    get(name)
        .map(|value| {
            value
                .parse()
                .map_err(|err| RelayError::Config(format!("{name}='{value}' is invalid: {err}")))
        })
        .transpose()
}

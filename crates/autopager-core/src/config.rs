#![forbid(unsafe_code)]

//! Injected page configuration.
//!
//! The server drops one JSON object into the page before the engine starts,
//! naming the fetch endpoint, the identifier of the article being read, and
//! the CSS-selector-or-tag of the content root. Field names follow the
//! injected payload (`ajax_url` / `post_id` / `main_element`), not Rust
//! conventions.

use serde::{Deserialize, Serialize};

use crate::protocol::ArticleId;

/// Content root used when the configured selector is empty.
pub const DEFAULT_CONTENT_ROOT: &str = "main";

/// Configuration payload injected into the page.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PageConfig {
    /// Fetch-service endpoint URL.
    #[serde(rename = "ajax_url")]
    pub endpoint_url: String,
    /// Identifier of the article the page initially shows (the first cursor).
    #[serde(rename = "post_id")]
    pub article_id: ArticleId,
    /// CSS selector or bare tag naming the content-root element.
    #[serde(rename = "main_element", default)]
    pub content_root: String,
}

impl PageConfig {
    /// Parse and validate an injected configuration object.
    pub fn from_json(body: &str) -> Result<Self, ConfigError> {
        let config: Self =
            serde_json::from_str(body).map_err(|err| ConfigError::Invalid(err.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// The configured content root, falling back to [`DEFAULT_CONTENT_ROOT`].
    #[must_use]
    pub fn content_root(&self) -> &str {
        if self.content_root.trim().is_empty() {
            DEFAULT_CONTENT_ROOT
        } else {
            self.content_root.trim()
        }
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.endpoint_url.trim().is_empty() {
            return Err(ConfigError::MissingEndpoint);
        }
        Ok(())
    }
}

/// Configuration failure, fatal at init.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    /// The fetch endpoint URL is empty or absent.
    MissingEndpoint,
    /// The payload could not be parsed.
    Invalid(String),
}

impl core::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::MissingEndpoint => f.write_str("fetch endpoint url is missing"),
            Self::Invalid(detail) => write!(f, "invalid page config: {detail}"),
        }
    }
}

impl std::error::Error for ConfigError {}

#![forbid(unsafe_code)]

//! Error taxonomy for the pagination engine.
//!
//! Only two failures are fatal for a page load: a missing content root at
//! init, and an application-level error reply from the fetch service. Both
//! surface a user-visible message and permanently deactivate the feature.
//! Exhaustion ("no more articles") is a terminal *success* state and is not
//! represented here.

use crate::config::ConfigError;

/// Engine error type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PaginationError {
    /// No element matched the configured content-root selector at init.
    ContentRootNotFound(String),
    /// The fetch service reported an application-level error.
    Service(String),
    /// The injected page configuration was missing or invalid.
    Config(ConfigError),
    /// A service reply body did not match the wire contract.
    Decode(String),
}

impl core::fmt::Display for PaginationError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::ContentRootNotFound(selector) => {
                write!(f, "unable to locate content root {selector:?} - check your settings")
            }
            Self::Service(message) => write!(f, "fetch service error: {message}"),
            Self::Config(err) => write!(f, "configuration error: {err}"),
            Self::Decode(detail) => write!(f, "malformed service reply: {detail}"),
        }
    }
}

impl std::error::Error for PaginationError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Config(err) => Some(err),
            _ => None,
        }
    }
}

impl From<ConfigError> for PaginationError {
    fn from(err: ConfigError) -> Self {
        Self::Config(err)
    }
}

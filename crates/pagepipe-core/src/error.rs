//! Error types for pages.

use thiserror::Error;

/// Errors surfaced by page definitions and page instances.
///
/// Pagelet authorization failures are not represented here: they are
/// contained during discovery and never reach the caller.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PageError {
    /// A field not declared on the page type was set in development mode.
    #[error("field '{field}' is not declared on page '{page}'")]
    UndeclaredField { page: String, field: String },

    /// Two pagelets with the same name were registered on one page.
    #[error("pagelet '{0}' is registered twice")]
    DuplicatePagelet(String),

    /// No pagelet with the given name exists on the page.
    #[error("unknown pagelet: {0}")]
    UnknownPagelet(String),

    /// A route parameter failed its parser.
    #[error("invalid parameter '{name}': {reason}")]
    InvalidParam { name: String, reason: String },

    /// A parser was declared for a parameter the route did not supply.
    #[error("missing parameter: {0}")]
    MissingParam(String),

    /// Configuration error.
    #[error("configuration error: {0}")]
    Config(String),
}

impl PageError {
    /// Check if this error is raised by development-mode strictness.
    pub fn is_structural(&self) -> bool {
        matches!(self, PageError::UndeclaredField { .. })
    }
}

impl From<toml::de::Error> for PageError {
    fn from(err: toml::de::Error) -> Self {
        PageError::Config(err.to_string())
    }
}

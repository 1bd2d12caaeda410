//! Pagelet abstraction for independently authorized page parts.

use std::sync::Arc;

use async_trait::async_trait;
use pagepipe_core::{EnvironmentMode, RequestContext, Resources};

/// Why an authorization check could not produce an answer.
#[derive(Debug, thiserror::Error)]
pub enum AuthorizeError {
    #[error("authorization check for '{0}' failed: {1}")]
    Failed(String, #[source] anyhow::Error),

    #[error("authorization check for '{0}' panicked")]
    Panicked(String),
}

impl AuthorizeError {
    /// Wrap an arbitrary failure raised by the named pagelet.
    pub fn failed(pagelet: impl Into<String>, err: impl Into<anyhow::Error>) -> Self {
        Self::Failed(pagelet.into(), err.into())
    }

    /// Name of the pagelet whose check failed.
    pub fn pagelet(&self) -> &str {
        match self {
            Self::Failed(name, _) | Self::Panicked(name) => name,
        }
    }
}

/// What a pagelet learns about the page it is bound to.
#[derive(Debug, Clone)]
pub struct PageletBinding {
    /// Name of the owning page type.
    pub page: String,
    /// Route pattern of the owning page.
    pub path: String,
    /// Environment the page runs in.
    pub mode: EnvironmentMode,
    /// Resources shared by the page type.
    pub resources: Arc<Resources>,
}

impl PageletBinding {
    /// Create a binding for the named page.
    pub fn new(page: impl Into<String>, path: impl Into<String>, mode: EnvironmentMode) -> Self {
        Self {
            page: page.into(),
            path: path.into(),
            mode,
            resources: Arc::new(Resources::new()),
        }
    }

    /// Attach shared resources.
    pub fn with_resources(mut self, resources: Arc<Resources>) -> Self {
        self.resources = resources;
        self
    }
}

/// A pagelet is a self-contained part of a page.
///
/// A pagelet that does not override `authorize` has no check and is always
/// enabled. Overriding it is what makes the pagelet conditional.
#[async_trait]
pub trait Pagelet: Send + Sync {
    /// Pagelet name, unique within its page.
    fn name(&self) -> &str;

    /// Bind this pagelet to the page serving the current request.
    fn configure(&mut self, binding: &PageletBinding) {
        let _ = binding;
    }

    /// Decide if the pagelet may render for `request`.
    ///
    /// Returns `None` when the pagelet has no check. `request` is `None` when
    /// discovery runs outside a request.
    async fn authorize(&self, request: Option<&RequestContext>) -> Option<Result<bool, AuthorizeError>> {
        let _ = request;
        None
    }

    /// Clear per-request state before the pagelet goes back to its pool.
    fn recycle(&mut self) {}
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Plain;

    #[async_trait]
    impl Pagelet for Plain {
        fn name(&self) -> &str {
            "plain"
        }
    }

    #[tokio::test]
    async fn test_default_authorize_has_no_check() {
        let pagelet = Plain;

        assert!(pagelet.authorize(None).await.is_none());
    }

    #[test]
    fn test_authorize_error_pagelet_name() {
        let err = AuthorizeError::failed("cart", anyhow::anyhow!("backend down"));
        assert_eq!(err.pagelet(), "cart");
        assert!(err.to_string().contains("backend down"));

        let err = AuthorizeError::Panicked("hero".into());
        assert_eq!(err.pagelet(), "hero");
    }
}

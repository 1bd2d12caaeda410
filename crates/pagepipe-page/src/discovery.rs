//! Concurrent authorization of a page's pagelets.

use std::panic::AssertUnwindSafe;
use std::time::Instant;

use futures::future::join_all;
use futures::FutureExt;
use pagepipe_core::RequestContext;
use pagepipe_pagelet::{AuthorizeError, PooledPagelet};

/// How a pagelet's authorization settled.
#[derive(Debug)]
pub enum Authorization {
    /// The pagelet has no check of its own.
    Unconditional,
    /// The check answered `true`.
    Granted,
    /// The check answered `false`.
    Denied,
    /// The check errored or panicked.
    Failed(AuthorizeError),
}

impl Authorization {
    /// Whether the pagelet carried a check, whatever it answered.
    pub fn is_conditional(&self) -> bool {
        !matches!(self, Self::Unconditional)
    }

    /// Whether the pagelet may render.
    pub fn is_enabled(&self) -> bool {
        matches!(self, Self::Unconditional | Self::Granted)
    }

    /// Short label for logs.
    pub fn label(&self) -> &'static str {
        match self {
            Self::Unconditional => "unconditional",
            Self::Granted => "granted",
            Self::Denied => "denied",
            Self::Failed(_) => "failed",
        }
    }
}

/// Outcome of one pagelet's check, with when it ran.
#[derive(Debug)]
pub struct AuthorizationReport {
    /// Name of the factory the pagelet came from.
    pub pagelet: String,
    /// How the check settled.
    pub outcome: Authorization,
    /// When the check started.
    pub started: Instant,
    /// When the check settled.
    pub settled: Instant,
}

/// Run every pagelet's authorization concurrently.
///
/// Reports come back in the order of `pagelets`, whatever order the checks
/// settle in. A failing or panicking check only affects its own report.
pub async fn authorize_all(
    pagelets: &[PooledPagelet],
    request: Option<&RequestContext>,
) -> Vec<AuthorizationReport> {
    join_all(pagelets.iter().map(|pagelet| authorize_one(pagelet, request))).await
}

async fn authorize_one(
    pagelet: &PooledPagelet,
    request: Option<&RequestContext>,
) -> AuthorizationReport {
    let name = pagelet.factory().to_string();
    let started = Instant::now();

    let outcome = match AssertUnwindSafe(pagelet.authorize(request))
        .catch_unwind()
        .await
    {
        Ok(None) => Authorization::Unconditional,
        Ok(Some(Ok(true))) => Authorization::Granted,
        Ok(Some(Ok(false))) => Authorization::Denied,
        Ok(Some(Err(err))) => Authorization::Failed(err),
        Err(_) => Authorization::Failed(AuthorizeError::Panicked(name.clone())),
    };

    AuthorizationReport {
        pagelet: name,
        outcome,
        started,
        settled: Instant::now(),
    }
}

//! Recycling of page instances.

use std::sync::Arc;

use pagepipe_core::{PagePhase, RequestContext, ResponseContext};
use pagepipe_pagelet::{Pool, DEFAULT_POOL_CAPACITY};

use crate::definition::PageDefinition;
use crate::instance::PageInstance;

/// Bounded pool of instances of one page type.
#[derive(Debug)]
pub struct PagePool {
    definition: Arc<PageDefinition>,
    idle: Pool<PageInstance>,
}

impl PagePool {
    /// Create a pool with the default capacity.
    pub fn new(definition: Arc<PageDefinition>) -> Self {
        Self::with_capacity(definition, DEFAULT_POOL_CAPACITY)
    }

    /// Create a pool retaining at most `capacity` idle instances.
    pub fn with_capacity(definition: Arc<PageDefinition>, capacity: usize) -> Self {
        Self {
            definition,
            idle: Pool::new(capacity),
        }
    }

    /// The page type served by this pool.
    pub fn definition(&self) -> &Arc<PageDefinition> {
        &self.definition
    }

    /// Take an idle instance, or create one.
    pub fn checkout(&self) -> PageInstance {
        self.idle
            .acquire()
            .unwrap_or_else(|| PageInstance::new(Arc::clone(&self.definition)))
    }

    /// Take an instance and configure it for `request`.
    pub async fn serve(&self, request: RequestContext, response: ResponseContext) -> PageInstance {
        let mut page = self.checkout();
        page.configure(request, response).await;
        page
    }

    /// Return an instance once its request is finished.
    ///
    /// Instances whose discovery never completed are dropped rather than
    /// recycled. Returns whether the instance was kept.
    pub fn checkin(&self, mut page: PageInstance) -> bool {
        if !Arc::ptr_eq(page.definition(), &self.definition) {
            tracing::warn!(
                page = %page.definition().name(),
                pool = %self.definition.name(),
                "refusing instance of another page type"
            );
            return false;
        }
        if page.phase() == PagePhase::Discovering {
            tracing::warn!(
                page = %self.definition.name(),
                "dropping instance with an interrupted discovery"
            );
            return false;
        }

        page.reset();
        self.idle.release(page)
    }

    /// Number of idle instances.
    pub fn idle(&self) -> usize {
        self.idle.len()
    }
}

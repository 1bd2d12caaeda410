//! Pagelet factories and pooled allocation.

use std::fmt;
use std::ops::{Deref, DerefMut};
use std::sync::Arc;

use crate::pagelet::Pagelet;
use crate::pool::{Pool, DEFAULT_POOL_CAPACITY};

type Constructor = Arc<dyn Fn() -> Box<dyn Pagelet> + Send + Sync>;

/// Creates pagelets of one kind, recycling them through a bounded pool.
#[derive(Clone)]
pub struct PageletFactory {
    name: String,
    constructor: Constructor,
    pool: Arc<Pool<Box<dyn Pagelet>>>,
}

impl PageletFactory {
    /// Create a factory for pagelets built by `constructor`.
    pub fn new<P, F>(name: impl Into<String>, constructor: F) -> Self
    where
        P: Pagelet + 'static,
        F: Fn() -> P + Send + Sync + 'static,
    {
        Self {
            name: name.into(),
            constructor: Arc::new(move || Box::new(constructor()) as Box<dyn Pagelet>),
            pool: Arc::new(Pool::new(DEFAULT_POOL_CAPACITY)),
        }
    }

    /// Set how many idle pagelets the pool retains.
    pub fn with_pool_capacity(mut self, capacity: usize) -> Self {
        self.pool = Arc::new(Pool::new(capacity));
        self
    }

    /// Factory name; identifies the pagelet within its page.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Take a pagelet from the pool, or construct a new one.
    pub fn alloc(&self) -> PooledPagelet {
        let pagelet = match self.pool.acquire() {
            Some(pagelet) => pagelet,
            None => {
                tracing::trace!(pagelet = %self.name, "constructing pagelet");
                (self.constructor)()
            }
        };
        PooledPagelet {
            factory: self.name.clone(),
            inner: Some(pagelet),
            pool: Arc::clone(&self.pool),
            discarded: false,
        }
    }

    /// Number of idle pagelets waiting in the pool.
    pub fn idle(&self) -> usize {
        self.pool.len()
    }
}

impl fmt::Debug for PageletFactory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PageletFactory")
            .field("name", &self.name)
            .field("idle", &self.pool.len())
            .field("capacity", &self.pool.capacity())
            .finish()
    }
}

/// A pagelet on loan from its factory's pool.
///
/// Dropping it recycles the pagelet and returns it to the pool, unless it
/// was marked with [`PooledPagelet::discard`].
pub struct PooledPagelet {
    factory: String,
    inner: Option<Box<dyn Pagelet>>,
    pool: Arc<Pool<Box<dyn Pagelet>>>,
    discarded: bool,
}

impl PooledPagelet {
    /// Name of the factory that allocated this pagelet.
    pub fn factory(&self) -> &str {
        &self.factory
    }

    /// Keep this pagelet out of the pool once dropped.
    ///
    /// For pagelets left in an unknown state, such as one whose check panicked.
    pub fn discard(&mut self) {
        self.discarded = true;
    }

    /// Whether [`PooledPagelet::discard`] was called.
    pub fn is_discarded(&self) -> bool {
        self.discarded
    }
}

impl Deref for PooledPagelet {
    type Target = dyn Pagelet;

    fn deref(&self) -> &Self::Target {
        self.inner.as_deref().expect("pagelet is present until drop")
    }
}

impl DerefMut for PooledPagelet {
    fn deref_mut(&mut self) -> &mut Self::Target {
        self.inner.as_deref_mut().expect("pagelet is present until drop")
    }
}

impl Drop for PooledPagelet {
    fn drop(&mut self) {
        let Some(mut pagelet) = self.inner.take() else {
            return;
        };
        if self.discarded {
            tracing::debug!(pagelet = %self.factory, "dropping discarded pagelet");
            return;
        }
        pagelet.recycle();
        self.pool.release(pagelet);
    }
}

impl fmt::Debug for PooledPagelet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PooledPagelet")
            .field("factory", &self.factory)
            .field("discarded", &self.discarded)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use async_trait::async_trait;

    struct Counter;

    #[async_trait]
    impl Pagelet for Counter {
        fn name(&self) -> &str {
            "counter"
        }
    }

    #[test]
    fn test_alloc_constructs_when_pool_empty() {
        let built = Arc::new(AtomicUsize::new(0));
        let b = Arc::clone(&built);
        let factory = PageletFactory::new("counter", move || {
            b.fetch_add(1, Ordering::SeqCst);
            Counter
        });

        let first = factory.alloc();
        let second = factory.alloc();

        assert_eq!(built.load(Ordering::SeqCst), 2);
        assert_eq!(first.name(), "counter");
        assert_eq!(second.factory(), "counter");
    }

    #[test]
    fn test_drop_returns_pagelet_to_pool() {
        let built = Arc::new(AtomicUsize::new(0));
        let b = Arc::clone(&built);
        let factory = PageletFactory::new("counter", move || {
            b.fetch_add(1, Ordering::SeqCst);
            Counter
        });

        drop(factory.alloc());
        assert_eq!(factory.idle(), 1);

        let _reused = factory.alloc();
        assert_eq!(built.load(Ordering::SeqCst), 1);
        assert_eq!(factory.idle(), 0);
    }

    #[test]
    fn test_pool_capacity_zero_never_recycles() {
        let factory = PageletFactory::new("counter", || Counter).with_pool_capacity(0);

        drop(factory.alloc());
        assert_eq!(factory.idle(), 0);
    }

    #[test]
    fn test_discarded_pagelet_skips_pool() {
        let built = Arc::new(AtomicUsize::new(0));
        let b = Arc::clone(&built);
        let factory = PageletFactory::new("counter", move || {
            b.fetch_add(1, Ordering::SeqCst);
            Counter
        });

        let mut pagelet = factory.alloc();
        pagelet.discard();
        assert!(pagelet.is_discarded());
        drop(pagelet);
        assert_eq!(factory.idle(), 0);

        let _fresh = factory.alloc();
        assert_eq!(built.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_clones_share_pool() {
        let factory = PageletFactory::new("counter", || Counter);
        let clone = factory.clone();

        drop(clone.alloc());
        assert_eq!(factory.idle(), 1);
    }
}

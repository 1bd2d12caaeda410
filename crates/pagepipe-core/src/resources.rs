//! Shared resources attached to a page type.

use std::any::Any;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

/// Named, type-erased resources shared by every instance of a page type.
#[derive(Clone, Default)]
pub struct Resources {
    entries: HashMap<String, Arc<dyn Any + Send + Sync>>,
}

impl Resources {
    /// Create an empty resource map.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a resource under `name`, replacing any previous one.
    pub fn insert<T>(&mut self, name: impl Into<String>, resource: T)
    where
        T: Any + Send + Sync,
    {
        self.entries.insert(name.into(), Arc::new(resource));
    }

    /// Look up a resource by name and type.
    pub fn get<T>(&self, name: &str) -> Option<Arc<T>>
    where
        T: Any + Send + Sync,
    {
        self.entries
            .get(name)
            .and_then(|r| Arc::clone(r).downcast::<T>().ok())
    }

    /// Whether a resource with this name exists.
    pub fn contains(&self, name: &str) -> bool {
        self.entries.contains_key(name)
    }

    /// Registered resource names.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }

    /// Number of resources.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether no resources are registered.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl fmt::Debug for Resources {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut names: Vec<&str> = self.names().collect();
        names.sort_unstable();
        f.debug_struct("Resources").field("names", &names).finish()
    }
}

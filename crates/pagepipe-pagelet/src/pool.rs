//! Bounded free list for reusable objects.

use parking_lot::Mutex;

/// Default number of idle objects a pool retains.
pub const DEFAULT_POOL_CAPACITY: usize = 32;

/// A bounded free list.
///
/// `acquire` hands out an idle object if one exists; `release` keeps the
/// object only while the pool is below capacity.
#[derive(Debug)]
pub struct Pool<T> {
    idle: Mutex<Vec<T>>,
    capacity: usize,
}

impl<T> Pool<T> {
    /// Create a pool retaining at most `capacity` idle objects.
    pub fn new(capacity: usize) -> Self {
        Self {
            idle: Mutex::new(Vec::with_capacity(capacity.min(DEFAULT_POOL_CAPACITY))),
            capacity,
        }
    }

    /// Take an idle object, if any.
    pub fn acquire(&self) -> Option<T> {
        self.idle.lock().pop()
    }

    /// Return an object. Returns false if the pool was full and it was dropped.
    pub fn release(&self, item: T) -> bool {
        let mut idle = self.idle.lock();
        if idle.len() >= self.capacity {
            return false;
        }
        idle.push(item);
        true
    }

    /// Number of idle objects.
    pub fn len(&self) -> usize {
        self.idle.lock().len()
    }

    /// Whether the pool holds no idle objects.
    pub fn is_empty(&self) -> bool {
        self.idle.lock().is_empty()
    }

    /// Maximum number of idle objects retained.
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Drop every idle object.
    pub fn clear(&self) {
        self.idle.lock().clear();
    }
}

impl<T> Default for Pool<T> {
    fn default() -> Self {
        Self::new(DEFAULT_POOL_CAPACITY)
    }
}

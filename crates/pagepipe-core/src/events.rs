//! Subscribe/unsubscribe/emit capability for pages.

use std::fmt;

/// An event that can be routed by name.
pub trait Event {
    /// Name listeners subscribe to.
    fn name(&self) -> &str;
}

/// Handle returned by [`EventEmitter::on`], used to unsubscribe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerId(u64);

type Callback<E> = Box<dyn FnMut(&E) + Send>;

struct Listener<E> {
    id: ListenerId,
    event: String,
    once: bool,
    callback: Callback<E>,
}

/// Name-keyed event emitter owned by a page instance.
///
/// Listeners run synchronously, in registration order, on `emit`.
pub struct EventEmitter<E> {
    listeners: Vec<Listener<E>>,
    next_id: u64,
}

impl<E: Event> EventEmitter<E> {
    /// Create an emitter with no listeners.
    pub fn new() -> Self {
        Self {
            listeners: Vec::new(),
            next_id: 0,
        }
    }

    /// Subscribe to every `event` emission.
    pub fn on<F>(&mut self, event: impl Into<String>, callback: F) -> ListenerId
    where
        F: FnMut(&E) + Send + 'static,
    {
        self.register(event.into(), false, Box::new(callback))
    }

    /// Subscribe to the next `event` emission only.
    pub fn once<F>(&mut self, event: impl Into<String>, callback: F) -> ListenerId
    where
        F: FnMut(&E) + Send + 'static,
    {
        self.register(event.into(), true, Box::new(callback))
    }

    fn register(&mut self, event: String, once: bool, callback: Callback<E>) -> ListenerId {
        let id = ListenerId(self.next_id);
        self.next_id += 1;
        self.listeners.push(Listener {
            id,
            event,
            once,
            callback,
        });
        id
    }

    /// Unsubscribe a listener. Returns false if it was already gone.
    pub fn off(&mut self, id: ListenerId) -> bool {
        let before = self.listeners.len();
        self.listeners.retain(|l| l.id != id);
        self.listeners.len() != before
    }

    /// Deliver an event. Returns how many listeners were invoked.
    pub fn emit(&mut self, event: &E) -> usize {
        let name = event.name();
        let mut invoked = 0;
        for listener in self.listeners.iter_mut().filter(|l| l.event == name) {
            (listener.callback)(event);
            invoked += 1;
        }
        self.listeners.retain(|l| !(l.once && l.event == name));
        invoked
    }

    /// Number of listeners subscribed to `event`.
    pub fn listener_count(&self, event: &str) -> usize {
        self.listeners.iter().filter(|l| l.event == event).count()
    }

    /// Number of listeners across all events.
    pub fn total_listeners(&self) -> usize {
        self.listeners.len()
    }

    /// Drop every listener.
    pub fn remove_all_listeners(&mut self) {
        if !self.listeners.is_empty() {
            tracing::trace!(count = self.listeners.len(), "removing page listeners");
        }
        self.listeners.clear();
    }
}

impl<E: Event> Default for EventEmitter<E> {
    fn default() -> Self {
        Self::new()
    }
}

impl<E> fmt::Debug for EventEmitter<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventEmitter")
            .field("listeners", &self.listeners.len())
            .finish()
    }
}

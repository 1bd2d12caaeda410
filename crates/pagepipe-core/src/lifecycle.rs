//! Page lifecycle tracking.

use std::collections::HashMap;
use std::time::{Duration, Instant};

use crate::events::Event;

/// Where a page instance is in its per-request lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PagePhase {
    /// Freshly allocated or reset; holds no request state.
    #[default]
    Idle,
    /// Authorization checks are in flight.
    Discovering,
    /// Discovery finished; the page can render.
    Ready,
}

/// Events published on a page's emitter.
///
/// The page emits `Connected` and `Disconnected` itself. Discovery and
/// configuration emit nothing; `End` and `Custom` are emitted by whoever
/// drives the response, through `PageInstance::emit`.
#[derive(Debug, Clone, PartialEq)]
pub enum PageEvent {
    /// A real-time connection was opened.
    Connected(String),
    /// A real-time connection was closed.
    Disconnected(String),
    /// The response is complete.
    End,
    /// Application-defined event.
    Custom {
        name: String,
        payload: serde_json::Value,
    },
}

impl Event for PageEvent {
    fn name(&self) -> &str {
        match self {
            Self::Connected(_) => "connected",
            Self::Disconnected(_) => "disconnected",
            Self::End => "end",
            Self::Custom { name, .. } => name,
        }
    }
}

/// Timing context for observability.
#[derive(Debug, Clone)]
pub struct TimingContext {
    start: Instant,
    marks: HashMap<String, Instant>,
}

impl TimingContext {
    /// Create a new timing context.
    pub fn new() -> Self {
        Self {
            start: Instant::now(),
            marks: HashMap::new(),
        }
    }

    /// Record a timing mark.
    pub fn mark(&mut self, name: &str) {
        self.marks.insert(name.to_string(), Instant::now());
    }

    /// Record a timing mark observed at `at`.
    pub fn mark_at(&mut self, name: &str, at: Instant) {
        self.marks.insert(name.to_string(), at);
    }

    /// Mark the start of a pagelet's authorization check.
    pub fn mark_authorize_start(&mut self, pagelet: &str, at: Instant) {
        self.mark_at(&format!("pagelet_{}_start", pagelet), at);
    }

    /// Mark the settlement of a pagelet's authorization check.
    pub fn mark_authorize_settled(&mut self, pagelet: &str, at: Instant) {
        self.mark_at(&format!("pagelet_{}_settled", pagelet), at);
    }

    /// Get elapsed time since start.
    pub fn elapsed(&self) -> Duration {
        self.start.elapsed()
    }

    /// Time between two marks, if both were recorded.
    pub fn between(&self, from: &str, to: &str) -> Option<Duration> {
        let from = self.marks.get(from)?;
        let to = self.marks.get(to)?;
        Some(to.saturating_duration_since(*from))
    }

    /// Duration of the last discovery.
    pub fn discovery_time(&self) -> Option<Duration> {
        self.between("discover_start", "discover_end")
    }

    /// Timing for a specific pagelet's authorization check.
    pub fn pagelet_timing(&self, pagelet: &str) -> Option<PageletTiming> {
        let start_key = format!("pagelet_{}_start", pagelet);
        let settled_key = format!("pagelet_{}_settled", pagelet);

        let start = self.marks.get(&start_key)?;
        let settled = self.marks.get(&settled_key)?;

        Some(PageletTiming {
            name: pagelet.to_string(),
            start: start.saturating_duration_since(self.start),
            duration: settled.saturating_duration_since(*start),
        })
    }

    /// Forget all marks and restart the clock.
    pub fn reset(&mut self) {
        self.start = Instant::now();
        self.marks.clear();
    }
}

impl Default for TimingContext {
    fn default() -> Self {
        Self::new()
    }
}

/// Timing information for one pagelet's authorization.
#[derive(Debug, Clone)]
pub struct PageletTiming {
    /// Pagelet name.
    pub name: String,
    /// Time from page start to check start.
    pub start: Duration,
    /// Duration of the check.
    pub duration: Duration,
}

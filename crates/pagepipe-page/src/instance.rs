//! Per-request page instances.

use std::collections::HashMap;
use std::sync::Arc;

use http::StatusCode;
use pagepipe_core::{
    EventEmitter, ListenerId, PageError, PageEvent, PagePhase, RequestContext, ResponseContext,
    TimingContext,
};
use pagepipe_observability::StructuredLogger;
use pagepipe_pagelet::{AuthorizeError, PageletBinding, PooledPagelet};

use crate::connection::{Connection, ConnectionId};
use crate::definition::PageDefinition;
use crate::discovery::{authorize_all, Authorization};

/// A reusable container for one request's page state.
///
/// An instance serves one request at a time. [`PageInstance::configure`]
/// discards everything left from the previous request and re-runs pagelet
/// discovery; it takes `&mut self`, so two requests can never share an
/// instance concurrently.
#[derive(Debug)]
pub struct PageInstance {
    definition: Arc<PageDefinition>,
    binding: PageletBinding,
    request: Option<Arc<RequestContext>>,
    response: Option<ResponseContext>,
    connections: HashMap<ConnectionId, Connection>,
    conditional: Vec<String>,
    enabled: Vec<PooledPagelet>,
    disabled: Vec<PooledPagelet>,
    fields: HashMap<String, serde_json::Value>,
    events: EventEmitter<PageEvent>,
    timing: TimingContext,
    phase: PagePhase,
}

impl PageInstance {
    /// Create an idle instance of the given page type.
    pub fn new(definition: Arc<PageDefinition>) -> Self {
        let binding = definition.binding();
        Self {
            definition,
            binding,
            request: None,
            response: None,
            connections: HashMap::new(),
            conditional: Vec::new(),
            enabled: Vec::new(),
            disabled: Vec::new(),
            fields: HashMap::new(),
            events: EventEmitter::new(),
            timing: TimingContext::new(),
            phase: PagePhase::Idle,
        }
    }

    /// Prepare this instance for a new request.
    ///
    /// Clears all state left by the previous request, then discovers which
    /// pagelets the new request may see.
    pub async fn configure(
        &mut self,
        request: RequestContext,
        response: ResponseContext,
    ) -> &mut Self {
        if self.phase == PagePhase::Discovering {
            tracing::warn!(
                page = %self.definition.name(),
                "previous discovery was interrupted, discarding its state"
            );
        }

        self.reset();

        let request = Arc::new(request);
        self.request = Some(Arc::clone(&request));
        self.response = Some(response);
        self.discover(Some(&request)).await;

        self
    }

    /// Drop every piece of per-request state.
    ///
    /// Pagelets go back to their pools, connections close and listeners
    /// are removed.
    pub fn reset(&mut self) {
        self.connections.clear();
        self.conditional.clear();
        self.enabled.clear();
        self.disabled.clear();
        self.fields.clear();
        self.events.remove_all_listeners();
        self.request = None;
        self.response = None;
        self.timing.reset();
        self.phase = PagePhase::Idle;
    }

    /// Partition the page's pagelets into enabled and disabled for `request`.
    ///
    /// Every registered pagelet ends up in exactly one of the two lists,
    /// each list keeping registration order. Authorization failures disable
    /// the failing pagelet only; one whose check panicked is not pooled again.
    ///
    /// [`PageInstance::request`] follows the request discovered for, so
    /// `discover(None)` clears it.
    pub async fn discover(&mut self, request: Option<&RequestContext>) {
        self.phase = PagePhase::Discovering;
        self.timing.mark("discover_start");

        let current = self.request.as_deref().map(|r| &r.request_id);
        if current != request.map(|r| &r.request_id) {
            self.request = request.map(|r| Arc::new(r.clone()));
        }

        self.conditional.clear();
        self.enabled.clear();
        self.disabled.clear();

        let pagelets: Vec<PooledPagelet> = self
            .definition
            .pagelets()
            .iter()
            .map(|factory| {
                let mut pagelet = factory.alloc();
                pagelet.configure(&self.binding);
                pagelet
            })
            .collect();

        let reports = authorize_all(&pagelets, request).await;

        self.conditional = reports
            .iter()
            .filter(|r| r.outcome.is_conditional())
            .map(|r| r.pagelet.clone())
            .collect();

        for (mut pagelet, report) in pagelets.into_iter().zip(reports) {
            self.timing.mark_authorize_start(&report.pagelet, report.started);
            self.timing.mark_authorize_settled(&report.pagelet, report.settled);

            match &report.outcome {
                Authorization::Failed(err) => tracing::warn!(
                    page = %self.definition.name(),
                    pagelet = %report.pagelet,
                    error = %err,
                    "pagelet authorization failed, disabling"
                ),
                outcome => tracing::debug!(
                    page = %self.definition.name(),
                    pagelet = %report.pagelet,
                    outcome = outcome.label(),
                    "pagelet authorized"
                ),
            }

            if let Authorization::Failed(AuthorizeError::Panicked(_)) = report.outcome {
                pagelet.discard();
            }

            if report.outcome.is_enabled() {
                self.enabled.push(pagelet);
            } else {
                self.disabled.push(pagelet);
            }
        }

        self.timing.mark("discover_end");
        self.phase = PagePhase::Ready;
        self.log_discovery(request);
    }

    fn log_discovery(&self, request: Option<&RequestContext>) {
        let Some(request) = request else {
            tracing::debug!(
                page = %self.definition.name(),
                enabled = self.enabled.len(),
                disabled = self.disabled.len(),
                "discovered pagelets without a request"
            );
            return;
        };

        let logger = StructuredLogger::new(request.request_id.clone())
            .with_page(self.definition.name())
            .with_route(self.definition.route().as_str());
        let mut entry = logger
            .info_builder("pagelets discovered")
            .field_list("enabled", &self.enabled_names())
            .field_list("disabled", &self.disabled_names());
        if let Some(elapsed) = self.timing.discovery_time() {
            entry = entry.duration_us("discovery_us", elapsed);
        }
        entry.emit();
    }

    /// The page type this instance belongs to.
    pub fn definition(&self) -> &Arc<PageDefinition> {
        &self.definition
    }

    /// Lifecycle phase.
    pub fn phase(&self) -> PagePhase {
        self.phase
    }

    /// Status code the page answers with.
    pub fn status_code(&self) -> StatusCode {
        self.definition.status_code()
    }

    /// Request currently being served.
    pub fn request(&self) -> Option<&RequestContext> {
        self.request.as_deref()
    }

    /// Response of the request currently being served.
    pub fn response(&self) -> Option<&ResponseContext> {
        self.response.as_ref()
    }

    /// Mutable access to the response of the current request.
    pub fn response_mut(&mut self) -> Option<&mut ResponseContext> {
        self.response.as_mut()
    }

    /// Timing of the current request.
    pub fn timing(&self) -> &TimingContext {
        &self.timing
    }

    // === Pagelets ===

    /// Pagelets authorized for the current request.
    pub fn enabled_pagelets(&self) -> &[PooledPagelet] {
        &self.enabled
    }

    /// Pagelets rejected for the current request.
    pub fn disabled_pagelets(&self) -> &[PooledPagelet] {
        &self.disabled
    }

    /// Names of pagelets that carry their own authorization check.
    pub fn conditional_pagelets(&self) -> &[String] {
        &self.conditional
    }

    /// Names of the enabled pagelets.
    pub fn enabled_names(&self) -> Vec<&str> {
        self.enabled.iter().map(|p| p.factory()).collect()
    }

    /// Names of the disabled pagelets.
    pub fn disabled_names(&self) -> Vec<&str> {
        self.disabled.iter().map(|p| p.factory()).collect()
    }

    /// Whether the named pagelet may render for the current request.
    pub fn is_enabled(&self, name: &str) -> bool {
        self.enabled.iter().any(|p| p.factory() == name)
    }

    /// An enabled pagelet by name.
    pub fn pagelet(&self, name: &str) -> Result<&PooledPagelet, PageError> {
        self.enabled
            .iter()
            .find(|p| p.factory() == name)
            .ok_or_else(|| PageError::UnknownPagelet(name.to_string()))
    }

    // === Connections ===

    /// Register a real-time connection, replacing one with the same ID.
    pub fn add_connection(&mut self, connection: Connection) -> Option<Connection> {
        let id = connection.id().clone();
        let replaced = self.connections.insert(id.clone(), connection);
        self.events.emit(&PageEvent::Connected(id.to_string()));
        replaced
    }

    /// Remove a real-time connection, closing it once dropped.
    pub fn remove_connection(&mut self, id: &ConnectionId) -> Option<Connection> {
        let removed = self.connections.remove(id)?;
        self.events.emit(&PageEvent::Disconnected(id.to_string()));
        Some(removed)
    }

    /// A connection by ID.
    pub fn connection(&self, id: &ConnectionId) -> Option<&Connection> {
        self.connections.get(id)
    }

    /// All open connections.
    pub fn connections(&self) -> impl Iterator<Item = &Connection> {
        self.connections.values()
    }

    /// Number of open connections.
    pub fn connection_count(&self) -> usize {
        self.connections.len()
    }

    /// Send a message on every connection. Returns how many accepted it.
    pub fn broadcast(&self, message: &str) -> usize {
        self.connections
            .values()
            .filter(|c| c.send(message))
            .count()
    }

    // === Fields ===

    /// Set a per-request field.
    ///
    /// Outside production mode the field must be declared on the page type.
    pub fn set_field(
        &mut self,
        name: impl Into<String>,
        value: serde_json::Value,
    ) -> Result<(), PageError> {
        let name = name.into();
        if self.definition.mode().is_strict() && !self.definition.declares_field(&name) {
            return Err(PageError::UndeclaredField {
                page: self.definition.name().to_string(),
                field: name,
            });
        }
        self.fields.insert(name, value);
        Ok(())
    }

    /// A per-request field.
    pub fn field(&self, name: &str) -> Option<&serde_json::Value> {
        self.fields.get(name)
    }

    // === Events ===

    /// Subscribe to a page event.
    pub fn on<F>(&mut self, event: impl Into<String>, callback: F) -> ListenerId
    where
        F: FnMut(&PageEvent) + Send + 'static,
    {
        self.events.on(event, callback)
    }

    /// Subscribe to the next occurrence of a page event.
    pub fn once<F>(&mut self, event: impl Into<String>, callback: F) -> ListenerId
    where
        F: FnMut(&PageEvent) + Send + 'static,
    {
        self.events.once(event, callback)
    }

    /// Unsubscribe a listener.
    pub fn off(&mut self, id: ListenerId) -> bool {
        self.events.off(id)
    }

    /// Publish a page event.
    pub fn emit(&mut self, event: &PageEvent) -> usize {
        self.events.emit(event)
    }

    /// Number of listeners for an event.
    pub fn listener_count(&self, event: &str) -> usize {
        self.events.listener_count(event)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use async_trait::async_trait;
    use pagepipe_core::{EnvironmentMode, Method};
    use pagepipe_pagelet::{AuthorizeError, Pagelet, PageletFactory};

    struct Open(&'static str);

    #[async_trait]
    impl Pagelet for Open {
        fn name(&self) -> &str {
            self.0
        }
    }

    struct Gate(bool);

    #[async_trait]
    impl Pagelet for Gate {
        fn name(&self) -> &str {
            "gate"
        }

        async fn authorize(&self, _request: Option<&RequestContext>) -> Option<Result<bool, AuthorizeError>> {
            Some(Ok(self.0))
        }
    }

    struct Crashes;

    #[async_trait]
    impl Pagelet for Crashes {
        fn name(&self) -> &str {
            "crashes"
        }

        async fn authorize(&self, _request: Option<&RequestContext>) -> Option<Result<bool, AuthorizeError>> {
            panic!("half-updated state");
        }
    }

    fn page(mode: EnvironmentMode) -> Arc<PageDefinition> {
        PageDefinition::builder("home")
            .mode(mode)
            .field("title")
            .pagelet(PageletFactory::new("nav", || Open("nav")))
            .pagelet(PageletFactory::new("gate", || Gate(false)))
            .build()
            .unwrap()
    }

    fn request() -> RequestContext {
        RequestContext::new(Method::Get, "/")
    }

    #[test]
    fn test_new_instance_is_idle() {
        let instance = PageInstance::new(page(EnvironmentMode::Development));

        assert_eq!(instance.phase(), PagePhase::Idle);
        assert!(instance.enabled_pagelets().is_empty());
        assert!(instance.request().is_none());
        assert_eq!(instance.status_code(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_configure_partitions_and_records_conditional() {
        let mut instance = PageInstance::new(page(EnvironmentMode::Development));
        instance.configure(request(), ResponseContext::new()).await;

        assert_eq!(instance.phase(), PagePhase::Ready);
        assert_eq!(instance.enabled_names(), vec!["nav"]);
        assert_eq!(instance.disabled_names(), vec!["gate"]);
        assert_eq!(instance.conditional_pagelets(), &["gate".to_string()]);
        assert!(instance.is_enabled("nav"));
        assert!(instance.pagelet("gate").is_err());
        assert!(instance.timing().discovery_time().is_some());
        assert!(instance.timing().pagelet_timing("gate").is_some());
    }

    #[tokio::test]
    async fn test_discover_without_request() {
        let mut instance = PageInstance::new(page(EnvironmentMode::Development));
        instance.discover(None).await;

        assert_eq!(instance.enabled_names(), vec!["nav"]);
        assert_eq!(instance.disabled_names(), vec!["gate"]);
        assert!(instance.request().is_none());
    }

    #[tokio::test]
    async fn test_pagelet_with_only_a_check_is_disabled_on_denial() {
        let definition = PageDefinition::builder("admin")
            .pagelet(PageletFactory::new("admin", || Gate(false)))
            .pagelet(PageletFactory::new("nav", || Open("nav")))
            .build()
            .unwrap();
        let mut instance = PageInstance::new(definition);
        instance.configure(request(), ResponseContext::new()).await;

        assert_eq!(instance.enabled_names(), vec!["nav"]);
        assert_eq!(instance.disabled_names(), vec!["admin"]);
        assert_eq!(instance.conditional_pagelets(), &["admin".to_string()]);
    }

    #[tokio::test]
    async fn test_discover_none_clears_previous_request() {
        let mut instance = PageInstance::new(page(EnvironmentMode::Development));
        instance.configure(request(), ResponseContext::new()).await;
        assert!(instance.request().is_some());

        instance.discover(None).await;
        assert!(instance.request().is_none());

        let next = request();
        let id = next.request_id.clone();
        instance.discover(Some(&next)).await;
        assert_eq!(instance.request().map(|r| &r.request_id), Some(&id));
    }

    #[tokio::test]
    async fn test_configure_keeps_its_own_request() {
        let mut instance = PageInstance::new(page(EnvironmentMode::Development));
        let req = request().with_header("x-trace", "abc");
        instance.configure(req, ResponseContext::new()).await;

        assert_eq!(instance.request().and_then(|r| r.header("x-trace")), Some("abc"));
    }

    #[tokio::test]
    async fn test_panicked_pagelet_is_not_recycled() {
        let definition = PageDefinition::builder("fragile")
            .pagelet(PageletFactory::new("crashes", || Crashes))
            .pagelet(PageletFactory::new("nav", || Open("nav")))
            .build()
            .unwrap();
        let mut instance = PageInstance::new(Arc::clone(&definition));
        instance.configure(request(), ResponseContext::new()).await;

        assert_eq!(instance.disabled_names(), vec!["crashes"]);
        assert!(instance.disabled_pagelets()[0].is_discarded());

        instance.reset();

        let idle: Vec<usize> = definition.pagelets().iter().map(|f| f.idle()).collect();
        assert_eq!(idle, vec![0, 1]);
    }

    #[tokio::test]
    async fn test_discover_twice_does_not_accumulate() {
        let mut instance = PageInstance::new(page(EnvironmentMode::Development));
        instance.discover(None).await;
        instance.discover(None).await;

        assert_eq!(instance.enabled_pagelets().len(), 1);
        assert_eq!(instance.disabled_pagelets().len(), 1);
        assert_eq!(instance.conditional_pagelets().len(), 1);
    }

    #[tokio::test]
    async fn test_reset_returns_pagelets_to_pool() {
        let definition = page(EnvironmentMode::Development);
        let mut instance = PageInstance::new(Arc::clone(&definition));
        instance.configure(request(), ResponseContext::new()).await;

        instance.reset();

        assert_eq!(instance.phase(), PagePhase::Idle);
        assert!(definition.pagelets().iter().all(|f| f.idle() == 1));
    }

    #[test]
    fn test_set_field_sealed_in_development() {
        let mut instance = PageInstance::new(page(EnvironmentMode::Development));

        instance.set_field("title", serde_json::json!("Home")).unwrap();
        let err = instance.set_field("typo", serde_json::json!(1)).unwrap_err();

        assert!(err.is_structural());
        assert_eq!(instance.field("title"), Some(&serde_json::json!("Home")));
        assert!(instance.field("typo").is_none());
    }

    #[test]
    fn test_set_field_open_in_production() {
        let mut instance = PageInstance::new(page(EnvironmentMode::Production));

        instance.set_field("anything", serde_json::json!(true)).unwrap();
        assert_eq!(instance.field("anything"), Some(&serde_json::json!(true)));
    }

    #[test]
    fn test_connections_emit_events() {
        let mut instance = PageInstance::new(page(EnvironmentMode::Development));
        let seen = Arc::new(AtomicUsize::new(0));
        let s = Arc::clone(&seen);
        instance.on("connected", move |_| {
            s.fetch_add(1, Ordering::SeqCst);
        });

        let (conn, _rx) = Connection::open("c1");
        assert!(instance.add_connection(conn).is_none());
        assert_eq!(seen.load(Ordering::SeqCst), 1);
        assert_eq!(instance.connection_count(), 1);
        assert!(instance.connection(&ConnectionId::from("c1")).is_some());

        assert!(instance.remove_connection(&ConnectionId::from("c1")).is_some());
        assert!(instance.remove_connection(&ConnectionId::from("c1")).is_none());
        assert_eq!(instance.connection_count(), 0);
    }

    #[test]
    fn test_broadcast_counts_live_connections() {
        let mut instance = PageInstance::new(page(EnvironmentMode::Development));
        let (live, _live_rx) = Connection::open("live");
        let (dead, dead_rx) = Connection::open("dead");
        drop(dead_rx);
        instance.add_connection(live);
        instance.add_connection(dead);

        assert_eq!(instance.broadcast("tick"), 1);
    }

    #[test]
    fn test_once_and_off() {
        let mut instance = PageInstance::new(page(EnvironmentMode::Development));
        let id = instance.on("end", |_| {});
        instance.once("end", |_| {});
        assert_eq!(instance.listener_count("end"), 2);

        assert_eq!(instance.emit(&PageEvent::End), 2);
        assert_eq!(instance.listener_count("end"), 1);
        assert!(instance.off(id));
        assert_eq!(instance.emit(&PageEvent::End), 0);
    }
}

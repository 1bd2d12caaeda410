//! Immutable page type definitions.

use std::any::Any;
use std::collections::{HashMap, HashSet};
use std::fmt;
use std::sync::Arc;

use http::StatusCode;
use pagepipe_core::{EnvironmentMode, Method, PageConfig, PageError, Resources, RouteParams};
use pagepipe_pagelet::{PageletBinding, PageletFactory};

use crate::route::RoutePattern;

/// Converts a raw route parameter into a typed value.
pub type ParamParser = Arc<dyn Fn(&str) -> Result<serde_json::Value, String> + Send + Sync>;

/// Route parameters after parsing.
pub type ParsedParams = HashMap<String, serde_json::Value>;

/// Everything that is shared by all instances of one page type.
///
/// Built once through [`PageDefinition::builder`] and read-only afterwards;
/// per-request state lives on [`crate::PageInstance`].
pub struct PageDefinition {
    name: String,
    route: RoutePattern,
    methods: Vec<Method>,
    status_code: StatusCode,
    mode: EnvironmentMode,
    pagelets: Vec<PageletFactory>,
    parsers: HashMap<String, ParamParser>,
    resources: Arc<Resources>,
    fields: HashSet<String>,
}

impl PageDefinition {
    /// Start building a page type with default configuration.
    pub fn builder(name: impl Into<String>) -> PageDefinitionBuilder {
        PageDefinitionBuilder::new(PageConfig::new(name))
    }

    /// Start building a page type from a declarative configuration.
    pub fn from_config(config: PageConfig) -> PageDefinitionBuilder {
        PageDefinitionBuilder::new(config)
    }

    /// Page name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Route pattern.
    pub fn route(&self) -> &RoutePattern {
        &self.route
    }

    /// Accepted methods.
    pub fn methods(&self) -> &[Method] {
        &self.methods
    }

    /// Status code the page answers with.
    pub fn status_code(&self) -> StatusCode {
        self.status_code
    }

    /// Environment mode.
    pub fn mode(&self) -> EnvironmentMode {
        self.mode
    }

    /// Registered pagelet factories, in registration order.
    pub fn pagelets(&self) -> &[PageletFactory] {
        &self.pagelets
    }

    /// Names of the registered pagelets, in registration order.
    pub fn pagelet_names(&self) -> Vec<&str> {
        self.pagelets.iter().map(|p| p.name()).collect()
    }

    /// Shared resources.
    pub fn resources(&self) -> &Arc<Resources> {
        &self.resources
    }

    /// Typed lookup of a shared resource.
    pub fn resource<T>(&self, name: &str) -> Option<Arc<T>>
    where
        T: Any + Send + Sync,
    {
        self.resources.get(name)
    }

    /// Whether a per-request field may be set on instances of this page.
    pub fn declares_field(&self, field: &str) -> bool {
        self.fields.contains(field)
    }

    /// Match a method and path against this page.
    pub fn matches(&self, method: Method, path: &str) -> Option<RouteParams> {
        if !self.methods.contains(&method) {
            return None;
        }
        self.route.matches(path)
    }

    /// Run the declared parsers over route parameters.
    ///
    /// Parameters without a parser pass through as strings.
    pub fn parse_params(&self, params: &RouteParams) -> Result<ParsedParams, PageError> {
        let mut parsed = ParsedParams::with_capacity(params.len());

        for (name, raw) in params {
            let value = match self.parsers.get(name) {
                Some(parser) => parser(raw).map_err(|reason| PageError::InvalidParam {
                    name: name.clone(),
                    reason,
                })?,
                None => serde_json::Value::String(raw.clone()),
            };
            parsed.insert(name.clone(), value);
        }

        for name in self.route.param_names() {
            if self.parsers.contains_key(name) && !params.contains_key(name) {
                return Err(PageError::MissingParam(name.to_string()));
            }
        }

        Ok(parsed)
    }

    /// Binding handed to pagelets when an instance of this page allocates them.
    pub(crate) fn binding(&self) -> PageletBinding {
        PageletBinding::new(&self.name, self.route.as_str(), self.mode)
            .with_resources(Arc::clone(&self.resources))
    }
}

impl fmt::Debug for PageDefinition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PageDefinition")
            .field("name", &self.name)
            .field("route", &self.route.as_str())
            .field("methods", &self.methods)
            .field("status_code", &self.status_code)
            .field("mode", &self.mode)
            .field("pagelets", &self.pagelet_names())
            .field("resources", &self.resources)
            .finish()
    }
}

/// Builder for ergonomic page type definition.
pub struct PageDefinitionBuilder {
    config: PageConfig,
    pagelets: Vec<PageletFactory>,
    parsers: HashMap<String, ParamParser>,
    resources: Resources,
}

impl PageDefinitionBuilder {
    fn new(config: PageConfig) -> Self {
        Self {
            config,
            pagelets: Vec::new(),
            parsers: HashMap::new(),
            resources: Resources::new(),
        }
    }

    /// Set the route pattern.
    pub fn path(mut self, path: impl Into<String>) -> Self {
        self.config.path = path.into();
        self
    }

    /// Accept a single method.
    pub fn method(mut self, method: Method) -> Self {
        self.config.methods = vec![method];
        self
    }

    /// Accept several methods.
    pub fn methods(mut self, methods: &[Method]) -> Self {
        self.config.methods = methods.to_vec();
        self
    }

    /// Set the status code.
    pub fn status_code(mut self, status_code: u16) -> Self {
        self.config.status_code = status_code;
        self
    }

    /// Set the environment mode.
    pub fn mode(mut self, mode: EnvironmentMode) -> Self {
        self.config.mode = mode;
        self
    }

    /// Register a pagelet.
    pub fn pagelet(mut self, factory: PageletFactory) -> Self {
        self.pagelets.push(factory);
        self
    }

    /// Declare a parser for a route parameter.
    pub fn parser<F>(mut self, param: impl Into<String>, parser: F) -> Self
    where
        F: Fn(&str) -> Result<serde_json::Value, String> + Send + Sync + 'static,
    {
        self.parsers.insert(param.into(), Arc::new(parser));
        self
    }

    /// Attach a shared resource.
    pub fn resource<T>(mut self, name: impl Into<String>, resource: T) -> Self
    where
        T: Any + Send + Sync,
    {
        self.resources.insert(name, resource);
        self
    }

    /// Declare a per-request field.
    pub fn field(mut self, name: impl Into<String>) -> Self {
        self.config.fields.push(name.into());
        self
    }

    /// Validate and freeze the definition.
    pub fn build(self) -> Result<Arc<PageDefinition>, PageError> {
        self.config.validate()?;
        let route = RoutePattern::parse(&self.config.path)?;
        let status_code = self.config.status()?;

        {
            let mut seen = HashSet::new();
            for factory in &self.pagelets {
                if !seen.insert(factory.name()) {
                    return Err(PageError::DuplicatePagelet(factory.name().to_string()));
                }
            }
        }

        let mut methods = self.config.methods;
        let mut seen_methods = HashSet::new();
        methods.retain(|method| seen_methods.insert(*method));

        Ok(Arc::new(PageDefinition {
            name: self.config.name,
            route,
            methods,
            status_code,
            mode: self.config.mode,
            pagelets: self.pagelets,
            parsers: self.parsers,
            resources: Arc::new(self.resources),
            fields: self.config.fields.into_iter().collect(),
        }))
    }
}

//! Page type configuration.

use std::fmt;
use std::str::FromStr;

use http::StatusCode;
use serde::{Deserialize, Serialize};

use crate::context::Method;
use crate::error::PageError;

/// Environment variable consulted by [`EnvironmentMode::from_env`].
pub const ENV_MODE_VAR: &str = "PAGEPIPE_ENV";

/// Environment the page runs in.
///
/// Development mode seals page instances: only declared fields may be set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EnvironmentMode {
    #[default]
    Development,
    Production,
    Test,
}

impl EnvironmentMode {
    /// Read the mode from `PAGEPIPE_ENV`, defaulting to development.
    pub fn from_env() -> Self {
        Self::from_env_value(std::env::var(ENV_MODE_VAR).ok().as_deref())
    }

    /// Resolve a raw `PAGEPIPE_ENV` value. Unset or unknown values fall back
    /// to development.
    pub fn from_env_value(value: Option<&str>) -> Self {
        let Some(value) = value else {
            return Self::default();
        };
        value.parse().unwrap_or_else(|err| {
            tracing::warn!(var = ENV_MODE_VAR, error = %err, "ignoring environment mode");
            Self::default()
        })
    }

    /// Whether structural checks are enforced.
    pub fn is_strict(&self) -> bool {
        !matches!(self, Self::Production)
    }
}

impl FromStr for EnvironmentMode {
    type Err = PageError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "development" | "dev" => Ok(Self::Development),
            "production" | "prod" => Ok(Self::Production),
            "test" => Ok(Self::Test),
            other => Err(PageError::Config(format!("unknown environment: {}", other))),
        }
    }
}

impl fmt::Display for EnvironmentMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Development => write!(f, "development"),
            Self::Production => write!(f, "production"),
            Self::Test => write!(f, "test"),
        }
    }
}

/// Declarative configuration for a page type.
///
/// Pagelets, parsers and resources are code and are attached when the
/// page definition is built; everything else can come from TOML.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PageConfig {
    /// Page name.
    pub name: String,
    /// Route pattern (e.g., "/products/:id").
    #[serde(default = "default_path")]
    pub path: String,
    /// HTTP methods this page accepts.
    #[serde(default = "default_methods")]
    pub methods: Vec<Method>,
    /// Status code the page answers with.
    #[serde(default = "default_status_code")]
    pub status_code: u16,
    /// Environment mode.
    #[serde(default)]
    pub mode: EnvironmentMode,
    /// Per-request fields the page may set.
    #[serde(default)]
    pub fields: Vec<String>,
}

fn default_path() -> String {
    "/".to_string()
}

fn default_methods() -> Vec<Method> {
    vec![Method::Get]
}

fn default_status_code() -> u16 {
    200
}

impl PageConfig {
    /// Create a new page configuration with defaults.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            path: default_path(),
            methods: default_methods(),
            status_code: default_status_code(),
            mode: EnvironmentMode::default(),
            fields: Vec::new(),
        }
    }

    /// Parse a configuration from TOML.
    pub fn from_toml(input: &str) -> Result<Self, PageError> {
        let config: PageConfig = toml::from_str(input)?;
        config.validate()?;
        Ok(config)
    }

    /// Set the route pattern.
    pub fn with_path(mut self, path: impl Into<String>) -> Self {
        self.path = path.into();
        self
    }

    /// Set allowed HTTP methods.
    pub fn with_methods(mut self, methods: Vec<Method>) -> Self {
        self.methods = methods;
        self
    }

    /// Set the status code.
    pub fn with_status_code(mut self, status_code: u16) -> Self {
        self.status_code = status_code;
        self
    }

    /// Set the environment mode.
    pub fn with_mode(mut self, mode: EnvironmentMode) -> Self {
        self.mode = mode;
        self
    }

    /// Check the values serde cannot.
    pub fn validate(&self) -> Result<(), PageError> {
        if !self.path.starts_with('/') {
            return Err(PageError::Config(format!(
                "path must start with '/': {}",
                self.path
            )));
        }
        if self.methods.is_empty() {
            return Err(PageError::Config("at least one method is required".into()));
        }
        self.status()?;
        Ok(())
    }

    /// The configured status code as a typed value.
    pub fn status(&self) -> Result<StatusCode, PageError> {
        StatusCode::from_u16(self.status_code)
            .map_err(|_| PageError::Config(format!("invalid status code: {}", self.status_code)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_page_config_defaults() {
        let config = PageConfig::new("home");

        assert_eq!(config.path, "/");
        assert_eq!(config.methods, vec![Method::Get]);
        assert_eq!(config.status_code, 200);
        assert_eq!(config.mode, EnvironmentMode::Development);
    }

    #[test]
    fn test_page_config_from_toml() {
        let config = PageConfig::from_toml(
            r#"
            name = "product"
            path = "/products/:id"
            methods = ["GET", "POST"]
            status_code = 200
            mode = "production"
            fields = ["title"]
            "#,
        )
        .unwrap();

        assert_eq!(config.name, "product");
        assert_eq!(config.methods, vec![Method::Get, Method::Post]);
        assert_eq!(config.mode, EnvironmentMode::Production);
        assert_eq!(config.fields, vec!["title".to_string()]);
    }

    #[test]
    fn test_page_config_toml_defaults() {
        let config = PageConfig::from_toml(r#"name = "bare""#).unwrap();

        assert_eq!(config.path, "/");
        assert_eq!(config.status_code, 200);
    }

    #[test]
    fn test_page_config_rejects_bad_status() {
        let err = PageConfig::from_toml("name = \"x\"\nstatus_code = 1000").unwrap_err();
        assert!(matches!(err, PageError::Config(_)));
    }

    #[test]
    fn test_page_config_rejects_relative_path() {
        let err = PageConfig::from_toml("name = \"x\"\npath = \"about\"").unwrap_err();
        assert!(matches!(err, PageError::Config(_)));
    }

    #[test]
    fn test_environment_mode_parse() {
        assert_eq!("prod".parse::<EnvironmentMode>().unwrap(), EnvironmentMode::Production);
        assert_eq!("Development".parse::<EnvironmentMode>().unwrap(), EnvironmentMode::Development);
        assert!("staging".parse::<EnvironmentMode>().is_err());
    }

    #[test]
    fn test_environment_mode_strictness() {
        assert!(EnvironmentMode::Development.is_strict());
        assert!(EnvironmentMode::Test.is_strict());
        assert!(!EnvironmentMode::Production.is_strict());
    }

    #[test]
    fn test_environment_mode_from_env_value() {
        assert_eq!(EnvironmentMode::from_env_value(None), EnvironmentMode::Development);
        assert_eq!(EnvironmentMode::from_env_value(Some("production")), EnvironmentMode::Production);
        assert_eq!(EnvironmentMode::from_env_value(Some("staging")), EnvironmentMode::Development);
    }

    // The only test that touches PAGEPIPE_ENV.
    #[test]
    fn test_environment_mode_from_env_reads_variable() {
        std::env::set_var(ENV_MODE_VAR, "test");
        let mode = EnvironmentMode::from_env();
        std::env::remove_var(ENV_MODE_VAR);

        assert_eq!(mode, EnvironmentMode::Test);
        assert_eq!(EnvironmentMode::from_env(), EnvironmentMode::Development);
    }
}

//! Route patterns for page types.

use std::fmt;

use pagepipe_core::{PageError, RouteParams};

/// One segment of a route pattern.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Segment {
    /// Literal segment, matched exactly.
    Static(String),
    /// `:name`, matches any single segment.
    Param(String),
    /// `*name`, matches the rest of the path (possibly empty).
    Wildcard(String),
}

/// A parsed route pattern such as `/products/:id` or `/docs/*path`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoutePattern {
    raw: String,
    segments: Vec<Segment>,
}

impl RoutePattern {
    /// Parse a pattern.
    pub fn parse(pattern: &str) -> Result<Self, PageError> {
        if !pattern.starts_with('/') {
            return Err(PageError::Config(format!(
                "route must start with '/': {}",
                pattern
            )));
        }

        let mut segments = Vec::new();
        let parts: Vec<&str> = split_path(pattern).collect();
        for (i, part) in parts.iter().enumerate() {
            let segment = if let Some(name) = part.strip_prefix(':') {
                Segment::Param(checked_name(pattern, name)?)
            } else if let Some(name) = part.strip_prefix('*') {
                if i + 1 != parts.len() {
                    return Err(PageError::Config(format!(
                        "wildcard must be the last segment: {}",
                        pattern
                    )));
                }
                Segment::Wildcard(checked_name(pattern, name)?)
            } else {
                Segment::Static(part.to_string())
            };
            segments.push(segment);
        }

        let route = Self {
            raw: pattern.to_string(),
            segments,
        };

        let mut names = route.param_names();
        names.sort_unstable();
        if let Some(dup) = names.windows(2).find(|w| w[0] == w[1]) {
            return Err(PageError::Config(format!(
                "parameter '{}' appears twice in {}",
                dup[0], pattern
            )));
        }

        Ok(route)
    }

    /// The pattern as written.
    pub fn as_str(&self) -> &str {
        &self.raw
    }

    /// Parsed segments.
    pub fn segments(&self) -> &[Segment] {
        &self.segments
    }

    /// Names of the parameters this pattern captures.
    pub fn param_names(&self) -> Vec<&str> {
        self.segments
            .iter()
            .filter_map(|s| match s {
                Segment::Param(name) | Segment::Wildcard(name) => Some(name.as_str()),
                Segment::Static(_) => None,
            })
            .collect()
    }

    /// Match a request path, returning the captured parameters.
    pub fn matches(&self, path: &str) -> Option<RouteParams> {
        let path = path.split(['?', '#']).next().unwrap_or_default();
        let parts: Vec<&str> = split_path(path).collect();
        let mut params = RouteParams::new();

        for (i, segment) in self.segments.iter().enumerate() {
            match segment {
                Segment::Static(expected) => {
                    if parts.get(i) != Some(&expected.as_str()) {
                        return None;
                    }
                }
                Segment::Param(name) => {
                    let value = parts.get(i)?;
                    params.insert(name.clone(), (*value).to_string());
                }
                Segment::Wildcard(name) => {
                    let rest = parts.get(i..).unwrap_or_default().join("/");
                    params.insert(name.clone(), rest);
                    return Some(params);
                }
            }
        }

        (parts.len() == self.segments.len()).then_some(params)
    }
}

impl fmt::Display for RoutePattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.raw)
    }
}

fn split_path(path: &str) -> impl Iterator<Item = &str> {
    path.split('/').filter(|s| !s.is_empty())
}

fn checked_name(pattern: &str, name: &str) -> Result<String, PageError> {
    if name.is_empty() {
        return Err(PageError::Config(format!(
            "unnamed parameter in route {}",
            pattern
        )));
    }
    Ok(name.to_string())
}

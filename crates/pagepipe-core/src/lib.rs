//! Core abstractions for request-scoped page composition.
//!
//! This crate provides the fundamental types shared by pages and pagelets:
//! - `RequestContext` / `ResponseContext` - Per-request contexts
//! - `PageConfig` / `EnvironmentMode` - Page type configuration
//! - `EventEmitter` - Subscribe/unsubscribe/emit capability
//! - `Resources` - Shared resources of a page type
//! - `TimingContext` - Request lifecycle timing
//! - `PageError` - Page-level error taxonomy

mod config;
mod context;
mod error;
mod events;
mod lifecycle;
mod resources;

pub use config::*;
pub use context::*;
pub use error::*;
pub use events::*;
pub use lifecycle::*;
pub use resources::*;

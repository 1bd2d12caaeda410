//! Request-scoped pages.
//!
//! This crate turns an immutable page type into reusable per-request
//! instances:
//! - `PageDefinition` - Route, methods, pagelets, parsers and resources
//! - `PageInstance` - Pagelet discovery and per-request reset
//! - `Connection` - Real-time channels opened while a page renders
//! - `PagePool` - Recycling of configured instances

mod connection;
mod definition;
mod discovery;
mod instance;
mod pool;
mod route;

pub use connection::*;
pub use definition::*;
pub use discovery::*;
pub use instance::*;
pub use pool::*;
pub use route::*;

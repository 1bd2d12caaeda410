//! Pagelets: independently authorized parts of a page.
//!
//! This crate defines the contract pages consume:
//! - `Pagelet` - Binding and authorization interface
//! - `PageletFactory` - Allocation from a bounded pool
//! - `Pool` - Free list shared by pagelets and pages

mod factory;
mod pagelet;
mod pool;

pub use factory::*;
pub use pagelet::*;
pub use pool::*;

//! CLI command implementations.

pub mod list;
pub mod pin;
pub mod remove;
pub mod sync;

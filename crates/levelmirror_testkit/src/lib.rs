//! # levelmirror testkit
//!
//! Test utilities for levelmirror.
//!
//! This crate provides:
//! - Catalog record fixtures with a stable newest-first order
//! - Temporary SQLite mirrors with automatic cleanup
//! - Property-based generators for perturbed remote listings
//!
//! ## Usage
//!
//! ```rust,ignore
//! use levelmirror_testkit::prelude::*;
//!
//! #[test]
//! fn mirror_roundtrip() {
//!     with_temp_mirror(|gateway| {
//!         seed(gateway, &levels(1..=40));
//!         assert_eq!(gateway.record_count().unwrap(), 40);
//!     });
//! }
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

pub mod fixtures;
pub mod generators;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::fixtures::*;
    pub use crate::generators::*;
}

pub use fixtures::*;
pub use generators::*;

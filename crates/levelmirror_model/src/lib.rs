//! # levelmirror model
//!
//! Shared data types for the levelmirror workspace.
//!
//! This crate provides:
//! - `CatalogRecord` for one entry of the level catalog
//! - `Page` for a fixed-size batch of records with pagination metadata
//! - `ZipFileInfo` and `LevelContent` for downloaded level content
//! - The wire format of the remote JSON listing endpoint
//! - `FailureClass`, the failure taxonomy every error type maps onto
//!
//! This is a pure data crate with no I/O operations.

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod class;
mod content;
mod error;
mod json;
mod page;
mod record;

pub use class::FailureClass;
pub use content::{LevelContent, ScreenImage, ZipFileInfo};
pub use error::{ModelError, ModelResult};
pub use json::{JsonLevel, JsonNamed, JsonPage, JsonUser};
pub use page::{Page, Pagination, PAGE_SIZE};
pub use record::{group_rows, CatalogRecord, ExternalId};

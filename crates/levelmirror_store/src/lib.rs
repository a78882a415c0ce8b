//! # levelmirror store
//!
//! Database gateway over the SQLite mirror.
//!
//! This crate provides:
//! - Schema bootstrap on first open
//! - Ordered, paged reads of catalog records (newest first)
//! - Transactional writes: insert, attribute update, delete
//! - Relation add/remove with orphan cleanup of shared lookup rows
//!
//! ## Transactions
//!
//! Every write goes through [`SqliteGateway::transaction`]. The closure's
//! result decides the outcome: `Ok` commits, `Err` rolls back. One level's
//! mutation never shares a transaction with another's.
//!
//! All statements are parameterized; only fixed table names are formatted
//! into SQL text.

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod error;
mod gateway;
mod relation;
mod schema;

pub use error::{StoreError, StoreResult};
pub use gateway::{GatewayTx, RecordKey, SqliteGateway};
pub use relation::Relation;
pub use schema::SCHEMA_VERSION;

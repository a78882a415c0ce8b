//! Remove command implementation.

use crate::error::CliError;
use levelmirror_model::ExternalId;
use levelmirror_store::{SqliteGateway, StoreError};
use std::path::Path;
use tracing::info;

/// Runs the remove command.
pub fn run(db: &Path, external_id: u64) -> Result<(), CliError> {
    let gateway = SqliteGateway::open(db)?;
    remove(&gateway, ExternalId(external_id))?;
    println!("removed level {external_id}");
    Ok(())
}

/// Deletes a level with its relation rows and orphaned lookup rows.
pub fn remove(gateway: &SqliteGateway, external_id: ExternalId) -> Result<(), CliError> {
    let removed = gateway.transaction(|tx| -> Result<bool, StoreError> {
        tx.delete_record(external_id)
    })?;
    if !removed {
        return Err(CliError::Usage(format!("level {external_id} is not mirrored")));
    }
    info!(%external_id, "removed level");
    Ok(())
}

//! Applying planned mutations to a mirror.

use crate::error::ReconcileResult;
use crate::plan::Mutation;
use crate::source::MemoryPageSource;
use levelmirror_model::{CatalogRecord, ExternalId, LevelContent};
use levelmirror_store::{GatewayTx, RecordKey, Relation, SqliteGateway, StoreError, StoreResult};
use std::collections::{BTreeMap, HashSet};
use tracing::{debug, warn};

/// Destination of planned mutations.
pub trait MirrorApplier {
    /// Returns the mirrored version of a level.
    fn lookup(&self, external_id: ExternalId) -> ReconcileResult<Option<CatalogRecord>>;

    /// Returns true if the mirror holds this level.
    fn contains(&self, external_id: ExternalId) -> ReconcileResult<bool> {
        Ok(self.lookup(external_id)?.is_some())
    }

    /// Applies one mutation atomically.
    fn apply(&mut self, mutation: &Mutation) -> ReconcileResult<()>;
}

/// Applies mutations to the SQLite mirror, one transaction per mutation.
#[derive(Debug, Clone, Copy)]
pub struct GatewayApplier<'g> {
    gateway: &'g SqliteGateway,
}

impl<'g> GatewayApplier<'g> {
    /// Creates an applier writing to `gateway`.
    pub fn new(gateway: &'g SqliteGateway) -> Self {
        Self { gateway }
    }

    /// Replaces the archives and screenshots of a level with `content`.
    ///
    /// Applied as an added/removed-set diff keyed by MD5; rows no longer
    /// referenced by any level are deleted.
    pub fn apply_content(
        &self,
        external_id: ExternalId,
        content: &LevelContent,
    ) -> ReconcileResult<()> {
        self.gateway.transaction(|tx| -> ReconcileResult<()> {
            let (key, _) = tx
                .find_record(external_id)?
                .ok_or(StoreError::RecordNotFound {
                    external_id: external_id.get(),
                })?;
            for zip in &content.zip_files {
                tx.upsert_zip(zip)?;
            }
            for screen in &content.screens {
                tx.upsert_screen(screen)?;
            }
            let zips: Vec<&str> = content.zip_files.iter().map(|z| z.md5.as_str()).collect();
            let screens: Vec<&str> = content.screens.iter().map(|s| s.md5.as_str()).collect();
            sync_relation(tx, key, Relation::ZipFile, &zips)?;
            sync_relation(tx, key, Relation::Screen, &screens)?;
            debug!(%external_id, zips = zips.len(), screens = screens.len(), "applied content");
            Ok(())
        })
    }
}

impl MirrorApplier for GatewayApplier<'_> {
    fn lookup(&self, external_id: ExternalId) -> ReconcileResult<Option<CatalogRecord>> {
        Ok(self
            .gateway
            .find_record(external_id)?
            .map(|(_, record)| record))
    }

    fn apply(&mut self, mutation: &Mutation) -> ReconcileResult<()> {
        debug!(kind = mutation.kind(), external_id = %mutation.external_id(), "applying");
        let result = self.gateway.transaction(|tx| -> StoreResult<()> {
            match mutation {
                Mutation::Insert(record) => tx.insert_record(record).map(|_| ()),
                Mutation::Update(record) => {
                    let (key, _) = tx.find_record(record.external_id)?.ok_or(
                        StoreError::RecordNotFound {
                            external_id: record.external_id.get(),
                        },
                    )?;
                    tx.update_record_attributes(key, record)?;
                    sync_relation(tx, key, Relation::Author, &as_strs(&record.authors))?;
                    sync_relation(tx, key, Relation::Genre, &as_strs(&record.genres))?;
                    sync_relation(tx, key, Relation::Tag, &as_strs(&record.tags))
                }
                Mutation::Delete(external_id) => {
                    if !tx.delete_record(*external_id)? {
                        warn!(%external_id, "level already gone");
                    }
                    Ok(())
                }
            }
        });
        Ok(result?)
    }
}

fn as_strs(values: &[String]) -> Vec<&str> {
    values.iter().map(String::as_str).collect()
}

/// Diffs the relation rows of `key` against `wanted`.
fn sync_relation(
    tx: &GatewayTx<'_>,
    key: RecordKey,
    relation: Relation,
    wanted: &[&str],
) -> StoreResult<()> {
    let current = tx.related_values(key, relation)?;
    let wanted_set: HashSet<&str> = wanted.iter().copied().collect();
    let current_set: HashSet<&str> = current.iter().map(String::as_str).collect();

    for value in current.iter().filter(|v| !wanted_set.contains(v.as_str())) {
        tx.remove_relation(key, relation, value)?;
        tx.delete_lookup_if_orphaned(relation, value)?;
    }
    for value in wanted.iter().filter(|v| !current_set.contains(*v)) {
        tx.add_relation(key, relation, value)?;
    }
    Ok(())
}

/// In-memory mirror, for tests and dry runs.
#[derive(Debug, Clone, Default)]
pub struct MemoryApplier {
    records: BTreeMap<ExternalId, CatalogRecord>,
    applied: Vec<Mutation>,
}

impl MemoryApplier {
    /// Creates a mirror holding `records`.
    pub fn new(records: impl IntoIterator<Item = CatalogRecord>) -> Self {
        Self {
            records: records
                .into_iter()
                .map(|record| (record.external_id, record))
                .collect(),
            applied: Vec::new(),
        }
    }

    /// Returns the mirrored records, newest first.
    pub fn records_newest_first(&self) -> Vec<CatalogRecord> {
        let mut records: Vec<CatalogRecord> = self.records.values().cloned().collect();
        records.sort_by(|a, b| {
            b.release
                .cmp(&a.release)
                .then(b.external_id.cmp(&a.external_id))
        });
        records
    }

    /// Returns a page source over the current contents.
    pub fn to_source(&self) -> MemoryPageSource {
        MemoryPageSource::new("memory mirror", self.records_newest_first())
    }

    /// Returns every mutation applied so far.
    pub fn applied(&self) -> &[Mutation] {
        &self.applied
    }

    /// Returns the number of mirrored records.
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Returns true if the mirror is empty.
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

impl MirrorApplier for MemoryApplier {
    fn lookup(&self, external_id: ExternalId) -> ReconcileResult<Option<CatalogRecord>> {
        Ok(self.records.get(&external_id).cloned())
    }

    fn apply(&mut self, mutation: &Mutation) -> ReconcileResult<()> {
        match mutation {
            Mutation::Insert(record) => {
                if self.records.contains_key(&record.external_id) {
                    return Err(StoreError::InvalidValue {
                        message: format!("level {} already mirrored", record.external_id),
                    }
                    .into());
                }
                self.records.insert(record.external_id, record.clone());
            }
            Mutation::Update(record) => {
                let slot = self.records.get_mut(&record.external_id).ok_or(
                    StoreError::RecordNotFound {
                        external_id: record.external_id.get(),
                    },
                )?;
                *slot = record.clone();
            }
            Mutation::Delete(external_id) => {
                self.records.remove(external_id);
            }
        }
        self.applied.push(mutation.clone());
        Ok(())
    }
}

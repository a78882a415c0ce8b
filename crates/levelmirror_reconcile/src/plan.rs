//! Phase two: walking from the anchor and planning mutations.

use crate::applier::MirrorApplier;
use crate::error::ReconcileResult;
use crate::matcher::TailMatch;
use levelmirror_model::{CatalogRecord, ExternalId};
use std::collections::HashSet;
use tracing::debug;

/// One change to the mirror.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Mutation {
    /// Add a level not yet in the mirror.
    Insert(CatalogRecord),
    /// Bring an existing level in line with the remote record.
    Update(CatalogRecord),
    /// Remove a level no longer listed upstream.
    Delete(ExternalId),
}

impl Mutation {
    /// External ID of the affected level.
    pub fn external_id(&self) -> ExternalId {
        match self {
            Mutation::Insert(record) | Mutation::Update(record) => record.external_id,
            Mutation::Delete(id) => *id,
        }
    }

    /// Short name of the mutation kind.
    pub fn kind(&self) -> &'static str {
        match self {
            Mutation::Insert(_) => "insert",
            Mutation::Update(_) => "update",
            Mutation::Delete(_) => "delete",
        }
    }
}

/// Plans the mutations between the anchor and the newest records.
///
/// Local records are walked from the anchor toward index 0, each paired with
/// the next unconsumed remote record:
///
/// - same ID: update if any compared attribute differs
/// - different ID, but the local level appears elsewhere in the remote
///   window: the entry is displaced upstream; compare against it instead
/// - otherwise the level was removed upstream: delete
///
/// Remote records left unpaired are new upstream (or were displaced past the
/// anchor) and are emitted newest first, as an insert when the mirror lacks
/// them and as an update when the mirror holds a different version.
pub(crate) fn plan(
    tail: &TailMatch<'_>,
    mirror: &dyn MirrorApplier,
) -> ReconcileResult<Vec<Mutation>> {
    let anchor = tail.anchor;
    tail.local.get(anchor.local)?;
    tail.remote.get(anchor.remote)?;
    let remote = tail.remote.records();

    let mut mutations = Vec::new();
    let mut consumed = vec![false; remote.len()];
    let mut handled: HashSet<ExternalId> = HashSet::new();
    // Remote entries at indices below `cursor` have not been walked past.
    let mut cursor = anchor.remote + 1;

    for l in (0..=anchor.local).rev() {
        let local = tail.local.get(l)?;
        if !handled.insert(local.external_id) {
            continue;
        }

        while cursor > 0
            && (consumed[cursor - 1] || handled_elsewhere(&handled, local, &remote[cursor - 1]))
        {
            cursor -= 1;
        }

        if cursor > 0 && remote[cursor - 1].external_id == local.external_id {
            cursor -= 1;
            consumed[cursor] = true;
            if !local.same_attributes(&remote[cursor]) {
                mutations.push(Mutation::Update(remote[cursor].clone()));
            }
            continue;
        }

        let displaced = (0..remote.len())
            .find(|&p| !consumed[p] && remote[p].external_id == local.external_id);
        match displaced {
            Some(p) => {
                debug!(external_id = %local.external_id, position = p, "displaced upstream");
                consumed[p] = true;
                if !local.same_attributes(&remote[p]) {
                    mutations.push(Mutation::Update(remote[p].clone()));
                }
            }
            None => mutations.push(Mutation::Delete(local.external_id)),
        }
    }

    for (p, record) in remote[..=anchor.remote].iter().enumerate() {
        if consumed[p] || !handled.insert(record.external_id) {
            continue;
        }
        match mirror.lookup(record.external_id)? {
            None => mutations.push(Mutation::Insert(record.clone())),
            Some(existing) if !existing.same_attributes(record) => {
                mutations.push(Mutation::Update(record.clone()));
            }
            Some(_) => {}
        }
    }

    Ok(mutations)
}

/// True if `remote` is a repeat of a level already walked, other than `local`.
fn handled_elsewhere(
    handled: &HashSet<ExternalId>,
    local: &CatalogRecord,
    remote: &CatalogRecord,
) -> bool {
    remote.external_id != local.external_id && handled.contains(&remote.external_id)
}

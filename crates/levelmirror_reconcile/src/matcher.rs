//! Phase one: finding the tail anchor.

use crate::config::ReconcileConfig;
use crate::error::{ReconcileError, ReconcileResult};
use crate::source::{PageSource, Side};
use crate::window::SequenceWindow;
use levelmirror_model::ExternalId;
use std::collections::HashMap;
use std::fmt;
use tracing::{debug, warn};

/// Positions in the local and remote windows holding the same level.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TailAnchor {
    /// Index into the local window.
    pub local: usize,
    /// Index into the remote window.
    pub remote: usize,
}

impl fmt::Display for TailAnchor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "(local {}, remote {})", self.local, self.remote)
    }
}

/// An established anchor together with the windows it indexes into.
pub struct TailMatch<'s> {
    /// The anchor.
    pub anchor: TailAnchor,
    /// Local window.
    pub local: SequenceWindow<'s>,
    /// Remote window.
    pub remote: SequenceWindow<'s>,
    /// True if the overshoot search found no pair and the batch match was
    /// used as the anchor.
    pub fallback: bool,
}

impl TailMatch<'_> {
    /// External ID both sides hold at the anchor.
    pub fn anchor_id(&self) -> ReconcileResult<ExternalId> {
        Ok(self.local.get(self.anchor.local)?.external_id)
    }
}

pub(crate) fn match_tails<'s>(
    config: &ReconcileConfig,
    local_source: &'s dyn PageSource,
    remote_source: &'s dyn PageSource,
) -> ReconcileResult<TailMatch<'s>> {
    let tail_len = config.tail_len();
    let mut local = SequenceWindow::new(Side::Local, local_source, config.max_pages);
    let mut remote = SequenceWindow::new(Side::Remote, remote_source, config.max_pages);
    local.seed()?;
    remote.seed()?;

    let drift = |reason: String, local: &SequenceWindow<'_>, remote: &SequenceWindow<'_>| {
        ReconcileError::Drift {
            reason,
            local_pages: local.pages_loaded(),
            remote_pages: remote.pages_loaded(),
        }
    };

    if !local.ensure_len(tail_len)? {
        return Err(drift(
            format!("local mirror holds {} of {tail_len} tail records", local.len()),
            &local,
            &remote,
        ));
    }

    // Batch match: the first remote entry whose ID appears anywhere in the tail.
    let mut tail: HashMap<ExternalId, usize> = HashMap::with_capacity(tail_len);
    for (index, record) in local.records()[..tail_len].iter().enumerate() {
        tail.entry(record.external_id).or_insert(index);
    }
    let mut i = 0;
    let batch = loop {
        if !remote.ensure_len(i + 1)? {
            return Err(drift(
                format!("none of the newest {tail_len} local records found upstream"),
                &local,
                &remote,
            ));
        }
        let id = remote.get(i)?.external_id;
        if let Some(&j) = tail.get(&id) {
            break TailAnchor {
                local: j,
                remote: i,
            };
        }
        i += 1;
    };
    debug!(anchor = %batch, "batch match");

    let (anchor, fallback) = match overshoot(config, &local, &mut remote, batch)? {
        Some(anchor) => (anchor, false),
        None => {
            warn!(anchor = %batch, "overshoot search found no pair, anchoring at batch match");
            (batch, true)
        }
    };
    debug!(%anchor, fallback, "tail anchor");

    Ok(TailMatch {
        anchor,
        local,
        remote,
        fallback,
    })
}

/// Searches backward from `remote[i + T - 1]` for the oldest aligned pair.
///
/// Each of the last `O` local tail records is looked up in the remote span
/// `[e - 2m, e]` where `e = i + T - 1` (clamped to what could be loaded).
fn overshoot(
    config: &ReconcileConfig,
    local: &SequenceWindow<'_>,
    remote: &mut SequenceWindow<'_>,
    batch: TailAnchor,
) -> ReconcileResult<Option<TailAnchor>> {
    let tail_len = config.tail_len();
    remote.ensure_len(batch.remote + tail_len)?;
    let end = (batch.remote + tail_len - 1).min(remote.len().saturating_sub(1));
    let start = end.saturating_sub(config.match_size * 2);

    for step in 0..config.overshoot_len().min(tail_len) {
        let l = tail_len - 1 - step;
        let id = local.get(l)?.external_id;
        for r in (start..=end).rev() {
            if remote.get(r)?.external_id == id {
                return Ok(Some(TailAnchor {
                    local: l,
                    remote: r,
                }));
            }
        }
    }
    Ok(None)
}

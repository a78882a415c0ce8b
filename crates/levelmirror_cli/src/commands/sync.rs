//! Sync command implementation.

use crate::error::CliError;
use levelmirror_fetch::{FetchClient, FetchConfig, HttpBackend};
use levelmirror_reconcile::{
    GatewayApplier, JsonPageSource, LocalPageSource, Mutation, ReconcileConfig, Reconciler,
    SyncReport,
};
use levelmirror_store::SqliteGateway;
use std::path::Path;
use tracing::info;

/// Runs the sync command against the network.
pub fn run(
    db: &Path,
    endpoint: &str,
    fetch: FetchConfig,
    config: ReconcileConfig,
    dry_run: bool,
) -> Result<(), CliError> {
    let client = FetchClient::connect(fetch);
    let _lock = client.acquire_lock()?;
    let gateway = SqliteGateway::open(db)?;

    if dry_run {
        for mutation in plan(&client, &gateway, endpoint, config)? {
            println!("{}", describe(&mutation));
        }
        return Ok(());
    }

    let report = sync(&client, &gateway, endpoint, config)?;
    let stats = client.stats();
    info!(
        requests = stats.requests,
        retries = stats.retries,
        bytes = stats.bytes,
        "fetch totals"
    );
    println!("{}", summary(&report));
    Ok(())
}

/// One-line summary of a finished run.
fn summary(report: &SyncReport) -> String {
    let anchor = if report.anchor_fallback {
        format!("{}, unverified batch anchor", report.anchor)
    } else {
        report.anchor.to_string()
    };
    format!(
        "{} inserted, {} updated, {} deleted (anchor {}, {} ms)",
        report.inserted,
        report.updated,
        report.deleted,
        anchor,
        report.elapsed.as_millis()
    )
}

/// Reconciles `gateway` against the listing at `endpoint`.
pub fn sync<B: HttpBackend>(
    client: &FetchClient<B>,
    gateway: &SqliteGateway,
    endpoint: &str,
    config: ReconcileConfig,
) -> Result<SyncReport, CliError> {
    let remote = JsonPageSource::new(client, endpoint);
    let local = LocalPageSource::new(gateway);
    let mut applier = GatewayApplier::new(gateway);
    Ok(Reconciler::new(config).sync(&local, &remote, &mut applier)?)
}

/// Plans the mutations a sync would apply, without applying them.
pub fn plan<B: HttpBackend>(
    client: &FetchClient<B>,
    gateway: &SqliteGateway,
    endpoint: &str,
    config: ReconcileConfig,
) -> Result<Vec<Mutation>, CliError> {
    let remote = JsonPageSource::new(client, endpoint);
    let local = LocalPageSource::new(gateway);
    let reconciler = Reconciler::new(config);
    let tail = reconciler.match_tails(&local, &remote)?;
    Ok(reconciler.plan(&tail, &GatewayApplier::new(gateway))?)
}

fn describe(mutation: &Mutation) -> String {
    match mutation {
        Mutation::Insert(record) => format!("insert {} {}", record.external_id, record.title),
        Mutation::Update(record) => format!("update {} {}", record.external_id, record.title),
        Mutation::Delete(id) => format!("delete {id}"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use levelmirror_fetch::{MockBackend, MockLeafProbe, MockReply, RetryPolicy};
    use levelmirror_model::CatalogRecord;
    use levelmirror_testkit::prelude::*;
    use serde_json::{json, Value};

    const ENDPOINT: &str = "https://trcustoms.org/api/levels/?sort=-created";

    fn json_level(record: &CatalogRecord) -> Value {
        json!({
            "id": record.external_id.get(),
            "name": record.title,
            "authors": record.authors.iter().map(|a| json!({"username": a})).collect::<Vec<_>>(),
            "genres": record.genres.iter().map(|g| json!({"name": g})).collect::<Vec<_>>(),
            "tags": record.tags.iter().map(|t| json!({"name": t})).collect::<Vec<_>>(),
            "engine": {"name": record.kind},
            "difficulty": record.difficulty.as_ref().map(|d| json!({"name": d})),
            "duration": record.duration.as_ref().map(|d| json!({"name": d})),
            "created": format!("{}T12:00:00Z", record.release),
        })
    }

    /// Serves `records` as 20-record JSON pages.
    fn endpoint_client(records: &[CatalogRecord]) -> FetchClient<MockBackend> {
        let backend = MockBackend::new();
        let pages: Vec<&[CatalogRecord]> = records.chunks(20).collect();
        let last = pages.len().max(1);
        for number in 1..=last + 1 {
            let results: Vec<Value> = pages
                .get(number - 1)
                .map(|page| page.iter().map(json_level).collect())
                .unwrap_or_default();
            let body = json!({
                "current_page": number,
                "last_page": last,
                "total_count": records.len(),
                "results": results,
            });
            backend.on_get(
                &format!("{ENDPOINT}&page={number}"),
                MockReply::ok("application/json", body.to_string()),
            );
        }
        let config = FetchConfig::new().with_retry(RetryPolicy::no_retry());
        FetchClient::new(config, backend, MockLeafProbe::new())
    }

    #[test]
    fn sync_against_json_endpoint() {
        let mirror = TestMirror::with_records(&levels(61..=100));
        let client = endpoint_client(&levels((61..=101).filter(|&id| id != 70)));

        let report = sync(&client, &mirror, ENDPOINT, ReconcileConfig::new()).unwrap();

        assert_eq!(report.inserted, 1);
        assert_eq!(report.deleted, 0);
        assert!(mirrored(&mirror, 101));
        // 70 sits below the anchor and is left for a later run.
        assert!(mirrored(&mirror, 70));
    }

    #[test]
    fn batch_anchor_fallback_is_reported() {
        let mirror = TestMirror::with_records(&levels(61..=100));
        let mut remote = levels([100]);
        remote.extend(levels(500..=560));
        let client = endpoint_client(&remote);

        let report = sync(&client, &mirror, ENDPOINT, ReconcileConfig::new()).unwrap();

        assert!(report.anchor_fallback);
        assert!(report.is_noop());
        assert!(summary(&report).contains("(anchor (local 0, remote 0), unverified batch anchor,"));
    }

    #[test]
    fn clean_anchor_summary() {
        let mirror = TestMirror::with_records(&levels(61..=100));
        let client = endpoint_client(&levels(61..=101));

        let report = sync(&client, &mirror, ENDPOINT, ReconcileConfig::new()).unwrap();

        assert!(!report.anchor_fallback);
        assert!(!summary(&report).contains("unverified"));
    }

    #[test]
    fn dry_run_leaves_mirror_untouched() {
        let mirror = TestMirror::with_records(&levels(61..=100));
        let client = endpoint_client(&levels((61..=102).filter(|&id| id != 95)));

        let planned = plan(&client, &mirror, ENDPOINT, ReconcileConfig::new()).unwrap();

        let described: Vec<String> = planned.iter().map(describe).collect();
        assert_eq!(
            described,
            vec!["delete 95", "insert 102 Level 102", "insert 101 Level 101"]
        );
        assert!(mirrored(&mirror, 95));
        assert_eq!(mirror.record_count().unwrap(), 40);
    }

    #[test]
    fn tiny_mirror_is_drift() {
        let mirror = TestMirror::with_records(&levels(1..=3));
        let client = endpoint_client(&levels(1..=3));

        let err = sync(&client, &mirror, ENDPOINT, ReconcileConfig::new()).unwrap_err();
        assert_eq!(err.exit_code(), 5);
    }
}

use std::io::Write;
use std::path::PathBuf;
use std::sync::Arc;

use plinth::{
    json_renderer, Cache, CancelToken, ExecuteOptions, ManifestKind, MemoryCache, OrdererKind,
    PlinthError, RenderFn, Runner,
};
use pretty_assertions::assert_eq;

/// A lockfile with a diamond plus a K(2,2) between the middle rows, so
/// normalization, ordering, and span-overlap resolution all have work to do.
const LOCKFILE: &str = r#"{
    "name": "fixture-app",
    "lockfileVersion": 3,
    "packages": {
        "": { "version": "1.0.0", "dependencies": { "a": "^1", "b": "^1" } },
        "node_modules/a": { "version": "1.0.0", "dependencies": { "c": "^1", "d": "^1" } },
        "node_modules/b": { "version": "1.0.0", "dependencies": { "c": "^1", "d": "^1" } },
        "node_modules/c": { "version": "1.0.0" },
        "node_modules/d": { "version": "1.0.0" }
    }
}"#;

fn lock_fixture(dir: &tempfile::TempDir) -> PathBuf {
    let path = dir.path().join("package-lock.json");
    let mut file = std::fs::File::create(&path).unwrap();
    file.write_all(LOCKFILE.as_bytes()).unwrap();
    path
}

fn runner_with(cache: Arc<dyn Cache>) -> Runner {
    Runner::builder().cache(cache).build()
}

#[async_std::test]
async fn second_execute_hits_every_stage() {
    let dir = tempfile::tempdir().unwrap();
    let opts = ExecuteOptions::manifest(lock_fixture(&dir), ManifestKind::Npm);
    let cache = Arc::new(MemoryCache::new());
    let runner = runner_with(cache.clone());
    let render: RenderFn = json_renderer();

    let first = runner
        .execute(&opts, &render, &CancelToken::new())
        .await
        .unwrap();
    assert!(!first.parse_cached && !first.layout_cached && !first.artifact_cached);
    assert_eq!(cache.len(), 3);

    let second = runner
        .execute(&opts, &render, &CancelToken::new())
        .await
        .unwrap();
    assert!(second.parse_cached && second.layout_cached && second.artifact_cached);
    assert_eq!(first.artifact, second.artifact);
}

#[async_std::test]
async fn refresh_skips_reads_but_still_writes() {
    let dir = tempfile::tempdir().unwrap();
    let mut opts = ExecuteOptions::manifest(lock_fixture(&dir), ManifestKind::Npm);
    let cache = Arc::new(MemoryCache::new());
    let runner = runner_with(cache.clone());
    let render: RenderFn = json_renderer();

    runner
        .execute(&opts, &render, &CancelToken::new())
        .await
        .unwrap();

    opts.refresh = true;
    let refreshed = runner
        .execute(&opts, &render, &CancelToken::new())
        .await
        .unwrap();
    assert!(!refreshed.parse_cached && !refreshed.layout_cached && !refreshed.artifact_cached);
    // Same keys, rewritten in place.
    assert_eq!(cache.len(), 3);

    // The refreshed write is visible to a later cached run.
    opts.refresh = false;
    let third = runner
        .execute(&opts, &render, &CancelToken::new())
        .await
        .unwrap();
    assert!(third.parse_cached && third.layout_cached && third.artifact_cached);
}

#[async_std::test]
async fn enrichment_flag_changes_the_parse_key_but_refresh_does_not() {
    let dir = tempfile::tempdir().unwrap();
    let path = lock_fixture(&dir);
    let cache = Arc::new(MemoryCache::new());
    let runner = runner_with(cache.clone());
    let render: RenderFn = json_renderer();

    let opts = ExecuteOptions::manifest(path.clone(), ManifestKind::Npm);
    runner
        .execute(&opts, &render, &CancelToken::new())
        .await
        .unwrap();

    // Refresh=true resolves to the same key: the rewritten entry serves the
    // next plain run.
    let mut refreshing = opts.clone();
    refreshing.refresh = true;
    runner
        .execute(&refreshing, &render, &CancelToken::new())
        .await
        .unwrap();
    let after_refresh = runner
        .execute(&opts, &render, &CancelToken::new())
        .await
        .unwrap();
    assert!(after_refresh.parse_cached);

    // A lockfile never crawls, so flipping `enrich` only changes the key:
    // the parse stage misses and recomputes.
    let mut enriched = opts.clone();
    enriched.enrich = true;
    let outcome = runner
        .execute(&enriched, &render, &CancelToken::new())
        .await
        .unwrap();
    assert!(!outcome.parse_cached);
}

#[async_std::test]
async fn same_seed_and_orderer_reproduce_identical_artifacts() {
    let dir = tempfile::tempdir().unwrap();
    let path = lock_fixture(&dir);
    let mut opts = ExecuteOptions::manifest(path, ManifestKind::Npm);
    opts.orderer = OrdererKind::Optimal;
    opts.seed = 42;
    opts.randomize = true;
    let render: RenderFn = json_renderer();

    // Fresh runners, no shared cache: byte-identical output must come from
    // determinism, not caching.
    let first = runner_with(Arc::new(MemoryCache::new()))
        .execute(&opts, &render, &CancelToken::new())
        .await
        .unwrap();
    let second = runner_with(Arc::new(MemoryCache::new()))
        .execute(&opts, &render, &CancelToken::new())
        .await
        .unwrap();
    assert_eq!(first.artifact, second.artifact);
}

#[async_std::test]
async fn span_overlap_and_layout_flow_through_the_pipeline() {
    let dir = tempfile::tempdir().unwrap();
    let opts = ExecuteOptions::manifest(lock_fixture(&dir), ManifestKind::Npm);
    let runner = runner_with(Arc::new(MemoryCache::new()));
    let render: RenderFn = json_renderer();

    let outcome = runner
        .execute(&opts, &render, &CancelToken::new())
        .await
        .unwrap();
    // Parse output is the raw graph; the K(2,2) separator only exists in
    // the layout stage's normalized copy.
    assert_eq!(outcome.graph.node_count(), 5);
    assert_eq!(outcome.layout.blocks.len(), 6);
    assert_eq!(outcome.layout.rows.len(), 3);
    assert!(outcome.layout.nebraska.is_some());
}

#[async_std::test]
async fn failed_render_keeps_earlier_stages_cached() {
    let dir = tempfile::tempdir().unwrap();
    let opts = ExecuteOptions::manifest(lock_fixture(&dir), ManifestKind::Npm);
    let cache = Arc::new(MemoryCache::new());
    let runner = runner_with(cache.clone());

    let broken: RenderFn = Arc::new(|_, _| Err(PlinthError::Render("sink exploded".into())));
    let err = runner
        .execute(&opts, &broken, &CancelToken::new())
        .await
        .unwrap_err();
    assert!(matches!(err, PlinthError::Render(_)));
    // Parse and layout results survived the abort.
    assert_eq!(cache.len(), 2);

    let render: RenderFn = json_renderer();
    let retry = runner
        .execute(&opts, &render, &CancelToken::new())
        .await
        .unwrap();
    assert!(retry.parse_cached && retry.layout_cached);
    assert!(!retry.artifact_cached);
}

#[async_std::test]
async fn cancelled_execute_returns_the_cancellation() {
    let dir = tempfile::tempdir().unwrap();
    let opts = ExecuteOptions::manifest(lock_fixture(&dir), ManifestKind::Npm);
    let runner = runner_with(Arc::new(MemoryCache::new()));
    let render: RenderFn = json_renderer();

    let cancel = CancelToken::new();
    cancel.cancel();
    let err = runner.execute(&opts, &render, &cancel).await.unwrap_err();
    assert!(matches!(err, PlinthError::Cancelled));
}

#[async_std::test]
async fn invalid_options_fail_before_any_io() {
    let runner = runner_with(Arc::new(MemoryCache::new()));
    let render: RenderFn = json_renderer();
    // The manifest path does not exist; validation must reject the empty
    // package name before anything tries to read or fetch.
    let opts = ExecuteOptions::package("", ManifestKind::Npm);
    let err = runner
        .execute(&opts, &render, &CancelToken::new())
        .await
        .unwrap_err();
    assert!(matches!(err, PlinthError::InvalidOption(_)));
}

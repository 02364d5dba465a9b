mod common;

use common::MemoryConnector;
use loader::{Pipeline, PipelineConfig, RetryPolicy, RunSummary, ViewOutcome};
use std::time::Duration;
use tempfile::TempDir;

fn config(dir: &TempDir) -> PipelineConfig {
    PipelineConfig {
        // Nothing listens on the discard port.
        base_url: "http://127.0.0.1:9/{service}{year}.ods".to_string(),
        raw_dir: dir.path().join("raw"),
        transformed_dir: None,
        debug_dir: None,
        view_script: dir.path().join("view.sql"),
        years: vec![2015, 2016],
        retry: RetryPolicy {
            max_attempts: 5,
            delay: Duration::ZERO,
        },
        ..PipelineConfig::default()
    }
}

#[tokio::test]
async fn unavailable_sources_are_skipped_and_the_view_still_runs() {
    let dir = TempDir::new().unwrap();
    std::fs::write(dir.path().join("view.sql"), "CREATE OR REPLACE VIEW v AS SELECT 1;").unwrap();
    let connector = MemoryConnector::new();

    let summary = Pipeline::new(config(&dir), connector.clone())
        .unwrap()
        .run()
        .await;

    assert_eq!(
        summary,
        RunSummary {
            skipped_unavailable: 6,
            view: Some(ViewOutcome::Applied),
            ..RunSummary::default()
        }
    );
    // Only the view opened a connection.
    assert_eq!(connector.stats().connections, 1);
}

#[tokio::test]
async fn unreadable_cached_file_is_contained_to_its_pair() {
    let dir = TempDir::new().unwrap();
    let raw = dir.path().join("raw");
    std::fs::create_dir_all(&raw).unwrap();
    std::fs::write(raw.join("SMP2015.ods"), b"not a spreadsheet").unwrap();
    let connector = MemoryConnector::new();

    let summary = Pipeline::new(config(&dir), connector.clone())
        .unwrap()
        .run()
        .await;

    assert_eq!(summary.failed, 1);
    assert_eq!(summary.skipped_unavailable, 5);
    assert_eq!(summary.loaded, 0);
    assert_eq!(summary.view, Some(ViewOutcome::ScriptMissing));
    assert_eq!(connector.stats().connect_attempts, 0);
}

mod common;

use common::MemoryConnector;
use loader::{ViewApplier, ViewOutcome};
use std::fs;
use tempfile::TempDir;

const VIEW_SQL: &str = "CREATE OR REPLACE VIEW datamart_ida.vw_teste AS SELECT 1;";

fn script(dir: &TempDir) -> std::path::PathBuf {
    let path = dir.path().join("view.sql");
    fs::write(&path, VIEW_SQL).unwrap();
    path
}

#[tokio::test]
async fn script_is_executed_verbatim_and_committed() {
    let dir = TempDir::new().unwrap();
    let connector = MemoryConnector::new();

    let outcome = ViewApplier::new(connector.clone(), script(&dir)).apply().await;

    assert_eq!(outcome, ViewOutcome::Applied);
    let stats = connector.stats();
    assert_eq!(stats.scripts, vec![VIEW_SQL.to_string()]);
    assert_eq!(stats.commits, 1);
    assert_eq!(stats.closes, 1);
}

#[tokio::test]
async fn missing_script_never_touches_the_warehouse() {
    let dir = TempDir::new().unwrap();
    let connector = MemoryConnector::new();

    let outcome = ViewApplier::new(connector.clone(), dir.path().join("absent.sql"))
        .apply()
        .await;

    assert_eq!(outcome, ViewOutcome::ScriptMissing);
    assert_eq!(connector.stats().connect_attempts, 0);
}

#[tokio::test]
async fn failing_script_is_rolled_back() {
    let dir = TempDir::new().unwrap();
    let connector = MemoryConnector::new().failing_script();

    let outcome = ViewApplier::new(connector.clone(), script(&dir)).apply().await;

    assert!(matches!(outcome, ViewOutcome::Failed { ref error } if error.contains("syntax error")));
    let stats = connector.stats();
    assert_eq!(stats.rollbacks, 1);
    assert_eq!(stats.commits, 0);
    assert_eq!(stats.closes, 1);
}

#[tokio::test]
async fn unreachable_warehouse_is_reported_after_one_attempt() {
    let dir = TempDir::new().unwrap();
    let connector = MemoryConnector::new().failing_connects(1);

    let outcome = ViewApplier::new(connector.clone(), script(&dir)).apply().await;

    assert_eq!(outcome, ViewOutcome::Disconnected);
    assert_eq!(connector.stats().connect_attempts, 1);
}

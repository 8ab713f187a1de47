//! Unit tests for component provisioning against the mock engine

use super::fixtures::{scratch_context, write_file};
use async_trait::async_trait;
use hqlunit::row;
use hqlunit::test_harness::components::ProvisionTarget;
use hqlunit::test_harness::{
    run_case, ComponentCreator, ComponentProvisioner, ComponentRegistry, MockEngine, QueryEngine,
    RunnerSettings, Session, SessionConfig, TestHarnessError, TestHarnessResult,
};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

fn session_config() -> SessionConfig {
    SessionConfig {
        namespace: "ns_test".to_string(),
        variables: BTreeMap::new(),
        warehouse_dir: PathBuf::from("/tmp/w"),
        scratch_dir: PathBuf::from("/tmp/s"),
    }
}

fn target(dir: &TempDir) -> ProvisionTarget {
    ProvisionTarget {
        data_dir: dir.path().join("table_data"),
        table_definitions_root: Some(dir.path().to_path_buf()),
        statement_timeout: None,
    }
}

fn lines(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| s.to_string()).collect()
}

// =============================================================================
// Built-in types
// =============================================================================

#[tokio::test]
async fn test_builtin_types_issue_expected_statements() {
    let dir = TempDir::new().unwrap();
    write_file(
        dir.path(),
        "tables/sales/orders.hql",
        "CREATE EXTERNAL TABLE sales.orders (id INT) LOCATION '/prod/orders';",
    );

    let engine = MockEngine::new();
    let mut session = engine.open_session(&session_config()).await.unwrap();
    let provisioner = ComponentProvisioner::default();

    provisioner
        .provision(
            session.as_mut(),
            &target(&dir),
            &lines(&[
                "# setup",
                "database sales",
                "TABLE tables/sales/orders.hql  # orders",
                "FUNCTION to_cents com.example.ToCents",
            ]),
        )
        .await
        .unwrap();

    let executed = engine.executed().await;
    assert_eq!(executed.len(), 3);
    assert_eq!(executed[0].statement, "CREATE DATABASE IF NOT EXISTS sales");
    assert_eq!(
        executed[1].statement,
        "CREATE EXTERNAL TABLE sales.orders (id INT) LOCATION '/prod/orders'"
    );
    assert_eq!(
        executed[1].table_location.as_deref(),
        Some(dir.path().join("table_data/tables/sales/orders.hql").as_path())
    );
    assert_eq!(
        executed[2].statement,
        "CREATE FUNCTION to_cents AS 'com.example.ToCents'"
    );
    assert!(executed.iter().all(|e| e.namespace == "ns_test"));
}

#[tokio::test]
async fn test_table_location_is_recreated_each_time() {
    let dir = TempDir::new().unwrap();
    write_file(dir.path(), "t.hql", "CREATE TABLE t (a INT)");
    let location = dir.path().join("table_data/t.hql");
    write_file(dir.path(), "table_data/t.hql/leftover.orc", "old data");

    let engine = MockEngine::new();
    let mut session = engine.open_session(&session_config()).await.unwrap();
    let provisioner = ComponentProvisioner::default();
    let target = target(&dir);

    for _ in 0..2 {
        provisioner
            .provision(session.as_mut(), &target, &lines(&["TABLE t.hql"]))
            .await
            .unwrap();
        assert!(location.is_dir());
        assert_eq!(std::fs::read_dir(&location).unwrap().count(), 0);
    }
}

#[tokio::test]
async fn test_relative_table_without_root_fails() {
    let dir = TempDir::new().unwrap();
    let engine = MockEngine::new();
    let mut session = engine.open_session(&session_config()).await.unwrap();

    let target = ProvisionTarget {
        table_definitions_root: None,
        ..target(&dir)
    };
    let err = ComponentProvisioner::default()
        .provision(session.as_mut(), &target, &lines(&["TABLE t.hql"]))
        .await
        .unwrap_err();

    assert!(matches!(err, TestHarnessError::ComponentError { .. }));
    assert!(engine.executed().await.is_empty());
}

#[tokio::test]
async fn test_provisioning_statement_returning_rows_fails() {
    let dir = TempDir::new().unwrap();
    let engine = MockEngine::new().with_rows("create database", vec![row!["ok"]]);
    let mut session = engine.open_session(&session_config()).await.unwrap();

    let err = ComponentProvisioner::default()
        .provision(
            session.as_mut(),
            &target(&dir),
            &lines(&["DATABASE a", "DATABASE b"]),
        )
        .await
        .unwrap_err();

    assert!(err.to_string().contains("must not return result"));
    assert_eq!(engine.executed().await.len(), 1);
}

#[tokio::test]
async fn test_malformed_descriptor_fails_fast() {
    let dir = TempDir::new().unwrap();
    let engine = MockEngine::new();
    let mut session = engine.open_session(&session_config()).await.unwrap();

    let err = ComponentProvisioner::default()
        .provision(
            session.as_mut(),
            &target(&dir),
            &lines(&["DATABASE a", "FUNCTION only_a_name", "DATABASE b"]),
        )
        .await
        .unwrap_err();

    assert!(matches!(err, TestHarnessError::ComponentError { .. }));
    assert_eq!(
        engine.statements().await,
        vec!["CREATE DATABASE IF NOT EXISTS a".to_string()]
    );
}

// =============================================================================
// Extension registry
// =============================================================================

struct ViewCreator;

#[async_trait]
impl ComponentCreator for ViewCreator {
    async fn create(
        &self,
        session: &mut dyn Session,
        _target: &ProvisionTarget,
        param: &str,
    ) -> TestHarnessResult<()> {
        session
            .execute(&format!("CREATE VIEW {}", param.trim()), None)
            .await
            .map(|_| ())
    }
}

#[tokio::test]
async fn test_extension_type_resolved_by_name() {
    let dir = TempDir::new().unwrap();
    let engine = MockEngine::new();
    let mut session = engine.open_session(&session_config()).await.unwrap();

    let registry = ComponentRegistry::new()
        .with("view", || Box::new(ViewCreator) as Box<dyn ComponentCreator>);
    ComponentProvisioner::new(registry)
        .provision(session.as_mut(), &target(&dir), &lines(&["VIEW v AS SELECT 1"]))
        .await
        .unwrap();

    assert_eq!(
        engine.statements().await,
        vec!["CREATE VIEW v AS SELECT 1".to_string()]
    );
}

#[tokio::test]
async fn test_unregistered_extension_type_fails() {
    let dir = TempDir::new().unwrap();
    let engine = MockEngine::new();
    let mut session = engine.open_session(&session_config()).await.unwrap();

    let err = ComponentProvisioner::default()
        .provision(session.as_mut(), &target(&dir), &lines(&["MACRO m"]))
        .await
        .unwrap_err();

    match err {
        TestHarnessError::ComponentError {
            message,
            definition,
        } => {
            assert!(message.contains("MACRO"));
            assert_eq!(definition, "MACRO m");
        }
        other => panic!("unexpected error: {:?}", other),
    }
}

#[tokio::test]
async fn test_registry_reaches_case_runs() {
    let (_dir, mut ctx) = scratch_context("views");
    ctx.add_component("VIEW v AS SELECT 1");
    ctx.set_test_query("SELECT count(*) = 1 FROM v");

    let engine = MockEngine::new().with_rows("FROM v", vec![row![true]]);
    let settings = RunnerSettings::default().with_registry(
        ComponentRegistry::new().with("VIEW", || Box::new(ViewCreator) as Box<dyn ComponentCreator>),
    );

    let outcome = run_case(&mut ctx, &engine, &settings).await;
    assert!(outcome.is_success(), "{:?}", outcome.errors);
    assert!(engine
        .statements()
        .await
        .contains(&"CREATE VIEW v AS SELECT 1".to_string()));
}

#[test]
fn test_absolute_table_path_is_keyed_inside_data_dir() {
    let target = ProvisionTarget {
        data_dir: PathBuf::from("/case/table_data"),
        table_definitions_root: None,
        statement_timeout: None,
    };
    assert_eq!(
        target.table_location("/defs/sales/orders.hql"),
        Path::new("/case/table_data/defs/sales/orders.hql")
    );
}

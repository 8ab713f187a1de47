//! Unit tests for single-case option validation

use super::fixtures::write_file;
use hqlunit::row;
use hqlunit::test_harness::cli::{run_single, CaseOptions, DEFAULT_CASE_NAME};
use hqlunit::test_harness::{MockEngine, RunnerSettings};
use serial_test::serial;
use tempfile::TempDir;

fn options_in(dir: &TempDir) -> CaseOptions {
    CaseOptions {
        root: dir.path().join("case_root"),
        ..CaseOptions::default()
    }
}

fn config_message(options: &CaseOptions) -> String {
    let err = options.validate().unwrap_err();
    assert!(err.is_fatal(), "expected configuration error, got {:?}", err);
    err.to_string()
}

#[test]
fn test_existing_root_is_rejected() {
    let dir = TempDir::new().unwrap();
    let options = CaseOptions {
        root: dir.path().to_path_buf(),
        ..CaseOptions::default()
    };
    assert!(config_message(&options).contains("root directory already exists"));
}

#[test]
fn test_missing_tables_root_is_rejected() {
    let dir = TempDir::new().unwrap();
    let options = CaseOptions {
        table_definitions_root: Some(dir.path().join("nope")),
        ..options_in(&dir)
    };
    assert!(config_message(&options).contains("table definitions directory"));
}

#[test]
fn test_query_and_query_file_conflict() {
    let dir = TempDir::new().unwrap();
    let query = write_file(dir.path(), "q.hql", "SELECT 1");
    let options = CaseOptions {
        query: Some("SELECT 1".to_string()),
        query_file: Some(query),
        ..options_in(&dir)
    };
    assert!(config_message(&options).contains("can not set both query and query file"));
}

#[test]
fn test_missing_test_query_file_is_rejected() {
    let dir = TempDir::new().unwrap();
    let options = CaseOptions {
        test_query_file: Some(dir.path().join("missing.hql")),
        ..options_in(&dir)
    };
    assert!(config_message(&options).contains("test query file does not exist"));
}

#[test]
fn test_missing_input_files_are_listed() {
    let dir = TempDir::new().unwrap();
    let present = write_file(dir.path(), "setup.hql", "SET a=1");
    let options = CaseOptions {
        setup_files: vec![present, dir.path().join("gone.hql")],
        ..options_in(&dir)
    };
    let message = config_message(&options);
    assert!(message.contains("setup files do not exist"));
    assert!(message.contains("gone.hql"));

    let options = CaseOptions {
        param_files: vec![dir.path().join("p.ini")],
        ..options_in(&dir)
    };
    assert!(config_message(&options).contains("param files"));
}

#[test]
fn test_relative_table_needs_tables_root() {
    let dir = TempDir::new().unwrap();
    let components = write_file(
        dir.path(),
        "components.txt",
        "# tables\nDATABASE db\nTABLE defs/a.hql\n",
    );

    let options = CaseOptions {
        component_files: vec![components.clone()],
        ..options_in(&dir)
    };
    assert!(config_message(&options).contains("table definition root is not set"));

    let options = CaseOptions {
        component_files: vec![components],
        table_definitions_root: Some(dir.path().to_path_buf()),
        ..options_in(&dir)
    };
    assert!(options.validate().is_ok());
}

#[test]
fn test_absolute_table_needs_no_root() {
    let dir = TempDir::new().unwrap();
    let options = CaseOptions {
        component_queries: vec!["TABLE /abs/defs/a.hql".to_string()],
        ..options_in(&dir)
    };
    assert!(options.validate().is_ok());
}

#[test]
fn test_into_context_collects_everything() {
    let dir = TempDir::new().unwrap();
    let test_query = write_file(dir.path(), "t.hql", "SELECT true");
    let params = write_file(dir.path(), "p.ini", "a=1\nb=1");
    let options = CaseOptions {
        name: Some("adhoc".to_string()),
        log_dir: Some(dir.path().join("logs")),
        query: Some("INSERT INTO t SELECT 1".to_string()),
        test_query_file: Some(test_query),
        param_files: vec![params],
        param_queries: vec!["b=2".to_string()],
        component_queries: vec!["DATABASE db".to_string(), "DATABASE db".to_string()],
        setup_queries: vec!["SET x=1".to_string()],
        ..options_in(&dir)
    };

    let ctx = options.into_context().unwrap();
    assert_eq!(ctx.name(), "adhoc");
    assert_eq!(ctx.root_dir(), dir.path().join("case_root"));
    assert_eq!(ctx.query(), Some("INSERT INTO t SELECT 1"));
    assert_eq!(ctx.test_query(), Some("SELECT true"));
    assert_eq!(ctx.components(), &["DATABASE db"]);
    assert_eq!(ctx.setup_scripts(), vec!["SET x=1"]);
    assert_eq!(ctx.parameters().get("b").map(String::as_str), Some("2"));
}

#[test]
#[serial]
fn test_relative_root_resolves_against_current_dir() {
    let dir = TempDir::new().unwrap();
    let previous = std::env::current_dir().unwrap();
    std::env::set_current_dir(dir.path()).unwrap();

    let ctx = CaseOptions {
        root: "relative_case".into(),
        ..CaseOptions::default()
    }
    .into_context();

    std::env::set_current_dir(previous).unwrap();

    let ctx = ctx.unwrap();
    assert!(ctx.root_dir().is_absolute());
    assert!(ctx.root_dir().ends_with("relative_case"));
    assert_eq!(ctx.name(), DEFAULT_CASE_NAME);
}

#[tokio::test]
async fn test_run_single_creates_root_and_reports() {
    let dir = TempDir::new().unwrap();
    let options = CaseOptions {
        test_query: Some("SELECT 1 = 1".to_string()),
        ..options_in(&dir)
    };
    let engine = MockEngine::new().with_rows("1 = 1", vec![row![true]]);

    let (outcome, report) = run_single(options, &engine, &RunnerSettings::default())
        .await
        .unwrap();

    assert!(outcome.is_success());
    assert!(dir.path().join("case_root").is_dir());
    assert_eq!(report.summary.total, 1);
    assert_eq!(report.summary.passed, 1);
}

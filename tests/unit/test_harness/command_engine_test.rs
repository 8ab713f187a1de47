//! Unit tests for the external command engine

use super::fixtures::{scratch_context, write_file};
use hqlunit::test_harness::command_engine::{parse_output, ENV_NAMESPACE};
use hqlunit::test_harness::{run_case, CommandEngine, EngineConfig, RunnerSettings, ScalarValue};
use std::time::Duration;
use tempfile::TempDir;

#[test]
fn test_engine_config_from_file() {
    let dir = TempDir::new().unwrap();
    let path = write_file(
        dir.path(),
        "engine.yaml",
        r#"
command: beeline
args: ["-u", "jdbc:hive2://localhost:10000", "--outputformat=csv2"]
separator: ","
null_literal: ""
statement_timeout_ms: 1500
drop_on_close: false
env:
  HADOOP_USER_NAME: tester
"#,
    );

    let config = EngineConfig::from_file(&path).unwrap();
    assert_eq!(config.command, "beeline");
    assert_eq!(config.args.len(), 3);
    assert_eq!(config.separator, ",");
    assert_eq!(config.statement_timeout(), Some(Duration::from_millis(1500)));
    assert!(!config.drop_on_close);
    assert_eq!(config.env.get("HADOOP_USER_NAME").map(String::as_str), Some("tester"));
    assert_eq!(config.use_namespace, "USE {namespace}");
}

#[test]
fn test_missing_engine_config_is_fatal() {
    let dir = TempDir::new().unwrap();
    let err = EngineConfig::from_file(dir.path().join("absent.yaml")).unwrap_err();
    assert!(err.is_fatal());
    assert!(err.to_string().contains("absent.yaml"));
}

#[test]
fn test_engine_rejects_empty_separator() {
    let mut config = EngineConfig::from_command_line("hive -S").unwrap();
    config.separator = String::new();
    assert!(CommandEngine::new(config).is_err());
}

#[test]
fn test_csv_output_with_empty_null() {
    let rows = parse_output("1,,abc\n", ",", "");
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].values()[1], ScalarValue::Null);
    assert_eq!(rows[0].values()[2], ScalarValue::String("abc".to_string()));
}

#[cfg(unix)]
#[tokio::test]
async fn test_case_through_shell_client() {
    let (dir, mut ctx) = scratch_context("shell");
    let transcript = dir.path().join("client.log");

    let mut config = EngineConfig::from_command_line("sh").unwrap();
    config.args = vec![
        "-c".to_string(),
        format!(
            "echo \"ns=${}\" >> '{}'; cat >> '{}'; printf 'true\\n'",
            ENV_NAMESPACE,
            transcript.display(),
            transcript.display()
        ),
    ];
    let engine = CommandEngine::new(config).unwrap();

    ctx.add_parameter_content("region=emea");
    ctx.set_test_query("SELECT count(*) > 0 FROM sales");
    let namespace = ctx.namespace().to_string();

    let outcome = run_case(&mut ctx, &engine, &RunnerSettings::default()).await;
    assert!(outcome.is_success(), "{:?}", outcome.errors);

    let log = std::fs::read_to_string(&transcript).unwrap();
    assert!(log.contains(&format!("ns={}", namespace)));
    assert!(log.contains(&format!("CREATE DATABASE IF NOT EXISTS {};", namespace)));
    assert!(log.contains("SET hivevar:region=emea;"));
    assert!(log.contains("SELECT count(*) > 0 FROM sales;"));
    assert!(log.contains(&format!("DROP DATABASE IF EXISTS {} CASCADE;", namespace)));
}

#[cfg(unix)]
#[tokio::test]
async fn test_failing_client_fails_the_case() {
    let (_dir, mut ctx) = scratch_context("broken");

    let mut config = EngineConfig::from_command_line("sh").unwrap();
    config.args = vec![
        "-c".to_string(),
        "cat >/dev/null; echo 'connection refused' >&2; exit 1".to_string(),
    ];
    config.drop_on_close = false;
    let engine = CommandEngine::new(config).unwrap();

    ctx.set_test_query("SELECT true");
    let outcome = run_case(&mut ctx, &engine, &RunnerSettings::default()).await;

    assert!(!outcome.is_success());
    assert!(outcome.errors[0].starts_with("broken: "));
    assert!(outcome.errors[0].contains("connection refused"));
    assert!(outcome.verdict.is_none());
}

#[cfg(unix)]
#[tokio::test]
async fn test_setup_session_settings_reach_later_statements() {
    let (dir, mut ctx) = scratch_context("dynamic_partitions");
    let transcript = dir.path().join("batches.log");

    let mut config = EngineConfig::from_command_line("sh").unwrap();
    config.args = vec![
        "-c".to_string(),
        format!(
            "cat >> '{}'; echo '----' >> '{}'; printf 'true\\n'",
            transcript.display(),
            transcript.display()
        ),
    ];
    config.drop_on_close = false;
    let engine = CommandEngine::new(config).unwrap();

    ctx.add_setup_content("SET hive.exec.dynamic.partition.mode=nonstrict;\nADD JAR /opt/udfs.jar;");
    ctx.set_query("INSERT INTO t PARTITION (day) SELECT 1, '2024-01-01'");
    ctx.set_test_query("SELECT true");

    let outcome = run_case(&mut ctx, &engine, &RunnerSettings::default()).await;
    assert!(outcome.is_success(), "{:?}", outcome.errors);

    let log = std::fs::read_to_string(&transcript).unwrap();
    let insert_batch = log
        .split("----")
        .find(|batch| batch.contains("INSERT INTO t"))
        .unwrap();
    assert!(insert_batch.contains("SET hive.exec.dynamic.partition.mode=nonstrict;"));
    assert!(insert_batch.contains("ADD JAR /opt/udfs.jar;"));

    let set_position = insert_batch.find("SET hive.exec").unwrap();
    let insert_position = insert_batch.find("INSERT INTO t").unwrap();
    assert!(set_position < insert_position);
}

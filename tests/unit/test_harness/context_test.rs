//! Unit tests for the per-case execution context

use super::fixtures::{scratch_context, write_file};
use hqlunit::row;
use hqlunit::test_harness::context::allocate_namespace;
use hqlunit::test_harness::ExecutionContext;
use std::collections::HashSet;
use std::path::Path;

#[test]
fn test_namespaces_never_collide() {
    let mut seen = HashSet::new();
    for _ in 0..10_000 {
        assert!(seen.insert(allocate_namespace()));
    }
}

#[test]
fn test_each_context_gets_its_own_namespace() {
    let a = ExecutionContext::new("/repo", "a", "a");
    let b = ExecutionContext::new("/repo", "a", "a");
    assert_ne!(a.namespace(), b.namespace());
    assert_eq!(a.session_config().namespace, a.namespace());
}

#[test]
fn test_parameter_files_merge_last_wins() {
    let (dir, mut ctx) = scratch_context("case");
    let suite = write_file(dir.path(), "suite.ini", "day=2024-01-01\ncountry=de\n");
    let module = write_file(dir.path(), "module.ini", "# module override\ncountry = fr\n");

    ctx.add_parameter_file(&suite).unwrap();
    ctx.add_parameter_file(&module).unwrap();
    ctx.add_parameter_content("limit: 10");

    let params = ctx.parameters();
    assert_eq!(params.get("day").map(String::as_str), Some("2024-01-01"));
    assert_eq!(params.get("country").map(String::as_str), Some("fr"));
    assert_eq!(params.get("limit").map(String::as_str), Some("10"));
    assert_eq!(ctx.parameter_blocks().len(), 3);
}

#[test]
fn test_components_deduplicate_in_insertion_order() {
    let (dir, mut ctx) = scratch_context("case");
    let deps = write_file(
        dir.path(),
        "dependencies.txt",
        "DATABASE sales\n\nTABLE t/a.hql\n  DATABASE sales  \nTABLE t/b.hql\n",
    );

    ctx.add_components_file(&deps).unwrap();
    ctx.add_component("TABLE t/a.hql");

    assert_eq!(
        ctx.components(),
        &["DATABASE sales", "TABLE t/a.hql", "TABLE t/b.hql"]
    );
}

#[test]
fn test_blank_setup_scripts_are_dropped() {
    let mut ctx = ExecutionContext::new("/repo", "case", "case");
    ctx.add_setup_content("  \n ");
    ctx.add_setup_content("  SET x=1;  ");
    assert_eq!(ctx.setup_scripts(), vec!["SET x=1;"]);
}

#[test]
fn test_blank_queries_are_absent() {
    let mut ctx = ExecutionContext::new("/repo", "case", "case");
    assert!(ctx.query().is_none());
    ctx.set_query("   ");
    assert!(ctx.query().is_none());
    ctx.set_query("SELECT 1");
    assert_eq!(ctx.query(), Some("SELECT 1"));
    ctx.set_test_query("SELECT true");
    assert_eq!(ctx.test_query(), Some("SELECT true"));
}

#[test]
fn test_relative_directories_fail_validation() {
    let mut ctx = ExecutionContext::new("/repo", "case", "case");
    assert!(ctx.validate_paths().is_ok());

    ctx.set_data_dir("relative/data");
    let err = ctx.validate_paths().unwrap_err();
    assert!(err.is_fatal());

    let ctx = ExecutionContext::new("relative", "case", "case");
    assert!(ctx.validate_paths().is_err());
}

#[test]
fn test_missing_query_file_is_io_error() {
    let mut ctx = ExecutionContext::new("/repo", "case", "case");
    assert!(ctx
        .set_query_file(Path::new("/definitely/not/here.hql"))
        .is_err());
}

#[test]
fn test_test_result_is_a_copy() {
    let ctx = ExecutionContext::new("/repo", "case", "case");
    let mut rows = ctx.test_result();
    rows.push(row![true]);
    assert!(ctx.test_result().is_empty());
}

#[test]
fn test_session_config_carries_dirs_and_variables() {
    let mut ctx = ExecutionContext::new("/repo", "case", "case");
    ctx.set_engine_base_dir("/repo/test/out");
    ctx.add_parameter_content("a=1");

    let config = ctx.session_config();
    assert_eq!(config.warehouse_dir, Path::new("/repo/test/out/warehouse"));
    assert_eq!(config.scratch_dir, Path::new("/repo/test/out/scratch"));
    assert_eq!(config.variables.get("a").map(String::as_str), Some("1"));
}

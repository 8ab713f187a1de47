//! HQL Test Harness
//!
//! A testing framework for SQL scripts run against an external query engine:
//! - Directory-driven discovery of suites, modules and cases
//! - One isolated namespace and data directory per case
//! - Declarative component provisioning (databases, tables, functions)
//! - Quote-aware statement splitting
//! - Boolean-matrix result validation with aggregated failures
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                     Test Harness Flow                           │
//! ├─────────────────────────────────────────────────────────────────┤
//! │  1. Walk <root>/test for suites with test_*.hql cases           │
//! │  2. For each case:                                              │
//! │     a. Build an ExecutionContext (namespace, dirs, params)      │
//! │     b. Open an engine session in the case namespace             │
//! │     c. Provision components from dependencies.txt               │
//! │     d. Run setup.hql, the query under test, the test query      │
//! │     e. Validate the captured rows                               │
//! │     f. Append the case output, close the session                │
//! │  3. Aggregate failures and generate the report                  │
//! └─────────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Usage
//!
//! ```bash
//! # Run every case of a repository
//! hqlunit repo path/to/repo --engine-config engine.yaml
//!
//! # Run a single case
//! hqlunit run --root /tmp/case1 --engine-command "hive -S" \
//!     --query-file daily.hql --test-query "SELECT count(*) > 0 FROM t"
//! ```

pub mod cli;
pub mod command_engine;
pub mod components;
pub mod context;
pub mod discovery;
pub mod engine;
pub mod error;
pub mod mock;
pub mod report;
pub mod runner;
pub mod splitter;
pub mod types;
pub mod utils;
pub mod validator;

// Re-export main types for convenience
pub use command_engine::{CommandEngine, EngineConfig};
pub use components::{ComponentCreator, ComponentProvisioner, ComponentRegistry};
pub use context::ExecutionContext;
pub use discovery::{RepoOutcome, RepoRunner};
pub use engine::{QueryEngine, Session, SessionConfig};
pub use error::{TestHarnessError, TestHarnessResult};
pub use mock::MockEngine;
pub use runner::{run_case, CaseOutcome, CaseRunner, CaseState, RunnerSettings};
pub use splitter::split_statements;
pub use types::{Row, RowSet, ScalarValue};
pub use validator::{validate, Verdict};

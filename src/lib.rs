//! # hqlunit
//!
//! Unit tests for Hive-style SQL repositories. Each test case is a SQL
//! script selecting boolean assertions; the harness runs it in an isolated
//! namespace against a real engine and aggregates the failures.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use hqlunit::test_harness::{EngineConfig, CommandEngine, RepoRunner};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let engine = CommandEngine::new(EngineConfig::from_file("engine.yaml")?)?;
//!     let outcome = RepoRunner::new("path/to/repo")?.run(&engine).await?;
//!     for error in &outcome.errors {
//!         eprintln!("{}", error);
//!     }
//!     Ok(())
//! }
//! ```

#![allow(clippy::large_enum_variant)]

pub mod test_harness;

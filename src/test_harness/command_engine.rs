//! Query engine backed by an external SQL command-line client
//!
//! Each statement is piped to a fresh child process (beeline, hive,
//! spark-sql, ...) preceded by the namespace selection, one variable
//! assignment per case parameter and every session-scoped statement the
//! session ran so far (`SET k=v`, `ADD JAR`, `CREATE TEMPORARY FUNCTION`).
//! Standard output is read back as separator-delimited rows.
//!
//! ```yaml
//! command: beeline
//! args: ["-u", "jdbc:hive2://localhost:10000", "--silent=true", "--showHeader=false", "--outputformat=tsv2"]
//! separator: "\t"
//! statement_timeout_ms: 60000
//! ```

use super::engine::{rewrite_table_location, QueryEngine, Session, SessionConfig};
use super::error::{TestHarnessError, TestHarnessResult};
use super::types::{Row, RowSet, ScalarValue};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;
use std::process::Stdio;
use std::time::Duration;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;

/// Environment variable carrying the case namespace
pub const ENV_NAMESPACE: &str = "HQLUNIT_NAMESPACE";

/// Environment variable carrying the case warehouse directory
pub const ENV_WAREHOUSE_DIR: &str = "HQLUNIT_WAREHOUSE_DIR";

/// Environment variable carrying the case scratch directory
pub const ENV_SCRATCH_DIR: &str = "HQLUNIT_SCRATCH_DIR";

/// How to drive the external client
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Executable of the SQL client
    pub command: String,

    /// Arguments passed before the script is written to stdin
    pub args: Vec<String>,

    /// Column separator of the client's output
    pub separator: String,

    /// Text the client prints for NULL
    pub null_literal: String,

    /// Deadline per statement
    #[serde(skip_serializing_if = "Option::is_none")]
    pub statement_timeout_ms: Option<u64>,

    /// Template run once when a session opens; `{namespace}` is substituted
    pub create_namespace: String,

    /// Template prepended to every statement
    pub use_namespace: String,

    /// Template run on close when `drop_on_close` is set
    pub drop_namespace: String,

    /// Template for one parameter; `{key}` and `{value}` are substituted
    pub set_variable: String,

    pub drop_on_close: bool,

    /// Extra environment for the child process
    pub env: BTreeMap<String, String>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            command: String::new(),
            args: Vec::new(),
            separator: "\t".to_string(),
            null_literal: "NULL".to_string(),
            statement_timeout_ms: None,
            create_namespace: "CREATE DATABASE IF NOT EXISTS {namespace}".to_string(),
            use_namespace: "USE {namespace}".to_string(),
            drop_namespace: "DROP DATABASE IF EXISTS {namespace} CASCADE".to_string(),
            set_variable: "SET hivevar:{key}={value}".to_string(),
            drop_on_close: true,
            env: BTreeMap::new(),
        }
    }
}

impl EngineConfig {
    /// Load engine config from YAML file
    pub fn from_file(path: impl AsRef<Path>) -> TestHarnessResult<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| {
            TestHarnessError::config(format!(
                "could not read engine config {}: {}",
                path.display(),
                e
            ))
        })?;
        Self::from_yaml(&content)
    }

    /// Parse engine config from a YAML string
    pub fn from_yaml(yaml: &str) -> TestHarnessResult<Self> {
        let config: Self = serde_yaml::from_str(yaml)?;
        config.validate()?;
        Ok(config)
    }

    /// Build a config from a whitespace-separated command line
    pub fn from_command_line(command_line: &str) -> TestHarnessResult<Self> {
        let mut parts = command_line.split_whitespace().map(str::to_string);
        let command = parts
            .next()
            .ok_or_else(|| TestHarnessError::config("engine command is empty"))?;
        Ok(Self {
            command,
            args: parts.collect(),
            ..Self::default()
        })
    }

    pub fn validate(&self) -> TestHarnessResult<()> {
        if self.command.trim().is_empty() {
            return Err(TestHarnessError::config("engine command is not set"));
        }
        if self.separator.is_empty() {
            return Err(TestHarnessError::config("engine output separator is empty"));
        }
        Ok(())
    }

    pub fn statement_timeout(&self) -> Option<Duration> {
        self.statement_timeout_ms.map(Duration::from_millis)
    }
}

/// Substitute `{name}` placeholders
fn render(template: &str, values: &[(&str, &str)]) -> String {
    values.iter().fold(template.to_string(), |acc, (name, value)| {
        acc.replace(&format!("{{{}}}", name), value)
    })
}

/// Parse separator-delimited client output into rows; blank lines are skipped
pub fn parse_output(stdout: &str, separator: &str, null_literal: &str) -> RowSet {
    stdout
        .lines()
        .filter(|line| !line.trim().is_empty())
        .map(|line| {
            line.split(separator)
                .map(|field| ScalarValue::parse_field(field, null_literal))
                .collect::<Row>()
        })
        .collect()
}

/// Engine that runs every statement through an external client
#[derive(Debug, Clone)]
pub struct CommandEngine {
    config: EngineConfig,
}

impl CommandEngine {
    pub fn new(config: EngineConfig) -> TestHarnessResult<Self> {
        config.validate()?;
        Ok(Self { config })
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }
}

#[async_trait]
impl QueryEngine for CommandEngine {
    fn name(&self) -> &str {
        &self.config.command
    }

    async fn open_session(&self, config: &SessionConfig) -> TestHarnessResult<Box<dyn Session>> {
        let session = CommandSession {
            engine: self.config.clone(),
            session: config.clone(),
            replayed: Vec::new(),
            closed: false,
        };

        let create = render(
            &self.config.create_namespace,
            &[("namespace", &config.namespace)],
        );
        log::debug!("creating namespace {}", config.namespace);
        session
            .run_batch(&[create.clone()], &create)
            .await
            .map_err(|e| TestHarnessError::SessionError {
                message: format!("failed to create namespace {}: {}", config.namespace, e),
            })?;

        Ok(Box::new(session))
    }
}

/// Whether `statement` changes client state that must outlive its process
fn is_session_statement(statement: &str) -> bool {
    let words: Vec<String> = statement
        .split_whitespace()
        .take(3)
        .map(str::to_ascii_uppercase)
        .collect();

    match words.as_slice() {
        [first, ..] if first == "SET" => statement.contains('='),
        [first, second, ..] if first == "ADD" => {
            matches!(
                second.as_str(),
                "JAR" | "JARS" | "FILE" | "FILES" | "ARCHIVE" | "ARCHIVES"
            )
        }
        [first, second, third] if first == "CREATE" && second == "TEMPORARY" => {
            matches!(third.as_str(), "FUNCTION" | "MACRO")
        }
        _ => false,
    }
}

fn is_reset(statement: &str) -> bool {
    statement.trim().eq_ignore_ascii_case("RESET")
}

struct CommandSession {
    engine: EngineConfig,
    session: SessionConfig,
    /// Session-scoped statements replayed ahead of every later statement
    replayed: Vec<String>,
    closed: bool,
}

impl CommandSession {
    /// Prelude, variable assignments, replayed session state and the
    /// statement, in client order
    fn script_for(&self, statement: &str) -> Vec<String> {
        let mut script =
            Vec::with_capacity(self.session.variables.len() + self.replayed.len() + 2);
        script.push(render(
            &self.engine.use_namespace,
            &[("namespace", &self.session.namespace)],
        ));
        for (key, value) in &self.session.variables {
            script.push(render(
                &self.engine.set_variable,
                &[("key", key), ("value", value)],
            ));
        }
        script.extend(self.replayed.iter().cloned());
        script.push(statement.to_string());
        script
    }

    /// Keep client state of a successful statement for the next processes
    fn remember(&mut self, statement: &str) {
        if is_reset(statement) {
            log::debug!("RESET drops {} replayed statements", self.replayed.len());
            self.replayed.clear();
        } else if is_session_statement(statement) {
            log::debug!("replaying session statement: {}", statement);
            self.replayed.push(statement.to_string());
        }
    }

    async fn run_batch(&self, statements: &[String], origin: &str) -> TestHarnessResult<RowSet> {
        let mut input = String::new();
        for statement in statements {
            input.push_str(statement);
            input.push_str(";\n");
        }

        let mut child = Command::new(&self.engine.command)
            .args(&self.engine.args)
            .envs(&self.engine.env)
            .env(ENV_NAMESPACE, &self.session.namespace)
            .env(ENV_WAREHOUSE_DIR, &self.session.warehouse_dir)
            .env(ENV_SCRATCH_DIR, &self.session.scratch_dir)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| TestHarnessError::ExecutionError {
                message: format!("failed to start '{}'", self.engine.command),
                statement: origin.to_string(),
                cause: Some(e.to_string()),
            })?;

        if let Some(mut stdin) = child.stdin.take() {
            // A client may exit before reading its input; its exit status
            // reports that case.
            if let Err(e) = stdin.write_all(input.as_bytes()).await {
                log::debug!("could not write script to '{}': {}", self.engine.command, e);
            }
        }

        let output = child
            .wait_with_output()
            .await
            .map_err(|e| TestHarnessError::ExecutionError {
                message: format!("failed to wait for '{}'", self.engine.command),
                statement: origin.to_string(),
                cause: Some(e.to_string()),
            })?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
            return Err(TestHarnessError::ExecutionError {
                message: format!(
                    "'{}' exited with {} for statement: {}",
                    self.engine.command, output.status, origin
                ),
                statement: origin.to_string(),
                cause: if stderr.is_empty() { None } else { Some(stderr) },
            });
        }

        let stdout = String::from_utf8_lossy(&output.stdout);
        Ok(parse_output(
            &stdout,
            &self.engine.separator,
            &self.engine.null_literal,
        ))
    }
}

#[async_trait]
impl Session for CommandSession {
    async fn execute(
        &mut self,
        statement: &str,
        table_location: Option<&Path>,
    ) -> TestHarnessResult<RowSet> {
        if self.closed {
            return Err(TestHarnessError::SessionError {
                message: "execute on closed session".to_string(),
            });
        }

        let statement = match table_location {
            Some(location) => rewrite_table_location(statement, location),
            None => statement.to_string(),
        };

        let script = self.script_for(&statement);
        let rows = self.run_batch(&script, &statement).await?;
        self.remember(&statement);
        Ok(rows)
    }

    async fn close(&mut self) -> TestHarnessResult<()> {
        if self.closed {
            return Ok(());
        }
        self.closed = true;

        if !self.engine.drop_on_close {
            return Ok(());
        }

        let drop = render(
            &self.engine.drop_namespace,
            &[("namespace", &self.session.namespace)],
        );
        log::debug!("dropping namespace {}", self.session.namespace);
        self.run_batch(&[drop.clone()], &drop)
            .await
            .map(|_| ())
            .map_err(|e| TestHarnessError::SessionError {
                message: format!(
                    "failed to drop namespace {}: {}",
                    self.session.namespace, e
                ),
            })
    }
}

//! Mock query engine for testing
//!
//! Provides an in-process [`QueryEngine`] that answers statements from a
//! list of rules instead of a real engine, and records everything it was
//! asked to do.

use super::engine::{QueryEngine, Session, SessionConfig};
use super::error::{TestHarnessError, TestHarnessResult};
use super::types::RowSet;
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::RwLock;

/// What a matching rule answers
#[derive(Debug, Clone)]
pub enum MockResponse {
    Rows(RowSet),
    Fail(String),
}

#[derive(Debug, Clone)]
struct MockRule {
    pattern: String,
    response: MockResponse,
}

/// One statement as the mock received it
#[derive(Debug, Clone, PartialEq)]
pub struct ExecutedStatement {
    pub namespace: String,
    pub statement: String,
    pub table_location: Option<PathBuf>,
}

#[derive(Debug, Default)]
struct MockState {
    executed: Vec<ExecutedStatement>,
    opened: Vec<SessionConfig>,
    closed: usize,
}

/// Mock engine for testing
///
/// Rules are matched in insertion order by case-insensitive substring; the
/// first match answers. Statements matching no rule return no rows.
///
/// # Example
///
/// ```rust,ignore
/// use hqlunit::test_harness::mock::MockEngine;
/// use hqlunit::row;
///
/// let engine = MockEngine::new()
///     .with_rows("select", vec![row![true]])
///     .with_failure("drop", "not allowed");
/// ```
#[derive(Clone, Default)]
pub struct MockEngine {
    rules: Vec<MockRule>,
    fail_open: bool,
    fail_close: bool,
    state: Arc<RwLock<MockState>>,
}

impl MockEngine {
    /// Create a mock with no rules
    pub fn new() -> Self {
        Self::default()
    }

    /// Answer statements containing `pattern` with `rows`
    pub fn with_rows(mut self, pattern: &str, rows: RowSet) -> Self {
        self.rules.push(MockRule {
            pattern: pattern.to_lowercase(),
            response: MockResponse::Rows(rows),
        });
        self
    }

    /// Fail statements containing `pattern`
    pub fn with_failure(mut self, pattern: &str, message: &str) -> Self {
        self.rules.push(MockRule {
            pattern: pattern.to_lowercase(),
            response: MockResponse::Fail(message.to_string()),
        });
        self
    }

    /// Make every `open_session` call fail
    pub fn with_failing_open(mut self) -> Self {
        self.fail_open = true;
        self
    }

    /// Make every session close fail
    pub fn with_failing_close(mut self) -> Self {
        self.fail_close = true;
        self
    }

    /// Every statement executed so far, in order
    pub async fn executed(&self) -> Vec<ExecutedStatement> {
        self.state.read().await.executed.clone()
    }

    /// Executed statement texts, in order
    pub async fn statements(&self) -> Vec<String> {
        self.state
            .read()
            .await
            .executed
            .iter()
            .map(|e| e.statement.clone())
            .collect()
    }

    /// Configurations of every opened session
    pub async fn opened_sessions(&self) -> Vec<SessionConfig> {
        self.state.read().await.opened.clone()
    }

    pub async fn sessions_opened(&self) -> usize {
        self.state.read().await.opened.len()
    }

    pub async fn sessions_closed(&self) -> usize {
        self.state.read().await.closed
    }

    /// Forget recorded statements and sessions, keeping the rules
    pub async fn reset(&self) {
        *self.state.write().await = MockState::default();
    }

    fn respond(&self, statement: &str) -> MockResponse {
        let lowered = statement.to_lowercase();
        self.rules
            .iter()
            .find(|rule| lowered.contains(&rule.pattern))
            .map(|rule| rule.response.clone())
            .unwrap_or_else(|| MockResponse::Rows(RowSet::new()))
    }
}

#[async_trait]
impl QueryEngine for MockEngine {
    fn name(&self) -> &str {
        "mock"
    }

    async fn open_session(&self, config: &SessionConfig) -> TestHarnessResult<Box<dyn Session>> {
        if self.fail_open {
            return Err(TestHarnessError::SessionError {
                message: format!("mock refused to open session for {}", config.namespace),
            });
        }

        self.state.write().await.opened.push(config.clone());
        Ok(Box::new(MockSession {
            engine: self.clone(),
            namespace: config.namespace.clone(),
            closed: false,
        }))
    }
}

struct MockSession {
    engine: MockEngine,
    namespace: String,
    closed: bool,
}

#[async_trait]
impl Session for MockSession {
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

        self.engine
            .state
            .write()
            .await
            .executed
            .push(ExecutedStatement {
                namespace: self.namespace.clone(),
                statement: statement.to_string(),
                table_location: table_location.map(Path::to_path_buf),
            });

        match self.engine.respond(statement) {
            MockResponse::Rows(rows) => Ok(rows),
            MockResponse::Fail(message) => Err(TestHarnessError::ExecutionError {
                message,
                statement: statement.to_string(),
                cause: None,
            }),
        }
    }

    async fn close(&mut self) -> TestHarnessResult<()> {
        if self.closed {
            return Err(TestHarnessError::SessionError {
                message: format!("session {} closed twice", self.namespace),
            });
        }
        self.closed = true;
        self.engine.state.write().await.closed += 1;

        if self.engine.fail_close {
            return Err(TestHarnessError::SessionError {
                message: format!("mock failed to close session {}", self.namespace),
            });
        }
        Ok(())
    }
}

//! Query engine contract
//!
//! The harness never interprets SQL itself; it drives an engine through two
//! narrow traits:
//! - [`QueryEngine`] opens one [`Session`] per test case
//! - [`Session`] executes single statements and is closed exactly once
//!
//! Table-creation statements receive the per-case storage location
//! explicitly, so the engine can point the table at the isolated data
//! directory instead of whatever path the script author wrote.

use super::error::{TestHarnessError, TestHarnessResult};
use super::splitter::split_statements;
use super::types::RowSet;
use async_trait::async_trait;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Everything an engine needs to open an isolated session for one case
#[derive(Debug, Clone, PartialEq)]
pub struct SessionConfig {
    /// Unique namespace (database/catalog name) of the case
    pub namespace: String,

    /// Merged parameters, exposed to scripts as variables
    pub variables: BTreeMap<String, String>,

    /// Warehouse directory owned by the case
    pub warehouse_dir: PathBuf,

    /// Scratch directory owned by the case
    pub scratch_dir: PathBuf,
}

/// Factory for engine sessions
#[async_trait]
pub trait QueryEngine: Send + Sync {
    /// Engine name for logs and reports
    fn name(&self) -> &str;

    /// Open a new session scoped to `config.namespace`
    async fn open_session(&self, config: &SessionConfig) -> TestHarnessResult<Box<dyn Session>>;
}

/// An open engine session
#[async_trait]
pub trait Session: Send {
    /// Execute one statement and return its rows
    ///
    /// When `table_location` is set, the statement is a table-creation
    /// script whose storage location must be rewritten to that directory.
    async fn execute(
        &mut self,
        statement: &str,
        table_location: Option<&Path>,
    ) -> TestHarnessResult<RowSet>;

    /// Release the session; called exactly once
    async fn close(&mut self) -> TestHarnessResult<()>;
}

/// Split `script` and execute each statement in order, concatenating rows
///
/// With `timeout` set, each statement runs under its own deadline.
pub async fn execute_script(
    session: &mut dyn Session,
    script: &str,
    table_location: Option<&Path>,
    timeout: Option<Duration>,
) -> TestHarnessResult<RowSet> {
    let mut rows = RowSet::new();

    for statement in split_statements(script) {
        let result = match timeout {
            Some(limit) => {
                match tokio::time::timeout(limit, session.execute(&statement, table_location))
                    .await
                {
                    Ok(result) => result,
                    Err(_) => Err(TestHarnessError::TimeoutError {
                        message: format!("statement did not finish: {}", statement),
                        operation: "execute".to_string(),
                        timeout_ms: limit.as_millis() as u64,
                    }),
                }
            }
            None => session.execute(&statement, table_location).await,
        };

        match result {
            Ok(mut statement_rows) => rows.append(&mut statement_rows),
            Err(e) => {
                log::error!("statement failed: {}: {}", statement, e);
                return Err(e);
            }
        }
    }

    Ok(rows)
}

/// Point the `LOCATION` clause of a table-creation statement at `location`
///
/// Only `CREATE [modifiers] TABLE` statements are touched, where the
/// modifiers are any run of `TEMPORARY`, `EXTERNAL`, `TRANSACTIONAL` and
/// `MANAGED`, and only a quoted literal directly following the `LOCATION`
/// keyword outside of quotes. Everything else is returned unchanged.
pub fn rewrite_table_location(statement: &str, location: &Path) -> String {
    let words = unquoted_words(statement);
    if !is_create_table(statement, &words) {
        return statement.to_string();
    }

    // A column may be called `location` too; the clause is the keyword
    // followed by a quoted literal.
    for &(start, end) in &words {
        if !statement[start..end].eq_ignore_ascii_case("LOCATION") {
            continue;
        }

        let rest = &statement[end..];
        let literal_start = end + (rest.len() - rest.trim_start().len());
        let quote = match statement[literal_start..].chars().next() {
            Some(q @ ('\'' | '"')) => q,
            _ => continue,
        };

        if let Some(literal_end) = closing_quote(statement, literal_start, quote) {
            return format!(
                "{}'file://{}'{}",
                &statement[..literal_start],
                location.display(),
                &statement[literal_end + 1..]
            );
        }
    }

    statement.to_string()
}

/// Keywords that may sit between `CREATE` and `TABLE`, in any order
const TABLE_MODIFIERS: &[&str] = &["TEMPORARY", "EXTERNAL", "TRANSACTIONAL", "MANAGED"];

fn is_create_table(statement: &str, words: &[(usize, usize)]) -> bool {
    let mut upper = words
        .iter()
        .map(|(s, e)| statement[*s..*e].to_ascii_uppercase());

    if upper.next().as_deref() != Some("CREATE") {
        return false;
    }
    upper
        .find(|word| !TABLE_MODIFIERS.contains(&word.as_str()))
        .is_some_and(|word| word == "TABLE")
}

/// Byte ranges of identifier-like words that are not inside quotes
fn unquoted_words(statement: &str) -> Vec<(usize, usize)> {
    let mut words = Vec::new();
    let mut in_single_quote = false;
    let mut in_double_quote = false;
    let mut escape = false;
    let mut word_start: Option<usize> = None;

    for (index, ch) in statement.char_indices() {
        let quoted = in_single_quote || in_double_quote;
        let is_word_char = ch.is_alphanumeric() || ch == '_';

        if !quoted && is_word_char {
            word_start.get_or_insert(index);
        } else if let Some(start) = word_start.take() {
            words.push((start, index));
        }

        match ch {
            '\'' if !escape && !in_double_quote => in_single_quote = !in_single_quote,
            '"' if !escape && !in_single_quote => in_double_quote = !in_double_quote,
            _ => {}
        }

        if escape {
            escape = false;
        } else if ch == '\\' {
            escape = true;
        }
    }

    if let Some(start) = word_start {
        words.push((start, statement.len()));
    }
    words
}

fn closing_quote(statement: &str, open_at: usize, quote: char) -> Option<usize> {
    let mut escape = false;
    for (offset, ch) in statement[open_at + 1..].char_indices() {
        if escape {
            escape = false;
        } else if ch == '\\' {
            escape = true;
        } else if ch == quote {
            return Some(open_at + 1 + offset);
        }
    }
    None
}

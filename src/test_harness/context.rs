//! Per-case execution context
//!
//! An [`ExecutionContext`] owns everything one test case needs: its names,
//! its unique namespace, the directories it may write to, the accumulated
//! setup scripts, parameter blocks and component descriptors, the query
//! under test, the validation query, and finally the captured result.

use super::engine::SessionConfig;
use super::error::{TestHarnessError, TestHarnessResult};
use super::types::RowSet;
use super::utils::{ensure_absolute, read_file, read_lines};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

/// Directory below the engine base dir holding warehouse data
pub const ENGINE_WAREHOUSE_DIR: &str = "warehouse";

/// Directory below the engine base dir for scratch files
pub const ENGINE_SCRATCH_DIR: &str = "scratch";

/// Prefix of every generated namespace
pub const NAMESPACE_PREFIX: &str = "ns_";

/// Allocate a fresh namespace identifier: `ns_` + 16 hex chars of a v4 uuid
pub fn allocate_namespace() -> String {
    let id = uuid::Uuid::new_v4().simple().to_string();
    format!("{}{}", NAMESPACE_PREFIX, &id[..16])
}

/// Isolated configuration and state of a single test case
#[derive(Debug)]
pub struct ExecutionContext {
    name: String,
    short_name: String,
    namespace: String,

    root_dir: PathBuf,
    table_definitions_root: Option<PathBuf>,
    out_dir: Option<PathBuf>,
    log_dir: Option<PathBuf>,
    data_dir: Option<PathBuf>,
    engine_base_dir: Option<PathBuf>,

    setup_scripts: Vec<String>,
    parameter_blocks: Vec<String>,
    components: Vec<String>,

    query: Option<String>,
    test_query: Option<String>,

    test_result: RowSet,
    transcript: String,
}

impl ExecutionContext {
    /// Create a context rooted at `root_dir` with a freshly allocated namespace
    pub fn new(root_dir: impl Into<PathBuf>, name: &str, short_name: &str) -> Self {
        Self {
            name: name.to_string(),
            short_name: short_name.to_string(),
            namespace: allocate_namespace(),
            root_dir: root_dir.into(),
            table_definitions_root: None,
            out_dir: None,
            log_dir: None,
            data_dir: None,
            engine_base_dir: None,
            setup_scripts: Vec::new(),
            parameter_blocks: Vec::new(),
            components: Vec::new(),
            query: None,
            test_query: None,
            test_result: RowSet::new(),
            transcript: String::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn short_name(&self) -> &str {
        &self.short_name
    }

    /// The case's namespace; fixed for the lifetime of the context
    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    // ==================== Directories ====================

    pub fn root_dir(&self) -> &Path {
        &self.root_dir
    }

    pub fn set_table_definitions_root(&mut self, dir: impl Into<PathBuf>) {
        self.table_definitions_root = Some(dir.into());
    }

    /// Root that relative table script paths resolve against
    pub fn table_definitions_root(&self) -> TestHarnessResult<&Path> {
        self.table_definitions_root
            .as_deref()
            .ok_or_else(|| TestHarnessError::config("table definition root directory not set"))
    }

    pub fn set_out_dir(&mut self, dir: impl Into<PathBuf>) {
        self.out_dir = Some(dir.into());
    }

    /// Output directory, the root directory unless set
    pub fn out_dir(&self) -> &Path {
        self.out_dir.as_deref().unwrap_or(&self.root_dir)
    }

    pub fn set_log_dir(&mut self, dir: impl Into<PathBuf>) {
        self.log_dir = Some(dir.into());
    }

    /// Directory receiving the case output file; no output when unset
    pub fn log_dir(&self) -> Option<&Path> {
        self.log_dir.as_deref()
    }

    pub fn set_data_dir(&mut self, dir: impl Into<PathBuf>) {
        self.data_dir = Some(dir.into());
    }

    /// Parent of the per-table storage locations
    pub fn data_dir(&self) -> &Path {
        self.data_dir.as_deref().unwrap_or(&self.root_dir)
    }

    pub fn set_engine_base_dir(&mut self, dir: impl Into<PathBuf>) {
        self.engine_base_dir = Some(dir.into());
    }

    pub fn engine_base_dir(&self) -> &Path {
        self.engine_base_dir.as_deref().unwrap_or(&self.root_dir)
    }

    pub fn warehouse_dir(&self) -> PathBuf {
        self.engine_base_dir().join(ENGINE_WAREHOUSE_DIR)
    }

    pub fn scratch_dir(&self) -> PathBuf {
        self.engine_base_dir().join(ENGINE_SCRATCH_DIR)
    }

    /// Check every configured directory is absolute
    pub fn validate_paths(&self) -> TestHarnessResult<()> {
        ensure_absolute(&self.root_dir)?;
        ensure_absolute(self.out_dir())?;
        ensure_absolute(self.data_dir())?;
        ensure_absolute(self.engine_base_dir())?;
        if let Some(dir) = self.log_dir() {
            ensure_absolute(dir)?;
        }
        if let Some(dir) = self.table_definitions_root.as_deref() {
            ensure_absolute(dir)?;
        }
        Ok(())
    }

    // ==================== Setup scripts ====================

    pub fn add_setup_file(&mut self, path: &Path) -> TestHarnessResult<()> {
        let content = read_file(path)?;
        self.add_setup_content(content);
        Ok(())
    }

    pub fn add_setup_content(&mut self, content: impl Into<String>) {
        self.setup_scripts.push(content.into());
    }

    /// Setup scripts in insertion order, trimmed, blanks removed
    pub fn setup_scripts(&self) -> Vec<String> {
        non_blank(&self.setup_scripts)
    }

    // ==================== Parameters ====================

    pub fn add_parameter_file(&mut self, path: &Path) -> TestHarnessResult<()> {
        let content = read_file(path)?;
        self.add_parameter_content(content);
        Ok(())
    }

    pub fn add_parameter_content(&mut self, content: impl Into<String>) {
        self.parameter_blocks.push(content.into());
    }

    pub fn parameter_blocks(&self) -> &[String] {
        &self.parameter_blocks
    }

    /// All parameter blocks merged, later blocks overriding earlier keys
    pub fn parameters(&self) -> BTreeMap<String, String> {
        let mut merged = BTreeMap::new();
        for block in &self.parameter_blocks {
            merged.extend(parse_parameters(block));
        }
        merged
    }

    // ==================== Components ====================

    /// Add every line of a component file
    pub fn add_components_file(&mut self, path: &Path) -> TestHarnessResult<()> {
        for line in read_lines(path)? {
            self.add_component(line);
        }
        Ok(())
    }

    /// Add one descriptor line; duplicates keep their first position
    pub fn add_component(&mut self, descriptor: impl Into<String>) {
        let descriptor = descriptor.into().trim().to_string();
        if descriptor.is_empty() || self.components.contains(&descriptor) {
            return;
        }
        self.components.push(descriptor);
    }

    pub fn components(&self) -> &[String] {
        &self.components
    }

    // ==================== Queries ====================

    pub fn set_query_file(&mut self, path: &Path) -> TestHarnessResult<()> {
        let content = read_file(path)?;
        self.set_query(content);
        Ok(())
    }

    pub fn set_query(&mut self, content: impl Into<String>) {
        if self.query.is_some() {
            log::warn!("query already set for {}, overriding", self.name);
        }
        self.query = Some(content.into());
    }

    /// Query under test; blank queries count as absent
    pub fn query(&self) -> Option<&str> {
        self.query.as_deref().filter(|q| !q.trim().is_empty())
    }

    pub fn set_test_query_file(&mut self, path: &Path) -> TestHarnessResult<()> {
        let content = read_file(path)?;
        self.set_test_query(content);
        Ok(())
    }

    pub fn set_test_query(&mut self, content: impl Into<String>) {
        let content = content.into();
        if self.test_query.is_some() && !content.is_empty() {
            log::warn!("test query already set for {}, overriding", self.name);
        }
        self.test_query = Some(content);
    }

    /// Validation query; blank queries count as absent
    pub fn test_query(&self) -> Option<&str> {
        self.test_query.as_deref().filter(|q| !q.trim().is_empty())
    }

    // ==================== Results ====================

    /// Copy of the captured validation rows
    pub fn test_result(&self) -> RowSet {
        self.test_result.clone()
    }

    pub(crate) fn set_test_result(&mut self, rows: &[super::types::Row]) {
        self.test_result = rows.to_vec();
    }

    /// Text accumulated for the persisted case output
    pub fn transcript(&self) -> &str {
        &self.transcript
    }

    pub(crate) fn transcript_mut(&mut self) -> &mut String {
        &mut self.transcript
    }

    /// Session parameters derived from this context
    pub fn session_config(&self) -> SessionConfig {
        SessionConfig {
            namespace: self.namespace.clone(),
            variables: self.parameters(),
            warehouse_dir: self.warehouse_dir(),
            scratch_dir: self.scratch_dir(),
        }
    }
}

impl std::fmt::Display for ExecutionContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "ExecutionContext[name={}]", self.name)
    }
}

fn non_blank(items: &[String]) -> Vec<String> {
    items
        .iter()
        .map(|s| s.trim())
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

/// Parse a properties-style block
///
/// Accepts `key=value`, `key:value` and `key value`; `#` and `!` start
/// comment lines. Later duplicates win.
pub fn parse_parameters(block: &str) -> BTreeMap<String, String> {
    let mut params = BTreeMap::new();

    for line in block.lines() {
        let line = line.trim_start();
        if line.is_empty() || line.starts_with('#') || line.starts_with('!') {
            continue;
        }

        let split_at = line
            .find(|c: char| c == '=' || c == ':')
            .into_iter()
            .chain(line.find(char::is_whitespace))
            .min();

        let (key, value) = match split_at {
            Some(pos) => {
                let key = &line[..pos];
                let rest = line[pos..].trim_start();
                let rest = rest
                    .strip_prefix('=')
                    .or_else(|| rest.strip_prefix(':'))
                    .unwrap_or(rest);
                (key.trim_end(), rest.trim())
            }
            None => (line.trim_end(), ""),
        };

        params.insert(key.to_string(), value.to_string());
    }

    params
}

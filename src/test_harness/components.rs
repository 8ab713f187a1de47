//! Component provisioning
//!
//! Component descriptors are one-line declarations of the database objects
//! a case needs before its scripts run:
//!
//! ```text
//! # comment lines and blank lines are ignored
//! DATABASE sales
//! TABLE    tables/sales/orders.hql   # relative to the table root
//! FUNCTION to_cents com.example.udf.ToCents
//! MY_TYPE  anything                  # resolved through the registry
//! ```
//!
//! Built-in types are dispatched to fixed creators; any other type name is
//! looked up in a [`ComponentRegistry`] of factories registered at startup.

use super::engine::{execute_script, Session};
use super::error::{TestHarnessError, TestHarnessResult};
use super::utils::{read_file, recreate_dir, resolve_path};
use async_trait::async_trait;
use std::collections::HashMap;
use std::path::{Component, Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

/// Starts a comment, both as a whole line and as a parameter suffix
pub const COMMENT_MARKER: char = '#';

/// The kind of component a descriptor declares
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ComponentKind {
    Database,
    Table,
    Function,
    /// Any other type name, resolved through the registry
    Extension(String),
}

impl ComponentKind {
    /// Classify a type token, case-insensitively
    pub fn from_type(token: &str) -> Self {
        match token.to_ascii_uppercase().as_str() {
            "DATABASE" => ComponentKind::Database,
            "TABLE" | "TABLEFILE" | "TABLE_FILE" | "FILE" => ComponentKind::Table,
            "FUNCTION" => ComponentKind::Function,
            _ => ComponentKind::Extension(token.to_string()),
        }
    }
}

/// A parsed `<TYPE> <parameter>` line
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ComponentDescriptor {
    pub kind: ComponentKind,
    /// The parameter as written, including any inline comment
    pub raw_param: String,
    /// Original line, kept for error messages
    pub definition: String,
}

impl ComponentDescriptor {
    /// Parse one descriptor line
    ///
    /// Returns `Ok(None)` for blank and comment lines.
    pub fn parse(line: &str) -> TestHarnessResult<Option<Self>> {
        let trimmed = line.trim();
        if trimmed.is_empty() || trimmed.starts_with(COMMENT_MARKER) {
            return Ok(None);
        }

        let Some((type_token, param)) = trimmed.split_once(char::is_whitespace) else {
            return Err(TestHarnessError::ComponentError {
                message: "bad component definition, expected '<TYPE> <parameter>'".to_string(),
                definition: line.to_string(),
            });
        };

        Ok(Some(Self {
            kind: ComponentKind::from_type(type_token.trim()),
            raw_param: param.to_string(),
            definition: line.to_string(),
        }))
    }

    /// Parameter with surrounding whitespace and any `#` suffix removed
    ///
    /// Only the text before the first `#` is kept, so paths containing `#`
    /// cannot be expressed.
    pub fn param(&self) -> &str {
        let trimmed = self.raw_param.trim();
        trimmed
            .split(COMMENT_MARKER)
            .next()
            .unwrap_or_default()
            .trim()
    }
}

/// Where provisioning actions may read scripts from and write data to
#[derive(Debug, Clone)]
pub struct ProvisionTarget {
    /// Parent of every per-table storage location
    pub data_dir: PathBuf,

    /// Root for relative table script paths
    pub table_definitions_root: Option<PathBuf>,

    /// Deadline per provisioning statement
    pub statement_timeout: Option<Duration>,
}

impl ProvisionTarget {
    /// Storage location of a table declared by `script_path`
    ///
    /// Absolute script paths are keyed by their path without the root, so
    /// every location stays inside `data_dir`.
    pub fn table_location(&self, script_path: &str) -> PathBuf {
        let relative: PathBuf = Path::new(script_path)
            .components()
            .filter(|c| matches!(c, Component::Normal(_)))
            .collect();
        self.data_dir.join(relative)
    }

    fn resolve_script(&self, script_path: &str) -> TestHarnessResult<PathBuf> {
        let path = Path::new(script_path);
        if path.is_absolute() {
            return Ok(path.to_path_buf());
        }
        match self.table_definitions_root.as_deref() {
            Some(root) => Ok(resolve_path(path, root)),
            None => Err(TestHarnessError::config(format!(
                "relative table definition '{}' but table definition root is not set",
                script_path
            ))),
        }
    }
}

/// Creation capability of one component type
#[async_trait]
pub trait ComponentCreator: Send + Sync {
    async fn create(
        &self,
        session: &mut dyn Session,
        target: &ProvisionTarget,
        param: &str,
    ) -> TestHarnessResult<()>;
}

/// Produces a creator for an extension type
pub type CreatorFactory = Arc<dyn Fn() -> Box<dyn ComponentCreator> + Send + Sync>;

/// Extension component types keyed by (case-insensitive) name
#[derive(Clone, Default)]
pub struct ComponentRegistry {
    factories: HashMap<String, CreatorFactory>,
}

impl ComponentRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a factory under `name`, replacing any previous one
    pub fn register<F>(&mut self, name: &str, factory: F)
    where
        F: Fn() -> Box<dyn ComponentCreator> + Send + Sync + 'static,
    {
        self.factories
            .insert(name.to_ascii_uppercase(), Arc::new(factory));
    }

    /// Builder-style [`register`](Self::register)
    pub fn with<F>(mut self, name: &str, factory: F) -> Self
    where
        F: Fn() -> Box<dyn ComponentCreator> + Send + Sync + 'static,
    {
        self.register(name, factory);
        self
    }

    /// Instantiate the creator registered for `name`
    pub fn resolve(&self, name: &str) -> Option<Box<dyn ComponentCreator>> {
        self.factories
            .get(&name.to_ascii_uppercase())
            .map(|factory| factory())
    }

    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.factories.keys().cloned().collect();
        names.sort();
        names
    }
}

impl std::fmt::Debug for ComponentRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ComponentRegistry")
            .field("types", &self.names())
            .finish()
    }
}

/// Runs the descriptors of a case against its session
#[derive(Debug, Clone, Default)]
pub struct ComponentProvisioner {
    registry: ComponentRegistry,
}

impl ComponentProvisioner {
    pub fn new(registry: ComponentRegistry) -> Self {
        Self { registry }
    }

    /// Provision every descriptor in order, stopping at the first failure
    pub async fn provision(
        &self,
        session: &mut dyn Session,
        target: &ProvisionTarget,
        definitions: &[String],
    ) -> TestHarnessResult<()> {
        for definition in definitions {
            let Some(descriptor) = ComponentDescriptor::parse(definition)? else {
                continue;
            };

            log::debug!(
                "creating component kind={:?}, param={}",
                descriptor.kind,
                descriptor.raw_param
            );

            self.create(session, target, &descriptor)
                .await
                .map_err(|e| attach_definition(e, &descriptor.definition))?;
        }
        Ok(())
    }

    async fn create(
        &self,
        session: &mut dyn Session,
        target: &ProvisionTarget,
        descriptor: &ComponentDescriptor,
    ) -> TestHarnessResult<()> {
        match &descriptor.kind {
            ComponentKind::Database => {
                DatabaseCreator
                    .create(session, target, descriptor.param())
                    .await
            }
            ComponentKind::Table => {
                TableCreator
                    .create(session, target, descriptor.param())
                    .await
            }
            ComponentKind::Function => {
                FunctionCreator
                    .create(session, target, descriptor.param())
                    .await
            }
            ComponentKind::Extension(name) => {
                let creator = self.registry.resolve(name).ok_or_else(|| {
                    TestHarnessError::ComponentError {
                        message: format!("no component creator registered for type={}", name),
                        definition: descriptor.definition.clone(),
                    }
                })?;
                creator
                    .create(session, target, &descriptor.raw_param)
                    .await
            }
        }
    }
}

fn attach_definition(err: TestHarnessError, definition: &str) -> TestHarnessError {
    match err {
        TestHarnessError::ComponentError { .. } => err,
        other => TestHarnessError::ComponentError {
            message: other.to_string(),
            definition: definition.to_string(),
        },
    }
}

/// Execute provisioning SQL, which must not produce rows
async fn execute_side_effect_only(
    session: &mut dyn Session,
    sql: &str,
    table_location: Option<&Path>,
    target: &ProvisionTarget,
    what: &str,
) -> TestHarnessResult<()> {
    let rows = execute_script(session, sql, table_location, target.statement_timeout).await?;
    if rows.is_empty() {
        Ok(())
    } else {
        Err(TestHarnessError::ComponentError {
            message: format!("{} must not return result, got {} rows", what, rows.len()),
            definition: sql.to_string(),
        })
    }
}

/// `DATABASE <name>`
pub struct DatabaseCreator;

#[async_trait]
impl ComponentCreator for DatabaseCreator {
    async fn create(
        &self,
        session: &mut dyn Session,
        target: &ProvisionTarget,
        param: &str,
    ) -> TestHarnessResult<()> {
        let sql = format!("CREATE DATABASE IF NOT EXISTS {}", param);
        execute_side_effect_only(session, &sql, None, target, "create database").await
    }
}

/// `TABLE <script path>`: recreates the table's storage and runs its script
pub struct TableCreator;

#[async_trait]
impl ComponentCreator for TableCreator {
    async fn create(
        &self,
        session: &mut dyn Session,
        target: &ProvisionTarget,
        param: &str,
    ) -> TestHarnessResult<()> {
        let script_path = target.resolve_script(param)?;
        let location = target.table_location(param);

        log::trace!(
            "table script={} location={}",
            script_path.display(),
            location.display()
        );
        recreate_dir(&location)?;

        let content = read_file(&script_path)?;
        execute_side_effect_only(session, &content, Some(&location), target, "create table").await
    }
}

/// `FUNCTION <name> <implementation>`
pub struct FunctionCreator;

#[async_trait]
impl ComponentCreator for FunctionCreator {
    async fn create(
        &self,
        session: &mut dyn Session,
        target: &ProvisionTarget,
        param: &str,
    ) -> TestHarnessResult<()> {
        let Some((name, implementation)) = param.split_once(char::is_whitespace) else {
            return Err(TestHarnessError::ComponentError {
                message: "invalid function syntax, expected '<name> <implementation>'"
                    .to_string(),
                definition: param.to_string(),
            });
        };

        let sql = format!(
            "CREATE FUNCTION {} AS '{}'",
            name,
            implementation.trim()
        );
        execute_side_effect_only(session, &sql, None, target, "create function").await
    }
}

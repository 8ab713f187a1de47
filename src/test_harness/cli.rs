//! CLI helpers for the hqlunit binary
//!
//! [`CaseOptions`] holds the flags of a single-case run. Validation is a
//! plain function of the options; nothing is staged in process-wide state.

use super::components::{ComponentDescriptor, ComponentKind};
use super::context::ExecutionContext;
use super::discovery::RepoRunner;
use super::engine::QueryEngine;
use super::error::{TestHarnessError, TestHarnessResult};
use super::report::{OutputFormat, ReportGenerator, TestReport};
use super::runner::{run_case, CaseOutcome, RunnerSettings};
use super::utils::{absolutize, read_lines};
use std::path::{Path, PathBuf};

/// Case name used when none is given
pub const DEFAULT_CASE_NAME: &str = "hqlunit";

/// Options of a single-case run
#[derive(Debug, Clone, Default)]
pub struct CaseOptions {
    pub name: Option<String>,

    /// Working directory of the case; must not exist yet
    pub root: PathBuf,

    pub table_definitions_root: Option<PathBuf>,
    pub log_dir: Option<PathBuf>,

    pub query_file: Option<PathBuf>,
    pub query: Option<String>,

    pub test_query_file: Option<PathBuf>,
    pub test_query: Option<String>,

    pub setup_files: Vec<PathBuf>,
    pub setup_queries: Vec<String>,

    pub component_files: Vec<PathBuf>,
    pub component_queries: Vec<String>,

    pub param_files: Vec<PathBuf>,
    pub param_queries: Vec<String>,
}

impl CaseOptions {
    pub fn name(&self) -> &str {
        self.name.as_deref().unwrap_or(DEFAULT_CASE_NAME)
    }

    /// Check the options for conflicts and missing files
    pub fn validate(&self) -> TestHarnessResult<()> {
        if self.root.exists() {
            return Err(TestHarnessError::config(format!(
                "root directory already exists: {}",
                self.root.display()
            )));
        }

        if let Some(dir) = &self.table_definitions_root {
            if !dir.is_dir() {
                return Err(TestHarnessError::config(format!(
                    "table definitions directory does not exist: {}",
                    dir.display()
                )));
            }
        }

        check_exclusive("query", &self.query_file, &self.query)?;
        check_exclusive("test query", &self.test_query_file, &self.test_query)?;

        check_all_exist("setup", &self.setup_files)?;
        check_all_exist("component", &self.component_files)?;
        check_all_exist("param", &self.param_files)?;

        if self.table_definitions_root.is_none() {
            self.check_no_relative_tables()?;
        }

        Ok(())
    }

    fn check_no_relative_tables(&self) -> TestHarnessResult<()> {
        let mut lines = Vec::new();
        for file in &self.component_files {
            lines.extend(read_lines(file)?);
        }
        lines.extend(self.component_queries.iter().cloned());

        for line in &lines {
            let Some(descriptor) = ComponentDescriptor::parse(line)? else {
                continue;
            };
            if descriptor.kind == ComponentKind::Table && !Path::new(descriptor.param()).is_absolute()
            {
                return Err(TestHarnessError::config(format!(
                    "a relative table definition file given but table definition root is not set: {}",
                    descriptor.param()
                )));
            }
        }
        Ok(())
    }

    /// Validate and build the case's execution context
    pub fn into_context(self) -> TestHarnessResult<ExecutionContext> {
        self.validate()?;

        let root = absolutize(&self.root)?;
        let name = self.name().to_string();
        let mut ctx = ExecutionContext::new(root, &name, &name);

        if let Some(dir) = &self.log_dir {
            ctx.set_log_dir(absolutize(dir)?);
        }
        if let Some(dir) = &self.table_definitions_root {
            ctx.set_table_definitions_root(absolutize(dir)?);
        }

        match (&self.query_file, self.query) {
            (Some(file), _) => ctx.set_query_file(file)?,
            (None, Some(query)) => ctx.set_query(query),
            (None, None) => log::info!("no query set, skipping query"),
        }

        match (&self.test_query_file, self.test_query) {
            (Some(file), _) => ctx.set_test_query_file(file)?,
            (None, Some(query)) => ctx.set_test_query(query),
            (None, None) => log::info!("no test query set, skipping test query"),
        }

        for file in &self.component_files {
            ctx.add_components_file(file)?;
        }
        for line in self.component_queries {
            ctx.add_component(line);
        }

        for file in &self.param_files {
            ctx.add_parameter_file(file)?;
        }
        for block in self.param_queries {
            ctx.add_parameter_content(block);
        }

        for file in &self.setup_files {
            ctx.add_setup_file(file)?;
        }
        for script in self.setup_queries {
            ctx.add_setup_content(script);
        }

        Ok(ctx)
    }
}

fn check_exclusive(
    what: &str,
    file: &Option<PathBuf>,
    inline: &Option<String>,
) -> TestHarnessResult<()> {
    match file {
        Some(_) if inline.is_some() => Err(TestHarnessError::config(format!(
            "can not set both {} and {} file",
            what, what
        ))),
        Some(path) if !path.exists() => Err(TestHarnessError::config(format!(
            "{} file does not exist: {}",
            what,
            path.display()
        ))),
        _ => Ok(()),
    }
}

fn check_all_exist(what: &str, files: &[PathBuf]) -> TestHarnessResult<()> {
    let missing: Vec<String> = files
        .iter()
        .filter(|p| !p.exists())
        .map(|p| p.display().to_string())
        .collect();

    if missing.is_empty() {
        Ok(())
    } else {
        Err(TestHarnessError::config(format!(
            "{} files do not exist: {}",
            what,
            missing.join(", ")
        )))
    }
}

/// Run one case described by `options`
///
/// Configuration problems are returned as `Err`; everything that goes wrong
/// while the case runs is reported through the outcome.
pub async fn run_single(
    options: CaseOptions,
    engine: &dyn QueryEngine,
    settings: &RunnerSettings,
) -> TestHarnessResult<(CaseOutcome, TestReport)> {
    let name = options.name().to_string();
    let mut ctx = options.into_context()?;

    let outcome = run_case(&mut ctx, engine, settings).await;

    let run_id = uuid::Uuid::new_v4().to_string();
    let mut generator = ReportGenerator::new(&name, &run_id);
    generator.add_case(&outcome, &name);

    Ok((outcome, generator.generate()))
}

/// Run every case below the repository `root`
pub async fn run_repo(
    root: &Path,
    engine: &dyn QueryEngine,
    settings: RunnerSettings,
) -> TestHarnessResult<(Vec<String>, TestReport)> {
    let runner = RepoRunner::new(root)?.with_settings(settings);
    let outcome = runner.run(engine).await?;
    Ok((outcome.errors, outcome.report))
}

/// Parse an output format flag
pub fn parse_output_format(value: &str) -> TestHarnessResult<OutputFormat> {
    value.parse().map_err(TestHarnessError::config)
}

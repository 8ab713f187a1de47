//! Repository discovery and aggregation
//!
//! A repository keeps its tests next to the queries they cover:
//!
//! ```text
//! <root>/
//!   reports/daily.hql                 query under test
//!   test/
//!     reports/daily.hql/              suite
//!       parameters.ini                optional
//!       dependencies.txt              optional component descriptors
//!       setup.hql                     optional
//!       by_country/                   module
//!         parameters.ini              optional
//!         setup.hql                   optional
//!         test_totals.hql             case
//!     out/                            generated, never scanned
//!       reports/daily.hql/by_country/
//!         logs/                       case output files
//!         table_data/test_totals/     table storage of one case
//! ```
//!
//! Every case runs in its own [`ExecutionContext`]. Case errors are turned
//! into messages and the run continues with the next case.

use super::context::ExecutionContext;
use super::engine::QueryEngine;
use super::error::{TestHarnessError, TestHarnessResult};
use super::report::{ReportGenerator, TestReport};
use super::runner::{run_case, CaseOutcome, RunnerSettings};
use super::utils::{absolutize, file_name, short_name, sub_directories, sub_files};
use std::path::{Path, PathBuf};

/// Directory below the root holding all suites
pub const TEST_DIR_NAME: &str = "test";

/// Directory below the test directory receiving generated output
pub const OUT_DIR_NAME: &str = "out";

pub const PARAMETERS_FILE: &str = "parameters.ini";

pub const SETUP_FILE: &str = "setup.hql";

/// Component descriptors of a suite
pub const DEPENDENCIES_FILE: &str = "dependencies.txt";

pub const CASE_PREFIX: &str = "test_";

pub const SCRIPT_SUFFIX: &str = ".hql";

const LOG_DIR_NAME: &str = "logs";
const TABLE_DATA_DIR_NAME: &str = "table_data";

/// Whether `path` names a case script (`test_*.hql`, any case)
pub fn is_case_file(path: &Path) -> bool {
    let name = file_name(path).to_lowercase();
    name.starts_with(CASE_PREFIX) && name.ends_with(SCRIPT_SUFFIX)
}

/// A discovered suite with its modules and cases
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SuitePlan {
    /// Suite directory below `test/`
    pub dir: PathBuf,

    /// Query under test, the suite's counterpart below the root; may be missing
    pub query_file: PathBuf,

    pub modules: Vec<ModulePlan>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModulePlan {
    pub dir: PathBuf,
    pub cases: Vec<PathBuf>,
}

impl SuitePlan {
    pub fn case_count(&self) -> usize {
        self.modules.iter().map(|m| m.cases.len()).sum()
    }
}

/// Error messages and report of a repository run
#[derive(Debug, Clone)]
pub struct RepoOutcome {
    /// Flat failure list; empty means success
    pub errors: Vec<String>,

    pub report: TestReport,
}

impl RepoOutcome {
    pub fn is_success(&self) -> bool {
        self.errors.is_empty()
    }
}

/// Discovers and runs every case of a repository
#[derive(Debug)]
pub struct RepoRunner {
    root: PathBuf,
    test_dir: PathBuf,
    out_dir: PathBuf,
    settings: RunnerSettings,
}

impl RepoRunner {
    /// Runner for the repository at `root`, which must be an existing directory
    pub fn new(root: impl AsRef<Path>) -> TestHarnessResult<Self> {
        let root = absolutize(root.as_ref())?;
        if !root.is_dir() {
            return Err(TestHarnessError::config(format!(
                "repository root is not a directory: {}",
                root.display()
            )));
        }

        let test_dir = root.join(TEST_DIR_NAME);
        let out_dir = test_dir.join(OUT_DIR_NAME);
        Ok(Self {
            root,
            test_dir,
            out_dir,
            settings: RunnerSettings::default(),
        })
    }

    pub fn with_settings(mut self, settings: RunnerSettings) -> Self {
        self.settings = settings;
        self
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn out_dir(&self) -> &Path {
        &self.out_dir
    }

    // ==================== Discovery ====================

    /// Find every suite with at least one case, in lexicographic order
    pub fn discover(&self) -> TestHarnessResult<Vec<SuitePlan>> {
        if !self.test_dir.is_dir() {
            return Err(TestHarnessError::config(format!(
                "test directory not found: {}",
                self.test_dir.display()
            )));
        }

        let mut suites = Vec::new();
        self.collect_suites(&self.test_dir, &mut suites)?;
        log::info!("found {} test suites", suites.len());
        Ok(suites)
    }

    fn collect_suites(&self, dir: &Path, suites: &mut Vec<SuitePlan>) -> TestHarnessResult<()> {
        for sub in sub_directories(dir)? {
            if sub == self.out_dir {
                continue;
            }

            if let Some(suite) = self.qualify_suite(&sub)? {
                suites.push(suite);
            }
            self.collect_suites(&sub, suites)?;
        }
        Ok(())
    }

    fn qualify_suite(&self, dir: &Path) -> TestHarnessResult<Option<SuitePlan>> {
        let Ok(relative) = dir.strip_prefix(&self.test_dir) else {
            return Ok(None);
        };
        if !file_name(dir).to_lowercase().ends_with(SCRIPT_SUFFIX) {
            return Ok(None);
        }
        if !contains_case(dir)? {
            log::trace!("rejecting suite without cases: {}", dir.display());
            return Ok(None);
        }

        let mut modules = Vec::new();
        for module_dir in sub_directories(dir)? {
            let cases = sub_files(&module_dir, is_case_file)?;
            if cases.is_empty() {
                log::trace!("module without cases: {}", module_dir.display());
                continue;
            }
            modules.push(ModulePlan {
                dir: module_dir,
                cases,
            });
        }

        let query_file = self.root.join(relative);
        if !query_file.is_file() {
            log::warn!(
                "query under test not found, running suite without it: {}",
                query_file.display()
            );
        }

        log::trace!("found potential test suite: {}", dir.display());
        Ok(Some(SuitePlan {
            dir: dir.to_path_buf(),
            query_file,
            modules,
        }))
    }

    // ==================== Contexts ====================

    /// Name of a case: its path relative to the root
    pub fn case_name(&self, case: &Path) -> String {
        case.strip_prefix(&self.root)
            .unwrap_or(case)
            .display()
            .to_string()
    }

    /// Build the isolated context of one case
    pub fn create_context(
        &self,
        suite: &SuitePlan,
        module: &Path,
        case: &Path,
    ) -> TestHarnessResult<ExecutionContext> {
        let module_relative = module.strip_prefix(&self.test_dir).unwrap_or(module);
        let data_dir = self.out_dir.join(module_relative);
        let short = short_name(case, SCRIPT_SUFFIX);

        let mut ctx = ExecutionContext::new(&self.root, &self.case_name(case), &short);
        ctx.set_out_dir(&self.out_dir);
        ctx.set_table_definitions_root(&self.root);
        ctx.set_engine_base_dir(&self.out_dir);
        ctx.set_log_dir(data_dir.join(LOG_DIR_NAME));
        ctx.set_data_dir(data_dir.join(TABLE_DATA_DIR_NAME).join(&short));
        if suite.query_file.is_file() {
            ctx.set_query_file(&suite.query_file)?;
        }
        ctx.set_test_query_file(case)?;

        for dir in [suite.dir.as_path(), module] {
            let params = dir.join(PARAMETERS_FILE);
            if optional(&params, "parameters") {
                ctx.add_parameter_file(&params)?;
            }
        }

        let dependencies = suite.dir.join(DEPENDENCIES_FILE);
        if optional(&dependencies, "dependencies") {
            ctx.add_components_file(&dependencies)?;
        }

        for dir in [suite.dir.as_path(), module] {
            let setup = dir.join(SETUP_FILE);
            if optional(&setup, "setup") {
                ctx.add_setup_file(&setup)?;
            }
        }

        Ok(ctx)
    }

    // ==================== Execution ====================

    /// Run every discovered case and aggregate the failures
    ///
    /// Only discovery problems are returned as `Err`; case errors end up in
    /// [`RepoOutcome::errors`].
    pub async fn run(&self, engine: &dyn QueryEngine) -> TestHarnessResult<RepoOutcome> {
        let suites = self.discover()?;
        let run_id = uuid::Uuid::new_v4().to_string();
        let mut generator = ReportGenerator::new(&self.root.display().to_string(), &run_id);
        let mut errors = Vec::new();

        for suite in &suites {
            log::info!("executing test suite={}", suite.dir.display());
            for module in &suite.modules {
                log::info!("executing test module={}", module.dir.display());
                let group = self.group_name(&module.dir);

                for case in &module.cases {
                    let outcome = self.run_one(engine, suite, &module.dir, case).await;
                    errors.extend(outcome.errors.iter().cloned());
                    generator.add_case(&outcome, &group);
                }
            }
        }

        let report = generator.generate();
        log::info!(
            "{} cases, {} passed, {} failed, {} invalid, {} errors",
            report.summary.total,
            report.summary.passed,
            report.summary.failed,
            report.summary.invalid,
            report.summary.errors
        );

        Ok(RepoOutcome { errors, report })
    }

    async fn run_one(
        &self,
        engine: &dyn QueryEngine,
        suite: &SuitePlan,
        module: &Path,
        case: &Path,
    ) -> CaseOutcome {
        match self.create_context(suite, module, case) {
            Ok(mut ctx) => run_case(&mut ctx, engine, &self.settings).await,
            Err(e) => CaseOutcome::errored(&self.case_name(case), &e),
        }
    }

    fn group_name(&self, module: &Path) -> String {
        module
            .strip_prefix(&self.test_dir)
            .unwrap_or(module)
            .display()
            .to_string()
    }
}

/// Whether an optional input file exists; absence is logged
fn optional(path: &Path, what: &str) -> bool {
    if path.is_file() {
        true
    } else {
        log::warn!("could not load {} file, ignoring: {}", what, path.display());
        false
    }
}

/// Recursive scan for any case file below `dir`
fn contains_case(dir: &Path) -> TestHarnessResult<bool> {
    if !sub_files(dir, is_case_file)?.is_empty() {
        return Ok(true);
    }
    for sub in sub_directories(dir)? {
        if contains_case(&sub)? {
            return Ok(true);
        }
    }
    Ok(false)
}

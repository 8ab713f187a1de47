//! Single test case execution
//!
//! A [`CaseRunner`] drives one [`ExecutionContext`] through its lifecycle:
//!
//! ```text
//! Created -> Initialized -> Provisioned -> SetupApplied -> Executed
//!         -> Validated -> Written -> Closed
//! ```
//!
//! Any failure up to `Validated` aborts the case. Writing the case output is
//! best effort. Closing the engine session happens on every exit path.

use super::components::{ComponentProvisioner, ComponentRegistry, ProvisionTarget};
use super::context::ExecutionContext;
use super::engine::{execute_script, QueryEngine, Session};
use super::error::{TestHarnessError, TestHarnessResult};
use super::types::RowSet;
use super::utils::{append_to_file, ensure_directories};
use super::validator::{validate, Verdict};
use std::time::{Duration, Instant};

/// Prefix of the per-case output file written to the log directory
pub const OUTPUT_FILE_PREFIX: &str = "hqlunit_out__";

/// Lifecycle state of a case
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CaseState {
    Created,
    Initialized,
    Provisioned,
    SetupApplied,
    Executed,
    Validated,
    Written,
    Closed,
}

/// Settings shared by every case of a run
#[derive(Debug, Clone, Default)]
pub struct RunnerSettings {
    /// Deadline per executed statement
    pub statement_timeout: Option<Duration>,

    /// Extension component types
    pub registry: ComponentRegistry,
}

impl RunnerSettings {
    pub fn with_statement_timeout(mut self, timeout: Duration) -> Self {
        self.statement_timeout = Some(timeout);
        self
    }

    pub fn with_registry(mut self, registry: ComponentRegistry) -> Self {
        self.registry = registry;
        self
    }
}

/// Rows captured by a finished case plus non-fatal problems
#[derive(Debug, Clone, Default)]
pub struct CaseRun {
    /// Validation rows, empty without a validation query
    pub rows: RowSet,

    /// Output-writing and resource-release problems
    pub warnings: Vec<String>,

    /// Wall-clock duration of the whole lifecycle
    pub duration_ms: u64,
}

/// Drives one case through its lifecycle
pub struct CaseRunner<'a> {
    ctx: &'a mut ExecutionContext,
    engine: &'a dyn QueryEngine,
    provisioner: ComponentProvisioner,
    statement_timeout: Option<Duration>,
    session: Option<Box<dyn Session>>,
    state: CaseState,
}

impl<'a> CaseRunner<'a> {
    pub fn new(
        ctx: &'a mut ExecutionContext,
        engine: &'a dyn QueryEngine,
        settings: &RunnerSettings,
    ) -> Self {
        Self {
            ctx,
            engine,
            provisioner: ComponentProvisioner::new(settings.registry.clone()),
            statement_timeout: settings.statement_timeout,
            session: None,
            state: CaseState::Created,
        }
    }

    pub fn state(&self) -> CaseState {
        self.state
    }

    /// Run the full lifecycle and return the captured validation rows
    pub async fn run(&mut self) -> TestHarnessResult<CaseRun> {
        let start = Instant::now();
        let mut warnings = Vec::new();

        let outcome = self.drive().await;

        if outcome.is_ok() {
            log::info!("writing results");
            if let Err(e) = self.write() {
                log::warn!("failed to write output of {}: {}", self.ctx.name(), e);
                warnings.push(format!("output not written: {}", e));
            }
            self.state = CaseState::Written;
        }

        let released = self.close().await;
        match (outcome, released) {
            (Ok(rows), Ok(())) => Ok(CaseRun {
                rows,
                warnings,
                duration_ms: start.elapsed().as_millis() as u64,
            }),
            (Ok(rows), Err(e)) => {
                log::warn!("failed to release resources of {}: {}", self.ctx.name(), e);
                warnings.push(format!("resource release failed: {}", e));
                Ok(CaseRun {
                    rows,
                    warnings,
                    duration_ms: start.elapsed().as_millis() as u64,
                })
            }
            (Err(e), Ok(())) => Err(e),
            (Err(e), Err(release)) => Err(e.merge(release)),
        }
    }

    async fn drive(&mut self) -> TestHarnessResult<RowSet> {
        log::info!("init {}", self.ctx);
        self.init().await?;
        self.state = CaseState::Initialized;

        log::info!("creating components");
        self.create_components().await?;
        self.state = CaseState::Provisioned;

        log::info!("setup");
        self.setup().await?;
        self.state = CaseState::SetupApplied;

        log::info!("execute");
        self.execute().await?;
        self.state = CaseState::Executed;

        log::info!("generating results");
        let rows = self.test().await?;
        self.state = CaseState::Validated;

        Ok(rows)
    }

    async fn init(&mut self) -> TestHarnessResult<()> {
        self.ctx.validate_paths()?;

        ensure_directories(self.ctx.out_dir())?;
        ensure_directories(self.ctx.data_dir())?;
        ensure_directories(&self.ctx.warehouse_dir())?;
        ensure_directories(&self.ctx.scratch_dir())?;

        let config = self.ctx.session_config();
        log::debug!(
            "opening {} session namespace={} variables={:?}",
            self.engine.name(),
            config.namespace,
            config.variables
        );
        self.session = Some(self.engine.open_session(&config).await?);
        Ok(())
    }

    async fn create_components(&mut self) -> TestHarnessResult<()> {
        let target = ProvisionTarget {
            data_dir: self.ctx.data_dir().to_path_buf(),
            table_definitions_root: self
                .ctx
                .table_definitions_root()
                .ok()
                .map(|p| p.to_path_buf()),
            statement_timeout: self.statement_timeout,
        };

        let session = open_session(&mut self.session)?;
        self.provisioner
            .provision(session, &target, self.ctx.components())
            .await
    }

    async fn setup(&mut self) -> TestHarnessResult<()> {
        let session = open_session(&mut self.session)?;
        for script in self.ctx.setup_scripts() {
            let rows = execute_script(session, &script, None, self.statement_timeout).await?;
            log::debug!("setup result: {} rows", rows.len());
        }
        Ok(())
    }

    async fn execute(&mut self) -> TestHarnessResult<()> {
        let Some(query) = self.ctx.query().map(str::to_string) else {
            log::debug!("no query under test for {}", self.ctx.name());
            return Ok(());
        };

        let session = open_session(&mut self.session)?;
        let rows = execute_script(session, &query, None, self.statement_timeout).await?;
        log::debug!("execute result: {} rows", rows.len());
        Ok(())
    }

    async fn test(&mut self) -> TestHarnessResult<RowSet> {
        let Some(test_query) = self.ctx.test_query().map(str::to_string) else {
            self.ctx.set_test_result(&[]);
            return Ok(RowSet::new());
        };

        let session = open_session(&mut self.session)?;
        let rows = execute_script(session, &test_query, None, self.statement_timeout).await?;
        log::debug!("test query result: {} rows", rows.len());

        self.ctx.set_test_result(&rows);
        Ok(rows)
    }

    fn write(&mut self) -> TestHarnessResult<()> {
        let Some(log_dir) = self.ctx.log_dir().map(|p| p.to_path_buf()) else {
            log::info!("not persisting any output as log dir is not set");
            return Ok(());
        };

        let block = render_output_block(self.ctx);
        self.ctx.transcript_mut().push_str(&block);

        let target = format!("{}{}.txt", OUTPUT_FILE_PREFIX, self.ctx.short_name());
        let written = append_to_file(&log_dir, &target, self.ctx.transcript())?;
        log::trace!("wrote test output to {}", written.display());
        Ok(())
    }

    async fn close(&mut self) -> TestHarnessResult<()> {
        let result = match self.session.take() {
            Some(mut session) => {
                log::info!("closing session of {}", self.ctx.name());
                session.close().await
            }
            None => Ok(()),
        };
        self.state = CaseState::Closed;
        result
    }
}

fn open_session(session: &mut Option<Box<dyn Session>>) -> TestHarnessResult<&mut dyn Session> {
    match session.as_deref_mut() {
        Some(s) => Ok(s),
        None => Err(TestHarnessError::SessionError {
            message: "session is not open".to_string(),
        }),
    }
}

/// The banner-delimited block appended to a case's output file
pub fn render_output_block(ctx: &ExecutionContext) -> String {
    let name = ctx.name();
    let mut out = String::new();

    out.push_str(&format!("\n================> TEST [{}] ==================>\n", name));
    out.push_str(ctx.test_query().unwrap_or("NONE"));
    out.push_str("\n\n");
    out.push_str(&format!("\n================> RESULT [{}] ================>\n", name));
    for row in ctx.test_result() {
        out.push_str(&row.to_string());
        out.push('\n');
    }
    out.push_str("\n\n");
    out.push_str(&format!("================> END [{}] ===================>\n", name));

    out
}

/// Result of running one case on its own, outside a repository
#[derive(Debug, Clone)]
pub struct CaseOutcome {
    /// Case name
    pub name: String,

    /// Failure messages; empty means success
    pub errors: Vec<String>,

    /// Classification, absent when the case errored before validation
    pub verdict: Option<Verdict>,

    /// Captured validation rows
    pub rows: RowSet,

    /// Non-fatal problems
    pub warnings: Vec<String>,

    /// Persisted output text of the case
    pub transcript: String,

    pub duration_ms: u64,
}

impl CaseOutcome {
    /// Outcome of a case aborted by `error`; the message is `"<name>: <error>"`
    pub fn errored(name: &str, error: &TestHarnessError) -> Self {
        log::error!("case {} failed: {}", name, error);
        Self {
            name: name.to_string(),
            errors: vec![format!("{}: {}", name, error)],
            verdict: None,
            rows: RowSet::new(),
            warnings: Vec::new(),
            transcript: String::new(),
            duration_ms: 0,
        }
    }

    pub fn is_success(&self) -> bool {
        self.errors.is_empty()
    }
}

/// Run and validate a single case, turning case errors into messages
pub async fn run_case(
    ctx: &mut ExecutionContext,
    engine: &dyn QueryEngine,
    settings: &RunnerSettings,
) -> CaseOutcome {
    let result = CaseRunner::new(ctx, engine, settings).run().await;

    let name = ctx.name().to_string();
    match result {
        Ok(run) => {
            let verdict = validate(&name, &run.rows);
            CaseOutcome {
                errors: verdict.errors(),
                verdict: Some(verdict),
                rows: run.rows,
                warnings: run.warnings,
                transcript: ctx.transcript().to_string(),
                duration_ms: run.duration_ms,
                name,
            }
        }
        Err(e) => {
            let mut outcome = CaseOutcome::errored(&name, &e);
            outcome.transcript = ctx.transcript().to_string();
            outcome
        }
    }
}

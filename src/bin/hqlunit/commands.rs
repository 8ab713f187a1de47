//! Command handlers for the hqlunit CLI
//!
//! Each handler returns the process exit code:
//! - 0 when no case failed
//! - 1 when at least one case failed or errored
//! - 2 on configuration errors, before any case ran

use hqlunit::test_harness::cli::{parse_output_format, run_repo, run_single, CaseOptions};
use hqlunit::test_harness::report::{write_report, TestReport};
use hqlunit::test_harness::{
    CommandEngine, EngineConfig, RunnerSettings, TestHarnessError, TestHarnessResult,
};
use std::path::PathBuf;

pub const EXIT_OK: i32 = 0;
pub const EXIT_FAILURES: i32 = 1;
pub const EXIT_CONFIG: i32 = 2;

/// Flags shared by every subcommand
pub struct SharedOptions {
    pub engine_config: Option<PathBuf>,
    pub engine_command: Option<String>,
    pub output: String,
    pub report_file: Option<PathBuf>,
}

impl SharedOptions {
    fn engine(&self) -> TestHarnessResult<(CommandEngine, RunnerSettings)> {
        parse_output_format(&self.output)?;

        let config = match (&self.engine_config, &self.engine_command) {
            (Some(path), _) => EngineConfig::from_file(path)?,
            (None, Some(command)) => EngineConfig::from_command_line(command)?,
            (None, None) => {
                return Err(TestHarnessError::config(
                    "one of --engine-config or --engine-command is required",
                ))
            }
        };

        let mut settings = RunnerSettings::default();
        if let Some(timeout) = config.statement_timeout() {
            settings = settings.with_statement_timeout(timeout);
        }
        Ok((CommandEngine::new(config)?, settings))
    }

    fn emit(&self, report: &TestReport) -> TestHarnessResult<()> {
        let format = parse_output_format(&self.output)?;
        match &self.report_file {
            Some(path) => {
                let mut file =
                    std::fs::File::create(path).map_err(|e| TestHarnessError::io(e, path))?;
                write_report(report, format, &mut file).map_err(|e| TestHarnessError::io(e, path))?;
                log::info!("report written to {}", path.display());
            }
            None => {
                let stdout = std::io::stdout();
                let mut handle = stdout.lock();
                write_report(report, format, &mut handle)?;
            }
        }
        Ok(())
    }
}

/// Run every case of the repository at `root`
pub async fn repo(root: PathBuf, shared: SharedOptions) -> i32 {
    let (engine, settings) = match shared.engine() {
        Ok(engine) => engine,
        Err(e) => return fail(e),
    };

    match run_repo(&root, &engine, settings).await {
        Ok((errors, report)) => finish(&shared, &errors, &report),
        Err(e) => fail(e),
    }
}

/// Run one case described by command-line flags
pub async fn run(options: CaseOptions, shared: SharedOptions) -> i32 {
    let (engine, settings) = match shared.engine() {
        Ok(engine) => engine,
        Err(e) => return fail(e),
    };

    match run_single(options, &engine, &settings).await {
        Ok((outcome, report)) => finish(&shared, &outcome.errors, &report),
        Err(e) => fail(e),
    }
}

fn finish(shared: &SharedOptions, errors: &[String], report: &TestReport) -> i32 {
    if let Err(e) = shared.emit(report) {
        log::error!("hqlunit_error: could not write report: {}", e);
    }

    if errors.is_empty() {
        log::info!("all ok");
        EXIT_OK
    } else {
        log::error!("errors: {:?}", errors);
        EXIT_FAILURES
    }
}

fn fail(error: TestHarnessError) -> i32 {
    log::error!("hqlunit_error: {}", error);
    if error.is_fatal() {
        EXIT_CONFIG
    } else {
        EXIT_FAILURES
    }
}

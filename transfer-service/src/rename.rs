//! Database rename.
//!
//! PostgreSQL renames with a single statement. The MySQL family has no
//! rename primitive, so the rename is driven as a four-step copy:
//!
//! ```text
//! NotStarted -> TargetCreated -> Dumped -> Imported -> SourceDropped
//! ```
//!
//! A failing step halts forward progress. Nothing is rolled back: whatever
//! the completed steps created stays on the server and the failure reports
//! the state that was reached.

use std::fmt;

use thiserror::Error;

use common::errors::AppError;

use crate::runner::{CommandRunner, CommandSpec, ProcessOutput};

/// Commands that carry out one rename.
#[derive(Debug, Clone)]
pub enum RenamePlan {
    /// One statement renames in place.
    Atomic(CommandSpec),
    /// Create target, dump source, load dump into target, drop source.
    CopyAndDrop {
        create: CommandSpec,
        /// Stdout is captured and becomes the import's stdin.
        dump: CommandSpec,
        import: CommandSpec,
        drop: CommandSpec,
    },
}

/// Furthest point a rename got to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum RenameState {
    NotStarted,
    TargetCreated,
    Dumped,
    Imported,
    SourceDropped,
}

impl fmt::Display for RenameState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            RenameState::NotStarted => "not_started",
            RenameState::TargetCreated => "target_created",
            RenameState::Dumped => "dumped",
            RenameState::Imported => "imported",
            RenameState::SourceDropped => "source_dropped",
        };
        f.write_str(name)
    }
}

/// Step of the copy-and-drop sequence.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RenameStep {
    CreateTarget,
    DumpSource,
    ImportTarget,
    DropSource,
}

impl RenameStep {
    /// State the rename is in once this step has succeeded.
    fn completes(self) -> RenameState {
        match self {
            RenameStep::CreateTarget => RenameState::TargetCreated,
            RenameStep::DumpSource => RenameState::Dumped,
            RenameStep::ImportTarget => RenameState::Imported,
            RenameStep::DropSource => RenameState::SourceDropped,
        }
    }
}

impl fmt::Display for RenameStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let message = match self {
            RenameStep::CreateTarget => "failed to create target database",
            RenameStep::DumpSource => "failed to export source database",
            RenameStep::ImportTarget => "failed to import to target database",
            RenameStep::DropSource => {
                "failed to drop source database (rename partially completed)"
            }
        };
        f.write_str(message)
    }
}

/// A copy-and-drop rename stopped at `step`.
#[derive(Debug, Error)]
#[error("{step}: {source}")]
pub struct RenameFailure {
    pub step: RenameStep,
    /// Last state successfully reached.
    pub reached: RenameState,
    #[source]
    pub source: AppError,
}

impl From<RenameFailure> for AppError {
    fn from(failure: RenameFailure) -> Self {
        AppError::Rename {
            step: failure.step.to_string(),
            reached: failure.reached.to_string(),
            source: Box::new(failure.source),
        }
    }
}

/// Outcome of executing a plan.
#[derive(Debug)]
pub enum RenameOutcome {
    Done,
    /// The single statement failed; nothing changed.
    AtomicFailed(AppError),
    Partial(RenameFailure),
}

impl RenameOutcome {
    /// Furthest state reached.
    pub fn state(&self) -> RenameState {
        match self {
            RenameOutcome::Done => RenameState::SourceDropped,
            RenameOutcome::AtomicFailed(_) => RenameState::NotStarted,
            RenameOutcome::Partial(failure) => failure.reached,
        }
    }

    pub fn into_result(self) -> Result<(), AppError> {
        match self {
            RenameOutcome::Done => Ok(()),
            RenameOutcome::AtomicFailed(err) => Err(err),
            RenameOutcome::Partial(failure) => Err(failure.into()),
        }
    }
}

/// Runs `plan` to completion or to the first failing step.
pub async fn execute(runner: &dyn CommandRunner, plan: RenamePlan) -> RenameOutcome {
    match plan {
        RenamePlan::Atomic(spec) => match runner.run(spec).await {
            Ok(_) => RenameOutcome::Done,
            Err(err) => RenameOutcome::AtomicFailed(err),
        },
        RenamePlan::CopyAndDrop {
            create,
            dump,
            import,
            drop,
        } => match copy_and_drop(runner, create, dump, import, drop).await {
            Ok(()) => RenameOutcome::Done,
            Err(failure) => RenameOutcome::Partial(failure),
        },
    }
}

async fn copy_and_drop(
    runner: &dyn CommandRunner,
    create: CommandSpec,
    dump: CommandSpec,
    import: CommandSpec,
    drop: CommandSpec,
) -> Result<(), RenameFailure> {
    let mut state = RenameState::NotStarted;

    step(runner, RenameStep::CreateTarget, create, &mut state).await?;
    let dumped = step(runner, RenameStep::DumpSource, dump, &mut state).await?;
    step(
        runner,
        RenameStep::ImportTarget,
        import.stdin_bytes(dumped.stdout),
        &mut state,
    )
    .await?;
    step(runner, RenameStep::DropSource, drop, &mut state).await?;

    Ok(())
}

async fn step(
    runner: &dyn CommandRunner,
    which: RenameStep,
    spec: CommandSpec,
    state: &mut RenameState,
) -> Result<ProcessOutput, RenameFailure> {
    match runner.run(spec).await {
        Ok(output) => {
            *state = which.completes();
            tracing::debug!(state = %state, "rename step completed");
            Ok(output)
        }
        Err(source) => {
            tracing::warn!(step = ?which, reached = %state, error = %source, "rename stopped");
            Err(RenameFailure {
                step: which,
                reached: *state,
                source,
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runner::StdinSource;
    use async_trait::async_trait;
    use common::errors::AppResult;
    use std::sync::Mutex;

    /// Records every command; the one whose last argument is `fail` exits 1.
    struct Scripted {
        fail: Option<&'static str>,
        dump: &'static [u8],
        seen: Mutex<Vec<CommandSpec>>,
    }

    impl Scripted {
        fn new(fail: Option<&'static str>) -> Self {
            Self {
                fail,
                dump: b"CREATE TABLE t (id int);",
                seen: Mutex::new(Vec::new()),
            }
        }

        fn seen(&self) -> Vec<CommandSpec> {
            self.seen.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl CommandRunner for Scripted {
        async fn run(&self, spec: CommandSpec) -> AppResult<ProcessOutput> {
            self.seen.lock().unwrap().push(spec.clone());
            let tag = spec.args.last().cloned().unwrap_or_default();
            if self.fail.is_some_and(|f| tag == f) {
                return Err(AppError::ProcessExit {
                    program: spec.program,
                    status: "exit status: 1".into(),
                    stderr: "ERROR 1044 (42000): Access denied".into(),
                });
            }
            let stdout = if tag == "dump" { self.dump.to_vec() } else { Vec::new() };
            Ok(ProcessOutput {
                stdout,
                stderr: String::new(),
            })
        }
    }

    fn plan() -> RenamePlan {
        RenamePlan::CopyAndDrop {
            create: CommandSpec::new("mysql").arg("create"),
            dump: CommandSpec::new("mysqldump").arg("dump"),
            import: CommandSpec::new("mysql").arg("import"),
            drop: CommandSpec::new("mysql").arg("drop"),
        }
    }

    #[tokio::test]
    async fn test_all_steps_succeed() {
        let runner = Scripted::new(None);
        let outcome = execute(&runner, plan()).await;
        assert_eq!(outcome.state(), RenameState::SourceDropped);
        assert!(outcome.into_result().is_ok());

        let seen = runner.seen();
        let order: Vec<_> = seen.iter().map(|s| s.args[0].as_str()).collect();
        assert_eq!(order, ["create", "dump", "import", "drop"]);
        assert_eq!(
            seen[2].stdin,
            StdinSource::Bytes(b"CREATE TABLE t (id int);".to_vec())
        );
    }

    #[tokio::test]
    async fn test_create_failure_runs_nothing_else() {
        let runner = Scripted::new(Some("create"));
        let outcome = execute(&runner, plan()).await;
        assert_eq!(outcome.state(), RenameState::NotStarted);
        assert_eq!(runner.seen().len(), 1);
        match outcome {
            RenameOutcome::Partial(f) => assert_eq!(f.step, RenameStep::CreateTarget),
            other => panic!("unexpected outcome: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_dump_failure_leaves_target_and_never_drops() {
        let runner = Scripted::new(Some("dump"));
        let outcome = execute(&runner, plan()).await;
        assert_eq!(outcome.state(), RenameState::TargetCreated);

        let programs: Vec<_> = runner.seen().iter().map(|s| s.args[0].clone()).collect();
        assert_eq!(programs, ["create", "dump"]);

        let err = outcome.into_result().unwrap_err();
        let message = err.to_string();
        assert!(message.starts_with("failed to export source database"));
        assert!(message.contains("target_created"));
        assert_eq!(err.stderr(), Some("ERROR 1044 (42000): Access denied"));
    }

    #[tokio::test]
    async fn test_import_failure_reports_dumped() {
        let runner = Scripted::new(Some("import"));
        let outcome = execute(&runner, plan()).await;
        assert_eq!(outcome.state(), RenameState::Dumped);
    }

    #[tokio::test]
    async fn test_drop_failure_is_partial_completion() {
        let runner = Scripted::new(Some("drop"));
        let outcome = execute(&runner, plan()).await;
        assert_eq!(outcome.state(), RenameState::Imported);
        let message = outcome.into_result().unwrap_err().to_string();
        assert!(message.contains("rename partially completed"));
    }

    #[tokio::test]
    async fn test_atomic_plan() {
        let atomic = || RenamePlan::Atomic(CommandSpec::new("psql").arg("alter"));
        let runner = Scripted::new(Some("alter"));
        let outcome = execute(&runner, atomic()).await;
        assert_eq!(outcome.state(), RenameState::NotStarted);
        assert!(matches!(
            outcome.into_result(),
            Err(AppError::ProcessExit { .. })
        ));

        let runner = Scripted::new(None);
        let outcome = execute(&runner, atomic()).await;
        assert_eq!(outcome.state(), RenameState::SourceDropped);
    }
}

//! External command execution.
//!
//! A [`CommandSpec`] describes one invocation of a client tool: program,
//! ordered arguments, extra environment, where stdin comes from and where
//! stdout goes. [`ProcessRunner`] executes it with `tokio::process`.

use std::path::{Path, PathBuf};
use std::process::Stdio;

use async_trait::async_trait;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;

use common::errors::{AppError, AppResult};

/// Source of the child's standard input.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StdinSource {
    Null,
    /// Stream a file from disk.
    File(PathBuf),
    /// Write an in-memory buffer.
    Bytes(Vec<u8>),
}

/// Destination of the child's standard output.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StdoutTarget {
    /// Collect into [`ProcessOutput::stdout`].
    Capture,
    /// Write to a newly created file, removed again if the command fails.
    File(PathBuf),
}

/// One external command invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandSpec {
    pub program: String,
    pub args: Vec<String>,
    /// Added on top of the inherited environment.
    pub envs: Vec<(String, String)>,
    pub stdin: StdinSource,
    pub stdout: StdoutTarget,
    /// Indices into `args` that must never be logged.
    secret_args: Vec<usize>,
}

impl CommandSpec {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            envs: Vec::new(),
            stdin: StdinSource::Null,
            stdout: StdoutTarget::Capture,
            secret_args: Vec::new(),
        }
    }

    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    /// Appends an argument that is masked in [`CommandSpec::display`].
    pub fn secret_arg(mut self, arg: impl Into<String>) -> Self {
        self.secret_args.push(self.args.len());
        self.args.push(arg.into());
        self
    }

    pub fn env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.envs.push((key.into(), value.into()));
        self
    }

    pub fn stdin_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.stdin = StdinSource::File(path.into());
        self
    }

    pub fn stdin_bytes(mut self, bytes: Vec<u8>) -> Self {
        self.stdin = StdinSource::Bytes(bytes);
        self
    }

    pub fn stdout_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.stdout = StdoutTarget::File(path.into());
        self
    }

    /// Shell-like rendering for logs. Secret arguments and environment
    /// values are masked.
    pub fn display(&self) -> String {
        let mut parts: Vec<String> = self
            .envs
            .iter()
            .map(|(key, _)| format!("{}=****", key))
            .collect();
        parts.push(self.program.clone());
        for (i, arg) in self.args.iter().enumerate() {
            if self.secret_args.contains(&i) {
                parts.push("****".to_string());
            } else if arg.is_empty() || arg.contains(char::is_whitespace) {
                parts.push(format!("\"{}\"", arg));
            } else {
                parts.push(arg.clone());
            }
        }
        parts.join(" ")
    }
}

/// Output of a successful command.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProcessOutput {
    /// Empty when stdout went to a file.
    pub stdout: Vec<u8>,
    pub stderr: String,
}

impl ProcessOutput {
    pub fn stdout_text(&self) -> String {
        String::from_utf8_lossy(&self.stdout).into_owned()
    }
}

/// Executes command specs.
///
/// Implementations return `Ok` only when the command ran and exited with
/// status zero.
#[async_trait]
pub trait CommandRunner: Send + Sync {
    async fn run(&self, spec: CommandSpec) -> AppResult<ProcessOutput>;
}

/// Runs commands as child processes.
#[derive(Debug, Clone, Copy, Default)]
pub struct ProcessRunner;

#[async_trait]
impl CommandRunner for ProcessRunner {
    async fn run(&self, spec: CommandSpec) -> AppResult<ProcessOutput> {
        let output_file = match &spec.stdout {
            StdoutTarget::File(path) => Some(path.clone()),
            StdoutTarget::Capture => None,
        };

        let result = execute(&spec).await;

        if let (Err(_), Some(path)) = (&result, &output_file) {
            remove_partial_output(path).await;
        }
        result
    }
}

async fn execute(spec: &CommandSpec) -> AppResult<ProcessOutput> {
    let mut command = Command::new(&spec.program);
    command
        .args(&spec.args)
        .envs(spec.envs.iter().map(|(k, v)| (k.as_str(), v.as_str())))
        .stderr(Stdio::piped());

    let mut input = None;
    match &spec.stdin {
        StdinSource::Null => {
            command.stdin(Stdio::null());
        }
        StdinSource::File(path) => {
            let file = tokio::fs::File::open(path).await.map_err(|e| {
                AppError::file_io(format!("Failed to open import file {}", path.display()), e)
            })?;
            command.stdin(Stdio::from(file.into_std().await));
        }
        StdinSource::Bytes(bytes) => {
            command.stdin(Stdio::piped());
            input = Some(bytes.clone());
        }
    }

    match &spec.stdout {
        StdoutTarget::Capture => {
            command.stdout(Stdio::piped());
        }
        StdoutTarget::File(path) => {
            let file = tokio::fs::File::create(path).await.map_err(|e| {
                AppError::file_io(format!("Failed to create export file {}", path.display()), e)
            })?;
            command.stdout(Stdio::from(file.into_std().await));
        }
    }

    tracing::info!(command = %spec.display(), "running external command");

    let mut child = command.spawn().map_err(|source| AppError::ProcessSpawn {
        program: spec.program.clone(),
        source,
    })?;

    let writer = match (child.stdin.take(), input) {
        (Some(mut stdin), Some(bytes)) => Some(tokio::spawn(async move {
            stdin.write_all(&bytes).await?;
            stdin.shutdown().await
        })),
        _ => None,
    };

    let output = child
        .wait_with_output()
        .await
        .map_err(|source| AppError::ProcessSpawn {
            program: spec.program.clone(),
            source,
        })?;

    let stderr = String::from_utf8_lossy(&output.stderr).into_owned();

    if !output.status.success() {
        tracing::warn!(
            program = %spec.program,
            status = %output.status,
            stderr = %stderr.trim_end(),
            "external command failed"
        );
        return Err(AppError::ProcessExit {
            program: spec.program.clone(),
            status: output.status.to_string(),
            stderr,
        });
    }

    if let Some(writer) = writer {
        match writer.await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => {
                return Err(AppError::file_io(
                    format!("Failed to stream input to {}", spec.program),
                    e,
                ))
            }
            Err(e) => {
                return Err(AppError::file_io(
                    format!("Failed to stream input to {}", spec.program),
                    std::io::Error::other(e),
                ))
            }
        }
    }

    Ok(ProcessOutput {
        stdout: output.stdout,
        stderr,
    })
}

async fn remove_partial_output(path: &Path) {
    match tokio::fs::remove_file(path).await {
        Ok(()) => tracing::info!(path = %path.display(), "removed partial output"),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
        Err(e) => {
            tracing::warn!(path = %path.display(), error = %e, "failed to remove partial output")
        }
    }
}

/// Looks `program` up on `PATH`.
pub fn find_on_path(program: &str) -> Option<PathBuf> {
    let path = std::env::var_os("PATH")?;
    std::env::split_paths(&path)
        .map(|dir| dir.join(program))
        .find(|candidate| candidate.is_file())
}

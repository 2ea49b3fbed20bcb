//! Shared fixtures for router tests.

#![allow(dead_code)]

use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use axum::{
    body::Body,
    http::{header, Request, Response},
    Router,
};
use http_body_util::BodyExt;
use tempfile::TempDir;
use tower::ServiceExt;

use common::config::AppConfig;
use common::errors::{AppError, AppResult};
use transfer_service::runner::{CommandRunner, CommandSpec, ProcessOutput, ProcessRunner};
use transfer_service::{create_router, state::AppState, SERVICE_NAME};

/// Scratch directories plus a router wired to them.
pub struct TestApp {
    pub dir: TempDir,
    pub config: AppConfig,
    pub router: Router,
}

impl TestApp {
    pub fn new(runner: Arc<dyn CommandRunner>) -> Self {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path().to_path_buf();
        let config = AppConfig::from_lookup(SERVICE_NAME, |key| {
            let value = match key {
                "EXPORT_DIR" => root.join("exports"),
                "UPLOAD_DIR" => root.join("uploads"),
                "TEMPLATE_DIR" => root.join("templates"),
                "STATIC_DIR" => root.join("static"),
                _ => return None,
            };
            Some(value.to_string_lossy().into_owned())
        });
        config.ensure_directories().unwrap();
        let router = create_router(AppState::with_runner(config.clone(), runner));
        Self {
            dir,
            config,
            router,
        }
    }

    pub async fn send(&self, request: Request<Body>) -> Response<Body> {
        self.router.clone().oneshot(request).await.unwrap()
    }

    pub fn export_files(&self) -> Vec<String> {
        list_dir(&self.config.export_dir)
    }

    pub fn upload_files(&self) -> Vec<String> {
        list_dir(&self.config.upload_dir)
    }
}

fn list_dir(dir: &Path) -> Vec<String> {
    let mut names: Vec<String> = std::fs::read_dir(dir)
        .unwrap()
        .map(|entry| entry.unwrap().file_name().to_string_lossy().into_owned())
        .collect();
    names.sort();
    names
}

pub async fn body_text(response: Response<Body>) -> String {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    String::from_utf8(bytes.to_vec()).unwrap()
}

pub async fn body_json(response: Response<Body>) -> serde_json::Value {
    serde_json::from_str(&body_text(response).await).unwrap()
}

/// `application/x-www-form-urlencoded` POST asking for JSON.
pub fn form_post(uri: &str, body: &str) -> Request<Body> {
    Request::post(uri)
        .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded")
        .header(header::ACCEPT, "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

pub const BOUNDARY: &str = "----transfer-test-boundary";

/// Multipart POST with text fields and an optional `sqlFile`.
pub fn multipart_post(
    uri: &str,
    fields: &[(&str, &str)],
    file: Option<(&str, &str)>,
) -> Request<Body> {
    let mut body = String::new();
    for (name, value) in fields {
        body.push_str(&format!(
            "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"{name}\"\r\n\r\n{value}\r\n"
        ));
    }
    if let Some((file_name, content)) = file {
        body.push_str(&format!(
            "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"sqlFile\"; filename=\"{file_name}\"\r\n\
             Content-Type: application/sql\r\n\r\n{content}\r\n"
        ));
    }
    body.push_str(&format!("--{BOUNDARY}--\r\n"));

    Request::post(uri)
        .header(
            header::CONTENT_TYPE,
            format!("multipart/form-data; boundary={BOUNDARY}"),
        )
        .header(header::ACCEPT, "application/json")
        .body(Body::from(body))
        .unwrap()
}

/// Answers commands from memory and records them.
///
/// Listing commands get `list_stdout`; a command whose program is in
/// `failing` exits 1 with `stderr`.
#[derive(Default)]
pub struct FakeRunner {
    pub list_stdout: String,
    pub failing: Vec<&'static str>,
    pub stderr: String,
    pub seen: Mutex<Vec<CommandSpec>>,
}

impl FakeRunner {
    pub fn seen(&self) -> Vec<CommandSpec> {
        self.seen.lock().unwrap().clone()
    }
}

#[async_trait]
impl CommandRunner for FakeRunner {
    async fn run(&self, spec: CommandSpec) -> AppResult<ProcessOutput> {
        self.seen.lock().unwrap().push(spec.clone());
        if self.failing.iter().any(|p| *p == spec.program) {
            return Err(AppError::ProcessExit {
                program: spec.program,
                status: "exit status: 1".into(),
                stderr: self.stderr.clone(),
            });
        }
        let is_listing = spec
            .args
            .iter()
            .any(|a| a == "SHOW DATABASES;" || a.starts_with("SELECT datname"));
        let stdout = if is_listing {
            self.list_stdout.clone().into_bytes()
        } else {
            Vec::new()
        };
        Ok(ProcessOutput {
            stdout,
            stderr: String::new(),
        })
    }
}

/// Runs `<bin>/<program>` shell scripts in place of the real client tools,
/// through the real process runner.
pub struct ScriptRunner {
    bin: TempDir,
}

impl ScriptRunner {
    pub fn new() -> Self {
        Self {
            bin: tempfile::tempdir().unwrap(),
        }
    }

    /// Installs a stand-in for `program`; the script sees the tool's
    /// arguments as `$@`.
    pub fn tool(self, program: &str, script: &str) -> Self {
        std::fs::write(self.bin.path().join(program), script).unwrap();
        self
    }

    fn script(&self, program: &str) -> PathBuf {
        self.bin.path().join(program)
    }
}

#[async_trait]
impl CommandRunner for ScriptRunner {
    async fn run(&self, spec: CommandSpec) -> AppResult<ProcessOutput> {
        let script = self.script(&spec.program);
        let mut wrapped = CommandSpec::new("sh")
            .arg(script.to_string_lossy())
            .args(spec.args.clone());
        wrapped.envs = spec.envs;
        wrapped.stdin = spec.stdin;
        wrapped.stdout = spec.stdout;

        ProcessRunner.run(wrapped).await.map_err(|err| match err {
            AppError::ProcessExit { status, stderr, .. } => AppError::ProcessExit {
                program: spec.program,
                status,
                stderr,
            },
            other => other,
        })
    }
}

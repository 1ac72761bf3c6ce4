//! Test doubles for the archive host and the container runtime.

#![allow(dead_code)]

use std::io::{Cursor, Write};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use axum::body::Body;
use axum::http::{Request, StatusCode};
use axum::routing::get;
use axum::Router;
use http_body_util::BodyExt;
use serde_json::Value;
use tokio::sync::Notify;
use tower::ServiceExt;

use deployer::archive::ArchiveSource;
use deployer::error::DeployError;
use deployer::orchestrator::{ComposeAction, Orchestrator};

pub const TOKEN: &str = "b0e873fd-af04-4b45-b0cc-95a990f1077d";

/// Stands in for the archive download: creates `compose_dir` or fails.
pub struct FakeArchive {
    pub compose_dir: PathBuf,
    pub fail: bool,
}

#[async_trait]
impl ArchiveSource for FakeArchive {
    async fn fetch_and_unpack(&self) -> Result<(), DeployError> {
        if self.fail {
            return Err(DeployError::upstream("GET fake", "HTTP 503"));
        }
        std::fs::create_dir_all(&self.compose_dir)
            .map_err(|e| DeployError::upstream("creating fake tree", e))
    }
}

/// Records every action and can be told to fail, hang, or wait for the test.
#[derive(Default)]
pub struct ScriptedOrchestrator {
    pub calls: Mutex<Vec<(ComposeAction, PathBuf)>>,
    fail_on: Option<ComposeAction>,
    hang_next_up: AtomicBool,
    /// (entered, release): `Up` signals `entered` then waits on `release`.
    hold_up: Option<(Arc<Notify>, Arc<Notify>)>,
}

impl ScriptedOrchestrator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing_on(action: ComposeAction) -> Self {
        Self {
            fail_on: Some(action),
            ..Self::default()
        }
    }

    /// The first `Up` never returns; later ones succeed.
    pub fn hanging_first_up() -> Self {
        Self {
            hang_next_up: AtomicBool::new(true),
            ..Self::default()
        }
    }

    pub fn holding_up(entered: Arc<Notify>, release: Arc<Notify>) -> Self {
        Self {
            hold_up: Some((entered, release)),
            ..Self::default()
        }
    }

    pub fn actions(&self) -> Vec<ComposeAction> {
        self.calls.lock().unwrap().iter().map(|(a, _)| *a).collect()
    }
}

#[async_trait]
impl Orchestrator for ScriptedOrchestrator {
    async fn run(&self, action: ComposeAction, dir: &Path) -> Result<String, DeployError> {
        self.calls.lock().unwrap().push((action, dir.to_path_buf()));

        if self.fail_on == Some(action) {
            return Err(DeployError::Orchestrator {
                command: format!("docker compose {action}"),
                message: "service \"web\" failed to build: exit code 1".to_string(),
            });
        }
        if matches!(action, ComposeAction::Up | ComposeAction::UpBuild) {
            if self.hang_next_up.swap(false, Ordering::SeqCst) {
                std::future::pending::<()>().await;
            }
            if let Some((entered, release)) = &self.hold_up {
                entered.notify_one();
                release.notified().await;
            }
        }
        Ok(String::new())
    }
}

pub fn zip_with(files: &[(&str, &str)]) -> Vec<u8> {
    let mut writer = zip::ZipWriter::new(Cursor::new(Vec::new()));
    for (name, body) in files {
        writer
            .start_file(*name, zip::write::SimpleFileOptions::default())
            .unwrap();
        writer.write_all(body.as_bytes()).unwrap();
    }
    writer.finish().unwrap().into_inner()
}

/// Serve `body` with `status` at `path` on a loopback port; returns the base URL.
pub async fn serve_archive(path: &str, status: StatusCode, body: Vec<u8>) -> String {
    let app = Router::new().route(
        path,
        get(move || {
            let body = body.clone();
            async move { (status, body) }
        }),
    );
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    format!("http://{addr}")
}

pub fn get_request(uri: &str) -> Request<Body> {
    Request::builder()
        .method("GET")
        .uri(uri)
        .body(Body::empty())
        .unwrap()
}

pub async fn json_response(app: &Router, req: Request<Body>) -> (StatusCode, Value) {
    let response = app.clone().oneshot(req).await.expect("Request failed");
    let status = response.status();
    let body = response
        .into_body()
        .collect()
        .await
        .expect("Failed to read body")
        .to_bytes();
    let value: Value = serde_json::from_slice(&body).expect("Invalid JSON response");
    (status, value)
}

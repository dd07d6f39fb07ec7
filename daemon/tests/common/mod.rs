#![allow(dead_code)]

use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use axum::body::Body;
use axum::http::{header, Method, Request, Response, StatusCode};
use axum::Router;
use http_body_util::BodyExt;
use tower::ServiceExt;

use sfcrawl_daemon::license::LicenseProvisioner;
use sfcrawl_daemon::process::{CrawlInvocation, CrawlLauncher, ProcessOutput};
use sfcrawl_daemon::{api, AppState, Config};

/// Crawler double: records each launch, optionally waits, writes the
/// configured files into `--output-folder` and exits with `exit_code`.
#[derive(Default)]
pub struct StubCrawler {
    pub calls: Mutex<Vec<CrawlInvocation>>,
    pub exit_code: i32,
    pub stderr: String,
    pub writes: Vec<String>,
    pub delay: Option<Duration>,
}

impl StubCrawler {
    pub fn exiting(exit_code: i32) -> Self {
        Self { exit_code, ..Default::default() }
    }

    pub fn writing(name: &str) -> Self {
        Self { writes: vec![name.to_string()], ..Default::default() }
    }

    pub fn launches(&self) -> usize {
        self.calls.lock().unwrap().len()
    }
}

#[async_trait]
impl CrawlLauncher for StubCrawler {
    async fn launch(&self, invocation: &CrawlInvocation) -> anyhow::Result<ProcessOutput> {
        self.calls.lock().unwrap().push(invocation.clone());
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        let out = PathBuf::from(invocation.flag_value("--output-folder").unwrap());
        for name in &self.writes {
            std::fs::write(out.join(name), format!("contents of {}", name))?;
        }
        Ok(ProcessOutput {
            exit_code: Some(self.exit_code),
            stdout: Vec::new(),
            stderr: self.stderr.clone().into_bytes(),
        })
    }
}

pub struct TestApp {
    pub dir: tempfile::TempDir,
    pub state: AppState,
    pub crawler: Arc<StubCrawler>,
}

impl TestApp {
    pub async fn new(crawler: StubCrawler) -> Self {
        let dir = tempfile::tempdir().unwrap();
        let mut config = Config::default();
        config.server.crawl_data_dir = dir.path().join("crawls");
        config.server.config_dir = dir.path().join("config");

        let crawler = Arc::new(crawler);
        let license = LicenseProvisioner::new(None, dir.path().join("license"));
        let state = AppState::with_launcher(&config, license, crawler.clone());
        state.init_dirs().await.unwrap();
        Self { dir, state, crawler }
    }

    pub fn router(&self) -> Router {
        api::router(self.state.clone())
    }

    pub fn config_dir(&self) -> PathBuf {
        self.dir.path().join("config")
    }

    pub async fn get(&self, uri: &str) -> Response<Body> {
        let request = Request::builder().uri(uri).body(Body::empty()).unwrap();
        self.router().oneshot(request).await.unwrap()
    }

    pub async fn post_json(&self, uri: &str, body: serde_json::Value) -> Response<Body> {
        let request = Request::builder()
            .method(Method::POST)
            .uri(uri)
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap();
        self.router().oneshot(request).await.unwrap()
    }

    pub async fn upload(&self, filename: &str, content: &[u8]) -> Response<Body> {
        let boundary = "sfcrawl-test-boundary";
        let mut body = Vec::new();
        body.extend_from_slice(format!("--{}\r\n", boundary).as_bytes());
        body.extend_from_slice(
            format!(
                "Content-Disposition: form-data; name=\"file\"; filename=\"{}\"\r\nContent-Type: application/octet-stream\r\n\r\n",
                filename
            )
            .as_bytes(),
        );
        body.extend_from_slice(content);
        body.extend_from_slice(format!("\r\n--{}--\r\n", boundary).as_bytes());

        let request = Request::builder()
            .method(Method::POST)
            .uri("/config/upload/")
            .header(header::CONTENT_TYPE, format!("multipart/form-data; boundary={}", boundary))
            .body(Body::from(body))
            .unwrap();
        self.router().oneshot(request).await.unwrap()
    }

    /// Submit a crawl and return its id.
    pub async fn submit(&self, body: serde_json::Value) -> String {
        let response = self.post_json("/crawl/", body).await;
        assert_eq!(response.status(), StatusCode::OK);
        let json = body_json(response).await;
        json["crawl_id"].as_str().unwrap().to_string()
    }

    /// Poll the status endpoint until the crawl leaves `running`.
    pub async fn wait_until_finished(&self, id: &str) -> serde_json::Value {
        for _ in 0..200 {
            let json = body_json(self.get(&format!("/crawl/status/{}", id)).await).await;
            if json["status"] != "running" {
                return json;
            }
            tokio::time::sleep(Duration::from_millis(25)).await;
        }
        panic!("crawl {} never finished", id);
    }
}

pub async fn body_bytes(response: Response<Body>) -> Vec<u8> {
    response.into_body().collect().await.unwrap().to_bytes().to_vec()
}

pub async fn body_json(response: Response<Body>) -> serde_json::Value {
    serde_json::from_slice(&body_bytes(response).await).unwrap()
}

pub fn set_age(path: &Path, age: Duration) {
    let file = std::fs::File::options().write(true).open(path).unwrap();
    file.set_modified(std::time::SystemTime::now() - age).unwrap();
}

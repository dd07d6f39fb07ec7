use anyhow::{anyhow, Context, Result};
use common::{ConfigList, CrawlRequest, ErrorBody, Job, UploadResponse};
use reqwest::{multipart, Response, StatusCode};
use std::path::Path;

/// Thin typed wrapper over the daemon's HTTP API.
pub struct Client {
    http: reqwest::Client,
    base: String,
}

impl Client {
    pub fn new(base: &str) -> Self {
        Self {
            http: reqwest::Client::new(),
            base: base.trim_end_matches('/').to_string(),
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base, path)
    }

    pub async fn start_crawl(&self, request: &CrawlRequest) -> Result<Job> {
        let resp = self
            .http
            .post(self.url("/crawl/"))
            .json(request)
            .send()
            .await
            .with_context(|| format!("Failed to reach daemon at {}", self.base))?;
        Ok(check(resp).await?.json().await?)
    }

    pub async fn status(&self, id: &str) -> Result<Job> {
        let resp = self
            .http
            .get(self.url(&format!("/crawl/status/{}", id)))
            .send()
            .await
            .with_context(|| format!("Failed to reach daemon at {}", self.base))?;
        Ok(check(resp).await?.json().await?)
    }

    /// Raw results response; the caller streams the body.
    pub async fn results(&self, id: &str) -> Result<Response> {
        let resp = self
            .http
            .get(self.url(&format!("/crawl/results/{}", id)))
            .send()
            .await
            .with_context(|| format!("Failed to reach daemon at {}", self.base))?;
        check(resp).await
    }

    pub async fn upload_config(&self, path: &Path) -> Result<UploadResponse> {
        let name = path
            .file_name()
            .and_then(|n| n.to_str())
            .ok_or_else(|| anyhow!("Not a file path: {}", path.display()))?
            .to_string();
        let content = tokio::fs::read(path)
            .await
            .with_context(|| format!("Failed to read {}", path.display()))?;

        let part = multipart::Part::bytes(content).file_name(name);
        let form = multipart::Form::new().part("file", part);
        let resp = self
            .http
            .post(self.url("/config/upload/"))
            .multipart(form)
            .send()
            .await
            .with_context(|| format!("Failed to reach daemon at {}", self.base))?;
        Ok(check(resp).await?.json().await?)
    }

    pub async fn list_configs(&self) -> Result<ConfigList> {
        let resp = self
            .http
            .get(self.url("/config/list/"))
            .send()
            .await
            .with_context(|| format!("Failed to reach daemon at {}", self.base))?;
        Ok(check(resp).await?.json().await?)
    }
}

/// Turn a non-2xx response into an error carrying the server's message.
async fn check(resp: Response) -> Result<Response> {
    let status = resp.status();
    if status.is_success() {
        return Ok(resp);
    }
    let body = resp.text().await.unwrap_or_default();
    Err(anyhow!(error_message(status, &body)))
}

fn error_message(status: StatusCode, body: &str) -> String {
    match serde_json::from_str::<ErrorBody>(body) {
        Ok(err) => format!("{} ({})", err.error, status),
        Err(_) if body.trim().is_empty() => format!("Request failed with {}", status),
        Err(_) => format!("Request failed with {}: {}", status, body.trim()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_message_prefers_server_text() {
        let body = r#"{"error":"Crawl ID not found.","code":"NOT_FOUND"}"#;
        assert_eq!(
            error_message(StatusCode::NOT_FOUND, body),
            "Crawl ID not found. (404 Not Found)"
        );
    }

    #[test]
    fn test_error_message_falls_back_to_raw_body() {
        assert_eq!(
            error_message(StatusCode::BAD_GATEWAY, "upstream down\n"),
            "Request failed with 502 Bad Gateway: upstream down"
        );
        assert_eq!(
            error_message(StatusCode::INTERNAL_SERVER_ERROR, ""),
            "Request failed with 500 Internal Server Error"
        );
    }

    #[test]
    fn test_base_url_trailing_slash() {
        let client = Client::new("http://localhost:8000/");
        assert_eq!(client.url("/crawl/"), "http://localhost:8000/crawl/");
    }
}

//! Client for the OCR detection / demand forecast microservice.
//!
//! - `POST {base}/api/model1/detect` with a multipart `file` part
//! - `POST {base}/api/model2/forecast` with a JSON body
//!
//! A `file` reference is either a local path (read from disk) or an
//! http(s) URL (downloaded first, then uploaded).

use std::path::Path;

use serde_json::Value;
use stepwise_core::workflow::connector::{ConnectorError, ConnectorFuture, InferenceBackend};

use super::http_client;

const DETECT_PATH: &str = "/api/model1/detect";
const FORECAST_PATH: &str = "/api/model2/forecast";

/// Upload name used when the reference carries no usable file name.
const FALLBACK_FILE_NAME: &str = "upload.jpg";

pub struct DlServiceClient {
    base_url: String,
    client: reqwest::Client,
}

impl DlServiceClient {
    pub fn new(base_url: &str, timeout_secs: u64) -> Result<Self, ConnectorError> {
        Ok(Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            client: http_client(timeout_secs)?,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    async fn load_file(&self, file: &str) -> Result<(Vec<u8>, String), ConnectorError> {
        if file.starts_with("http://") || file.starts_with("https://") {
            let response = self
                .client
                .get(file)
                .send()
                .await
                .map_err(|e| ConnectorError::Request(format!("failed to download {file}: {e}")))?;
            let status = response.status().as_u16();
            if status >= 400 {
                let body = response.text().await.unwrap_or_default();
                return Err(ConnectorError::Status { status, body });
            }
            let bytes = response
                .bytes()
                .await
                .map_err(|e| ConnectorError::Decode(format!("failed to read {file}: {e}")))?;
            Ok((bytes.to_vec(), file_name_of(file)))
        } else {
            let bytes = tokio::fs::read(file)
                .await
                .map_err(|e| ConnectorError::Unavailable(format!("cannot read file '{file}': {e}")))?;
            Ok((bytes, file_name_of(file)))
        }
    }

    async fn detect_file(&self, file: &str) -> Result<Value, ConnectorError> {
        let (bytes, name) = self.load_file(file).await?;
        let size = bytes.len();
        let part = reqwest::multipart::Part::bytes(bytes).file_name(name);
        let form = reqwest::multipart::Form::new().part("file", part);

        let url = format!("{}{DETECT_PATH}", self.base_url);
        let response = self
            .client
            .post(&url)
            .multipart(form)
            .send()
            .await
            .map_err(|e| ConnectorError::Request(format!("detect request failed: {e}")))?;

        tracing::info!(url = url.as_str(), upload_bytes = size, "detect call completed");
        decode_json(response).await
    }

    async fn forecast_input(&self, input: Value) -> Result<Value, ConnectorError> {
        let url = format!("{}{FORECAST_PATH}", self.base_url);
        let response = self
            .client
            .post(&url)
            .json(&input)
            .send()
            .await
            .map_err(|e| ConnectorError::Request(format!("forecast request failed: {e}")))?;

        tracing::info!(url = url.as_str(), "forecast call completed");
        decode_json(response).await
    }
}

impl InferenceBackend for DlServiceClient {
    fn detect<'a>(&'a self, file: &'a str) -> ConnectorFuture<'a, Value> {
        Box::pin(self.detect_file(file))
    }

    fn forecast<'a>(&'a self, input: Value) -> ConnectorFuture<'a, Value> {
        Box::pin(self.forecast_input(input))
    }
}

async fn decode_json(response: reqwest::Response) -> Result<Value, ConnectorError> {
    let status = response.status().as_u16();
    let text = response
        .text()
        .await
        .map_err(|e| ConnectorError::Decode(format!("failed to read response: {e}")))?;
    if status >= 400 {
        return Err(ConnectorError::Status { status, body: text });
    }
    serde_json::from_str(&text)
        .map_err(|e| ConnectorError::Decode(format!("response is not JSON: {e}")))
}

/// Last path segment of a path or URL, without any query string.
fn file_name_of(reference: &str) -> String {
    let without_query = reference.split(['?', '#']).next().unwrap_or(reference);
    let segment = without_query.rsplit(['/', '\\']).next().unwrap_or("");
    if segment.is_empty() || segment.contains(':') {
        return FALLBACK_FILE_NAME.to_string();
    }
    Path::new(segment)
        .file_name()
        .and_then(|n| n.to_str())
        .map(str::to_string)
        .unwrap_or_else(|| FALLBACK_FILE_NAME.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::connectors::test_server;
    use axum::Json;
    use axum::body::Bytes;
    use axum::http::StatusCode;
    use axum::routing::{get, post};
    use serde_json::json;

    fn app() -> axum::Router {
        axum::Router::new()
            .route(
                DETECT_PATH,
                post(|body: Bytes| async move {
                    let text = String::from_utf8_lossy(&body).to_string();
                    Json(json!({
                        "has_file_part": text.contains("name=\"file\""),
                        "file_name": text.contains("filename=\"receipt.png\""),
                        "has_payload": text.contains("PNGDATA"),
                    }))
                }),
            )
            .route(
                FORECAST_PATH,
                post(|Json(input): Json<Value>| async move { Json(json!({ "forecast": input })) }),
            )
            .route("/files/receipt.png", get(|| async { "PNGDATA" }))
    }

    #[tokio::test]
    async fn detect_uploads_local_file() {
        let base = test_server::spawn(app()).await;
        let tmp = tempfile::TempDir::new().unwrap();
        let path = tmp.path().join("receipt.png");
        tokio::fs::write(&path, "PNGDATA").await.unwrap();

        let client = DlServiceClient::new(&base, 5).unwrap();
        let out = client.detect(path.to_str().unwrap()).await.unwrap();
        assert_eq!(
            out,
            json!({ "has_file_part": true, "file_name": true, "has_payload": true })
        );
    }

    #[tokio::test]
    async fn detect_downloads_url_first() {
        let base = test_server::spawn(app()).await;
        let client = DlServiceClient::new(&format!("{base}/"), 5).unwrap();
        let out = client
            .detect(&format!("{base}/files/receipt.png"))
            .await
            .unwrap();
        assert_eq!(out["has_payload"], json!(true));
        assert_eq!(out["file_name"], json!(true));
    }

    #[tokio::test]
    async fn detect_missing_file_is_unavailable() {
        let client = DlServiceClient::new("http://127.0.0.1:9", 5).unwrap();
        let err = client.detect("/definitely/not/here.png").await.unwrap_err();
        assert!(matches!(err, ConnectorError::Unavailable(_)));
    }

    #[tokio::test]
    async fn forecast_posts_json() {
        let base = test_server::spawn(app()).await;
        let client = DlServiceClient::new(&base, 5).unwrap();
        let out = client.forecast(json!({ "history": [1, 2, 3] })).await.unwrap();
        assert_eq!(out, json!({ "forecast": { "history": [1, 2, 3] } }));
    }

    #[tokio::test]
    async fn error_status_is_reported() {
        let app = axum::Router::new().route(
            FORECAST_PATH,
            post(|| async { (StatusCode::INTERNAL_SERVER_ERROR, "model not loaded") }),
        );
        let base = test_server::spawn(app).await;
        let client = DlServiceClient::new(&base, 5).unwrap();
        let err = client.forecast(json!([])).await.unwrap_err();
        assert_eq!(err.to_string(), "remote returned HTTP 500: model not loaded");
    }

    #[test]
    fn file_name_from_references() {
        assert_eq!(file_name_of("/tmp/scan.jpg"), "scan.jpg");
        assert_eq!(file_name_of("C:\\scans\\r1.png"), "r1.png");
        assert_eq!(file_name_of("https://cdn.example.com/a/b.pdf?sig=1"), "b.pdf");
        assert_eq!(file_name_of("https://cdn.example.com/"), FALLBACK_FILE_NAME);
    }
}

//! Connector backend ports.
//!
//! Step handlers never speak a wire protocol themselves. Each external
//! system (spreadsheet, document store, mail, webhooks, the OCR/forecast
//! service) is reached through one of the object-safe traits below, which
//! `stepwise-infra` implements. Futures are boxed so the backends can be
//! held as `Arc<dyn ...>` and swapped at runtime (real vs offline).
//!
//! Every call receives the caller's opaque credential blob unchanged.

use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

/// Boxed future returned by every backend call.
pub type ConnectorFuture<'a, T> = Pin<Box<dyn Future<Output = Result<T, ConnectorError>> + Send + 'a>>;

// ---------------------------------------------------------------------------
// Error type
// ---------------------------------------------------------------------------

/// Failures reported by a connector backend.
#[derive(Debug, Clone, Error)]
pub enum ConnectorError {
    /// The request could not be sent or no response arrived.
    #[error("request failed: {0}")]
    Request(String),

    /// The remote side answered with an error status.
    #[error("remote returned HTTP {status}: {body}")]
    Status { status: u16, body: String },

    /// The response could not be decoded.
    #[error("invalid response: {0}")]
    Decode(String),

    /// The backend cannot serve this call (missing file, not configured, ...).
    #[error("connector unavailable: {0}")]
    Unavailable(String),
}

// ---------------------------------------------------------------------------
// Call payloads
// ---------------------------------------------------------------------------

/// How rows are written to a sheet range.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WriteMethod {
    /// Append after the last row of the range.
    Append,
    /// Overwrite the range in place.
    Update,
}

impl fmt::Display for WriteMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WriteMethod::Append => f.write_str("append"),
            WriteMethod::Update => f.write_str("update"),
        }
    }
}

/// A composed outgoing email.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MailMessage {
    pub to: String,
    pub subject: String,
    pub body: String,
}

/// HTTP verb for outgoing webhooks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum WebhookMethod {
    Get,
    Post,
}

impl WebhookMethod {
    /// Parse a method name, case-insensitively.
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_ascii_uppercase().as_str() {
            "GET" => Some(WebhookMethod::Get),
            "POST" => Some(WebhookMethod::Post),
            _ => None,
        }
    }
}

impl fmt::Display for WebhookMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WebhookMethod::Get => f.write_str("GET"),
            WebhookMethod::Post => f.write_str("POST"),
        }
    }
}

/// One outgoing webhook call. For `GET`, object payloads become query
/// parameters; for `POST` the payload is sent as the JSON body.
#[derive(Debug, Clone, PartialEq)]
pub struct WebhookRequest {
    pub url: String,
    pub method: WebhookMethod,
    pub payload: Value,
}

// ---------------------------------------------------------------------------
// Backend traits
// ---------------------------------------------------------------------------

/// Spreadsheet reads and writes.
pub trait SpreadsheetBackend: Send + Sync {
    /// Read a range as a 2-D array of cell values.
    fn read_range<'a>(
        &'a self,
        sheet_id: &'a str,
        range: &'a str,
        credentials: Option<&'a Value>,
    ) -> ConnectorFuture<'a, Value>;

    /// Write rows to a range and return the connector acknowledgement.
    fn write_range<'a>(
        &'a self,
        sheet_id: &'a str,
        range: &'a str,
        rows: Vec<Vec<Value>>,
        method: WriteMethod,
        credentials: Option<&'a Value>,
    ) -> ConnectorFuture<'a, Value>;
}

/// Text documents.
pub trait DocumentBackend: Send + Sync {
    /// Fetch the plain-text body of a document.
    fn read_document<'a>(
        &'a self,
        doc_id: &'a str,
        credentials: Option<&'a Value>,
    ) -> ConnectorFuture<'a, String>;

    /// Append text to a document and return the acknowledgement.
    fn write_document<'a>(
        &'a self,
        doc_id: &'a str,
        body: String,
        credentials: Option<&'a Value>,
    ) -> ConnectorFuture<'a, Value>;
}

/// Outgoing email.
pub trait MailBackend: Send + Sync {
    /// Send a message and return the acknowledgement (message id, status).
    fn send_mail<'a>(
        &'a self,
        message: MailMessage,
        credentials: Option<&'a Value>,
    ) -> ConnectorFuture<'a, Value>;
}

/// Outgoing HTTP webhooks.
pub trait WebhookBackend: Send + Sync {
    /// Perform the call and return a response summary
    /// (`{status, status_code, response}`). Error statuses are
    /// `ConnectorError::Status`.
    fn send<'a>(&'a self, request: WebhookRequest) -> ConnectorFuture<'a, Value>;
}

/// OCR detection and demand forecasting.
pub trait InferenceBackend: Send + Sync {
    /// Run OCR detection on a file (local path or URL).
    fn detect<'a>(&'a self, file: &'a str) -> ConnectorFuture<'a, Value>;

    /// Run a demand forecast on structured input.
    fn forecast<'a>(&'a self, input: Value) -> ConnectorFuture<'a, Value>;
}

/// The full set of backends the built-in step handlers need.
#[derive(Clone)]
pub struct Connectors {
    pub sheets: Arc<dyn SpreadsheetBackend>,
    pub documents: Arc<dyn DocumentBackend>,
    pub mail: Arc<dyn MailBackend>,
    pub webhooks: Arc<dyn WebhookBackend>,
    pub inference: Arc<dyn InferenceBackend>,
}

//! In-memory workspace simulation.
//!
//! Stands in for the spreadsheet, document, and mail services when no real
//! workspace is wired up. Unknown sheets read as a small sample table and
//! unknown documents as a placeholder text; writes are kept in memory so a
//! later read in the same process sees them. Ranges are not interpreted.

use std::sync::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};

use dashmap::DashMap;
use serde_json::{json, Value};
use stepwise_core::workflow::connector::{
    ConnectorFuture, DocumentBackend, MailBackend, MailMessage, SpreadsheetBackend, WriteMethod,
};

/// Text returned for documents that were never written.
pub const SAMPLE_DOCUMENT: &str = "This is the content of the Google Doc.";

/// Rows returned for sheets that were never written.
pub fn sample_sheet() -> Vec<Vec<Value>> {
    [
        ["Name", "Email", "Status"],
        ["Alice", "alice@example.com", "Active"],
        ["Bob", "bob@example.com", "Inactive"],
        ["Charlie", "charlie@example.com", "Active"],
    ]
    .iter()
    .map(|row| row.iter().map(|cell| json!(cell)).collect())
    .collect()
}

#[derive(Default)]
pub struct OfflineWorkspace {
    sheets: DashMap<String, Vec<Vec<Value>>>,
    documents: DashMap<String, String>,
    outbox: Mutex<Vec<MailMessage>>,
    next_message_id: AtomicU64,
}

impl OfflineWorkspace {
    pub fn new() -> Self {
        Self::default()
    }

    /// Messages "sent" so far, oldest first.
    pub fn sent(&self) -> Vec<MailMessage> {
        self.outbox
            .lock()
            .map(|outbox| outbox.clone())
            .unwrap_or_default()
    }

    fn rows_of(&self, sheet_id: &str) -> Vec<Vec<Value>> {
        self.sheets
            .get(sheet_id)
            .map(|rows| rows.clone())
            .unwrap_or_else(sample_sheet)
    }
}

impl SpreadsheetBackend for OfflineWorkspace {
    fn read_range<'a>(
        &'a self,
        sheet_id: &'a str,
        range: &'a str,
        credentials: Option<&'a Value>,
    ) -> ConnectorFuture<'a, Value> {
        Box::pin(async move {
            tracing::debug!(sheet_id, range, has_credentials = credentials.is_some(), "offline sheet read");
            Ok(json!(self.rows_of(sheet_id)))
        })
    }

    fn write_range<'a>(
        &'a self,
        sheet_id: &'a str,
        range: &'a str,
        rows: Vec<Vec<Value>>,
        method: WriteMethod,
        credentials: Option<&'a Value>,
    ) -> ConnectorFuture<'a, Value> {
        Box::pin(async move {
            tracing::debug!(
                sheet_id,
                range,
                method = %method,
                rows = rows.len(),
                has_credentials = credentials.is_some(),
                "offline sheet write"
            );
            let written = rows.len();
            let mut sheet = self
                .sheets
                .entry(sheet_id.to_string())
                .or_insert_with(sample_sheet);
            match method {
                WriteMethod::Append => sheet.extend(rows),
                WriteMethod::Update => {
                    for (i, row) in rows.into_iter().enumerate() {
                        match sheet.get_mut(i) {
                            Some(existing) => *existing = row,
                            None => sheet.push(row),
                        }
                    }
                }
            }
            Ok(json!({
                "status": "mock_success",
                "message": "Data written (simulated)",
                "updatedRange": range,
                "updatedRows": written,
            }))
        })
    }
}

impl DocumentBackend for OfflineWorkspace {
    fn read_document<'a>(
        &'a self,
        doc_id: &'a str,
        credentials: Option<&'a Value>,
    ) -> ConnectorFuture<'a, String> {
        Box::pin(async move {
            tracing::debug!(doc_id, has_credentials = credentials.is_some(), "offline document read");
            Ok(self
                .documents
                .get(doc_id)
                .map(|text| text.clone())
                .unwrap_or_else(|| SAMPLE_DOCUMENT.to_string()))
        })
    }

    fn write_document<'a>(
        &'a self,
        doc_id: &'a str,
        body: String,
        credentials: Option<&'a Value>,
    ) -> ConnectorFuture<'a, Value> {
        Box::pin(async move {
            tracing::debug!(doc_id, chars = body.len(), has_credentials = credentials.is_some(), "offline document write");
            let mut doc = self
                .documents
                .entry(doc_id.to_string())
                .or_insert_with(|| SAMPLE_DOCUMENT.to_string());
            doc.push('\n');
            doc.push_str(&body);
            Ok(json!({
                "status": "mock_success",
                "message": "Document updated (simulated)",
                "documentId": doc_id,
            }))
        })
    }
}

impl MailBackend for OfflineWorkspace {
    fn send_mail<'a>(
        &'a self,
        message: MailMessage,
        credentials: Option<&'a Value>,
    ) -> ConnectorFuture<'a, Value> {
        Box::pin(async move {
            let id = self.next_message_id.fetch_add(1, Ordering::Relaxed) + 1;
            tracing::info!(to = message.to.as_str(), has_credentials = credentials.is_some(), "offline email queued");
            if let Ok(mut outbox) = self.outbox.lock() {
                outbox.push(message);
            }
            Ok(json!({
                "status": "mock_success",
                "message": "Email sent (simulated)",
                "id": format!("offline-{id}"),
            }))
        })
    }
}

//! Spreadsheet read and write steps.
//!
//! `sheet_write` shapes its resolved `data` into rows according to
//! `writeMode` before handing them to the backend:
//!
//! | Mode | String input | List input | Other | Method |
//! |---|---|---|---|---|
//! | `json` (default) | parsed JSON, else one cell | as-is | one cell | append |
//! | `row` | comma-split, trimmed | one row | one cell | append |
//! | `column` | one row per non-empty line | one row per item | one cell | append |
//! | `cell` | one cell | one cell | one cell | update |

use std::str::FromStr;
use std::sync::Arc;

use serde_json::{Map, Value};

use crate::workflow::connector::{SpreadsheetBackend, WriteMethod};
use crate::workflow::expression::value_to_string;
use crate::workflow::registry::{
    AutoPass, StepError, StepFuture, StepHandler, StepInput, StepOutput,
};

const DEFAULT_READ_RANGE: &str = "A1:Z100";
const DEFAULT_WRITE_RANGE: &str = "A1";

// ---------------------------------------------------------------------------
// sheet_read
// ---------------------------------------------------------------------------

/// Reads a range and outputs it as a 2-D array.
pub struct SheetReadHandler {
    backend: Arc<dyn SpreadsheetBackend>,
}

impl SheetReadHandler {
    pub fn new(backend: Arc<dyn SpreadsheetBackend>) -> Self {
        Self { backend }
    }
}

impl StepHandler for SheetReadHandler {
    fn templated_fields(&self) -> &'static [&'static str] {
        &["sheetId", "range"]
    }

    fn execute<'a>(&'a self, input: StepInput<'a>) -> StepFuture<'a> {
        Box::pin(async move {
            let sheet_id = input.config.require_text("sheetId")?;
            let range = input.config.text_or("range", DEFAULT_READ_RANGE);
            let rows = self
                .backend
                .read_range(&sheet_id, &range, input.credentials)
                .await?;
            Ok(StepOutput::Value(rows))
        })
    }
}

// ---------------------------------------------------------------------------
// sheet_write
// ---------------------------------------------------------------------------

/// How `sheet_write` turns its data into rows.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteMode {
    Json,
    Row,
    Column,
    Cell,
}

impl FromStr for WriteMode {
    type Err = StepError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "json" => Ok(WriteMode::Json),
            "row" => Ok(WriteMode::Row),
            "column" => Ok(WriteMode::Column),
            "cell" => Ok(WriteMode::Cell),
            other => Err(StepError::InvalidConfig(format!(
                "unknown writeMode '{}' (expected json, row, column, or cell)",
                other
            ))),
        }
    }
}

/// Writes templated data to a range.
pub struct SheetWriteHandler {
    backend: Arc<dyn SpreadsheetBackend>,
}

impl SheetWriteHandler {
    pub fn new(backend: Arc<dyn SpreadsheetBackend>) -> Self {
        Self { backend }
    }
}

impl StepHandler for SheetWriteHandler {
    fn templated_fields(&self) -> &'static [&'static str] {
        &["sheetId", "range", "data"]
    }

    fn auto_pass(&self, _config: &Map<String, Value>) -> Option<AutoPass> {
        Some(AutoPass::field("data"))
    }

    fn execute<'a>(&'a self, input: StepInput<'a>) -> StepFuture<'a> {
        Box::pin(async move {
            let sheet_id = input.config.require_text("sheetId")?;
            let range = input.config.text_or("range", DEFAULT_WRITE_RANGE);
            let mode: WriteMode = input.config.text_or("writeMode", "json").parse()?;
            let data = input
                .config
                .get("data")
                .cloned()
                .unwrap_or_else(|| Value::String(String::new()));

            let (rows, method) = shape_rows(mode, &data);
            tracing::debug!(
                step_id = input.step_id,
                sheet_id = %sheet_id,
                range = %range,
                ?mode,
                %method,
                rows = rows.len(),
                "writing to sheet"
            );

            let ack = self
                .backend
                .write_range(&sheet_id, &range, rows, method, input.credentials)
                .await?;
            Ok(StepOutput::Value(ack))
        })
    }
}

/// Shape resolved data into a list of rows for the given mode.
pub fn shape_rows(mode: WriteMode, data: &Value) -> (Vec<Vec<Value>>, WriteMethod) {
    let single_cell = |v: &Value| Value::Array(vec![Value::Array(vec![Value::String(value_to_string(v))])]);

    let (shaped, method) = match mode {
        WriteMode::Json => {
            let shaped = match data {
                Value::String(s) => serde_json::from_str(s).unwrap_or_else(|_| single_cell(data)),
                Value::Array(_) => data.clone(),
                other => single_cell(other),
            };
            (shaped, WriteMethod::Append)
        }
        WriteMode::Row => {
            let shaped = match data {
                Value::String(s) => Value::Array(vec![Value::Array(
                    s.split(',')
                        .map(|cell| Value::String(cell.trim().to_string()))
                        .collect(),
                )]),
                Value::Array(_) => Value::Array(vec![data.clone()]),
                other => single_cell(other),
            };
            (shaped, WriteMethod::Append)
        }
        WriteMode::Column => {
            let shaped = match data {
                Value::String(s) => Value::Array(
                    s.lines()
                        .map(str::trim)
                        .filter(|line| !line.is_empty())
                        .map(|line| Value::Array(vec![Value::String(line.to_string())]))
                        .collect(),
                ),
                Value::Array(items) => Value::Array(
                    items
                        .iter()
                        .map(|item| Value::Array(vec![Value::String(value_to_string(item))]))
                        .collect(),
                ),
                other => single_cell(other),
            };
            (shaped, WriteMethod::Append)
        }
        WriteMode::Cell => (single_cell(data), WriteMethod::Update),
    };

    (normalize_rows(shaped), method)
}

/// Force any value into a list of lists.
fn normalize_rows(value: Value) -> Vec<Vec<Value>> {
    match value {
        Value::Array(items) if items.first().is_some_and(Value::is_array) => items
            .into_iter()
            .map(|row| match row {
                Value::Array(cells) => cells,
                cell => vec![cell],
            })
            .collect(),
        Value::Array(items) if items.is_empty() => Vec::new(),
        Value::Array(items) => vec![items],
        other => vec![vec![Value::String(value_to_string(&other))]],
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::workflow::context::ExecutionContext;
    use crate::workflow::registry::StepRegistry;
    use crate::workflow::steps::testing::{connectors, step, RecordingBackend};
    use serde_json::json;

    #[test]
    fn test_shape_json_mode() {
        assert_eq!(
            shape_rows(WriteMode::Json, &json!("[[1, 2], [3, 4]]")),
            (vec![vec![json!(1), json!(2)], vec![json!(3), json!(4)]], WriteMethod::Append)
        );
        assert_eq!(shape_rows(WriteMode::Json, &json!("hello")).0, vec![vec![json!("hello")]]);
        assert_eq!(shape_rows(WriteMode::Json, &json!(["a", "b"])).0, vec![vec![json!("a"), json!("b")]]);
        assert_eq!(shape_rows(WriteMode::Json, &json!(7)).0, vec![vec![json!("7")]]);
    }

    #[test]
    fn test_shape_row_mode() {
        assert_eq!(
            shape_rows(WriteMode::Row, &json!("Alice, alice@example.com ,Active")).0,
            vec![vec![json!("Alice"), json!("alice@example.com"), json!("Active")]]
        );
        assert_eq!(shape_rows(WriteMode::Row, &json!([1, 2])).0, vec![vec![json!(1), json!(2)]]);
    }

    #[test]
    fn test_shape_column_mode() {
        assert_eq!(
            shape_rows(WriteMode::Column, &json!("A\n  B \n\nC")).0,
            vec![vec![json!("A")], vec![json!("B")], vec![json!("C")]]
        );
        assert_eq!(
            shape_rows(WriteMode::Column, &json!(["x", 2])).0,
            vec![vec![json!("x")], vec![json!("2")]]
        );
    }

    #[test]
    fn test_shape_cell_mode_updates() {
        let (rows, method) = shape_rows(WriteMode::Cell, &json!(["a", "b"]));
        assert_eq!(rows, vec![vec![json!(r#"["a","b"]"#)]]);
        assert_eq!(method, WriteMethod::Update);
    }

    #[test]
    fn test_unknown_write_mode_rejected() {
        assert!(matches!(
            "diagonal".parse::<WriteMode>(),
            Err(StepError::InvalidConfig(_))
        ));
    }

    #[tokio::test]
    async fn test_sheet_read_uses_default_range() {
        let backend = RecordingBackend::with_sheet(json!([["Name"], ["Alice"]]));
        let registry = StepRegistry::with_builtin(&connectors(backend.clone()));
        let ctx = ExecutionContext::default();

        let out = registry
            .dispatch(&step("1", "google_sheet_read", json!({ "sheetId": "abc" })), &[], &ctx, None)
            .await
            .unwrap();
        assert_eq!(out, StepOutput::Value(json!([["Name"], ["Alice"]])));
        assert_eq!(backend.calls()[0]["range"], json!("A1:Z100"));
    }

    #[tokio::test]
    async fn test_sheet_read_requires_sheet_id() {
        let backend = RecordingBackend::with_sheet(json!([]));
        let registry = StepRegistry::with_builtin(&connectors(backend));
        let err = registry
            .dispatch(&step("1", "sheet_read", json!({})), &[], &ExecutionContext::default(), None)
            .await
            .unwrap_err();
        assert!(matches!(err, StepError::InvalidConfig(_)));
    }

    #[tokio::test]
    async fn test_sheet_write_auto_passes_parent_rows() {
        let backend = RecordingBackend::with_sheet(json!([]));
        let registry = StepRegistry::with_builtin(&connectors(backend.clone()));
        let mut ctx = ExecutionContext::default();
        ctx.insert("1", json!([["Alice", "Active"]])).unwrap();

        registry
            .dispatch(
                &step("2", "sheet_write", json!({ "sheetId": "out", "writeMode": "json" })),
                &["1".to_string()],
                &ctx,
                None,
            )
            .await
            .unwrap();

        let call = &backend.calls()[0];
        assert_eq!(call["rows"], json!([["Alice", "Active"]]));
        assert_eq!(call["range"], json!("A1"));
        assert_eq!(call["method"], json!("append"));
    }

    #[tokio::test]
    async fn test_sheet_write_row_mode_from_template() {
        let backend = RecordingBackend::with_sheet(json!([]));
        let registry = StepRegistry::with_builtin(&connectors(backend.clone()));
        let mut ctx = ExecutionContext::default();
        ctx.insert("1", json!({ "name": "Bob", "email": "bob@example.com" })).unwrap();

        registry
            .dispatch(
                &step(
                    "2",
                    "sheet_write",
                    json!({ "sheetId": "out", "writeMode": "row", "data": "{{1.name}}, {{1.email}}" }),
                ),
                &["1".to_string()],
                &ctx,
                None,
            )
            .await
            .unwrap();

        assert_eq!(backend.calls()[0]["rows"], json!([["Bob", "bob@example.com"]]));
    }
}

//! Template resolver for `{{stepId.path}}` references.
//!
//! A reference names a step id followed by a restricted path: `.field`,
//! `[3]`, `[-1]`, `['key']` or `["key"]`. Nothing else is evaluated.
//!
//! Two forms are supported:
//! - **Whole reference**: the template is exactly one `{{ref}}`; the referenced
//!   value is returned with its native type (arrays stay arrays).
//! - **Embedded**: every `{{ref}}` fragment is replaced by the string form of
//!   its value, then the whole string is parsed as JSON, falling back to the
//!   literal string when it is not valid JSON.
//!
//! Malformed references and missing steps never fail a run: they resolve to
//! `null`.

use serde_json::Value;
use thiserror::Error;

use super::context::ExecutionContext;

const OPEN: &str = "{{";
const CLOSE: &str = "}}";

// ---------------------------------------------------------------------------
// Error type
// ---------------------------------------------------------------------------

/// Reference parse errors. The resolver absorbs these and yields `null`.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TemplateError {
    #[error("empty reference")]
    EmptyReference,

    #[error("malformed path '{path}': {message}")]
    MalformedPath { path: String, message: String },
}

// ---------------------------------------------------------------------------
// Reference AST
// ---------------------------------------------------------------------------

/// One step of a path below the root step id.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Accessor {
    /// `.name` -- object field, or array index when the name is numeric.
    Field(String),
    /// `[n]` -- array index; negative counts from the end.
    Index(i64),
    /// `['key']` / `["key"]` -- object field with arbitrary characters.
    Key(String),
}

/// A parsed `stepId.path` reference.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reference {
    pub root: String,
    pub path: Vec<Accessor>,
}

impl Reference {
    /// Parse the text between `{{` and `}}`.
    ///
    /// The root step id runs up to the first `.` or `[`.
    pub fn parse(expr: &str) -> Result<Self, TemplateError> {
        let expr = expr.trim();
        if expr.is_empty() {
            return Err(TemplateError::EmptyReference);
        }

        let malformed = |message: &str| TemplateError::MalformedPath {
            path: expr.to_string(),
            message: message.to_string(),
        };

        let root_end = expr.find(['.', '[']).unwrap_or(expr.len());
        let root = &expr[..root_end];
        if root.is_empty() {
            return Err(malformed("missing step id"));
        }

        let mut path = Vec::new();
        let mut rest = &expr[root_end..];
        while let Some(first) = rest.chars().next() {
            match first {
                '.' => {
                    let body = &rest[1..];
                    let end = body.find(['.', '[']).unwrap_or(body.len());
                    let name = &body[..end];
                    if name.is_empty() {
                        return Err(malformed("empty field name"));
                    }
                    path.push(Accessor::Field(name.to_string()));
                    rest = &body[end..];
                }
                '[' => {
                    let body = &rest[1..];
                    if let Some(quote) = body.chars().next().filter(|c| *c == '\'' || *c == '"') {
                        let inner = &body[1..];
                        let close = inner
                            .find(quote)
                            .ok_or_else(|| malformed("unterminated quoted key"))?;
                        let after = &inner[close + 1..];
                        if !after.starts_with(']') {
                            return Err(malformed("expected ']' after quoted key"));
                        }
                        path.push(Accessor::Key(inner[..close].to_string()));
                        rest = &after[1..];
                    } else {
                        let close = body
                            .find(']')
                            .ok_or_else(|| malformed("unterminated index"))?;
                        let index = body[..close]
                            .trim()
                            .parse::<i64>()
                            .map_err(|_| malformed("index must be an integer"))?;
                        path.push(Accessor::Index(index));
                        rest = &body[close + 1..];
                    }
                }
                _ => return Err(malformed("expected '.' or '['")),
            }
        }

        Ok(Self {
            root: root.to_string(),
            path,
        })
    }

    /// Walk the path against the context. `None` when the step has no
    /// output or any accessor misses.
    pub fn evaluate<'a>(&self, ctx: &'a ExecutionContext) -> Option<&'a Value> {
        let mut current = ctx.get(&self.root)?;
        for accessor in &self.path {
            current = match (accessor, current) {
                (Accessor::Field(name), Value::Object(map)) => map.get(name)?,
                (Accessor::Field(name), Value::Array(items)) => {
                    items.get(name.parse::<usize>().ok()?)?
                }
                (Accessor::Key(key), Value::Object(map)) => map.get(key)?,
                (Accessor::Index(i), Value::Array(items)) => {
                    let idx = if *i < 0 {
                        items.len().checked_sub(i.unsigned_abs() as usize)?
                    } else {
                        *i as usize
                    };
                    items.get(idx)?
                }
                (Accessor::Index(i), Value::Object(map)) => map.get(&i.to_string())?,
                _ => return None,
            };
        }
        Some(current)
    }
}

// ---------------------------------------------------------------------------
// Resolution
// ---------------------------------------------------------------------------

/// Resolve a template string against the context.
pub fn resolve_template(template: &str, ctx: &ExecutionContext) -> Value {
    if template.is_empty() {
        return Value::String(String::new());
    }

    if let Some(inner) = whole_reference(template) {
        match Reference::parse(inner) {
            Ok(reference) => {
                return reference.evaluate(ctx).cloned().unwrap_or(Value::Null);
            }
            Err(e) => {
                tracing::debug!(template, error = %e, "not a whole reference, substituting");
            }
        }
    }

    let substituted = substitute(template, ctx);
    serde_json::from_str(&substituted).unwrap_or(Value::String(substituted))
}

/// Resolve every template inside a config value.
///
/// Top-level strings always go through `resolve_template`. Strings nested in
/// arrays or objects are resolved only when they contain a reference, so
/// literal nested values keep their type.
pub fn resolve_value(value: &Value, ctx: &ExecutionContext) -> Value {
    match value {
        Value::String(s) => resolve_template(s, ctx),
        Value::Array(_) | Value::Object(_) => resolve_nested(value, ctx),
        other => other.clone(),
    }
}

fn resolve_nested(value: &Value, ctx: &ExecutionContext) -> Value {
    match value {
        Value::String(s) if s.contains(OPEN) => resolve_template(s, ctx),
        Value::Array(items) => Value::Array(items.iter().map(|v| resolve_nested(v, ctx)).collect()),
        Value::Object(map) => Value::Object(
            map.iter()
                .map(|(k, v)| (k.clone(), resolve_nested(v, ctx)))
                .collect(),
        ),
        other => other.clone(),
    }
}

/// String form used for embedded substitution: strings raw, everything
/// else as compact JSON.
pub fn value_to_string(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// The reference body when the template is exactly one `{{...}}`.
fn whole_reference(template: &str) -> Option<&str> {
    if template.len() >= OPEN.len() + CLOSE.len()
        && template.starts_with(OPEN)
        && template.ends_with(CLOSE)
        && template.matches(OPEN).count() == 1
    {
        Some(&template[OPEN.len()..template.len() - CLOSE.len()])
    } else {
        None
    }
}

/// Replace each `{{ref}}` with the string form of its value (`null` when
/// it does not resolve). An unclosed `{{` is kept literally.
fn substitute(template: &str, ctx: &ExecutionContext) -> String {
    let mut out = String::with_capacity(template.len());
    let mut rest = template;

    while let Some(start) = rest.find(OPEN) {
        let after_open = &rest[start + OPEN.len()..];
        let Some(end) = after_open.find(CLOSE) else {
            break;
        };
        out.push_str(&rest[..start]);
        out.push_str(&lookup(&after_open[..end], ctx));
        rest = &after_open[end + CLOSE.len()..];
    }

    out.push_str(rest);
    out
}

fn lookup(expr: &str, ctx: &ExecutionContext) -> String {
    match Reference::parse(expr) {
        Ok(reference) => reference
            .evaluate(ctx)
            .map(value_to_string)
            .unwrap_or_else(|| "null".to_string()),
        Err(e) => {
            tracing::debug!(expr, error = %e, "template reference absorbed as null");
            "null".to_string()
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

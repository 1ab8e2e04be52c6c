//! Built-in step handlers.
//!
//! Canonical step types and the legacy type names kept as aliases:
//!
//! | Canonical | Aliases |
//! |---|---|
//! | `sheet_read` | `google_sheet_read` |
//! | `sheet_write` | `google_sheet_write` |
//! | `doc_read` | `google_doc_read` |
//! | `doc_write` | |
//! | `email_send` | `gmail_send` |
//! | `webhook_notify` | `make_webhook` |
//! | `slack_notify`, `discord_notify` | (chat-flavored webhooks) |
//! | `filter_gate` | `filter` |
//! | `ocr_detect` | |
//! | `forecast_predict` | |

pub mod document;
pub mod email;
pub mod filter;
pub mod inference;
pub mod sheet;
pub mod webhook;

use std::sync::Arc;

use super::connector::Connectors;
use super::registry::StepRegistry;

use self::document::{DocReadHandler, DocWriteHandler};
use self::email::EmailSendHandler;
use self::filter::FilterGateHandler;
use self::inference::{ForecastPredictHandler, OcrDetectHandler};
use self::sheet::{SheetReadHandler, SheetWriteHandler};
use self::webhook::{WebhookFlavor, WebhookHandler};

/// Register every built-in handler and alias.
pub fn register_builtin(registry: &mut StepRegistry, connectors: &Connectors) {
    registry.register("sheet_read", Arc::new(SheetReadHandler::new(connectors.sheets.clone())));
    registry.register("sheet_write", Arc::new(SheetWriteHandler::new(connectors.sheets.clone())));
    registry.register("doc_read", Arc::new(DocReadHandler::new(connectors.documents.clone())));
    registry.register("doc_write", Arc::new(DocWriteHandler::new(connectors.documents.clone())));
    registry.register("email_send", Arc::new(EmailSendHandler::new(connectors.mail.clone())));
    registry.register(
        "webhook_notify",
        Arc::new(WebhookHandler::configurable(connectors.webhooks.clone())),
    );
    registry.register(
        "slack_notify",
        Arc::new(WebhookHandler::new(connectors.webhooks.clone(), WebhookFlavor::Slack)),
    );
    registry.register(
        "discord_notify",
        Arc::new(WebhookHandler::new(connectors.webhooks.clone(), WebhookFlavor::Discord)),
    );
    registry.register("filter_gate", Arc::new(FilterGateHandler));
    registry.register("ocr_detect", Arc::new(OcrDetectHandler::new(connectors.inference.clone())));
    registry.register(
        "forecast_predict",
        Arc::new(ForecastPredictHandler::new(connectors.inference.clone())),
    );

    registry.alias("google_sheet_read", "sheet_read");
    registry.alias("google_sheet_write", "sheet_write");
    registry.alias("google_doc_read", "doc_read");
    registry.alias("gmail_send", "email_send");
    registry.alias("make_webhook", "webhook_notify");
    registry.alias("filter", "filter_gate");
}

// ---------------------------------------------------------------------------
// Test support
// ---------------------------------------------------------------------------

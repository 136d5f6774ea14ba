//! Line-oriented audit log
//!
//! The confirmation loop has no persistent record of in-flight attempts, so
//! every submission intent, attempt, and outcome is appended here as one
//! JSON line. After an ambiguous timeout this file is the operator's only
//! reconciliation source; the idempotency marker written with the intent
//! record is what makes double-application detectable offline.

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::io::Write;
use std::sync::Mutex;
use uuid::Uuid;

use crate::errors::PipelineError;

/// One audit record
#[derive(Debug, Serialize)]
pub struct AuditRecord<'a> {
    pub timestamp: DateTime<Utc>,
    pub item_id: &'a str,
    pub stage: &'a str,
    pub event: &'a str,
    /// Caller-assigned idempotency marker for this logical submission
    #[serde(skip_serializing_if = "Option::is_none")]
    pub marker: Option<Uuid>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub signature: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub attempt: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
}

/// Append-only JSON-lines audit writer
pub struct AuditLog {
    writer: Mutex<Box<dyn Write + Send>>,
}

impl AuditLog {
    /// Open (or create) the audit file in append mode
    pub fn open(path: &str) -> Result<Self, PipelineError> {
        let file = std::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .map_err(|e| PipelineError::Checkpoint(format!("audit log {path}: {e}")))?;
        Ok(Self {
            writer: Mutex::new(Box::new(file)),
        })
    }

    /// Discarding log for tests
    pub fn sink() -> Self {
        Self {
            writer: Mutex::new(Box::new(std::io::sink())),
        }
    }

    /// Append one record
    ///
    /// Audit I/O failures are reported but deliberately do not fail the
    /// submission path; the line is also mirrored to tracing.
    pub fn record(&self, record: &AuditRecord<'_>) {
        tracing::info!(
            item = record.item_id,
            stage = record.stage,
            event = record.event,
            marker = ?record.marker,
            signature = record.signature.as_deref().unwrap_or(""),
            attempt = ?record.attempt,
            "audit"
        );
        let Ok(line) = serde_json::to_string(record) else {
            return;
        };
        let mut writer = match self.writer.lock() {
            Ok(writer) => writer,
            Err(poisoned) => poisoned.into_inner(),
        };
        if let Err(e) = writeln!(writer, "{line}") {
            tracing::warn!(error = %e, "Failed to append audit record");
        }
    }

    /// Record the intent to submit, before any bytes leave the process
    pub fn submission_intent(&self, item_id: &str, stage: &str, marker: Uuid) {
        self.record(&AuditRecord {
            timestamp: Utc::now(),
            item_id,
            stage,
            event: "submission_intent",
            marker: Some(marker),
            signature: None,
            attempt: None,
            detail: None,
        });
    }

    /// Record one confirmation-loop attempt
    pub fn attempt(&self, item_id: &str, stage: &str, marker: Uuid, signature: &str, attempt: u32) {
        self.record(&AuditRecord {
            timestamp: Utc::now(),
            item_id,
            stage,
            event: "attempt",
            marker: Some(marker),
            signature: Some(signature.to_string()),
            attempt: Some(attempt),
            detail: None,
        });
    }

    /// Record a confirmed submission
    pub fn confirmed(&self, item_id: &str, stage: &str, marker: Uuid, signature: &str, attempts: u32) {
        self.record(&AuditRecord {
            timestamp: Utc::now(),
            item_id,
            stage,
            event: "confirmed",
            marker: Some(marker),
            signature: Some(signature.to_string()),
            attempt: Some(attempts),
            detail: None,
        });
    }

    /// Record a terminal failure, including ambiguous timeouts
    pub fn failed(&self, item_id: &str, stage: &str, marker: Option<Uuid>, detail: &str) {
        self.record(&AuditRecord {
            timestamp: Utc::now(),
            item_id,
            stage,
            event: "failed",
            marker,
            signature: None,
            attempt: None,
            detail: Some(detail.to_string()),
        });
    }
}

//! Diagnostics emitted while collecting.
//!
//! The collector never talks to a global logger directly; it reports through
//! a [`DiagnosticSink`] handed in at construction. [`TracingSink`] forwards to
//! `tracing`, whose subscriber is installed once by the host process.

use crate::catalog::MetricDefinition;
use crate::error::ExtractError;
use std::sync::Mutex;

pub trait DiagnosticSink: Send + Sync {
    /// A field could not be extracted and was replaced by zero.
    fn field_failed(&self, definition: &MetricDefinition, error: &ExtractError);

    /// Verbose mode: the raw status document rendered as JSON.
    fn raw_status(&self, rendered: &str);
}

#[derive(Debug, Default, Clone, Copy)]
pub struct TracingSink;

impl DiagnosticSink for TracingSink {
    fn field_failed(&self, definition: &MetricDefinition, error: &ExtractError) {
        tracing::warn!(
            metric = definition.output_key,
            path = %definition.path,
            error = %error,
            "Cannot fetch metric"
        );
    }

    fn raw_status(&self, rendered: &str) {
        tracing::info!(document = %rendered, "Raw serverStatus");
    }
}

/// One recorded diagnostic.
#[derive(Debug, Clone, PartialEq)]
pub enum Diagnostic {
    FieldFailed {
        output_key: &'static str,
        path: String,
        error: ExtractError,
    },
    RawStatus(String),
}

/// Keeps diagnostics in memory, for hosts that report them in bulk.
#[derive(Debug, Default)]
pub struct MemorySink {
    entries: Mutex<Vec<Diagnostic>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of everything recorded so far.
    pub fn entries(&self) -> Vec<Diagnostic> {
        self.entries
            .lock()
            .map(|entries| entries.clone())
            .unwrap_or_else(|poisoned| poisoned.into_inner().clone())
    }

    /// Output keys of all failed fields, in the order they were reported.
    pub fn failed_keys(&self) -> Vec<&'static str> {
        self.entries()
            .into_iter()
            .filter_map(|entry| match entry {
                Diagnostic::FieldFailed { output_key, .. } => Some(output_key),
                Diagnostic::RawStatus(_) => None,
            })
            .collect()
    }

    fn push(&self, diagnostic: Diagnostic) {
        match self.entries.lock() {
            Ok(mut entries) => entries.push(diagnostic),
            Err(poisoned) => poisoned.into_inner().push(diagnostic),
        }
    }
}

impl DiagnosticSink for MemorySink {
    fn field_failed(&self, definition: &MetricDefinition, error: &ExtractError) {
        self.push(Diagnostic::FieldFailed {
            output_key: definition.output_key,
            path: definition.path.to_string(),
            error: error.clone(),
        });
    }

    fn raw_status(&self, rendered: &str) {
        self.push(Diagnostic::RawStatus(rendered.to_string()));
    }
}

//! Reconciler error types.

use std::path::PathBuf;

use nbrt_client::ClientError;
use thiserror::Error;

use crate::reconciler::{Phase, TemplateField};
use crate::validation::Violation;

/// Errors reading or writing configuration and state files.
#[derive(Debug, Error)]
pub enum FileError {
    #[error("failed to read {}: {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to write {}: {source}", path.display())]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid JSON in {}: {source}", path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("failed to encode state: {0}")]
    Encode(#[source] serde_json::Error),
}

/// Errors surfaced by the reconciler.
#[derive(Debug, Error)]
pub enum ReconcileError {
    /// The configuration has blocking violations. Nothing was sent.
    #[error("validation failed: {}", join(.0))]
    Validation(Vec<Violation>),

    /// A changed field can only be applied by replacing the template.
    #[error("template {name}: changed fields require replacement: {}", join(.fields))]
    FieldImmutable {
        name: String,
        fields: Vec<TemplateField>,
    },

    /// A remote call failed.
    #[error("{operation} {name}: {source}")]
    Api {
        operation: &'static str,
        name: String,
        #[source]
        source: ClientError,
    },

    #[error("invalid phase transition {from} -> {to}")]
    InvalidTransition { from: Phase, to: Phase },

    #[error(transparent)]
    File(#[from] FileError),
}

impl ReconcileError {
    pub(crate) fn api(operation: &'static str, name: impl Into<String>, source: ClientError) -> Self {
        ReconcileError::Api {
            operation,
            name: name.into(),
            source,
        }
    }
}

fn join<T: std::fmt::Display>(items: &[T]) -> String {
    items
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}

/// Result type for reconciler operations.
pub type Result<T> = std::result::Result<T, ReconcileError>;

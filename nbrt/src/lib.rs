//! nbrt: declarative lifecycle management for Vertex AI notebook runtime
//! templates.
//!
//! A [`TemplateConfig`] is validated, diffed against the last known
//! [`TemplateState`], and converged by the [`TemplateReconciler`] through any
//! [`nbrt_client::TemplateApi`].

pub mod config;
pub mod error;
pub mod reconciler;
pub mod state;
pub mod validation;

pub use config::TemplateConfig;
pub use error::{FileError, ReconcileError, Result};
pub use reconciler::{
    ManagedTemplate, Mutability, MutabilityTable, Phase, Plan, TemplateField, TemplateReconciler,
    TemplateState,
};
pub use validation::{Severity, ValidationPolicy, Violation, validate, validate_with};

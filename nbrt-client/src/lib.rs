//! nbrt-client: REST client for Vertex AI notebook runtime templates.
//!
//! Provides the wire model, credential providers and an authenticated client
//! for the list / create / patch / delete calls of the remote API.

pub mod client;
pub mod credentials;
pub mod error;
pub mod field;
pub mod model;

pub use client::{ClientConfig, DEFAULT_LOCATION, NotebookClient, TemplateApi, find_by_name};
pub use credentials::{
    AccessToken, CredentialProvider, EnvToken, GcloudToken, ProviderChain, StaticToken,
};
pub use error::{ClientError, CredentialError, Result};
pub use field::Field;
pub use model::{FieldMask, NotebookRuntimeTemplate};

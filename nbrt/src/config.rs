//! Declared (desired) configuration of one notebook runtime template.
//!
//! Files are JSON with snake_case attribute names:
//!
//! ```json
//! {
//!   "display_name": "analytics",
//!   "machine_spec": { "machine_type": "e2-standard-4" },
//!   "network_spec": { "enable_internet_access": true },
//!   "idle_shutdown_config": { "idle_timeout": "3600s" },
//!   "kms_key_name": null
//! }
//! ```
//!
//! `kms_key_name` is tri-state: omitted leaves the key unmanaged, `null`
//! asks for no key, a string asks for that key.

use std::collections::BTreeMap;
use std::path::Path;

use nbrt_client::Field;
use serde::{Deserialize, Serialize};

use crate::error::FileError;
use crate::validation::{self, ValidationPolicy, Violation};

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct MachineSpecConfig {
    #[serde(default)]
    pub machine_type: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub accelerator_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub accelerator_count: Option<i64>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct DiskSpecConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub disk_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub disk_size_gb: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct NetworkSpecConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub enable_internet_access: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub network: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subnetwork: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct IdleShutdownSettings {
    /// Seconds with an `s` suffix, e.g. `"3600s"`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub idle_timeout: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub idle_shutdown_disabled: Option<bool>,
}

/// Desired state of a managed template.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TemplateConfig {
    #[serde(default)]
    pub display_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub is_default: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub enable_secure_boot: Option<bool>,
    #[serde(default, skip_serializing_if = "Field::is_unset")]
    pub kms_key_name: Field<String>,
    #[serde(default)]
    pub machine_spec: MachineSpecConfig,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data_persistent_disk_spec: Option<DiskSpecConfig>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub network_spec: Option<NetworkSpecConfig>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub idle_shutdown_config: Option<IdleShutdownSettings>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub labels: Option<BTreeMap<String, String>>,
}

impl TemplateConfig {
    /// Minimal valid configuration.
    pub fn new(display_name: impl Into<String>, machine_type: impl Into<String>) -> Self {
        Self {
            display_name: display_name.into(),
            machine_spec: MachineSpecConfig {
                machine_type: machine_type.into(),
                ..Default::default()
            },
            ..Default::default()
        }
    }

    pub fn from_json_str(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }

    /// Every violation under the advisory policy. Sends nothing.
    pub fn validate(&self) -> Vec<Violation> {
        validation::validate(self)
    }

    pub fn validate_with(&self, policy: ValidationPolicy) -> Vec<Violation> {
        validation::validate_with(self, policy)
    }

    /// Reads and decodes a configuration file.
    pub async fn load(path: &Path) -> Result<Self, FileError> {
        let text = tokio::fs::read_to_string(path)
            .await
            .map_err(|source| FileError::Read {
                path: path.to_path_buf(),
                source,
            })?;
        Self::from_json_str(&text).map_err(|source| FileError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }
}

//! Wire types for the `notebookRuntimeTemplates` collection.
//!
//! These mirror the remote JSON exactly (camelCase keys). Absent fields are
//! omitted on serialization so the same types serve as creation payloads,
//! masked patch payloads, and decoded responses.

use std::collections::BTreeMap;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::field::Field;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MachineSpec {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub machine_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub accelerator_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub accelerator_count: Option<i64>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DataPersistentDiskSpec {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub disk_type: Option<String>,
    /// int64 on the remote side, so JSON-encoded as a string.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub disk_size_gb: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NetworkSpec {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub enable_internet_access: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub network: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subnetwork: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IdleShutdownConfig {
    /// Duration string, e.g. `"3600s"`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub idle_timeout: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub idle_shutdown_disabled: Option<bool>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EucConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub euc_disabled: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bypass_actas_check: Option<bool>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ShieldedVmConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub enable_secure_boot: Option<bool>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EncryptionSpec {
    /// `Null` clears the key in a masked patch.
    #[serde(default, skip_serializing_if = "Field::is_unset")]
    pub kms_key_name: Field<String>,
}

/// A notebook runtime template as the remote API sees it.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NotebookRuntimeTemplate {
    /// Full resource name, `projects/*/locations/*/notebookRuntimeTemplates/*`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub display_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub is_default: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub machine_spec: Option<MachineSpec>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data_persistent_disk_spec: Option<DataPersistentDiskSpec>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub network_spec: Option<NetworkSpec>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub service_account: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub etag: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub labels: Option<BTreeMap<String, String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub idle_shutdown_config: Option<IdleShutdownConfig>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub euc_config: Option<EucConfig>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub create_time: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub update_time: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notebook_runtime_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub shielded_vm_config: Option<ShieldedVmConfig>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub encryption_spec: Option<EncryptionSpec>,
}

impl NotebookRuntimeTemplate {
    /// Short identifier: the last segment of the resource name.
    pub fn id(&self) -> Option<&str> {
        self.name
            .as_deref()
            .and_then(|name| name.rsplit('/').next())
    }

    /// The configured KMS key, if any.
    pub fn kms_key_name(&self) -> Option<&str> {
        self.encryption_spec
            .as_ref()
            .and_then(|spec| spec.kms_key_name.value())
            .map(String::as_str)
    }
}

/// Body of `GET .../notebookRuntimeTemplates`.
///
/// The remote omits the array entirely when the collection is empty.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListNotebookRuntimeTemplatesResponse {
    #[serde(default)]
    pub notebook_runtime_templates: Vec<NotebookRuntimeTemplate>,
}

/// The list of field paths a partial update may change.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FieldMask {
    paths: Vec<String>,
}

impl FieldMask {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a path, ignoring duplicates.
    pub fn push(&mut self, path: impl Into<String>) {
        let path = path.into();
        if !self.paths.contains(&path) {
            self.paths.push(path);
        }
    }

    pub fn paths(&self) -> &[String] {
        &self.paths
    }

    pub fn is_empty(&self) -> bool {
        self.paths.is_empty()
    }

    pub fn contains(&self, path: &str) -> bool {
        self.paths.iter().any(|p| p == path)
    }
}

impl<S: Into<String>> FromIterator<S> for FieldMask {
    fn from_iter<I: IntoIterator<Item = S>>(iter: I) -> Self {
        let mut mask = FieldMask::new();
        for path in iter {
            mask.push(path);
        }
        mask
    }
}

/// Comma-joined, the form `updateMask` expects.
impl fmt::Display for FieldMask {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.paths.join(","))
    }
}

//! Normalized view of a remote template.
//!
//! The remote omits booleans that are false and nested objects that are
//! empty. Reading fills those in with zero values so a freshly created
//! template compares equal to the configuration it came from.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use nbrt_client::NotebookRuntimeTemplate;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MachineSpecState {
    pub machine_type: String,
    pub accelerator_type: Option<String>,
    pub accelerator_count: Option<i64>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiskSpecState {
    pub disk_type: Option<String>,
    pub disk_size_gb: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NetworkSpecState {
    pub enable_internet_access: bool,
    pub network: Option<String>,
    pub subnetwork: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct IdleShutdownState {
    pub idle_timeout: Option<String>,
    pub idle_shutdown_disabled: bool,
}

/// A template as last read from the remote, with defaults applied.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TemplateState {
    pub name: String,
    pub display_name: String,
    pub description: Option<String>,
    pub is_default: bool,
    pub enable_secure_boot: bool,
    pub kms_key_name: Option<String>,
    pub machine_spec: MachineSpecState,
    pub data_persistent_disk_spec: DiskSpecState,
    pub network_spec: NetworkSpecState,
    pub idle_shutdown_config: IdleShutdownState,
    pub labels: Option<BTreeMap<String, String>>,
    pub service_account: Option<String>,
    pub notebook_runtime_type: Option<String>,
    pub etag: Option<String>,
    pub create_time: Option<DateTime<Utc>>,
    pub update_time: Option<DateTime<Utc>>,
}

impl TemplateState {
    /// Short identifier, the last segment of the resource name.
    pub fn id(&self) -> &str {
        self.name.rsplit('/').next().unwrap_or_default()
    }
}

impl From<&NotebookRuntimeTemplate> for TemplateState {
    fn from(remote: &NotebookRuntimeTemplate) -> Self {
        let machine = remote.machine_spec.clone().unwrap_or_default();
        let disk = remote.data_persistent_disk_spec.clone().unwrap_or_default();
        let network = remote.network_spec.clone().unwrap_or_default();
        let idle = remote.idle_shutdown_config.clone().unwrap_or_default();

        TemplateState {
            name: remote.name.clone().unwrap_or_default(),
            display_name: remote.display_name.clone().unwrap_or_default(),
            description: remote.description.clone(),
            is_default: remote.is_default.unwrap_or(false),
            enable_secure_boot: remote
                .shielded_vm_config
                .as_ref()
                .and_then(|c| c.enable_secure_boot)
                .unwrap_or(false),
            kms_key_name: remote.kms_key_name().map(str::to_string),
            machine_spec: MachineSpecState {
                machine_type: machine.machine_type.unwrap_or_default(),
                accelerator_type: machine.accelerator_type,
                accelerator_count: machine.accelerator_count,
            },
            data_persistent_disk_spec: DiskSpecState {
                disk_type: disk.disk_type,
                disk_size_gb: disk.disk_size_gb,
            },
            network_spec: NetworkSpecState {
                enable_internet_access: network.enable_internet_access.unwrap_or(false),
                network: network.network,
                subnetwork: network.subnetwork,
            },
            idle_shutdown_config: IdleShutdownState {
                idle_timeout: idle.idle_timeout,
                idle_shutdown_disabled: idle.idle_shutdown_disabled.unwrap_or(false),
            },
            labels: remote.labels.clone().filter(|labels| !labels.is_empty()),
            service_account: remote.service_account.clone(),
            notebook_runtime_type: remote.notebook_runtime_type.clone(),
            etag: remote.etag.clone(),
            create_time: remote.create_time,
            update_time: remote.update_time,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_omitted_values_get_zero_defaults() {
        let remote: NotebookRuntimeTemplate = serde_json::from_value(json!({
            "name": "projects/p/locations/l/notebookRuntimeTemplates/77",
            "displayName": "bare",
            "machineSpec": { "machineType": "e2-standard-4" }
        }))
        .unwrap();

        let state = TemplateState::from(&remote);
        assert_eq!(state.id(), "77");
        assert!(!state.is_default);
        assert!(!state.enable_secure_boot);
        assert!(!state.network_spec.enable_internet_access);
        assert!(!state.idle_shutdown_config.idle_shutdown_disabled);
        assert_eq!(state.data_persistent_disk_spec, DiskSpecState::default());
        assert_eq!(state.kms_key_name, None);
        assert_eq!(state.labels, None);
    }

    #[test]
    fn test_empty_labels_read_as_none() {
        let remote: NotebookRuntimeTemplate = serde_json::from_value(json!({
            "name": "projects/p/locations/l/notebookRuntimeTemplates/79",
            "labels": {}
        }))
        .unwrap();

        assert_eq!(TemplateState::from(&remote).labels, None);
    }

    #[test]
    fn test_present_values_are_kept() {
        let remote: NotebookRuntimeTemplate = serde_json::from_value(json!({
            "name": "projects/p/locations/l/notebookRuntimeTemplates/78",
            "displayName": "full",
            "isDefault": true,
            "shieldedVmConfig": { "enableSecureBoot": true },
            "encryptionSpec": { "kmsKeyName": "k1" },
            "networkSpec": { "enableInternetAccess": true },
            "idleShutdownConfig": { "idleTimeout": "3600s", "idleShutdownDisabled": false },
            "labels": { "env": "dev" }
        }))
        .unwrap();

        let state = TemplateState::from(&remote);
        assert!(state.is_default);
        assert!(state.enable_secure_boot);
        assert_eq!(state.kms_key_name.as_deref(), Some("k1"));
        assert!(state.network_spec.enable_internet_access);
        assert_eq!(
            state.idle_shutdown_config.idle_timeout.as_deref(),
            Some("3600s")
        );
        assert_eq!(state.labels.unwrap()["env"], "dev");
    }
}

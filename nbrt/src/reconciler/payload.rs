//! Mapping from declared configuration to wire payloads.

use nbrt_client::model::{
    DataPersistentDiskSpec, EncryptionSpec, IdleShutdownConfig, MachineSpec, NetworkSpec,
    ShieldedVmConfig,
};
use nbrt_client::{Field, FieldMask, NotebookRuntimeTemplate};

use super::fields::TemplateField;
use crate::config::TemplateConfig;

fn machine_spec(config: &TemplateConfig) -> MachineSpec {
    let machine = &config.machine_spec;
    let accelerator_type = machine.accelerator_type.clone();
    // A count is only meaningful next to a type, and only when positive.
    let accelerator_count = accelerator_type
        .as_ref()
        .and(machine.accelerator_count)
        .filter(|count| *count > 0);

    MachineSpec {
        machine_type: Some(machine.machine_type.clone()),
        accelerator_type,
        accelerator_count,
    }
}

/// Body of the create call. The encryption key is left out; the remote only
/// accepts it through a masked patch.
pub fn creation_payload(config: &TemplateConfig) -> NotebookRuntimeTemplate {
    NotebookRuntimeTemplate {
        display_name: Some(config.display_name.clone()),
        description: config.description.clone(),
        is_default: config.is_default,
        machine_spec: Some(machine_spec(config)),
        data_persistent_disk_spec: config.data_persistent_disk_spec.as_ref().map(|disk| {
            DataPersistentDiskSpec {
                disk_type: disk.disk_type.clone(),
                disk_size_gb: disk.disk_size_gb.clone(),
            }
        }),
        network_spec: config.network_spec.as_ref().map(|network| NetworkSpec {
            enable_internet_access: network.enable_internet_access,
            network: network.network.clone(),
            subnetwork: network.subnetwork.clone(),
        }),
        idle_shutdown_config: config
            .idle_shutdown_config
            .as_ref()
            .map(|idle| IdleShutdownConfig {
                idle_timeout: idle.idle_timeout.clone(),
                idle_shutdown_disabled: idle.idle_shutdown_disabled,
            }),
        shielded_vm_config: config.enable_secure_boot.map(|enabled| ShieldedVmConfig {
            enable_secure_boot: Some(enabled),
        }),
        labels: config.labels.clone(),
        ..Default::default()
    }
}

/// Body and mask of a partial update touching exactly `fields`.
///
/// The body carries the resource name plus the masked fields, nothing else.
pub fn patch_payload(
    name: &str,
    config: &TemplateConfig,
    fields: &[TemplateField],
) -> (NotebookRuntimeTemplate, FieldMask) {
    let full = creation_payload(config);
    let mut patch = NotebookRuntimeTemplate {
        name: Some(name.to_string()),
        ..Default::default()
    };
    let mut mask = FieldMask::new();

    for field in fields {
        mask.push(field.mask_path());
        match field {
            TemplateField::DisplayName => patch.display_name = full.display_name.clone(),
            TemplateField::Description => patch.description = full.description.clone(),
            TemplateField::IsDefault => patch.is_default = Some(config.is_default.unwrap_or(false)),
            TemplateField::EnableSecureBoot => {
                patch.shielded_vm_config = Some(ShieldedVmConfig {
                    enable_secure_boot: Some(config.enable_secure_boot.unwrap_or(false)),
                })
            }
            TemplateField::KmsKeyName => {
                // Not declared means nothing to send; an explicit null clears.
                let kms_key_name = match &config.kms_key_name {
                    Field::Unset => Field::Null,
                    other => other.clone(),
                };
                patch.encryption_spec = Some(EncryptionSpec { kms_key_name });
            }
            TemplateField::MachineSpec => patch.machine_spec = full.machine_spec.clone(),
            TemplateField::DataPersistentDiskSpec => {
                patch.data_persistent_disk_spec = full.data_persistent_disk_spec.clone()
            }
            TemplateField::NetworkSpec => patch.network_spec = full.network_spec.clone(),
            TemplateField::IdleShutdownConfig => {
                patch.idle_shutdown_config = full.idle_shutdown_config.clone()
            }
            TemplateField::Labels => patch.labels = full.labels.clone(),
        }
    }

    (patch, mask)
}

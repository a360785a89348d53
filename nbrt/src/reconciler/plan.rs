//! Diffing declared configuration against the last known state.

use nbrt_client::{Field, FieldMask};
use serde::Serialize;

use super::fields::{MutabilityTable, TemplateField};
use super::normalize::TemplateState;
use super::payload::creation_payload;
use crate::config::TemplateConfig;

/// What an apply would do.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum Plan {
    Create,
    NoOp,
    /// Every changed field can be patched in place.
    Update { fields: Vec<TemplateField> },
    /// These changed fields force delete-then-create.
    Replace { fields: Vec<TemplateField> },
}

impl Plan {
    /// Update mask for an in-place plan.
    pub fn mask(&self) -> Option<FieldMask> {
        match self {
            Plan::Update { fields } => Some(fields.iter().map(|f| f.mask_path()).collect()),
            _ => None,
        }
    }
}

/// Whether `field` is part of the declared configuration. Booleans count as
/// declared with their `false` default.
fn declared(config: &TemplateConfig, field: TemplateField) -> bool {
    match field {
        TemplateField::DisplayName
        | TemplateField::IsDefault
        | TemplateField::EnableSecureBoot
        | TemplateField::MachineSpec => true,
        TemplateField::Description => config.description.is_some(),
        TemplateField::KmsKeyName => !config.kms_key_name.is_unset(),
        TemplateField::DataPersistentDiskSpec => config.data_persistent_disk_spec.is_some(),
        TemplateField::NetworkSpec => config.network_spec.is_some(),
        TemplateField::IdleShutdownConfig => config.idle_shutdown_config.is_some(),
        TemplateField::Labels => config.labels.is_some(),
    }
}

/// The state a template created from `config` is expected to read back as.
pub fn expected_state(config: &TemplateConfig) -> TemplateState {
    let mut state = TemplateState::from(&creation_payload(config));
    if let Field::Value(key) = &config.kms_key_name {
        state.kms_key_name = Some(key.clone());
    }
    state
}

fn differs(field: TemplateField, want: &TemplateState, have: &TemplateState) -> bool {
    match field {
        TemplateField::DisplayName => want.display_name != have.display_name,
        TemplateField::Description => want.description != have.description,
        TemplateField::IsDefault => want.is_default != have.is_default,
        TemplateField::EnableSecureBoot => want.enable_secure_boot != have.enable_secure_boot,
        TemplateField::KmsKeyName => want.kms_key_name != have.kms_key_name,
        TemplateField::MachineSpec => want.machine_spec != have.machine_spec,
        TemplateField::DataPersistentDiskSpec => {
            want.data_persistent_disk_spec != have.data_persistent_disk_spec
        }
        TemplateField::NetworkSpec => want.network_spec != have.network_spec,
        TemplateField::IdleShutdownConfig => want.idle_shutdown_config != have.idle_shutdown_config,
        TemplateField::Labels => want.labels != have.labels,
    }
}

/// Fields declared in `desired` whose value differs from `state`.
pub fn diff(state: &TemplateState, desired: &TemplateConfig) -> Vec<TemplateField> {
    let want = expected_state(desired);
    TemplateField::ALL
        .into_iter()
        .filter(|field| declared(desired, *field) && differs(*field, &want, state))
        .collect()
}

pub fn plan(
    prior: Option<&TemplateState>,
    desired: &TemplateConfig,
    mutability: &MutabilityTable,
) -> Plan {
    let Some(prior) = prior else {
        return Plan::Create;
    };

    let changed = diff(prior, desired);
    if changed.is_empty() {
        return Plan::NoOp;
    }

    let immutable: Vec<TemplateField> = changed
        .iter()
        .copied()
        .filter(|field| !mutability.is_in_place(*field))
        .collect();
    if immutable.is_empty() {
        Plan::Update { fields: changed }
    } else {
        Plan::Replace { fields: immutable }
    }
}

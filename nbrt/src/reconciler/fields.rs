//! Managed attributes and how each one may change after creation.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

/// One top-level attribute of a template. Nested specs are a single field
/// each and always travel as a whole object.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TemplateField {
    DisplayName,
    Description,
    IsDefault,
    EnableSecureBoot,
    KmsKeyName,
    MachineSpec,
    DataPersistentDiskSpec,
    NetworkSpec,
    IdleShutdownConfig,
    Labels,
}

impl TemplateField {
    pub const ALL: [TemplateField; 10] = [
        TemplateField::DisplayName,
        TemplateField::Description,
        TemplateField::IsDefault,
        TemplateField::EnableSecureBoot,
        TemplateField::KmsKeyName,
        TemplateField::MachineSpec,
        TemplateField::DataPersistentDiskSpec,
        TemplateField::NetworkSpec,
        TemplateField::IdleShutdownConfig,
        TemplateField::Labels,
    ];

    /// Attribute name in configuration files.
    pub fn attribute(&self) -> &'static str {
        match self {
            TemplateField::DisplayName => "display_name",
            TemplateField::Description => "description",
            TemplateField::IsDefault => "is_default",
            TemplateField::EnableSecureBoot => "enable_secure_boot",
            TemplateField::KmsKeyName => "kms_key_name",
            TemplateField::MachineSpec => "machine_spec",
            TemplateField::DataPersistentDiskSpec => "data_persistent_disk_spec",
            TemplateField::NetworkSpec => "network_spec",
            TemplateField::IdleShutdownConfig => "idle_shutdown_config",
            TemplateField::Labels => "labels",
        }
    }

    /// Field path in an `updateMask`.
    pub fn mask_path(&self) -> &'static str {
        match self {
            TemplateField::DisplayName => "displayName",
            TemplateField::Description => "description",
            TemplateField::IsDefault => "isDefault",
            TemplateField::EnableSecureBoot => "shieldedVmConfig.enableSecureBoot",
            TemplateField::KmsKeyName => "encryptionSpec.kmsKeyName",
            TemplateField::MachineSpec => "machineSpec",
            TemplateField::DataPersistentDiskSpec => "dataPersistentDiskSpec",
            TemplateField::NetworkSpec => "networkSpec",
            TemplateField::IdleShutdownConfig => "idleShutdownConfig",
            TemplateField::Labels => "labels",
        }
    }
}

impl fmt::Display for TemplateField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.attribute())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mutability {
    /// Changed through a masked patch.
    InPlace,
    /// Changed only by deleting and recreating the template.
    Replace,
}

/// Per-field mutability. Fields without an entry require replacement.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MutabilityTable {
    entries: BTreeMap<TemplateField, Mutability>,
}

impl MutabilityTable {
    /// Every field requires replacement.
    pub fn immutable() -> Self {
        Self {
            entries: BTreeMap::new(),
        }
    }

    pub fn with(mut self, field: TemplateField, mutability: Mutability) -> Self {
        self.entries.insert(field, mutability);
        self
    }

    pub fn get(&self, field: TemplateField) -> Mutability {
        self.entries
            .get(&field)
            .copied()
            .unwrap_or(Mutability::Replace)
    }

    pub fn is_in_place(&self, field: TemplateField) -> bool {
        self.get(field) == Mutability::InPlace
    }
}

/// The remote API patches only the encryption key.
impl Default for MutabilityTable {
    fn default() -> Self {
        Self::immutable().with(TemplateField::KmsKeyName, Mutability::InPlace)
    }
}

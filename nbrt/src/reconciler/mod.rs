//! Reconciler for notebook runtime templates.
//!
//! Compares declared configuration with the template as last read from the
//! remote API and converges them: create when absent, masked patch for
//! in-place fields, and a `FieldImmutable` signal for everything else. The
//! caller decides whether an immutable change becomes delete-then-create.

mod fields;
mod normalize;
mod payload;
mod phase;
mod plan;

use std::sync::Arc;

use nbrt_client::{ClientError, NotebookRuntimeTemplate, TemplateApi};
use tracing::{debug, info, warn};

use crate::config::TemplateConfig;
use crate::error::{ReconcileError, Result};
use crate::validation::{ValidationPolicy, Violation, has_blocking, validate_with};

pub use fields::{Mutability, MutabilityTable, TemplateField};
pub use normalize::{
    DiskSpecState, IdleShutdownState, MachineSpecState, NetworkSpecState, TemplateState,
};
pub use payload::{creation_payload, patch_payload};
pub use phase::{ManagedTemplate, Phase};
pub use plan::{Plan, diff, expected_state};

/// Drives one template type against a [`TemplateApi`].
///
/// Holds no per-template state; callers serialize operations on the same
/// template themselves.
pub struct TemplateReconciler {
    api: Arc<dyn TemplateApi>,
    policy: ValidationPolicy,
    mutability: MutabilityTable,
}

impl TemplateReconciler {
    pub fn new(api: Arc<dyn TemplateApi>) -> Self {
        Self {
            api,
            policy: ValidationPolicy::default(),
            mutability: MutabilityTable::default(),
        }
    }

    pub fn with_policy(mut self, policy: ValidationPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn with_mutability(mut self, mutability: MutabilityTable) -> Self {
        self.mutability = mutability;
        self
    }

    pub fn policy(&self) -> ValidationPolicy {
        self.policy
    }

    pub fn mutability(&self) -> &MutabilityTable {
        &self.mutability
    }

    /// Fails on blocking violations. Warnings are logged and returned.
    pub fn validate(&self, desired: &TemplateConfig) -> Result<Vec<Violation>> {
        let violations = validate_with(desired, self.policy);
        if has_blocking(&violations) {
            return Err(ReconcileError::Validation(violations));
        }
        for violation in &violations {
            warn!(path = %violation.path, detail = %violation.detail, "{}", violation.summary);
        }
        Ok(violations)
    }

    pub fn plan(&self, prior: Option<&TemplateState>, desired: &TemplateConfig) -> Plan {
        plan::plan(prior, desired, &self.mutability)
    }

    /// Creates the template, sets its encryption key if one is declared, and
    /// returns it as read back.
    ///
    /// A failure after the create call succeeded leaves the template behind;
    /// it shows up in [`list`](Self::list).
    pub async fn create(&self, desired: &TemplateConfig) -> Result<TemplateState> {
        self.validate(desired)?;
        let (name, created) = self.create_remote(desired).await?;
        self.finish_create(&name, created, desired).await
    }

    async fn create_remote(&self, desired: &TemplateConfig) -> Result<(String, NotebookRuntimeTemplate)> {
        let payload = creation_payload(desired);
        let created = self
            .api
            .create(&payload)
            .await
            .map_err(|e| ReconcileError::api("create", &desired.display_name, e))?;
        let name = created
            .name
            .clone()
            .ok_or_else(|| ReconcileError::api("create", &desired.display_name, ClientError::MissingName))?;
        info!(name = %name, display_name = %desired.display_name, "Template created");
        Ok((name, created))
    }

    async fn finish_create(
        &self,
        name: &str,
        created: NotebookRuntimeTemplate,
        desired: &TemplateConfig,
    ) -> Result<TemplateState> {
        if !desired.kms_key_name.is_value() {
            return Ok(TemplateState::from(&created));
        }
        let (patch, mask) = patch_payload(name, desired, &[TemplateField::KmsKeyName]);
        self.api
            .update(&patch, &mask)
            .await
            .map_err(|e| ReconcileError::api("update", name, e))?;
        info!(name = %name, "Encryption key set");
        self.read_existing(name).await
    }

    /// `None` when the template is no longer in the remote list. A failing
    /// list call, 404 included, is an error.
    pub async fn read(&self, name: &str) -> Result<Option<TemplateState>> {
        match self.api.get(name).await {
            Ok(template) => Ok(Some(TemplateState::from(&template))),
            Err(ClientError::NotFound(_)) => {
                debug!(name = %name, "Template not found");
                Ok(None)
            }
            Err(e) => Err(ReconcileError::api("read", name, e)),
        }
    }

    async fn read_existing(&self, name: &str) -> Result<TemplateState> {
        self.read(name).await?.ok_or_else(|| {
            ReconcileError::api("read", name, ClientError::NotFound(name.to_string()))
        })
    }

    /// Every template in the project and location, normalized.
    pub async fn list(&self) -> Result<Vec<TemplateState>> {
        let templates = self
            .api
            .list()
            .await
            .map_err(|e| ReconcileError::api("list", "*", e))?;
        Ok(templates.iter().map(TemplateState::from).collect())
    }

    /// Patches in-place fields. Any changed field that needs replacement
    /// fails with [`ReconcileError::FieldImmutable`] before a request is sent.
    pub async fn update(&self, prior: &TemplateState, desired: &TemplateConfig) -> Result<TemplateState> {
        self.validate(desired)?;
        self.patch(prior, desired).await
    }

    async fn patch(&self, prior: &TemplateState, desired: &TemplateConfig) -> Result<TemplateState> {
        let fields = match self.plan(Some(prior), desired) {
            Plan::Update { fields } => fields,
            Plan::Replace { fields } => {
                return Err(ReconcileError::FieldImmutable {
                    name: prior.name.clone(),
                    fields,
                });
            }
            Plan::NoOp | Plan::Create => return Ok(prior.clone()),
        };

        let (patch, mask) = patch_payload(&prior.name, desired, &fields);
        self.api
            .update(&patch, &mask)
            .await
            .map_err(|e| ReconcileError::api("update", &prior.name, e))?;
        info!(name = %prior.name, mask = %mask, "Template updated");
        self.read_existing(&prior.name).await
    }

    /// Deletes by name. A template that is already gone counts as deleted.
    pub async fn delete(&self, name: &str) -> Result<()> {
        match self.api.delete(name).await {
            Ok(()) => Ok(()),
            Err(e) if e.is_not_found() => {
                warn!(name = %name, "Template already gone");
                Ok(())
            }
            Err(e) => Err(ReconcileError::api("delete", name, e)),
        }
    }

    /// Converges `managed` on `desired`.
    ///
    /// Refreshes first, then creates, patches or, when `replace` is set,
    /// deletes and recreates. Without `replace` an immutable change fails
    /// with [`ReconcileError::FieldImmutable`] and nothing is sent.
    pub async fn apply(
        &self,
        managed: &mut ManagedTemplate,
        desired: &TemplateConfig,
        replace: bool,
    ) -> Result<Plan> {
        self.validate(desired)?;
        self.refresh(managed).await?;

        let prior = managed.state.clone();
        let plan = self.plan(prior.as_ref(), desired);
        match (&plan, prior) {
            (Plan::NoOp, _) => {
                debug!(name = managed.name.as_deref().unwrap_or("-"), "Template up to date");
            }
            (Plan::Update { .. }, Some(prior)) => self.apply_update(managed, &prior, desired).await?,
            (Plan::Replace { fields }, Some(prior)) => {
                if !replace {
                    return Err(ReconcileError::FieldImmutable {
                        name: prior.name,
                        fields: fields.clone(),
                    });
                }
                info!(name = %prior.name, fields = ?fields, "Replacing template");
                self.destroy(managed).await?;
                self.apply_create(managed, desired).await?;
            }
            _ => self.apply_create(managed, desired).await?,
        }
        Ok(plan)
    }

    async fn apply_create(&self, managed: &mut ManagedTemplate, desired: &TemplateConfig) -> Result<()> {
        managed.transition(Phase::Creating)?;
        let (name, created) = match self.create_remote(desired).await {
            Ok(created) => created,
            Err(e) => {
                managed.transition(Phase::Absent)?;
                managed.last_error = Some(e.to_string());
                return Err(e);
            }
        };

        managed.name = Some(name.clone());
        match self.finish_create(&name, created, desired).await {
            Ok(state) => managed.settle(state),
            Err(e) => {
                managed.fail(&e);
                Err(e)
            }
        }
    }

    async fn apply_update(
        &self,
        managed: &mut ManagedTemplate,
        prior: &TemplateState,
        desired: &TemplateConfig,
    ) -> Result<()> {
        managed.transition(Phase::Updating)?;
        match self.patch(prior, desired).await {
            Ok(state) => managed.settle(state),
            Err(e) => {
                managed.fail(&e);
                Err(e)
            }
        }
    }

    /// Re-reads a tracked template. One that vanished remotely goes back to
    /// `Absent`; the caller decides whether to recreate it.
    ///
    /// A template left in `Creating`, `Updating` or `Deleting` by an
    /// interrupted run is rejected with [`ReconcileError::InvalidTransition`].
    pub async fn refresh(&self, managed: &mut ManagedTemplate) -> Result<()> {
        if managed.phase.is_in_flight() {
            return Err(ReconcileError::InvalidTransition {
                from: managed.phase,
                to: Phase::Present,
            });
        }
        let Some(name) = managed.name.clone() else {
            return Ok(());
        };
        match self.read(&name).await {
            Ok(Some(state)) => managed.settle(state),
            Ok(None) => {
                warn!(name = %name, "Template removed outside of nbrt");
                managed.forget()
            }
            Err(e) => {
                managed.fail(&e);
                Err(e)
            }
        }
    }

    /// Deletes a tracked template and forgets it.
    pub async fn destroy(&self, managed: &mut ManagedTemplate) -> Result<()> {
        let Some(name) = managed.name.clone() else {
            debug!("Nothing to destroy");
            return Ok(());
        };
        managed.transition(Phase::Deleting)?;
        match self.delete(&name).await {
            Ok(()) => {
                info!(name = %name, "Template destroyed");
                managed.forget()
            }
            Err(e) => {
                managed.fail(&e);
                Err(e)
            }
        }
    }
}

//! Lifecycle phase of a managed template.

use std::fmt;

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use super::normalize::TemplateState;
use crate::error::{ReconcileError, Result};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    #[default]
    Absent,
    Creating,
    Present,
    Updating,
    Deleting,
    Failed,
}

impl Phase {
    /// A remote call was under way when this phase was entered.
    pub fn is_in_flight(self) -> bool {
        matches!(self, Phase::Creating | Phase::Updating | Phase::Deleting)
    }

    pub fn can_transition_to(self, next: Phase) -> bool {
        use Phase::*;
        matches!(
            (self, next),
            (Absent, Creating)
                | (Creating, Present)
                | (Creating, Failed)
                // The create call itself failed; nothing exists remotely.
                | (Creating, Absent)
                | (Present, Updating)
                | (Present, Deleting)
                | (Present, Failed)
                | (Present, Absent)
                | (Updating, Present)
                | (Updating, Failed)
                | (Deleting, Absent)
                | (Deleting, Failed)
                | (Failed, Updating)
                | (Failed, Deleting)
                | (Failed, Present)
                | (Failed, Absent)
        )
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Phase::Absent => "absent",
            Phase::Creating => "creating",
            Phase::Present => "present",
            Phase::Updating => "updating",
            Phase::Deleting => "deleting",
            Phase::Failed => "failed",
        };
        f.write_str(s)
    }
}

/// One template tracked by identifier across runs.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ManagedTemplate {
    /// Full resource name once the remote has assigned one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default)]
    pub phase: Phase,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub state: Option<TemplateState>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_error: Option<String>,
}

impl ManagedTemplate {
    pub fn transition(&mut self, next: Phase) -> Result<()> {
        if !self.phase.can_transition_to(next) {
            return Err(ReconcileError::InvalidTransition {
                from: self.phase,
                to: next,
            });
        }
        info!(
            name = self.name.as_deref().unwrap_or("-"),
            from = %self.phase,
            to = %next,
            "Template phase changed"
        );
        self.phase = next;
        Ok(())
    }

    /// Enters `Failed` and records the error. Already failed is fine.
    pub(crate) fn fail(&mut self, err: &ReconcileError) {
        self.last_error = Some(err.to_string());
        if self.phase == Phase::Failed {
            return;
        }
        if self.phase.can_transition_to(Phase::Failed) {
            self.phase = Phase::Failed;
            info!(name = self.name.as_deref().unwrap_or("-"), "Template failed: {err}");
        } else {
            // Absent has nothing to fail; the error is still recorded.
            debug!(phase = %self.phase, error = %err, "Not entering failed phase");
        }
    }

    /// Back to `Absent` with nothing remembered.
    pub(crate) fn forget(&mut self) -> Result<()> {
        self.transition(Phase::Absent)?;
        self.name = None;
        self.state = None;
        self.last_error = None;
        Ok(())
    }

    /// Settles on `Present` with freshly read state.
    pub(crate) fn settle(&mut self, state: TemplateState) -> Result<()> {
        if self.phase != Phase::Present {
            self.transition(Phase::Present)?;
        }
        self.name = Some(state.name.clone());
        self.state = Some(state);
        self.last_error = None;
        Ok(())
    }
}

//! Cross-field checks on a declared configuration.
//!
//! Every check runs on every call so one pass reports all problems. Checks on
//! optional attributes are advisory by default; missing required attributes
//! always block.

use std::fmt;

use serde::Serialize;

use crate::config::TemplateConfig;

/// Lower bound of the idle timeout, in seconds.
pub const MIN_IDLE_TIMEOUT_SECS: i64 = 600;
/// Upper bound of the idle timeout, in seconds.
pub const MAX_IDLE_TIMEOUT_SECS: i64 = 86_400;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Warning,
    Blocking,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Severity::Warning => write!(f, "warning"),
            Severity::Blocking => write!(f, "error"),
        }
    }
}

/// How advisory checks are reported.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ValidationPolicy {
    /// Advisory checks are warnings; only missing required attributes block.
    #[default]
    Advisory,
    /// Every violation blocks.
    Strict,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Violation {
    /// Dotted attribute path, e.g. `network_spec.subnetwork`.
    pub path: String,
    pub summary: String,
    pub detail: String,
    pub severity: Severity,
}

impl fmt::Display for Violation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} [{}]: {}", self.severity, self.path, self.summary)
    }
}

struct Checker {
    advisory: Severity,
    violations: Vec<Violation>,
}

impl Checker {
    fn advise(&mut self, path: &str, summary: &str, detail: &str) {
        let severity = self.advisory;
        self.push(path, summary, detail, severity);
    }

    fn block(&mut self, path: &str, summary: &str, detail: &str) {
        self.push(path, summary, detail, Severity::Blocking);
    }

    fn push(&mut self, path: &str, summary: &str, detail: &str, severity: Severity) {
        self.violations.push(Violation {
            path: path.to_string(),
            summary: summary.to_string(),
            detail: detail.to_string(),
            severity,
        });
    }
}

/// Validates under [`ValidationPolicy::Advisory`].
pub fn validate(config: &TemplateConfig) -> Vec<Violation> {
    validate_with(config, ValidationPolicy::Advisory)
}

pub fn validate_with(config: &TemplateConfig, policy: ValidationPolicy) -> Vec<Violation> {
    let mut checker = Checker {
        advisory: match policy {
            ValidationPolicy::Advisory => Severity::Warning,
            ValidationPolicy::Strict => Severity::Blocking,
        },
        violations: Vec::new(),
    };

    check_idle_shutdown(config, &mut checker);
    check_network(config, &mut checker);
    check_accelerator(config, &mut checker);
    check_required(config, &mut checker);

    checker.violations
}

pub fn has_blocking(violations: &[Violation]) -> bool {
    violations.iter().any(|v| v.severity == Severity::Blocking)
}

/// Seconds of an idle timeout string. A trailing `s` is stripped if present.
pub fn idle_timeout_seconds(value: &str) -> Option<i64> {
    value.strip_suffix('s').unwrap_or(value).parse().ok()
}

fn check_idle_shutdown(config: &TemplateConfig, checker: &mut Checker) {
    let Some(idle) = &config.idle_shutdown_config else {
        return;
    };

    if idle.idle_shutdown_disabled == Some(true) && idle.idle_timeout.is_some() {
        checker.advise(
            "idle_shutdown_config.idle_shutdown_disabled",
            "idle_shutdown_disabled can't be set to true and have a value in idle_timeout",
            "Expected idle_timeout to be unset if idle_shutdown_disabled is true.",
        );
    }

    let Some(timeout) = &idle.idle_timeout else {
        return;
    };
    if !timeout.ends_with('s') {
        checker.advise(
            "idle_shutdown_config.idle_timeout",
            "idle_timeout must end in 's'",
            "Expected idle_timeout to end in 's' as it is defined in seconds.",
        );
    }
    match idle_timeout_seconds(timeout) {
        None => checker.advise(
            "idle_shutdown_config.idle_timeout",
            "idle_timeout must end in 's' and be a valid integer",
            "Expected idle_timeout to be an integer number of seconds.",
        ),
        Some(secs) if !(MIN_IDLE_TIMEOUT_SECS..=MAX_IDLE_TIMEOUT_SECS).contains(&secs) => {
            checker.advise(
                "idle_shutdown_config.idle_timeout",
                "idle_timeout must be a valid integer between 600 and 86400",
                "Expected idle_timeout to be between 600 and 86400 seconds.",
            )
        }
        Some(_) => {}
    }
}

// An absent network spec counts as internet access disabled.
fn check_network(config: &TemplateConfig, checker: &mut Checker) {
    let network = config.network_spec.clone().unwrap_or_default();
    if network.enable_internet_access.unwrap_or(false) {
        return;
    }
    if network.network.is_none() {
        checker.advise(
            "network_spec.network",
            "network can't be unset if enable_internet_access is false",
            "Expected network to be configured.",
        );
    }
    if network.subnetwork.is_none() {
        checker.advise(
            "network_spec.subnetwork",
            "subnetwork can't be unset if enable_internet_access is false",
            "Expected subnetwork to be configured.",
        );
    }
}

fn check_accelerator(config: &TemplateConfig, checker: &mut Checker) {
    let machine = &config.machine_spec;
    if machine.accelerator_type.is_none() && machine.accelerator_count.is_some() {
        checker.advise(
            "machine_spec.accelerator_count",
            "accelerator_count must be unset if accelerator_type is unset",
            "Expected accelerator_count to not be configured.",
        );
    }
}

fn check_required(config: &TemplateConfig, checker: &mut Checker) {
    if config.display_name.trim().is_empty() {
        checker.block(
            "display_name",
            "display_name is required",
            "The remote API rejects templates without a display name.",
        );
    }
    if config.machine_spec.machine_type.trim().is_empty() {
        checker.block(
            "machine_spec.machine_type",
            "machine_type is required",
            "Expected machine_spec.machine_type to be configured.",
        );
    }
}

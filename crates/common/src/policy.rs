//! Reset policy
//!
//! Decides whether a destructive database reset may run at a given trigger
//! point. The locality gate runs before any trigger-specific logic: a host
//! that is not a loopback name is never reset unless
//! `DB_RESET_ALLOW_NON_LOCAL` is explicitly true.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::Error;

/// Hostnames treated as the local machine
pub const LOCAL_HOSTS: [&str; 3] = ["localhost", "127.0.0.1", "::1"];

/// Lifecycle point at which a reset decision is evaluated
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ResetTrigger {
    /// Ad hoc invocation from test code or the CLI
    #[serde(rename = "task")]
    ManualTask,
    BeforeRun,
    AfterRun,
    BeforeScenario,
    AfterScenario,
}

impl ResetTrigger {
    pub const ALL: [ResetTrigger; 5] = [
        ResetTrigger::ManualTask,
        ResetTrigger::BeforeRun,
        ResetTrigger::AfterRun,
        ResetTrigger::BeforeScenario,
        ResetTrigger::AfterScenario,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ResetTrigger::ManualTask => "task",
            ResetTrigger::BeforeRun => "before-run",
            ResetTrigger::AfterRun => "after-run",
            ResetTrigger::BeforeScenario => "before-scenario",
            ResetTrigger::AfterScenario => "after-scenario",
        }
    }
}

impl fmt::Display for ResetTrigger {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ResetTrigger {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "task" | "manual" | "manual-task" => Ok(ResetTrigger::ManualTask),
            "before-run" => Ok(ResetTrigger::BeforeRun),
            "after-run" => Ok(ResetTrigger::AfterRun),
            "before-scenario" => Ok(ResetTrigger::BeforeScenario),
            "after-scenario" => Ok(ResetTrigger::AfterScenario),
            _ => Err(Error::InvalidTrigger(s.to_string())),
        }
    }
}

/// Normalise a loosely typed flag value.
///
/// Returns `None` for absent, empty or unrecognised values.
pub fn parse_flag(value: Option<&str>) -> Option<bool> {
    match value?.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "y" | "on" => Some(true),
        "0" | "false" | "no" | "n" | "off" => Some(false),
        _ => None,
    }
}

/// Per-trigger overrides; `None` means unspecified
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ResetFlags {
    pub allow_non_local: Option<bool>,
    pub on_run: Option<bool>,
    pub after_run: Option<bool>,
    pub before_spec: Option<bool>,
    pub after_spec: Option<bool>,
}

/// Why a reset was refused before trigger rules were consulted
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SkipReason {
    NonLocalHost,
    InvalidConnectionString,
    /// Teardown of a run that found the server already running; never
    /// produced by [`decide`]
    ServerNotOwned,
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SkipReason::NonLocalHost => f.write_str("non-local host not allowed"),
            SkipReason::InvalidConnectionString => f.write_str("invalid connection string"),
            SkipReason::ServerNotOwned => f.write_str("server not launched by this run"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResetDecision {
    pub enabled: bool,
    pub reason: Option<SkipReason>,
}

impl ResetDecision {
    fn refused(reason: SkipReason) -> Self {
        Self {
            enabled: false,
            reason: Some(reason),
        }
    }

    fn resolved(enabled: bool) -> Self {
        Self {
            enabled,
            reason: None,
        }
    }
}

/// Whether `host` names the local machine
pub fn is_local_host(host: &str) -> bool {
    let host = host.trim();
    let host = host
        .strip_prefix('[')
        .and_then(|h| h.strip_suffix(']'))
        .unwrap_or(host);
    LOCAL_HOSTS.iter().any(|local| local.eq_ignore_ascii_case(host))
}

/// Decide whether a reset runs for `trigger` against `host`.
///
/// `host` is `None` when the connection string could not be resolved. An
/// unknown host is not local, so it meets the locality gate first and is
/// only reported as an invalid connection string once non-local resets are
/// allowed.
pub fn decide(trigger: ResetTrigger, host: Option<&str>, flags: &ResetFlags) -> ResetDecision {
    let local = host.is_some_and(is_local_host);
    if !local && flags.allow_non_local != Some(true) {
        return ResetDecision::refused(SkipReason::NonLocalHost);
    }
    if host.is_none() {
        return ResetDecision::refused(SkipReason::InvalidConnectionString);
    }

    let auto_enabled = local;
    let enabled = match trigger {
        ResetTrigger::ManualTask => true,
        ResetTrigger::BeforeRun => flags.on_run.unwrap_or(auto_enabled),
        ResetTrigger::AfterRun => flags.after_run.unwrap_or(auto_enabled),
        // Scenario-level resets are opt-in
        ResetTrigger::BeforeScenario => flags.before_spec.unwrap_or(false),
        ResetTrigger::AfterScenario => flags.after_spec.unwrap_or(false),
    };
    ResetDecision::resolved(enabled)
}

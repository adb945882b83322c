//! Scenario state

use std::collections::HashMap;

use qatrain_common::{ConnectionDescriptor, HarnessConfig};
use qatrain_e2e::ResetPlan;

/// Settings a scenario declares, and what it observed
#[derive(Debug, Default, cucumber::World)]
pub struct HarnessWorld {
    /// Environment seen by the harness; never the real process environment
    pub env: HashMap<String, String>,
    pub resolved: Option<Result<ConnectionDescriptor, String>>,
    pub plan: Option<ResetPlan>,
}

impl HarnessWorld {
    pub fn config(&self) -> HarnessConfig {
        HarnessConfig::default().with_env(|key| self.env.get(key).cloned())
    }

    pub fn descriptor(&self) -> &ConnectionDescriptor {
        match self.resolved.as_ref() {
            Some(Ok(descriptor)) => descriptor,
            Some(Err(e)) => panic!("connection string did not resolve: {e}"),
            None => panic!("connection string was not resolved"),
        }
    }

    pub fn plan(&self) -> &ResetPlan {
        self.plan.as_ref().expect("reset was not planned")
    }
}

//! Run lifecycle hooks that tie server bootstrapping to database resets

use serde::Serialize;
use tokio::sync::Mutex;
use tracing::{debug, error, info, warn};

use qatrain_common::{HarnessConfig, ResetTrigger, SkipReason};

use crate::error::E2eResult;
use crate::launch::{LaunchConfig, LaunchSpec};
use crate::reset::{DatabaseResetter, FixtureLoader, MySqlLoader, ResetOutcome};
use crate::server::{ensure_ready, Bootstrap, Readiness, ServerProcessHandle};

/// What happened to the server at teardown
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", content = "detail", rename_all = "kebab-case")]
pub enum ServerTeardown {
    /// The server was not launched by this run and was left running
    NotOwned,
    Stopped,
    Failed(String),
}

/// Outcome of both teardown phases; neither phase prevents the other
#[derive(Debug, Clone, Serialize)]
pub struct TeardownReport {
    pub reset: Result<ResetOutcome, String>,
    pub server: ServerTeardown,
}

/// Hooks for one test run: before/after the run, around each scenario, and
/// the manual reset task
pub struct RunLifecycle<L = MySqlLoader> {
    resetter: DatabaseResetter<L>,
    readiness: Readiness,
    launch: LaunchSpec,
    server: Mutex<Option<ServerProcessHandle>>,
}

impl RunLifecycle<MySqlLoader> {
    pub fn from_config(config: &HarnessConfig) -> E2eResult<Self> {
        let readiness = Readiness::from_settings(&config.server)?;
        let launch = LaunchConfig::from_config(config)?.to_spec();
        let resetter = DatabaseResetter::new(config.database.clone());
        Ok(Self::new(resetter, readiness, launch))
    }
}

impl<L: FixtureLoader> RunLifecycle<L> {
    pub fn new(resetter: DatabaseResetter<L>, readiness: Readiness, launch: LaunchSpec) -> Self {
        Self {
            resetter,
            readiness,
            launch,
            server: Mutex::new(None),
        }
    }

    pub fn resetter(&self) -> &DatabaseResetter<L> {
        &self.resetter
    }

    pub fn readiness(&self) -> &Readiness {
        &self.readiness
    }

    /// Whether this run launched the server it is using
    pub async fn owns_server(&self) -> bool {
        self.server.lock().await.is_some()
    }

    /// Bring the server up, then apply the `before-run` reset.
    ///
    /// Errors abort the run. A server launched here is stopped again when
    /// the reset fails.
    pub async fn before_run(&self) -> E2eResult<ResetOutcome> {
        match ensure_ready(&self.readiness, &self.launch).await? {
            Bootstrap::AlreadyRunning => {}
            Bootstrap::Launched(handle) => {
                *self.server.lock().await = Some(handle);
            }
        }

        match self.resetter.reset(ResetTrigger::BeforeRun).await {
            Ok(outcome) => Ok(outcome),
            Err(e) => {
                error!(error = %e, "before-run reset failed, aborting run");
                self.stop_server().await;
                Err(e)
            }
        }
    }

    pub async fn before_scenario(&self, scenario: &str) -> E2eResult<ResetOutcome> {
        debug!(scenario, "before-scenario hook");
        self.resetter.reset(ResetTrigger::BeforeScenario).await
    }

    pub async fn after_scenario(&self, scenario: &str) -> E2eResult<ResetOutcome> {
        debug!(scenario, "after-scenario hook");
        self.resetter.reset(ResetTrigger::AfterScenario).await
    }

    /// Reset on explicit request from test code
    pub async fn task(&self) -> E2eResult<ResetOutcome> {
        self.resetter.reset(ResetTrigger::ManualTask).await
    }

    /// Two-phase teardown for a server this run launched: attempt the
    /// `after-run` reset, then stop the server whatever the reset did.
    ///
    /// A server found already running is left untouched, database included.
    pub async fn after_run(&self) -> TeardownReport {
        let reset = if !self.owns_server().await {
            info!("server not launched by this run, skipping after-run reset");
            Ok(ResetOutcome::Skipped {
                trigger: ResetTrigger::AfterRun,
                reason: Some(SkipReason::ServerNotOwned),
            })
        } else {
            match self.resetter.reset(ResetTrigger::AfterRun).await {
                Ok(outcome) => Ok(outcome),
                Err(e) => {
                    error!(error = %e, "after-run reset failed");
                    Err(e.to_string())
                }
            }
        };

        let server = self.stop_server().await;
        info!(?server, "teardown complete");
        TeardownReport { reset, server }
    }

    async fn stop_server(&self) -> ServerTeardown {
        let Some(handle) = self.server.lock().await.take() else {
            return ServerTeardown::NotOwned;
        };
        match handle.terminate().await {
            Ok(()) => ServerTeardown::Stopped,
            Err(e) => {
                warn!(error = %e, "failed to stop server");
                ServerTeardown::Failed(e.to_string())
            }
        }
    }
}

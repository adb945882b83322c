//! Fixture database reset
//!
//! A reset replaces the database contents by running the fixture script as a
//! single multi-statement batch. Nothing is rolled back: a script that fails
//! halfway is reported as an error and leaves whatever it already applied.

use std::path::{Path, PathBuf};
use std::time::Instant;

use async_trait::async_trait;
use serde::Serialize;
use sqlx::mysql::{MySqlConnectOptions, MySqlSslMode};
use sqlx::{ConnectOptions, Connection};
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use qatrain_common::{decide, ConnectionDescriptor, DatabaseSettings, ResetDecision, ResetTrigger, SkipReason};

use crate::error::{E2eError, E2eResult};

const BYTE_ORDER_MARK: char = '\u{feff}';

/// SQL batch restoring the baseline data
#[derive(Debug, Clone)]
pub struct FixtureScript {
    path: PathBuf,
    sql: String,
}

impl FixtureScript {
    /// Read the script from disk
    pub fn load(path: &Path) -> E2eResult<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                E2eError::ResetExecution(format!("fixture script not found: {}", path.display()))
            } else {
                E2eError::ResetExecution(format!(
                    "failed to read fixture script {}: {e}",
                    path.display()
                ))
            }
        })?;
        Self::from_sql(path, content)
    }

    pub fn from_sql(path: impl Into<PathBuf>, sql: impl Into<String>) -> E2eResult<Self> {
        let path = path.into();
        let mut sql = sql.into();
        if sql.starts_with(BYTE_ORDER_MARK) {
            sql.drain(..BYTE_ORDER_MARK.len_utf8());
        }
        if sql.trim().is_empty() {
            return Err(E2eError::ResetExecution(format!(
                "fixture script {} is empty",
                path.display()
            )));
        }
        Ok(Self { path, sql })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn sql(&self) -> &str {
        &self.sql
    }
}

/// Applies a fixture script to a database
#[async_trait]
pub trait FixtureLoader: Send + Sync {
    /// Run `script` as one batch against `target`, returning rows affected
    async fn apply(&self, target: &ConnectionDescriptor, script: &FixtureScript) -> E2eResult<u64>;
}

/// Loads fixtures into MySQL
#[derive(Debug, Clone, Copy, Default)]
pub struct MySqlLoader;

impl MySqlLoader {
    pub fn connect_options(target: &ConnectionDescriptor) -> MySqlConnectOptions {
        let ssl_mode = if target.tls {
            MySqlSslMode::Required
        } else {
            MySqlSslMode::Preferred
        };
        let mut options = MySqlConnectOptions::new()
            .host(&target.host)
            .port(target.port)
            .database(&target.database)
            .ssl_mode(ssl_mode);
        if let Some(user) = &target.user {
            options = options.username(user);
        }
        if let Some(password) = &target.password {
            options = options.password(password);
        }
        options
    }
}

#[async_trait]
impl FixtureLoader for MySqlLoader {
    async fn apply(&self, target: &ConnectionDescriptor, script: &FixtureScript) -> E2eResult<u64> {
        let mut conn = Self::connect_options(target)
            .connect()
            .await
            .map_err(|e| E2eError::ResetExecution(format!("cannot connect to {target}: {e}")))?;

        // Method-call form trips a higher-ranked lifetime error inside async_trait
        let result = sqlx::Executor::execute(&mut conn, sqlx::raw_sql(script.sql())).await;

        if let Err(e) = conn.close().await {
            warn!(%target, error = %e, "failed to close reset connection");
        }

        let done = result.map_err(|e| {
            E2eError::ResetExecution(format!(
                "{} rejected by {target}: {e}",
                script.path().display()
            ))
        })?;
        Ok(done.rows_affected())
    }
}

/// What a reset attempt did
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "kebab-case")]
pub enum ResetOutcome {
    Skipped {
        trigger: ResetTrigger,
        reason: Option<SkipReason>,
    },
    Applied {
        trigger: ResetTrigger,
        target: String,
        script: PathBuf,
        rows_affected: u64,
        elapsed_ms: u64,
    },
}

impl ResetOutcome {
    pub fn trigger(&self) -> ResetTrigger {
        match self {
            ResetOutcome::Skipped { trigger, .. } | ResetOutcome::Applied { trigger, .. } => *trigger,
        }
    }

    pub fn is_applied(&self) -> bool {
        matches!(self, ResetOutcome::Applied { .. })
    }
}

/// Policy evaluation for one trigger, without touching the database
#[derive(Debug, Clone)]
pub struct ResetPlan {
    pub trigger: ResetTrigger,
    pub decision: ResetDecision,
    /// `None` when the connection string did not resolve
    pub target: Option<ConnectionDescriptor>,
}

/// Gates and executes fixture resets; one at a time
pub struct DatabaseResetter<L = MySqlLoader> {
    settings: DatabaseSettings,
    loader: L,
    running: Mutex<()>,
}

impl DatabaseResetter<MySqlLoader> {
    pub fn new(settings: DatabaseSettings) -> Self {
        Self::with_loader(settings, MySqlLoader)
    }
}

impl<L: FixtureLoader> DatabaseResetter<L> {
    pub fn with_loader(settings: DatabaseSettings, loader: L) -> Self {
        Self {
            settings,
            loader,
            running: Mutex::new(()),
        }
    }

    pub fn settings(&self) -> &DatabaseSettings {
        &self.settings
    }

    pub fn loader(&self) -> &L {
        &self.loader
    }

    /// Resolve the connection string and apply the reset policy
    pub fn plan(&self, trigger: ResetTrigger) -> ResetPlan {
        let target = match self.settings.descriptor() {
            Ok(descriptor) => Some(descriptor),
            Err(e) => {
                warn!(%trigger, error = %e, "cannot resolve database connection string");
                None
            }
        };
        let host = target.as_ref().map(|t| t.host.as_str());
        let decision = decide(trigger, host, &self.settings.reset);
        ResetPlan {
            trigger,
            decision,
            target,
        }
    }

    /// Reset the database if the policy allows it for `trigger`
    pub async fn reset(&self, trigger: ResetTrigger) -> E2eResult<ResetOutcome> {
        let _running = self.running.lock().await;

        let plan = self.plan(trigger);
        let target = match (plan.decision.enabled, plan.target) {
            (true, Some(target)) => target,
            _ => {
                match plan.decision.reason {
                    Some(reason) => info!(%trigger, %reason, "database reset skipped"),
                    None => debug!(%trigger, "database reset not enabled for trigger"),
                }
                return Ok(ResetOutcome::Skipped {
                    trigger,
                    reason: plan.decision.reason,
                });
            }
        };

        let script = FixtureScript::load(&self.settings.reset_sql_file)?;
        info!(%trigger, %target, script = %script.path().display(), "resetting database");

        let start = Instant::now();
        let rows_affected = self.loader.apply(&target, &script).await?;
        let elapsed_ms = start.elapsed().as_millis() as u64;

        info!(%trigger, %target, rows_affected, elapsed_ms, "database reset complete");
        Ok(ResetOutcome::Applied {
            trigger,
            target: target.to_string(),
            script: script.path().to_path_buf(),
            rows_affected,
            elapsed_ms,
        })
    }
}

//! Bring the application server up for interactive use

use anyhow::Result;
use serde::Serialize;
use tracing::info;

use qatrain_common::HarnessConfig;
use qatrain_e2e::{ResetOutcome, RunLifecycle, ServerTeardown, TeardownReport};

use crate::output::{print_error, print_info, print_item, print_success, OutputFormat, TableDisplay};

#[derive(Debug, Serialize)]
pub struct TeardownDisplay {
    pub reset: String,
    pub server: String,
}

impl From<&TeardownReport> for TeardownDisplay {
    fn from(report: &TeardownReport) -> Self {
        let reset = match &report.reset {
            Ok(ResetOutcome::Applied { .. }) => "applied".to_string(),
            Ok(ResetOutcome::Skipped { reason: Some(reason), .. }) => format!("skipped ({reason})"),
            Ok(ResetOutcome::Skipped { reason: None, .. }) => "skipped".to_string(),
            Err(e) => format!("failed: {e}"),
        };
        let server = match &report.server {
            ServerTeardown::NotOwned => "left running".to_string(),
            ServerTeardown::Stopped => "stopped".to_string(),
            ServerTeardown::Failed(e) => format!("failed to stop: {e}"),
        };
        Self { reset, server }
    }
}

impl TableDisplay for TeardownDisplay {
    fn headers() -> Vec<&'static str> {
        vec!["After-run reset", "Server"]
    }

    fn row(&self) -> Vec<String> {
        vec![self.reset.clone(), self.server.clone()]
    }
}

/// Run the before-run hook, hold a launched server until Ctrl-C, then tear
/// down. A server that was already running is left alone.
pub async fn execute(config: &HarnessConfig, format: OutputFormat) -> Result<()> {
    let lifecycle = RunLifecycle::from_config(config)?;
    let endpoint = lifecycle.readiness().endpoint.clone();

    let outcome = lifecycle.before_run().await?;
    print_item(&outcome, format);

    if !lifecycle.owns_server().await {
        print_info(&format!("Server already running at {endpoint}; nothing to hold"));
        return Ok(());
    }

    print_success(&format!("Server is up at {endpoint}. Press Ctrl-C to stop it."));
    if let Err(e) = tokio::signal::ctrl_c().await {
        print_error(&format!("cannot listen for Ctrl-C, stopping now: {e}"));
    }
    info!(%endpoint, "shutting down");

    let report = lifecycle.after_run().await;
    print_item(&TeardownDisplay::from(&report), format);
    if report.server != ServerTeardown::Stopped {
        anyhow::bail!("server at {endpoint} did not stop cleanly");
    }
    Ok(())
}

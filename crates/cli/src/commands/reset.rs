//! Reset and policy-check commands

use anyhow::Result;
use clap::Args;
use serde::Serialize;

use qatrain_common::{HarnessConfig, ResetTrigger};
use qatrain_e2e::{DatabaseResetter, ResetOutcome, ResetPlan};

use crate::output::{or_dash, print_item, print_success, print_warning, OutputFormat, TableDisplay};

#[derive(Args)]
pub struct ResetArgs {
    /// Lifecycle point whose policy applies
    #[arg(long, default_value = "task")]
    pub trigger: ResetTrigger,
}

impl TableDisplay for ResetOutcome {
    fn headers() -> Vec<&'static str> {
        vec!["Trigger", "Status", "Target", "Rows", "Elapsed"]
    }

    fn row(&self) -> Vec<String> {
        match self {
            ResetOutcome::Skipped { trigger, reason } => vec![
                trigger.to_string(),
                match reason {
                    Some(reason) => format!("skipped ({reason})"),
                    None => "skipped".to_string(),
                },
                "-".to_string(),
                "-".to_string(),
                "-".to_string(),
            ],
            ResetOutcome::Applied {
                trigger,
                target,
                rows_affected,
                elapsed_ms,
                ..
            } => vec![
                trigger.to_string(),
                "applied".to_string(),
                target.clone(),
                rows_affected.to_string(),
                format!("{elapsed_ms} ms"),
            ],
        }
    }
}

/// Policy decision for one trigger
#[derive(Debug, Serialize)]
pub struct PlanDisplay {
    pub trigger: ResetTrigger,
    pub enabled: bool,
    pub reason: Option<String>,
    pub target: Option<String>,
}

impl From<&ResetPlan> for PlanDisplay {
    fn from(plan: &ResetPlan) -> Self {
        Self {
            trigger: plan.trigger,
            enabled: plan.decision.enabled,
            reason: plan.decision.reason.map(|r| r.to_string()),
            target: plan.target.as_ref().map(|t| t.to_string()),
        }
    }
}

impl TableDisplay for PlanDisplay {
    fn headers() -> Vec<&'static str> {
        vec!["Trigger", "Enabled", "Reason", "Target"]
    }

    fn row(&self) -> Vec<String> {
        vec![
            self.trigger.to_string(),
            (if self.enabled { "yes" } else { "no" }).to_string(),
            or_dash(self.reason.as_ref()),
            or_dash(self.target.as_ref()),
        ]
    }
}

/// Run the reset for `args.trigger` if the policy allows it
pub async fn execute(args: ResetArgs, config: &HarnessConfig, format: OutputFormat) -> Result<()> {
    let resetter = DatabaseResetter::new(config.database.clone());
    let outcome = resetter.reset(args.trigger).await?;

    print_item(&outcome, format);
    if matches!(format, OutputFormat::Table) {
        match &outcome {
            ResetOutcome::Applied { .. } => print_success("Database reset to fixture data"),
            ResetOutcome::Skipped { .. } => print_warning("Database was not reset"),
        }
    }
    Ok(())
}

/// Print the policy decision without touching the database
pub fn check(args: ResetArgs, config: &HarnessConfig, format: OutputFormat) -> Result<()> {
    let resetter = DatabaseResetter::new(config.database.clone());
    let plan = resetter.plan(args.trigger);
    print_item(&PlanDisplay::from(&plan), format);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use qatrain_common::config::{DB_RESET_ALLOW_NON_LOCAL, DB_URL};
    use qatrain_common::SkipReason;
    use test_case::test_case;

    fn config(url: Option<&str>, allow_non_local: bool) -> HarnessConfig {
        let url = url.map(str::to_string);
        HarnessConfig::default().with_env(move |key| match key {
            DB_URL => url.clone(),
            DB_RESET_ALLOW_NON_LOCAL if allow_non_local => Some("true".to_string()),
            _ => None,
        })
    }

    #[test_case(Some("jdbc:mysql://root:pw@localhost/qa"), false, ResetTrigger::BeforeRun, "yes", "-", "mysql://root@localhost:3306/qa" ; "local before run")]
    #[test_case(Some("jdbc:mysql://root:pw@localhost/qa"), false, ResetTrigger::BeforeScenario, "no", "-", "mysql://root@localhost:3306/qa" ; "local scenario opt in")]
    #[test_case(Some("jdbc:mysql://root:pw@prod-db.example.com/qa"), false, ResetTrigger::BeforeRun, "no", "non-local host not allowed", "mysql://root@prod-db.example.com:3306/qa" ; "remote host")]
    #[test_case(None, false, ResetTrigger::ManualTask, "no", "non-local host not allowed", "-" ; "no url")]
    #[test_case(None, true, ResetTrigger::ManualTask, "no", "invalid connection string", "-" ; "no url non-local allowed")]
    fn plan_display_rows(
        url: Option<&str>,
        allow_non_local: bool,
        trigger: ResetTrigger,
        enabled: &str,
        reason: &str,
        target: &str,
    ) {
        let plan = DatabaseResetter::new(config(url, allow_non_local).database).plan(trigger);
        let row = PlanDisplay::from(&plan).row();
        assert_eq!(row, vec![trigger.to_string(), enabled.to_string(), reason.to_string(), target.to_string()]);
    }

    #[test_case(Some(SkipReason::NonLocalHost), "skipped (non-local host not allowed)" ; "non-local")]
    #[test_case(Some(SkipReason::ServerNotOwned), "skipped (server not launched by this run)" ; "not owned")]
    #[test_case(None, "skipped" ; "trigger disabled")]
    fn skipped_outcome_row_names_reason(reason: Option<SkipReason>, status: &str) {
        let outcome = ResetOutcome::Skipped {
            trigger: ResetTrigger::AfterRun,
            reason,
        };
        let row = outcome.row();
        assert_eq!(row[0], "after-run");
        assert_eq!(row[1], status);
    }

    #[test]
    fn applied_outcome_row() {
        let outcome = ResetOutcome::Applied {
            trigger: ResetTrigger::ManualTask,
            target: "mysql://root@localhost:3306/qa".to_string(),
            script: "sql/sample_plant_data_full.sql".into(),
            rows_affected: 42,
            elapsed_ms: 17,
        };
        assert_eq!(
            outcome.row(),
            vec!["task", "applied", "mysql://root@localhost:3306/qa", "42", "17 ms"]
        );
    }
}

//! QA Training E2E Orchestration
//!
//! Everything a test run needs around the application under test:
//! - Probes the server endpoint and launches the server when nothing answers
//! - Owns a launched server and stops it at teardown, never one it found running
//! - Gates destructive fixture resets behind the locality and trigger policy
//! - Exposes the reset task and the four lifecycle hooks to the test runner
//!
//! # Lifecycle
//!
//! ```text
//! before_run ──► ensure_ready ──► reset(before-run)
//!   scenario ──► reset(before-scenario) ... reset(after-scenario)
//! after_run  ──► owned server only: reset(after-run) ──► terminate
//! task       ──► reset(task)
//! ```

pub mod error;
pub mod launch;
pub mod lifecycle;
pub mod reset;
pub mod server;

pub use error::{E2eError, E2eResult};
pub use launch::{LaunchConfig, LaunchSpec};
pub use lifecycle::{RunLifecycle, ServerTeardown, TeardownReport};
pub use reset::{DatabaseResetter, FixtureLoader, FixtureScript, MySqlLoader, ResetOutcome, ResetPlan};
pub use server::{ensure_ready, Bootstrap, Endpoint, Probe, Readiness, ServerProcessHandle};

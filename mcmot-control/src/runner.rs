//! Workflow runner (component C12): runs startup tasks once, then loops a
//! single loop task until told to stop, sleeping between cycles.
//!
//! Grounded on the original `WorkflowRunner` main loop: startup failures are
//! catastrophic and abort the process; loop-task failures are transient and
//! only incur a backoff sleep before the next attempt (§4.12, §4.15).

use crate::error::{Error, Result};
use chrono::{DateTime, Utc};
use std::time::Duration;

/// A task run exactly once before the main loop starts. Any failure aborts
/// startup.
pub trait StartupTask: Send {
    fn name(&self) -> &str;
    fn run(&mut self) -> Result<()>;
}

/// What one loop-task cycle reported, beyond success/failure.
#[derive(Debug, Clone, Copy, Default)]
pub struct LoopReport {
    /// Overrides `loop_interval` for the sleep following this cycle, e.g. a
    /// longer idle sleep while in a non-working phase.
    pub sleep_override: Option<Duration>,
}

/// The single task run every cycle of the main loop.
pub trait LoopTask: Send {
    fn run(&mut self, now: DateTime<Utc>) -> Result<LoopReport>;
}

#[derive(Debug, Clone, Copy)]
pub struct RunnerConfig {
    pub loop_interval: Duration,
    pub retry_backoff: Duration,
}

/// Runs `startup_tasks` once, then `loop_task` repeatedly until `should_stop`
/// reports true. `now`/`sleep` are injected so the cadence can be driven
/// deterministically in tests; in production they are `Utc::now` and
/// `std::thread::sleep`.
pub fn run_workflow(
    startup_tasks: &mut [Box<dyn StartupTask>],
    loop_task: &mut dyn LoopTask,
    config: RunnerConfig,
    mut should_stop: impl FnMut() -> bool,
    mut sleep: impl FnMut(Duration),
    mut now: impl FnMut() -> DateTime<Utc>,
) -> Result<()> {
    for task in startup_tasks.iter_mut() {
        task.run().map_err(|err| Error::StartupFailed { task: task.name().to_string(), reason: err.to_string() })?;
    }

    while !should_stop() {
        let cycle_time = now();
        match loop_task.run(cycle_time) {
            Ok(report) => sleep(report.sleep_override.unwrap_or(config.loop_interval)),
            Err(err) => {
                tracing::warn!(error = %err, "loop task failed, retrying after backoff");
                sleep(config.retry_backoff);
            }
        }
    }
    Ok(())
}

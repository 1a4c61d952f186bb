//! Cooldown-gated actuator.
//!
//! Owns the only cross-tick state in the control loop: the time of the last
//! successful scaling command. A command is issued only when the cooldown
//! has elapsed *and* the recommendation differs from the current count.
//! Neither a no-op nor a failed command touches the cooldown timer.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Local, TimeDelta};
use tracing::{debug, info};

use crate::error::{AutoscaleError, AutoscaleResult};
use crate::orchestrator::Orchestrator;

/// What the actuator did with a recommendation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScaleOutcome {
    /// A "set replicas" command was issued for this count.
    Scaled(u32),
    /// Nothing was sent.
    NoAction(NoActionReason),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NoActionReason {
    /// The last scaling action was too recent.
    CooldownActive { remaining: Duration },
    /// The recommendation matches the current replica count.
    Unchanged,
}

pub struct CooldownActuator {
    orchestrator: Arc<dyn Orchestrator>,
    cooldown: Duration,
    call_timeout: Duration,
    /// `None` until the first successful command.
    last_scale_time: Option<DateTime<Local>>,
}

impl CooldownActuator {
    pub fn new(orchestrator: Arc<dyn Orchestrator>, cooldown: Duration) -> Self {
        Self {
            orchestrator,
            cooldown,
            call_timeout: Duration::from_secs(5),
            last_scale_time: None,
        }
    }

    /// Bound the "set replicas" call.
    pub fn with_call_timeout(mut self, timeout: Duration) -> Self {
        self.call_timeout = timeout;
        self
    }

    pub fn last_scale_time(&self) -> Option<DateTime<Local>> {
        self.last_scale_time
    }

    /// Time left before another command may be issued, if any.
    pub fn cooldown_remaining(&self, now: DateTime<Local>) -> Option<Duration> {
        let last = self.last_scale_time?;
        let cooldown = TimeDelta::from_std(self.cooldown).unwrap_or(TimeDelta::MAX);
        let elapsed = now.signed_duration_since(last);
        if elapsed >= cooldown {
            return None;
        }
        Some((cooldown - elapsed).to_std().unwrap_or(self.cooldown))
    }

    /// Issue `set replicas = recommended` if the gate allows it.
    ///
    /// An orchestrator failure is returned as `ScaleCommandFailed` and leaves
    /// the cooldown untouched, so the next tick can retry.
    pub async fn maybe_scale(
        &mut self,
        recommended: u32,
        current: u32,
        now: DateTime<Local>,
    ) -> AutoscaleResult<ScaleOutcome> {
        if let Some(remaining) = self.cooldown_remaining(now) {
            debug!(
                recommended,
                current,
                remaining_secs = remaining.as_secs_f64(),
                "cooldown active, skipping scaling"
            );
            return Ok(ScaleOutcome::NoAction(NoActionReason::CooldownActive {
                remaining,
            }));
        }

        if recommended == current {
            debug!(current, "no scaling action needed");
            return Ok(ScaleOutcome::NoAction(NoActionReason::Unchanged));
        }

        match tokio::time::timeout(self.call_timeout, self.orchestrator.set_replicas(recommended))
            .await
        {
            Ok(Ok(())) => {}
            Ok(Err(AutoscaleError::ScaleCommandFailed(reason))) => {
                return Err(AutoscaleError::ScaleCommandFailed(reason));
            }
            Ok(Err(other)) => return Err(AutoscaleError::ScaleCommandFailed(other.to_string())),
            Err(_) => {
                return Err(AutoscaleError::ScaleCommandFailed(format!(
                    "timed out after {:?}",
                    self.call_timeout
                )));
            }
        }

        self.last_scale_time = Some(now);
        info!(from = current, to = recommended, "scaled workload");
        Ok(ScaleOutcome::Scaled(recommended))
    }
}

//! The polling control loop.
//!
//! [`Controller::tick`] runs one full iteration (observe, predict, blend,
//! actuate) and never fails: every collaborator error is logged and replaced
//! by a fallback. [`Controller::run`] drives ticks on a fixed interval until
//! the shutdown channel flips.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use tidal_core::{AutoscaleConfig, CalendarBucket, Clock, FeatureVector, SystemClock};
use tidal_metrics::TrafficMetrics;
use tokio::sync::watch;
use tracing::{debug, error, info, warn};

use crate::actuator::{CooldownActuator, NoActionReason, ScaleOutcome};
use crate::error::{AutoscaleError, AutoscaleResult};
use crate::orchestrator::Orchestrator;
use crate::policy::{BlendPolicy, Decision};
use crate::source::TrafficSource;

/// What a tick ended up doing.
#[derive(Debug, Clone, PartialEq)]
pub enum TickAction {
    /// No prediction was available, so nothing was decided.
    Held,
    Scaled(u32),
    CooldownActive,
    Unchanged,
    /// The orchestrator rejected the command; retried on a later tick.
    ScaleFailed(String),
}

/// Summary of one iteration, mainly for tests and debug logging.
#[derive(Debug, Clone, PartialEq)]
pub struct TickReport {
    pub current_replicas: u32,
    /// False when the replica read failed and the minimum was assumed.
    pub replicas_known: bool,
    pub traffic_rate: u64,
    pub decision: Option<Decision>,
    pub action: TickAction,
}

pub struct Controller {
    source: Arc<dyn TrafficSource>,
    orchestrator: Arc<dyn Orchestrator>,
    actuator: CooldownActuator,
    policy: BlendPolicy,
    metrics: Arc<TrafficMetrics>,
    clock: Arc<dyn Clock>,
    request_timeout: Duration,
}

impl Controller {
    pub fn new(
        source: Arc<dyn TrafficSource>,
        orchestrator: Arc<dyn Orchestrator>,
        config: &AutoscaleConfig,
    ) -> Self {
        let request_timeout = config.request_timeout();
        let actuator = CooldownActuator::new(Arc::clone(&orchestrator), config.cooldown())
            .with_call_timeout(request_timeout);
        Self {
            source,
            orchestrator,
            actuator,
            policy: BlendPolicy::from_config(config),
            metrics: Arc::new(TrafficMetrics::new()),
            clock: Arc::new(SystemClock),
            request_timeout,
        }
    }

    /// Publish gauges into a shared registry instead of a private one.
    pub fn with_metrics(mut self, metrics: Arc<TrafficMetrics>) -> Self {
        self.metrics = metrics;
        self
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn metrics(&self) -> &Arc<TrafficMetrics> {
        &self.metrics
    }

    pub fn policy(&self) -> &BlendPolicy {
        &self.policy
    }

    /// Run one control iteration.
    pub async fn tick(&mut self) -> TickReport {
        let timeout = self.request_timeout;
        let now = self.clock.now();
        let bucket = CalendarBucket::at(&now);

        let (current_replicas, replicas_known) =
            match bounded(timeout, "read replicas", self.orchestrator.current_replicas()).await {
                Ok(n) => (n, true),
                Err(e) => {
                    warn!(
                        error = %e,
                        assumed = self.policy.min_replicas,
                        "could not read current replicas, assuming minimum"
                    );
                    (self.policy.min_replicas, false)
                }
            };

        let traffic_rate =
            match bounded(timeout, "traffic rate", self.source.requests_per_minute()).await {
                Ok(rate) => rate,
                Err(e) => {
                    warn!(error = %e, "could not read traffic rate, assuming 1");
                    1
                }
            };

        let features = FeatureVector::from_load(traffic_rate as f64, bucket);
        let predicted = match bounded(timeout, "predict", self.source.predict(features)).await {
            Ok(p) => Some(p),
            Err(e) => {
                warn!(error = %e, "prediction unavailable");
                None
            }
        };

        let historical =
            match bounded(timeout, "historical average", self.source.historical_average(bucket))
                .await
            {
                Ok(avg) => avg,
                Err(e) => {
                    warn!(error = %e, "historical average unavailable");
                    None
                }
            };

        let decision = self.policy.decide(predicted, historical, current_replicas);

        let action = match &decision {
            None => {
                info!(current_replicas, "no prediction, holding replicas");
                TickAction::Held
            }
            Some(d) => {
                debug!(
                    predicted = d.predicted_traffic,
                    historical = ?d.historical_average,
                    blended = d.blended,
                    current = d.current_replicas,
                    recommended = d.recommended_replicas,
                    "scaling decision"
                );
                match self
                    .actuator
                    .maybe_scale(d.recommended_replicas, current_replicas, now)
                    .await
                {
                    Ok(ScaleOutcome::Scaled(n)) => TickAction::Scaled(n),
                    Ok(ScaleOutcome::NoAction(NoActionReason::CooldownActive { .. })) => {
                        TickAction::CooldownActive
                    }
                    Ok(ScaleOutcome::NoAction(NoActionReason::Unchanged)) => TickAction::Unchanged,
                    Err(e) => {
                        error!(error = %e, "scaling failed, will retry next tick");
                        TickAction::ScaleFailed(e.to_string())
                    }
                }
            }
        };

        self.metrics.set_current_replicas(current_replicas);
        if let Some(d) = &decision {
            self.metrics.set_predicted_traffic(d.blended);
        }

        TickReport {
            current_replicas,
            replicas_known,
            traffic_rate,
            decision,
            action,
        }
    }

    /// Tick every `interval` until `shutdown` changes.
    pub async fn run(&mut self, interval: Duration, mut shutdown: watch::Receiver<bool>) {
        info!(
            interval_secs = interval.as_secs_f64(),
            min = self.policy.min_replicas,
            max = self.policy.max_replicas,
            "control loop started"
        );

        loop {
            if *shutdown.borrow() {
                break;
            }
            let report = self.tick().await;
            debug!(action = ?report.action, replicas = report.current_replicas, "tick complete");

            tokio::select! {
                _ = tokio::time::sleep(interval) => {}
                _ = shutdown.changed() => break,
            }
        }
        info!("control loop shutting down");
    }
}

/// Bound a collaborator call; a timeout becomes an ordinary remote failure.
async fn bounded<T, F>(timeout: Duration, call: &'static str, fut: F) -> AutoscaleResult<T>
where
    F: Future<Output = AutoscaleResult<T>>,
{
    tokio::time::timeout(timeout, fut)
        .await
        .unwrap_or_else(|_| Err(AutoscaleError::remote(call, format!("timed out after {timeout:?}"))))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{MockOrchestrator, MockSource};
    use chrono::{Local, TimeZone};
    use tidal_core::ManualClock;

    struct Harness {
        controller: Controller,
        orch: Arc<MockOrchestrator>,
        source: Arc<MockSource>,
        clock: Arc<ManualClock>,
    }

    fn harness(orch: MockOrchestrator, source: MockSource) -> Harness {
        harness_with(orch, source, AutoscaleConfig::default())
    }

    fn harness_with(orch: MockOrchestrator, source: MockSource, config: AutoscaleConfig) -> Harness {
        let orch = Arc::new(orch);
        let source = Arc::new(source);
        // Wednesday 09:00
        let clock = Arc::new(ManualClock::new(
            Local.with_ymd_and_hms(2024, 3, 6, 9, 0, 0).unwrap(),
        ));
        let src: Arc<dyn TrafficSource> = source.clone();
        let o: Arc<dyn Orchestrator> = orch.clone();
        let c: Arc<dyn Clock> = clock.clone();
        let controller = Controller::new(src, o, &config).with_clock(c);
        Harness {
            controller,
            orch,
            source,
            clock,
        }
    }

    #[tokio::test]
    async fn scales_to_blended_recommendation() {
        let mut h = harness(
            MockOrchestrator::with_replicas(2),
            MockSource::new(Some(40), Some(20.0), Some(10.0)),
        );
        let report = h.controller.tick().await;

        // 0.7 * 20 + 0.3 * 10 = 17 -> ceil(17 / 3) = 6
        let d = report.decision.unwrap();
        assert!((d.blended - 17.0).abs() < 1e-9);
        assert_eq!(report.action, TickAction::Scaled(6));
        assert_eq!(h.orch.set_calls(), vec![6]);
        assert_eq!(report.traffic_rate, 40);
        assert!(report.replicas_known);
    }

    #[tokio::test]
    async fn prediction_failure_holds_without_commands() {
        let mut h = harness(
            MockOrchestrator::with_replicas(4),
            MockSource::new(Some(10), None, Some(50.0)),
        );
        let report = h.controller.tick().await;

        assert_eq!(report.action, TickAction::Held);
        assert_eq!(report.decision, None);
        assert!(h.orch.set_calls().is_empty());
        assert_eq!(h.controller.metrics().current_replicas(), 4);
    }

    #[tokio::test]
    async fn cooldown_limits_commands_until_expiry() {
        let mut h = harness(
            MockOrchestrator::with_replicas(1),
            MockSource::new(Some(10), Some(9.0), None),
        );
        assert_eq!(h.controller.tick().await.action, TickAction::Scaled(3));

        h.source.set_prediction(Some(15.0));
        h.clock.advance(Duration::from_secs(10));
        assert_eq!(h.controller.tick().await.action, TickAction::CooldownActive);
        assert_eq!(h.orch.set_calls(), vec![3]);

        h.clock.advance(Duration::from_secs(10));
        assert_eq!(h.controller.tick().await.action, TickAction::Scaled(5));
        assert_eq!(h.orch.set_calls(), vec![3, 5]);
    }

    #[tokio::test]
    async fn matching_recommendation_is_unchanged() {
        let mut h = harness(
            MockOrchestrator::with_replicas(3),
            MockSource::new(Some(10), Some(9.0), None),
        );
        assert_eq!(h.controller.tick().await.action, TickAction::Unchanged);
        assert!(h.orch.set_calls().is_empty());
    }

    #[tokio::test]
    async fn replica_read_failure_assumes_minimum() {
        let mut h = harness(
            MockOrchestrator::default(),
            MockSource::new(Some(10), Some(9.0), None),
        );
        let report = h.controller.tick().await;

        assert!(!report.replicas_known);
        assert_eq!(report.current_replicas, 1);
        assert_eq!(report.action, TickAction::Scaled(3));
    }

    #[tokio::test]
    async fn traffic_failure_predicts_from_unit_load() {
        let mut h = harness(
            MockOrchestrator::with_replicas(1),
            MockSource::new(None, Some(1.0), None),
        );
        let report = h.controller.tick().await;
        assert_eq!(report.traffic_rate, 1);

        let bucket = CalendarBucket::at(&h.clock.now());
        let sent = h.source.predicted_with.lock().unwrap().clone();
        assert_eq!(sent, vec![FeatureVector::from_load(1.0, bucket)]);
    }

    #[tokio::test]
    async fn history_failure_uses_prediction_alone() {
        let source = MockSource::new(Some(10), Some(12.0), None);
        *source.history.lock().unwrap() = None;
        let mut h = harness(MockOrchestrator::with_replicas(1), source);

        let d = h.controller.tick().await.decision.unwrap();
        assert_eq!(d.historical_average, None);
        assert_eq!(d.blended, 12.0);
        assert_eq!(d.recommended_replicas, 4);
    }

    #[tokio::test]
    async fn slow_prediction_times_out_and_holds() {
        let source = MockSource::new(Some(10), Some(9.0), None);
        *source.predict_delay.lock().unwrap() = Duration::from_millis(500);
        let config = AutoscaleConfig {
            request_timeout: "50ms".into(),
            ..AutoscaleConfig::default()
        };
        let mut h = harness_with(MockOrchestrator::with_replicas(1), source, config);

        let report = h.controller.tick().await;
        assert_eq!(report.action, TickAction::Held);
        assert!(h.orch.set_calls().is_empty());
    }

    #[tokio::test]
    async fn failed_scale_is_retried_next_tick() {
        let mut h = harness(
            MockOrchestrator::with_replicas(1),
            MockSource::new(Some(10), Some(9.0), None),
        );
        h.orch.fail_sets(true);
        assert!(matches!(
            h.controller.tick().await.action,
            TickAction::ScaleFailed(_)
        ));

        h.orch.fail_sets(false);
        h.clock.advance(Duration::from_secs(1));
        assert_eq!(h.controller.tick().await.action, TickAction::Scaled(3));
    }

    #[tokio::test]
    async fn gauges_track_replicas_and_blend() {
        let mut h = harness(
            MockOrchestrator::with_replicas(2),
            MockSource::new(Some(10), Some(100.0), Some(50.0)),
        );
        let metrics = Arc::new(TrafficMetrics::new());
        h.controller = h.controller.with_metrics(Arc::clone(&metrics));
        h.controller.tick().await;

        assert_eq!(metrics.current_replicas(), 2);
        assert!((metrics.predicted_traffic() - 85.0).abs() < 1e-9);

        // A held tick leaves the last blend in place.
        h.source.set_prediction(None);
        h.controller.tick().await;
        assert!((metrics.predicted_traffic() - 85.0).abs() < 1e-9);
    }

    #[tokio::test]
    async fn run_stops_on_shutdown() {
        let h = harness(
            MockOrchestrator::with_replicas(3),
            MockSource::new(Some(10), Some(9.0), None),
        );
        let mut controller = h.controller;
        let (tx, rx) = watch::channel(false);

        let handle = tokio::spawn(async move {
            controller.run(Duration::from_secs(3600), rx).await;
        });
        tokio::time::sleep(Duration::from_millis(50)).await;
        tx.send(true).unwrap();

        tokio::time::timeout(Duration::from_secs(2), handle)
            .await
            .expect("loop did not stop")
            .unwrap();
    }
}

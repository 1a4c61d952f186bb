//! tidal-autoscale: predictive, cooldown-gated replica scaling.
//!
//! Every poll interval the [`Controller`] reads the workload's replica
//! count and recent request rate, asks the prediction service for a
//! traffic estimate, blends it with the seasonal average for the current
//! (day-of-week, hour) bucket, and lets the [`CooldownActuator`] decide
//! whether to issue a "set replicas" command.
//!
//! # Scaling Algorithm
//!
//! ```text
//! blended     = α · predicted + (1 − α) · historical   (historical known)
//!             = predicted                              (no history yet)
//! recommended = clamp(ceil(blended / capacity_per_replica), min, max)
//!
//! if no prediction:                       hold
//! elif now − last_scale < cooldown:       hold (cooldown)
//! elif recommended == current:            hold (cooldown not reset)
//! else:                                   set replicas, last_scale = now
//! ```
//!
//! Every collaborator call is bounded by a timeout and degrades to a safe
//! default; a tick never fails.

pub mod actuator;
pub mod controller;
pub mod error;
pub mod http;
pub mod orchestrator;
pub mod policy;
pub mod source;

pub use actuator::{CooldownActuator, NoActionReason, ScaleOutcome};
pub use controller::{Controller, TickAction, TickReport};
pub use error::{AutoscaleError, AutoscaleResult};
pub use http::HttpSource;
pub use orchestrator::{KubeOrchestrator, Orchestrator};
pub use policy::{BlendPolicy, Decision};
pub use source::{LocalSource, TrafficSource};

#[cfg(test)]
pub(crate) mod testing;

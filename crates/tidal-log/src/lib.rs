//! tidal-log: the append-only observation log.
//!
//! Every prediction served by Tidal leaves one [`ObservationRecord`] behind.
//! The log is the only shared state between the prediction service and the
//! read-side estimators in [`stats`]:
//!
//! ```text
//! PredictionService ──append──▶ ObservationLog ◀──scan── stats::requests_per_minute
//!                                              ◀──scan── stats::historical_average
//! ```
//!
//! [`ObservationStore`] implements the log on [redb](https://docs.rs/redb),
//! either on disk or fully in memory (for tests). Records are JSON-encoded
//! into `&[u8]` value columns keyed by a monotonically allocated sequence
//! number, and the store is `Clone + Send + Sync` (backed by
//! `Arc<Database>`).

pub mod error;
pub mod stats;
pub mod store;
pub mod tables;
pub mod types;

pub use error::{LogError, LogResult};
pub use stats::{historical_average, requests_per_minute};
pub use store::{ObservationLog, ObservationStore};
pub use types::ObservationRecord;

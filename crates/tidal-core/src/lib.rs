//! tidal-core: shared building blocks for the Tidal capacity controller.
//!
//! Holds the `tidal.toml` configuration model, the 16-slot feature vector
//! consumed by traffic predictors, calendar buckets (day-of-week, hour) and
//! the injectable clock used by everything that reads "now".

pub mod clock;
pub mod config;
pub mod features;

pub use clock::{Clock, ManualClock, SystemClock};
pub use config::{AutoscaleConfig, ConfigError, ServerConfig, TidalConfig, parse_duration};
pub use features::{CalendarBucket, FEATURE_COUNT, FeatureError, FeatureVector, LOAD_SLOTS};

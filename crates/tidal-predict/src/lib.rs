//! tidal-predict: turns feature vectors into traffic estimates.
//!
//! A [`Predictor`] is an opaque capability that maps a
//! [`FeatureVector`](tidal_core::FeatureVector) to a log-scale (`log1p`)
//! traffic estimate. The [`PredictionService`] wraps it: it builds the
//! default vector when the caller has none, inverse-transforms and floors
//! the estimate, and appends one observation per successful call.
//!
//! ```text
//! predict(batch?) ─▶ rows ─▶ Predictor ─▶ expm1 ─▶ floor(0) ─▶ ObservationLog::append
//!                                                              └─▶ Prediction
//! ```

pub mod error;
pub mod model;
pub mod service;

pub use error::{PredictError, PredictResult};
pub use model::{LinearModel, Predictor, load_predictor};
pub use service::{Prediction, PredictionService};

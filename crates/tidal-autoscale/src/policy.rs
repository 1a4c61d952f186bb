//! Blending and replica recommendation.

use tidal_core::AutoscaleConfig;

/// Everything the loop knew when it made a recommendation.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Decision {
    pub predicted_traffic: f64,
    pub historical_average: Option<f64>,
    pub blended: f64,
    pub current_replicas: u32,
    pub recommended_replicas: u32,
}

/// Fixed blending weights and fleet bounds.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BlendPolicy {
    /// Weight of the live prediction; `1 - alpha` goes to the seasonal average.
    pub alpha: f64,
    /// Requests a single replica absorbs.
    pub capacity_per_replica: f64,
    pub min_replicas: u32,
    pub max_replicas: u32,
}

impl BlendPolicy {
    pub fn from_config(config: &AutoscaleConfig) -> Self {
        Self {
            alpha: config.alpha,
            capacity_per_replica: config.capacity_per_replica,
            min_replicas: config.min_replicas,
            max_replicas: config.max_replicas,
        }
    }

    /// Combine the live prediction with the seasonal average, if any.
    pub fn blend(&self, predicted: f64, historical: Option<f64>) -> f64 {
        match historical {
            Some(h) => self.alpha * predicted + (1.0 - self.alpha) * h,
            None => predicted,
        }
    }

    /// Replicas needed for a load, rounded up and clamped to the bounds.
    ///
    /// Negative or NaN loads count as zero.
    pub fn replicas_for(&self, load: f64) -> u32 {
        let load = if load.is_nan() { 0.0 } else { load.max(0.0) };
        let needed = (load / self.capacity_per_replica).ceil();
        needed.clamp(f64::from(self.min_replicas), f64::from(self.max_replicas)) as u32
    }

    /// Recommend a replica count, or `None` when there is no prediction.
    pub fn decide(
        &self,
        predicted: Option<f64>,
        historical: Option<f64>,
        current_replicas: u32,
    ) -> Option<Decision> {
        let predicted_traffic = predicted?;
        let blended = self.blend(predicted_traffic, historical);
        Some(Decision {
            predicted_traffic,
            historical_average: historical,
            blended,
            current_replicas,
            recommended_replicas: self.replicas_for(blended),
        })
    }
}

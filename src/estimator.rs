use std::ops::RangeInclusive;
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use rand::{rngs::StdRng, Rng, SeedableRng};
use tracing::debug;

use crate::config::EstimatorConfig;
use crate::images::DecodedImage;

/// Turns a meal photo into a calorie count. Called at most once per upload.
#[async_trait]
pub trait CalorieEstimator: Send + Sync {
    async fn estimate(&self, image: &DecodedImage) -> anyhow::Result<u32>;
}

/// Stand-in for a real model: waits, then picks a plausible number.
pub struct SimulatedEstimator {
    range: RangeInclusive<u32>,
    delay: Duration,
    rng: Mutex<StdRng>,
}

impl SimulatedEstimator {
    pub fn new(cfg: &EstimatorConfig) -> Self {
        let rng = match cfg.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        Self {
            range: cfg.min_kcal..=cfg.max_kcal,
            delay: Duration::from_millis(cfg.delay_ms),
            rng: Mutex::new(rng),
        }
    }
}

#[async_trait]
impl CalorieEstimator for SimulatedEstimator {
    async fn estimate(&self, image: &DecodedImage) -> anyhow::Result<u32> {
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        let kcal = {
            let mut rng = self
                .rng
                .lock()
                .map_err(|_| anyhow::anyhow!("estimator rng poisoned"))?;
            rng.gen_range(self.range.clone())
        };
        debug!(kcal, content_type = %image.content_type, size = image.bytes.len(), "simulated estimate");
        Ok(kcal)
    }
}

use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use anyhow::Context;
use serde::Deserialize;

#[derive(Debug, Clone, Deserialize)]
pub struct StoreConfig {
    pub data_dir: PathBuf,
    pub key: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct EstimatorConfig {
    pub min_kcal: u32,
    pub max_kcal: u32,
    pub delay_ms: u64,
    pub seed: Option<u64>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct UploadConfig {
    pub max_image_bytes: u64,
    /// `None` waits for the estimator forever.
    pub detection_timeout_secs: Option<u64>,
}

impl UploadConfig {
    pub fn detection_timeout(&self) -> Option<Duration> {
        self.detection_timeout_secs.map(Duration::from_secs)
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub store: StoreConfig,
    pub estimator: EstimatorConfig,
    pub uploads: UploadConfig,
}

impl AppConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        Self::from_lookup(|k| std::env::var(k).ok())
    }

    pub fn from_lookup(get: impl Fn(&str) -> Option<String>) -> anyhow::Result<Self> {
        let store = StoreConfig {
            data_dir: get("MEALMIND_DATA_DIR")
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from(".mealmind")),
            key: get("MEALMIND_STORE_KEY").unwrap_or_else(|| "meals".into()),
        };
        anyhow::ensure!(
            crate::storage::is_valid_key(&store.key),
            "MEALMIND_STORE_KEY must match [A-Za-z0-9_-]+, got `{}`",
            store.key
        );

        let estimator = EstimatorConfig {
            min_kcal: parse_or(&get, "MEALMIND_MIN_KCAL", 200)?,
            max_kcal: parse_or(&get, "MEALMIND_MAX_KCAL", 800)?,
            delay_ms: parse_or(&get, "MEALMIND_DETECT_DELAY_MS", 2000)?,
            seed: parse_opt(&get, "MEALMIND_ESTIMATOR_SEED")?,
        };
        anyhow::ensure!(
            estimator.min_kcal <= estimator.max_kcal,
            "MEALMIND_MIN_KCAL ({}) exceeds MEALMIND_MAX_KCAL ({})",
            estimator.min_kcal,
            estimator.max_kcal
        );

        let timeout: u64 = parse_or(&get, "MEALMIND_DETECT_TIMEOUT_SECS", 30)?;
        let max_mb: u64 = parse_or(&get, "MEALMIND_MAX_IMAGE_MB", 20)?;
        let uploads = UploadConfig {
            max_image_bytes: max_mb
                .checked_mul(1024 * 1024)
                .context("MEALMIND_MAX_IMAGE_MB is too large")?,
            detection_timeout_secs: (timeout > 0).then_some(timeout),
        };

        Ok(Self {
            store,
            estimator,
            uploads,
        })
    }
}

fn parse_opt<T>(get: &impl Fn(&str) -> Option<String>, key: &str) -> anyhow::Result<Option<T>>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    get(key)
        .map(|v| v.trim().parse::<T>().with_context(|| format!("{} = `{}`", key, v)))
        .transpose()
}

fn parse_or<T>(get: &impl Fn(&str) -> Option<String>, key: &str, default: T) -> anyhow::Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    Ok(parse_opt(get, key)?.unwrap_or(default))
}

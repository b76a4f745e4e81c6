use std::sync::Arc;

use crate::config::AppConfig;
use crate::estimator::{CalorieEstimator, SimulatedEstimator};
use crate::meals::{MealRepo, MealTracker, UploadLimits};
use crate::storage::{FileStore, KeyValueStore};

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub tracker: Arc<MealTracker>,
}

impl AppState {
    pub async fn init() -> anyhow::Result<Self> {
        let config = AppConfig::from_env()?;
        Ok(Self::from_config(config).await)
    }

    pub async fn from_config(config: AppConfig) -> Self {
        let store = Arc::new(FileStore::new(&config.store.data_dir)) as Arc<dyn KeyValueStore>;
        let estimator =
            Arc::new(SimulatedEstimator::new(&config.estimator)) as Arc<dyn CalorieEstimator>;
        Self::from_parts(Arc::new(config), store, estimator).await
    }

    pub async fn from_parts(
        config: Arc<AppConfig>,
        store: Arc<dyn KeyValueStore>,
        estimator: Arc<dyn CalorieEstimator>,
    ) -> Self {
        let repo = MealRepo::new(store, config.store.key.clone());
        let limits = UploadLimits::from(&config.uploads);
        let tracker = Arc::new(MealTracker::open(repo, estimator, limits).await);
        Self { config, tracker }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{EstimatorConfig, StoreConfig, UploadConfig};
    use crate::images::UploadFile;
    use std::path::Path;

    fn config(dir: &Path) -> AppConfig {
        AppConfig {
            store: StoreConfig {
                data_dir: dir.to_path_buf(),
                key: "meals".into(),
            },
            estimator: EstimatorConfig {
                min_kcal: 200,
                max_kcal: 800,
                delay_ms: 0,
                seed: Some(3),
            },
            uploads: UploadConfig {
                max_image_bytes: 1024 * 1024,
                detection_timeout_secs: Some(5),
            },
        }
    }

    #[tokio::test]
    async fn meals_survive_restart() {
        let tmp = tempfile::TempDir::new().unwrap();
        let photo = tmp.path().join("dinner.png");
        std::fs::write(&photo, b"\x89PNG\r\n\x1a\n").unwrap();

        let state = AppState::from_config(config(tmp.path())).await;
        assert!(state.tracker.meals().is_empty());
        let added = state
            .tracker
            .add_meal(UploadFile::from_path(&photo))
            .await
            .unwrap();
        assert!(added.outcome.image_url.starts_with("data:image/png;base64,"));

        let restarted = AppState::from_config(config(tmp.path())).await;
        assert_eq!(restarted.tracker.meals(), vec![added.outcome.clone()]);

        restarted.tracker.remove_meal(&added.outcome.id).await;
        let again = AppState::from_config(config(tmp.path())).await;
        assert!(again.tracker.meals().is_empty());
    }
}

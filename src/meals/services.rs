use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{watch, Mutex};
use tracing::{info, instrument, warn};

use super::dto::{new_meal_id, MealRecord, Mutation, UploadState};
use super::repo::MealRepo;
use crate::config::UploadConfig;
use crate::error::{MealError, StoreError};
use crate::estimator::CalorieEstimator;
use crate::images::{services as images, DecodedImage, UploadFile};

#[derive(Debug, Clone, Copy)]
pub struct UploadLimits {
    pub max_image_bytes: u64,
    pub detection_timeout: Option<Duration>,
}

impl From<&UploadConfig> for UploadLimits {
    fn from(cfg: &UploadConfig) -> Self {
        Self {
            max_image_bytes: cfg.max_image_bytes,
            detection_timeout: cfg.detection_timeout(),
        }
    }
}

/// Owns the meal collection: every add and remove goes through here and is
/// written back to the store before the call returns.
pub struct MealTracker {
    repo: MealRepo,
    estimator: Arc<dyn CalorieEstimator>,
    limits: UploadLimits,
    // held across mutate + save so saves land in mutation order
    meals: Mutex<Vec<MealRecord>>,
    changes: watch::Sender<Vec<MealRecord>>,
    upload: watch::Sender<UploadState>,
}

impl MealTracker {
    pub async fn open(
        repo: MealRepo,
        estimator: Arc<dyn CalorieEstimator>,
        limits: UploadLimits,
    ) -> Self {
        let meals = repo.load().await;
        info!(count = meals.len(), key = %repo.key(), "meals loaded");
        let (changes, _) = watch::channel(meals.clone());
        let (upload, _) = watch::channel(UploadState::Idle);
        Self {
            repo,
            estimator,
            limits,
            meals: Mutex::new(meals),
            changes,
            upload,
        }
    }

    /// Newest first.
    pub fn meals(&self) -> Vec<MealRecord> {
        self.changes.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<Vec<MealRecord>> {
        self.changes.subscribe()
    }

    pub fn upload_state(&self) -> UploadState {
        *self.upload.borrow()
    }

    pub fn watch_upload(&self) -> watch::Receiver<UploadState> {
        self.upload.subscribe()
    }

    #[instrument(skip(self, file), fields(file = %file.name, content_type = %file.content_type))]
    pub async fn add_meal(&self, file: UploadFile) -> Result<Mutation<MealRecord>, MealError> {
        images::validate_upload(&file, self.limits.max_image_bytes)?;
        let _flight = InFlight::begin(&self.upload)?;

        let image = images::read_image(file, self.limits.max_image_bytes).await?;
        self.upload.send_replace(UploadState::Detecting);
        let calories = self.detect(&image).await?;

        let mut meals = self.meals.lock().await;
        let mut record = MealRecord::new(image.data_url, calories);
        while meals.iter().any(|m| m.id == record.id) {
            record.id = new_meal_id();
        }
        meals.insert(0, record.clone());
        // publish before the save so a dropped future cannot leave the snapshot behind
        self.changes.send_replace(meals.clone());
        let persist_warning = self.persist(&meals).await;
        info!(id = %record.id, calories, total = meals.len(), "meal added");

        Ok(Mutation {
            outcome: record,
            meals: meals.clone(),
            persist_warning,
        })
    }

    /// Absent ids are a no-op. Does not wait for or disturb an upload in flight.
    #[instrument(skip(self))]
    pub async fn remove_meal(&self, id: &str) -> Mutation<Option<MealRecord>> {
        let mut meals = self.meals.lock().await;
        let removed = meals
            .iter()
            .position(|m| m.id == id)
            .map(|idx| meals.remove(idx));
        if removed.is_some() {
            self.changes.send_replace(meals.clone());
            info!(%id, total = meals.len(), "meal removed");
        }
        let persist_warning = self.persist(&meals).await;

        Mutation {
            outcome: removed,
            meals: meals.clone(),
            persist_warning,
        }
    }

    async fn detect(&self, image: &DecodedImage) -> Result<u32, MealError> {
        let estimate = self.estimator.estimate(image);
        let result = match self.limits.detection_timeout {
            Some(limit) => tokio::time::timeout(limit, estimate)
                .await
                .map_err(|_| MealError::DetectionTimeout(limit))?,
            None => estimate.await,
        };
        result.map_err(|e| MealError::Detection(format!("{e:#}")))
    }

    async fn persist(&self, meals: &[MealRecord]) -> Option<StoreError> {
        match self.repo.save(meals).await {
            Ok(()) => None,
            Err(e) => {
                warn!(error = %e, "meals not persisted; keeping in-memory state");
                Some(e)
            }
        }
    }
}

/// Marks an upload as in flight; dropping it (success, error or a cancelled
/// future) returns the tracker to `Idle`.
struct InFlight<'a>(&'a watch::Sender<UploadState>);

impl<'a> InFlight<'a> {
    fn begin(tx: &'a watch::Sender<UploadState>) -> Result<Self, MealError> {
        let started = tx.send_if_modified(|state| {
            if *state == UploadState::Idle {
                *state = UploadState::ReadingImage;
                true
            } else {
                false
            }
        });
        if started {
            Ok(Self(tx))
        } else {
            Err(MealError::UploadInProgress)
        }
    }
}

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.0.send_replace(UploadState::Idle);
    }
}

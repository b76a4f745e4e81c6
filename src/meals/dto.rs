use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use uuid::Uuid;

use crate::error::StoreError;

/// One logged meal. Created once detection succeeds, never edited afterwards.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MealRecord {
    pub id: String,
    /// Self-contained `data:` URL, redisplayable without a fetch.
    #[serde(alias = "image")]
    pub image_url: String,
    pub calories: u32,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
}

impl MealRecord {
    pub(crate) fn new(image_url: String, calories: u32) -> Self {
        Self {
            id: new_meal_id(),
            image_url,
            calories,
            created_at: OffsetDateTime::now_utc(),
        }
    }
}

pub(crate) fn new_meal_id() -> String {
    Uuid::new_v4().to_string()
}

/// Result of a mutating call: its own outcome, the collection right after it,
/// and a warning if mirroring to the store failed.
#[derive(Debug)]
pub struct Mutation<T> {
    pub outcome: T,
    pub meals: Vec<MealRecord>,
    pub persist_warning: Option<StoreError>,
}

/// Where an upload attempt is. Anything but `Idle` means the upload control is disabled.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UploadState {
    Idle,
    ReadingImage,
    Detecting,
}

use std::collections::HashSet;
use std::sync::Arc;

use tracing::{debug, warn};

use super::dto::MealRecord;
use crate::error::StoreError;
use crate::storage::KeyValueStore;

/// Mirrors the whole meal collection under a single store key.
#[derive(Clone)]
pub struct MealRepo {
    store: Arc<dyn KeyValueStore>,
    key: String,
}

impl MealRepo {
    pub fn new(store: Arc<dyn KeyValueStore>, key: impl Into<String>) -> Self {
        Self {
            store,
            key: key.into(),
        }
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    /// Never fails: a missing or unreadable value means no meals yet.
    pub async fn load(&self) -> Vec<MealRecord> {
        let raw = match self.store.get(&self.key).await {
            Ok(Some(raw)) => raw,
            Ok(None) => {
                debug!(key = %self.key, "no stored meals");
                return Vec::new();
            }
            Err(e) => {
                warn!(error = %format!("{e:#}"), key = %self.key, "meal store unreadable; starting empty");
                return Vec::new();
            }
        };

        let meals: Vec<MealRecord> = match serde_json::from_str(&raw) {
            Ok(m) => m,
            Err(e) => {
                warn!(error = %e, key = %self.key, "stored meals are corrupt; starting empty");
                return Vec::new();
            }
        };

        dedupe_ids(meals)
    }

    /// Replaces the stored value with the full collection.
    pub async fn save(&self, meals: &[MealRecord]) -> Result<(), StoreError> {
        let body = serde_json::to_string(meals)?;
        self.store
            .put(&self.key, body)
            .await
            .map_err(|e| StoreError::Write {
                key: self.key.clone(),
                reason: format!("{e:#}"),
            })
    }
}

/// Keeps the first (newest) record for each id.
fn dedupe_ids(meals: Vec<MealRecord>) -> Vec<MealRecord> {
    let total = meals.len();
    let mut seen = HashSet::with_capacity(total);
    let kept: Vec<MealRecord> = meals
        .into_iter()
        .filter(|m| seen.insert(m.id.clone()))
        .collect();
    if kept.len() != total {
        warn!(dropped = total - kept.len(), "duplicate meal ids in store");
    }
    kept
}

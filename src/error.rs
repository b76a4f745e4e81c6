use std::time::Duration;

/// Failure of a single upload attempt. The `Display` text is meant to be shown
/// to the user as a transient notice.
#[derive(Debug, thiserror::Error)]
pub enum MealError {
    #[error("{0}")]
    Validation(String),
    #[error("an upload is already in progress")]
    UploadInProgress,
    #[error("could not read the image: {0}")]
    Decode(String),
    #[error("calorie detection failed: {0}")]
    Detection(String),
    #[error("calorie detection timed out after {}s", .0.as_secs_f32())]
    DetectionTimeout(Duration),
}

/// Failure to mirror the collection into the store. Never fatal: the
/// in-memory collection stays authoritative.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("serialize meals: {0}")]
    Serialize(#[from] serde_json::Error),
    #[error("write `{key}`: {reason}")]
    Write { key: String, reason: String },
}

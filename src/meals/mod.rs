mod dto;
mod repo;
mod services;
pub mod summary;

pub use dto::{MealRecord, Mutation, UploadState};
pub use repo::MealRepo;
pub use services::{MealTracker, UploadLimits};

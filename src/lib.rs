pub mod config;
pub mod error;
pub mod estimator;
pub mod images;
pub mod meals;
pub mod state;
pub mod storage;

pub mod dto;
pub mod services;

pub use dto::{DecodedImage, UploadFile, UploadSource};

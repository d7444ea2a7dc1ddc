//! Whisper model catalog and installation.

pub mod catalog;
#[cfg(feature = "model-download")]
pub mod download;

pub use catalog::{ModelInfo, get_model, list_models, resolve_name};
#[cfg(feature = "model-download")]
pub use download::{download_model, ensure_model, is_model_installed, model_path, models_dir};

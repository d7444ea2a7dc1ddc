//! Model download and installation management.
//!
//! Downloads Whisper models from HuggingFace, verifies their integrity, and
//! stores them in the user's cache directory.

use crate::error::{Result, ScribedError};
use crate::models::catalog::{get_model, resolve_name};
use futures_util::StreamExt;
use indicatif::{ProgressBar, ProgressStyle};
use sha1::{Digest, Sha1};
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

/// Directory where models are stored (`~/.cache/scribed/models/`).
pub fn models_dir() -> PathBuf {
    dirs::cache_dir()
        .unwrap_or_else(|| PathBuf::from(".cache"))
        .join("scribed")
        .join("models")
}

/// Full path for a model file, whether or not it exists on disk.
pub fn model_path(name: &str) -> PathBuf {
    let resolved = resolve_name(name);
    models_dir().join(format!("ggml-{resolved}.bin"))
}

/// Check if a model is installed.
pub fn is_model_installed(name: &str) -> bool {
    model_path(name).exists()
}

/// Core download: fetch url, save to path, verify sha1 if non-empty.
async fn download_to_path(
    name: &str,
    url: &str,
    sha1: &str,
    size_mb: u32,
    output_path: &Path,
    progress: bool,
) -> Result<()> {
    if let Some(parent) = output_path.parent() {
        fs::create_dir_all(parent)
            .map_err(|e| ScribedError::Other(format!("Failed to create models directory: {e}")))?;
    }

    info!(model = name, size_mb, "downloading model");

    let client = reqwest::Client::new();
    let response = client
        .get(url)
        .send()
        .await
        .map_err(|e| ScribedError::Other(format!("Failed to start download: {e}")))?;

    if !response.status().is_success() {
        return Err(ScribedError::Other(format!(
            "Download failed with status: {}",
            response.status()
        )));
    }

    let total_size = response.content_length().unwrap_or(0);

    let pb = if progress {
        let pb = ProgressBar::new(total_size);
        pb.set_style(
            // SAFETY: hardcoded template string — always valid
            #[allow(clippy::expect_used)]
            ProgressStyle::default_bar()
                .template("{spinner:.green} [{bar:40.cyan/blue}] {bytes}/{total_bytes} ({eta})")
                .expect("hardcoded progress bar template")
                .progress_chars("#>-"),
        );
        Some(pb)
    } else {
        None
    };

    let mut hasher = Sha1::new();
    let mut stream = response.bytes_stream();
    let mut file = fs::File::create(output_path)
        .map_err(|e| ScribedError::Other(format!("Failed to create output file: {e}")))?;

    while let Some(chunk) = stream.next().await {
        let chunk =
            chunk.map_err(|e| ScribedError::Other(format!("Failed to read download chunk: {e}")))?;

        file.write_all(&chunk)
            .map_err(|e| ScribedError::Other(format!("Failed to write to file: {e}")))?;

        hasher.update(&chunk);

        if let Some(ref pb) = pb {
            pb.inc(chunk.len() as u64);
        }
    }

    if let Some(pb) = pb {
        pb.finish_with_message("Downloaded");
    }

    if !sha1.is_empty() {
        let calculated_hash = format!("{:x}", hasher.finalize());
        if calculated_hash != sha1 {
            if let Err(e) = fs::remove_file(output_path) {
                warn!(error = %e, "failed to remove corrupted download");
            }
            return Err(ScribedError::Other(format!(
                "SHA-1 checksum mismatch. Expected: {sha1}, got: {calculated_hash}"
            )));
        }
    }

    info!(model = name, path = %output_path.display(), "model installed");
    Ok(())
}

/// Download a catalog model, skipping if already installed.
///
/// # Errors
///
/// Returns an error if the model is not in the catalog, the download fails,
/// the SHA-1 checksum doesn't match, or the file cannot be written.
pub async fn download_model(name: &str, progress: bool) -> Result<PathBuf> {
    let path = model_path(name);

    if path.exists() {
        info!(model = name, path = %path.display(), "model already installed");
        return Ok(path);
    }

    let info = get_model(name).ok_or_else(|| {
        ScribedError::Other(format!(
            "Model '{name}' not found in catalog.\n\
             Run 'scribed models list' to see available models."
        ))
    })?;

    download_to_path(name, &info.url(), info.sha1, info.size_mb, &path, progress).await?;
    Ok(path)
}

/// Path to the named model, downloading it first if necessary.
pub async fn ensure_model(name: &str, progress: bool) -> Result<PathBuf> {
    if is_model_installed(name) {
        Ok(model_path(name))
    } else {
        download_model(name, progress).await
    }
}

/// List all installed model names by scanning the models directory.
///
/// Discovers every `ggml-*.bin` file, not just catalog models.
pub fn list_installed_models() -> Vec<String> {
    let dir = models_dir();
    let entries = match fs::read_dir(&dir) {
        Ok(entries) => entries,
        Err(_) => return Vec::new(),
    };

    let mut names: Vec<String> = entries
        .filter_map(|entry| {
            let entry = entry.ok()?;
            let name = entry.file_name();
            let name = name.to_str()?;
            let model = name.strip_prefix("ggml-")?.strip_suffix(".bin")?;
            if entry.path().is_file() {
                Some(model.to_string())
            } else {
                None
            }
        })
        .collect();

    names.sort();
    names
}

/// Format model information for display.
pub fn format_model_info(model: &crate::models::catalog::ModelInfo) -> String {
    let status = if is_model_installed(model.name) {
        "[installed]"
    } else {
        "[not installed]"
    };
    format!("{:12} {:5} MB   {}", model.name, model.size_mb, status)
}

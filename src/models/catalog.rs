//! Whisper model metadata catalog.

/// Metadata for a Whisper model.
#[derive(Debug, Clone, PartialEq)]
pub struct ModelInfo {
    /// Model identifier (e.g., "tiny.en", "base", "large")
    pub name: &'static str,
    /// Model size in megabytes
    pub size_mb: u32,
    /// SHA-1 checksum; empty means skip verification
    pub sha1: &'static str,
    /// Whether this model supports English only
    pub english_only: bool,
}

impl ModelInfo {
    /// Download URL on HuggingFace.
    pub fn url(&self) -> String {
        format!(
            "https://huggingface.co/ggerganov/whisper.cpp/resolve/main/ggml-{}.bin",
            self.name
        )
    }
}

/// Catalog of available Whisper models.
///
/// Models range from tiny (75 MB, fast, lower accuracy) to large (3094 MB,
/// slower, highest accuracy). The `.en` suffix indicates English-only models,
/// which are faster at the same size; a server doing auto language detection
/// needs a multilingual one.
pub const MODELS: &[ModelInfo] = &[
    ModelInfo {
        name: "tiny.en",
        size_mb: 75,
        sha1: "c78c86eb1a8faa21b369bcd33207cc90d64ae9df",
        english_only: true,
    },
    ModelInfo {
        name: "tiny",
        size_mb: 75,
        sha1: "bd577a113a864445d4c299885e0cb97d4ba92b5f",
        english_only: false,
    },
    ModelInfo {
        name: "base.en",
        size_mb: 142,
        sha1: "137c40403d78fd54d454da0f9bd998f78703390c",
        english_only: true,
    },
    ModelInfo {
        name: "base",
        size_mb: 142,
        sha1: "465707469ff3a37a2b9b8d8f89f2f99de7299dac",
        english_only: false,
    },
    ModelInfo {
        name: "small.en",
        size_mb: 466,
        sha1: "db8a495a91d927739e50b3fc1cc4c6b8f6c2d022",
        english_only: true,
    },
    ModelInfo {
        name: "small",
        size_mb: 466,
        sha1: "55356645c2b361a969dfd0ef2c5a50d530afd8d5",
        english_only: false,
    },
    ModelInfo {
        name: "medium.en",
        size_mb: 1533,
        sha1: "8c30f0e44ce9560643ebd10bbe50cd20eafd3723",
        english_only: true,
    },
    ModelInfo {
        name: "medium",
        size_mb: 1533,
        sha1: "fd9727b6e1217c2f614f9b698455c4ffd82463b4",
        english_only: false,
    },
    ModelInfo {
        name: "large-v3",
        size_mb: 3094,
        sha1: "ad82bf6a9043ceed055076d0fd39f5f186ff8062",
        english_only: false,
    },
];

/// Resolve user-facing aliases to catalog names.
pub fn resolve_name(name: &str) -> &str {
    match name {
        "large" => "large-v3",
        other => other,
    }
}

/// Find a model by name.
pub fn get_model(name: &str) -> Option<&'static ModelInfo> {
    let resolved = resolve_name(name);
    MODELS.iter().find(|m| m.name == resolved)
}

/// Get all available models.
pub fn list_models() -> &'static [ModelInfo] {
    MODELS
}

//! Error types for settings document conversion.

/// Errors raised while converting settings documents to and from trees.
#[derive(Debug, thiserror::Error)]
pub enum TreeError {
    #[error("TOML parse error: {0}")]
    TomlParse(#[from] toml::de::Error),

    #[error("TOML serialization error: {0}")]
    TomlSerialize(#[from] toml::ser::Error),

    #[error("JSON parse error: {0}")]
    JsonParse(#[from] serde_json::Error),

    #[error("Document root must be a {expected}")]
    InvalidRoot { expected: &'static str },
}

use std::path::PathBuf;
use thiserror::Error;

/// Errors returned by BizyAir operations.
#[derive(Error, Debug)]
pub enum BizyAirError {
    /// No API key was supplied and the key file had none.
    #[error("No API key found")]
    MissingApiKey,

    /// A required input (task id, image, URL) was empty.
    #[error("Missing required input: {0}")]
    MissingInput(&'static str),

    /// BizyAir returned a non-success HTTP status.
    #[error("BizyAir returned HTTP {status}: {body}")]
    Http { status: u16, body: String },

    /// The response from BizyAir was missing expected fields.
    #[error("{0}")]
    InvalidResponse(String),

    /// Network-level request failure with context.
    #[error("{context}: {source}")]
    Network {
        context: String,
        source: reqwest::Error,
    },

    /// The image bytes could not be encoded or decoded.
    #[error("Image codec error: {0}")]
    Image(#[from] image::ImageError),

    /// The tensor shape or data does not describe a usable image.
    #[error("Malformed image tensor: {0}")]
    MalformedTensor(String),

    /// A `data:` URI that is not a base64 image payload.
    #[error("Invalid data URI: {0}")]
    InvalidDataUri(String),

    #[error("Base64 decode error: {0}")]
    Base64(#[from] base64::DecodeError),

    /// Local file access (key file, image cache) failed.
    #[error("{}: {source}", path.display())]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    /// JSON serialization/deserialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl BizyAirError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        BizyAirError::Io {
            path: path.into(),
            source,
        }
    }
}

/// Convenience alias.
pub type Result<T> = std::result::Result<T, BizyAirError>;

use std::path::PathBuf;

use thiserror::Error;

/// Library error type for slide-frame operations.
#[derive(Debug, Error)]
pub enum Error {
    /// A configuration value is present but unusable.
    #[error("invalid option {field}: {reason}")]
    InvalidOption { field: &'static str, reason: String },

    /// The image at `path` could not be decoded.
    #[error("failed to decode {}: {source}", path.display())]
    Decode {
        path: PathBuf,
        #[source]
        source: image::ImageError,
    },

    /// Underlying IO error.
    #[error(transparent)]
    Io(#[from] std::io::Error),

    /// YAML/serde configuration error.
    #[error(transparent)]
    Config(#[from] serde_yaml::Error),

    /// Malformed per-folder `options.json`.
    #[error(transparent)]
    FolderOptions(#[from] serde_json::Error),
}

pub type Result<T, E = Error> = std::result::Result<T, E>;

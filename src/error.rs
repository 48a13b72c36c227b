use std::path::PathBuf;
use thiserror::Error;

/// Shown whenever a failure carries nothing a user could act on.
pub const GENERIC_ERROR_MESSAGE: &str =
    "Something went wrong while talking to the recipe service. Please try again.";

#[derive(Error, Debug)]
pub enum RecipeMuseError {
    #[error("Failed to read image file {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("The selected image file is empty")]
    EmptyImage,

    #[error("Unsupported image type '{0}'. Use a JPEG, PNG, GIF or WebP photo")]
    UnsupportedImage(String),

    #[error("{0}")]
    Service(String),

    #[error("Unknown error")]
    Unknown,

    #[error("Configuration error: {0}")]
    Config(String),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl RecipeMuseError {
    pub fn service(message: impl Into<String>) -> Self {
        Self::Service(message.into())
    }

    /// Collapse the error into the single line a front end shows the user.
    pub fn user_message(&self) -> String {
        match self {
            Self::Io { source, .. } => format!("Could not read the selected image: {source}"),
            Self::Service(message) if message.trim().is_empty() => {
                GENERIC_ERROR_MESSAGE.to_string()
            }
            Self::Service(message) => message.clone(),
            Self::Unknown => GENERIC_ERROR_MESSAGE.to_string(),
            Self::Other(e) => {
                let message = e.to_string();
                if message.trim().is_empty() {
                    GENERIC_ERROR_MESSAGE.to_string()
                } else {
                    message
                }
            }
            other => other.to_string(),
        }
    }
}

pub type Result<T> = std::result::Result<T, RecipeMuseError>;

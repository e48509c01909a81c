use std::path::PathBuf;

/// Result alias that carries the custom [`PetError`] type.
pub type Result<T> = std::result::Result<T, PetError>;

/// Common error type for the core crate.
#[derive(Debug, thiserror::Error)]
pub enum PetError {
    /// Free-form message for conditions that have no dedicated variant.
    #[error("{0}")]
    Message(String),
    /// A configuration document was missing or could not be parsed. Always
    /// recovered by substituting the built-in default.
    #[error("config `{path}`: {reason}")]
    Config { path: PathBuf, reason: String },
    /// The skin image that should be displayed does not exist on disk.
    #[error("skin image not found: {0}")]
    SkinMissing(PathBuf),
    /// Audio capture could not be established.
    #[error("audio capture setup failed: {0}")]
    CaptureSetup(String),
    /// A pixel could not be read for hit testing.
    #[error("hit test failed: {0}")]
    HitTest(String),
    /// The frequency snapshot does not cover the fixed band ranges.
    #[error("frequency snapshot has {len} bins, at least 120 are required")]
    ShortSnapshot { len: usize },
    #[error("{0}")]
    Io(#[from] std::io::Error),
    #[error("{0}")]
    Json(#[from] serde_json::Error),
    #[error("{0}")]
    Image(#[from] image::ImageError),
    #[error("fft: {0}")]
    Fft(#[from] realfft::FftError),
}

impl PetError {
    /// Creates a new error that simply wraps the provided message.
    pub fn msg<T: Into<String>>(msg: T) -> Self {
        Self::Message(msg.into())
    }

    pub fn config(path: impl Into<PathBuf>, reason: impl ToString) -> Self {
        Self::Config {
            path: path.into(),
            reason: reason.to_string(),
        }
    }

    /// Only a missing skin ends the process; every other error is recovered
    /// by its caller.
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::SkinMissing(_))
    }
}

impl From<&str> for PetError {
    fn from(value: &str) -> Self {
        Self::msg(value)
    }
}

impl From<String> for PetError {
    fn from(value: String) -> Self {
        Self::Message(value)
    }
}

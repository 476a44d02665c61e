//! Error types for the licensing module.

use thiserror::Error;

/// Licensing-specific errors.
#[derive(Debug, Error)]
pub enum LicenseError {
    /// Caller supplied empty or malformed input. Never reaches the network.
    #[error("validation error: {0}")]
    Validation(String),

    /// Transport failure: DNS, refused connection, timeout, malformed body.
    #[error("network error: {0}")]
    Network(String),

    /// The license service answered and reported a logical failure.
    /// The message is the service's own text, unmodified.
    #[error("{0}")]
    Service(String),

    /// The reply's integrity stamp does not match the request it answers.
    #[error("response integrity check failed")]
    Tampered,

    /// Malformed hex on the legacy cipher path.
    #[error("cipher error: {0}")]
    Decode(#[from] kami_crypto::CryptoError),

    /// Local persistent storage failed.
    #[error("storage error: {0}")]
    Storage(String),

    /// Serialization error.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// The name the verification flow uses for [`LicenseError`].
pub type VerificationError = LicenseError;

/// Result type for license operations.
pub type LicenseResult<T> = Result<T, LicenseError>;

impl LicenseError {
    /// Text safe to show an end user.
    ///
    /// Service messages pass through verbatim. Decode, storage and
    /// serialization internals are replaced by a generic message.
    #[must_use]
    pub fn user_message(&self) -> String {
        match self {
            Self::Validation(msg) | Self::Service(msg) => msg.clone(),
            Self::Network(_) => "network error".to_string(),
            Self::Tampered => "数据被修改，验证失败".to_string(),
            Self::Decode(_) | Self::Storage(_) | Self::Serialization(_) => {
                "internal error, please try again later".to_string()
            }
        }
    }

    /// Whether retrying the same request later may succeed.
    #[must_use]
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Network(_))
    }
}

impl From<std::io::Error> for LicenseError {
    fn from(err: std::io::Error) -> Self {
        Self::Storage(err.to_string())
    }
}

#[cfg(feature = "online")]
impl From<reqwest::Error> for LicenseError {
    fn from(err: reqwest::Error) -> Self {
        Self::Network(err.to_string())
    }
}

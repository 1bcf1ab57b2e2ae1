//! Errors raised while building or reading a canonical configuration

use thiserror::Error;

/// Error type for configuration operations
#[derive(Debug, Error, Clone, PartialEq)]
pub enum SettingsError {
    /// The document cannot be turned into a canonical configuration
    #[error("configuration invalid: {0}")]
    Invalid(String),

    /// A setting read by the controller has an unexpected shape
    #[error("cannot unpack setting {key}: {message}")]
    Unpack {
        /// Dotted key of the setting
        key: String,
        /// What was expected
        message: String,
    },

    /// The configuration cannot be rendered to YAML
    #[error("cannot render configuration: {0}")]
    Render(String),
}

impl SettingsError {
    /// Create an invalid-configuration error
    pub fn invalid(msg: impl Into<String>) -> Self {
        Self::Invalid(msg.into())
    }

    /// Create an unpack error for a setting
    pub fn unpack(key: impl Into<String>, msg: impl Into<String>) -> Self {
        Self::Unpack {
            key: key.into(),
            message: msg.into(),
        }
    }
}

impl From<SettingsError> for eskube_common::Error {
    fn from(e: SettingsError) -> Self {
        eskube_common::Error::settings(e.to_string())
    }
}

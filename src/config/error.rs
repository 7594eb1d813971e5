//! Configuration error types.

/// Errors raised while loading or validating configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigurationError {
    #[error("configuration file not found: {path}")]
    FileNotFound { path: String },

    #[error("failed to read configuration file {path}: {message}")]
    FileRead { path: String, message: String },

    #[error("failed to parse configuration file {path}: {message}")]
    Parse { path: String, message: String },

    #[error("invalid configuration: {message}")]
    Invalid { message: String },
}

impl ConfigurationError {
    pub fn file_not_found(path: impl Into<String>) -> Self {
        ConfigurationError::FileNotFound { path: path.into() }
    }

    pub fn file_read(path: impl Into<String>, message: impl Into<String>) -> Self {
        ConfigurationError::FileRead {
            path: path.into(),
            message: message.into(),
        }
    }

    pub fn parse(path: impl Into<String>, message: impl Into<String>) -> Self {
        ConfigurationError::Parse {
            path: path.into(),
            message: message.into(),
        }
    }

    pub fn invalid(message: impl Into<String>) -> Self {
        ConfigurationError::Invalid {
            message: message.into(),
        }
    }
}

pub type ConfigResult<T> = std::result::Result<T, ConfigurationError>;

//! Error handling for the hostpulse telemetry aggregator.

/// A specialized `Result` type for hostpulse operations.
pub type Result<T> = std::result::Result<T, SystemError>;

/// The main error type for hostpulse operations.
#[derive(Debug, thiserror::Error)]
pub enum SystemError {
    /// I/O operation failed
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// A sampling function could not produce a value
    #[error("Sampling failed: {0}")]
    Sampling(String),

    /// Command or probe output did not have the expected shape
    #[error("Failed to parse system information: {0}")]
    Parse(String),

    /// A native command exited unsuccessfully
    #[error("Command `{command}` failed: {message}")]
    Command { command: String, message: String },

    /// Network operation failed
    #[error("Network error: {0}")]
    Network(String),

    /// JSON encoding or decoding failed
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// State store misuse (wrong value shape, duplicate key owner)
    #[error("State store error: {0}")]
    Store(String),

    /// Web server error
    #[error("Web server error: {0}")]
    WebServer(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),
}

impl SystemError {
    /// Create a new sampling error
    pub fn sampling_error(msg: impl Into<String>) -> Self {
        Self::Sampling(msg.into())
    }

    /// Create a new parse error
    pub fn parse_error(msg: impl Into<String>) -> Self {
        Self::Parse(msg.into())
    }

    /// Create a new command error
    pub fn command_error(command: impl Into<String>, msg: impl Into<String>) -> Self {
        Self::Command {
            command: command.into(),
            message: msg.into(),
        }
    }

    /// Create a new network error
    pub fn network_error(msg: impl Into<String>) -> Self {
        Self::Network(msg.into())
    }

    /// Create a new state store error
    pub fn store_error(msg: impl Into<String>) -> Self {
        Self::Store(msg.into())
    }

    /// Create a new web server error
    pub fn web_server_error(msg: impl Into<String>) -> Self {
        Self::WebServer(msg.into())
    }

    /// Create a new configuration error
    pub fn config_error(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }
}

impl From<reqwest::Error> for SystemError {
    fn from(err: reqwest::Error) -> Self {
        Self::Network(err.to_string())
    }
}

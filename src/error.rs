//! Error types for remote-config-watch.

/// Result type alias for remote-config-watch operations.
pub type Result<T> = std::result::Result<T, ConfigError>;

/// Errors that can occur when talking to the remote config service or
/// managing listeners.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConfigError {
    /// Network or protocol failure while talking to the remote service.
    #[error("Transport error: {0}")]
    TransportError(String),

    /// The namespace does not exist on the remote service.
    #[error("Namespace not found: {0}")]
    NotFoundError(String),

    /// A listener failed while processing a change event.
    #[error("Listener failed on {namespace}/{key}: {message}")]
    ListenerFault {
        /// Namespace of the event being processed
        namespace: String,
        /// Key of the event being processed
        key: String,
        /// Failure description
        message: String,
    },

    /// A listener registration was rejected.
    #[error("Registration error: {0}")]
    RegistrationError(String),

    /// The requested key is absent from the cached namespace.
    #[error("Property not found: {0}")]
    PropertyNotFound(String),

    /// Raw namespace content could not be parsed into key/value pairs.
    #[error("Failed to parse configuration: {0}")]
    ParseError(String),

    /// Client settings could not be loaded.
    #[error("Failed to load settings: {0}")]
    LoadError(String),

    /// Generic error for other cases.
    #[error("Configuration error: {0}")]
    Other(String),
}

impl ConfigError {
    /// Whether the poll loop should back off and retry after this error.
    ///
    /// Inside the loop a missing namespace is retried too, since it may be
    /// published later.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::TransportError(_) | Self::NotFoundError(_) | Self::ParseError(_))
    }
}

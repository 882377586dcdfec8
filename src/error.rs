//! Error types for the messenger store.

/// Configuration-related errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid configuration value for {key}: {message}")]
    InvalidValue { key: String, message: String },
}

/// Storage errors, shared by every backend.
#[derive(Debug, thiserror::Error)]
pub enum DatabaseError {
    /// The relational engine could not be opened. Only ever logged by the
    /// selector, which falls back to the key-value store.
    #[error("Backend unavailable: {0}")]
    Unavailable(String),

    #[error("Email already exists: {email}")]
    DuplicateEmail { email: String },

    #[error("Unknown user id {id}")]
    UnknownUser { id: i64 },

    #[error("Query failed: {0}")]
    Query(String),

    #[error("Storage I/O failed: {0}")]
    Io(String),

    #[error("Schema creation failed: {0}")]
    Schema(String),

    #[error("Serialization error: {0}")]
    Serialization(String),
}

/// Sign-up / sign-in errors.
#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    #[error("No account found for {email}")]
    NotFound { email: String },

    #[error("Wrong password")]
    WrongPassword,

    #[error("Password hashing failed: {0}")]
    Hashing(String),

    #[error(transparent)]
    Database(#[from] DatabaseError),
}

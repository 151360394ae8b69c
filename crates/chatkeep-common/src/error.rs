pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// A durable read or write failed. In-memory state may already reflect the mutation.
    #[error("store error: {0}")]
    Store(String),

    /// The request never reached the endpoint, or was rejected without a structured body.
    #[error("transport error: {0}")]
    Transport(String),

    /// The endpoint answered with a structured error payload.
    #[error("provider error: {0}")]
    Provider(String),

    #[error("empty completion")]
    EmptyCompletion,

    #[error("unknown chat: {0}")]
    UnknownChat(String),

    #[error("no API key configured")]
    MissingApiKey,

    #[error("validation error: {0}")]
    Validation(String),

    #[error("config error: {0}")]
    Config(String),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

use thiserror::Error;

#[derive(Debug, Error)]
pub enum AtriumError {
    #[error("configuration error: {0}")]
    Config(String),
    #[error("transport error: {0}")]
    Transport(String),
    #[error("serialization error: {0}")]
    Serialization(String),
    #[error("runtime error: {0}")]
    Runtime(String),
    #[error("malformed envelope: {0}")]
    MalformedEnvelope(String),
    #[error("envelope is missing required field `{0}`")]
    MissingRequiredField(String),
    #[error("bad message header format: {0}")]
    BadMessageHeaderFormat(String),
    #[error("no dispatch target registered for message type `{0}`")]
    UnregisteredMessageType(String),
    #[error("handler construction failed: {0}")]
    HandlerConstruction(String),
    #[error("hash ring must contain at least one node")]
    EmptyRing,
}

impl AtriumError {
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            Self::BadMessageHeaderFormat(_)
                | Self::UnregisteredMessageType(_)
                | Self::MalformedEnvelope(_)
                | Self::MissingRequiredField(_)
        )
    }
}

pub type Result<T> = std::result::Result<T, AtriumError>;

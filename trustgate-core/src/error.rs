use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TrustError {
    #[error("shared devices cannot be registered as trusted")]
    SharedDeviceRejected,

    #[error("missing required field: {0}")]
    MissingField(&'static str),

    #[error("invalid trust duration: {0} days (allowed 1..=365)")]
    InvalidTrustDuration(i64),

    #[error("invalid owner type: {0}")]
    InvalidOwnerType(String),
}

pub type Result<T> = std::result::Result<T, TrustError>;

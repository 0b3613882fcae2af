use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error, Serialize, Deserialize)]
pub enum Error {
    #[error("Invalid operation")]
    InvalidOperation,
    #[error("Invalid guess: {0}")]
    InvalidInput(String),
    #[error("Invalid username: {0}")]
    InvalidUsername(String),
    #[error("Invalid score value: {0}")]
    InvalidScore(i64),
    #[error("Listings unavailable: {0}")]
    DataUnavailable(String),
    #[error("Failed to submit score: {0}")]
    SubmissionFailure(String),
    #[error("User not found")]
    UserNotFound,
}

pub type Result<T> = std::result::Result<T, Error>;

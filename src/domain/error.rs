use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    #[error("Task title cannot be empty")]
    EmptyTitle,

    #[error("Update must change the title or the description")]
    EmptyUpdate,

    #[error("Unknown status: {0}")]
    InvalidStatus(String),

    #[error("Unknown filter: {0}")]
    InvalidFilter(String),
}

pub type ValidationResult<T> = Result<T, ValidationError>;

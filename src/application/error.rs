use crate::domain::ValidationError;
use crate::ports::{ApiError, ConfigError};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum AppError {
    #[error("Invalid input: {0}")]
    Validation(#[from] ValidationError),

    #[error("API error: {0}")]
    Api(#[from] ApiError),

    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),
}

pub type AppResult<T> = Result<T, AppError>;

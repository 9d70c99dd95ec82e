use thiserror::Error;

pub type Result<T> = std::result::Result<T, AppError>;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),
    #[error("product code already exists: {0}")]
    DuplicateProduct(String),
    #[error("not a recognized backup file")]
    InvalidBackup,
    #[error("validation error: {0}")]
    Validation(String),
}

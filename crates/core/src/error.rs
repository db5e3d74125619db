use thiserror::Error;

use crate::event::ParseCategoryError;

#[derive(Error, Debug)]
pub enum CoreError {
    #[error("Malformed event: {0}")]
    Event(#[from] serde_json::Error),

    #[error(transparent)]
    Category(#[from] ParseCategoryError),

    #[error("{0}")]
    Other(String),
}

pub type Result<T> = std::result::Result<T, CoreError>;

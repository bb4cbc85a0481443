use thiserror::Error;

#[derive(Debug, Error)]
pub enum ModelError {
    #[error("code not found in codelist: {code}")]
    CodeNotFound { code: String },
}

pub type Result<T> = std::result::Result<T, ModelError>;

use thiserror::Error;

/// Fatal build failures. Everything recoverable becomes a
/// [`crate::BuildIssue`] instead; only a missing or unparsable entry
/// document aborts a build.
#[derive(Debug, Error)]
pub enum BuildError {
    #[error("failed to load source document: {0}")]
    Registry(#[from] codebook_registry::RegistryError),
}

pub type Result<T> = std::result::Result<T, BuildError>;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum RegistryError {
    #[error(transparent)]
    Ingest(#[from] codebook_ingest::IngestError),
}

pub type Result<T> = std::result::Result<T, RegistryError>;

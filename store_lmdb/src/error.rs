use thiserror::Error;

#[derive(Debug, Error)]
pub enum LmdbError {
    #[error("LMDB error: {0}")]
    Heed(#[from] heed::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] bincode::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("data directory {0} exists but holds no data.mdb")]
    MissingDataFile(String),
}

impl From<LmdbError> for lattice_store::StoreError {
    fn from(e: LmdbError) -> Self {
        match e {
            LmdbError::Serialization(e) => lattice_store::StoreError::Serialization(e.to_string()),
            other => lattice_store::StoreError::Backend(other.to_string()),
        }
    }
}

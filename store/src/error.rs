use thiserror::Error;

/// Failure of the storage collaborator. Fatal to the transaction it occurs in.
#[derive(Debug, Error)]
pub enum StoreError {
    /// The backend could not begin, read, write or commit.
    #[error("storage backend error: {0}")]
    Backend(String),

    /// A stored record could not be encoded or decoded.
    #[error("record encoding error: {0}")]
    Serialization(String),
}

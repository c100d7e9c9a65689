use crate::domain::order::ValidationError;
use crate::storage::StoreError;
use crate::utils::IsTransient;

// ============================================================================
// Service Error Taxonomy
// ============================================================================
//
// - InvalidInput and AlreadyExists are terminal: retrying cannot change them.
// - NotFound is an outcome, not a fault; nothing logs it as an error.
// - Storage is the only transient class, and only the ingestion path retries
//   it; the API surfaces it directly.
//
// ============================================================================

#[derive(Debug, thiserror::Error)]
pub enum OrderServiceError {
    #[error("invalid order: {0}")]
    InvalidInput(#[from] ValidationError),

    #[error("order {0} already exists")]
    AlreadyExists(String),

    #[error("order {0} not found")]
    NotFound(String),

    #[error("storage failure: {0}")]
    Storage(#[from] StoreError),
}

impl IsTransient for OrderServiceError {
    fn is_transient(&self) -> bool {
        matches!(self, Self::Storage(_))
    }
}

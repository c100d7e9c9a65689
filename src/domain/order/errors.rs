// ============================================================================
// Order Structural Validation Errors
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
    #[error("required field is empty: {0}")]
    EmptyField(&'static str),

    #[error("order must contain at least one item")]
    EmptyItems,

    #[error("field {field} must not be negative, got {value}")]
    Negative { field: &'static str, value: i64 },
}

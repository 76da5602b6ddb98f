use eurogenius_db::models::DrawValidationError;
use eurogenius_db::store::StoreError;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, StatsError>;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum StatsError {
    /// Malformed request: out-of-range value, duplicates, include/exclude
    /// conflict or a pool too small to fill the combination.
    #[error("validation error: {0}")]
    Validation(String),

    /// The incoming draw is structurally invalid. Nothing was written.
    #[error("ingestion error: {0}")]
    Ingestion(String),

    #[error("store unavailable: {0}")]
    StoreUnavailable(#[source] StoreError),

    /// The ingestion transaction was rolled back.
    #[error("transaction failed and was rolled back: {0}")]
    TransactionFailure(#[source] StoreError),

    #[error(transparent)]
    Store(StoreError),

    #[error("configuration error: {0}")]
    Config(String),

    #[error("draw provider error: {0}")]
    Provider(String),
}

impl StatsError {
    pub fn validation(msg: impl Into<String>) -> Self {
        StatsError::Validation(msg.into())
    }

    /// Whether the same call may succeed if repeated unchanged.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            StatsError::StoreUnavailable(_) | StatsError::TransactionFailure(_)
        )
    }
}

impl From<StoreError> for StatsError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::Unavailable(_) => StatsError::StoreUnavailable(err),
            StoreError::Backend(_) => StatsError::Store(err),
        }
    }
}

impl From<DrawValidationError> for StatsError {
    fn from(err: DrawValidationError) -> Self {
        StatsError::Ingestion(err.to_string())
    }
}

/// Errors raised while an ingestion transaction is open: unavailability is
/// kept distinct, everything else is a rolled-back transaction.
pub(crate) fn tx_error(err: StoreError) -> StatsError {
    match err {
        StoreError::Unavailable(_) => StatsError::StoreUnavailable(err),
        StoreError::Backend(_) => StatsError::TransactionFailure(err),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_store_error_mapping() {
        assert!(matches!(
            StatsError::from(StoreError::unavailable("timeout")),
            StatsError::StoreUnavailable(_)
        ));
        assert!(matches!(
            StatsError::from(StoreError::backend("bad row")),
            StatsError::Store(_)
        ));
        assert!(matches!(
            tx_error(StoreError::backend("constraint")),
            StatsError::TransactionFailure(_)
        ));
    }

    #[test]
    fn test_retryable() {
        assert!(StatsError::StoreUnavailable(StoreError::unavailable("x")).is_retryable());
        assert!(StatsError::TransactionFailure(StoreError::backend("x")).is_retryable());
        assert!(!StatsError::validation("x").is_retryable());
        assert!(!StatsError::Ingestion("x".into()).is_retryable());
    }

    #[test]
    fn test_draw_validation_becomes_ingestion_error() {
        let err: StatsError = DrawValidationError::DuplicateStar(3).into();
        assert_eq!(err, StatsError::Ingestion("duplicate star: 3".into()));
    }
}

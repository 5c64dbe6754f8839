use thiserror::Error;

/// Input rejected before any persistence call is made.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    #[error("Item name must not be empty")]
    EmptyName,

    #[error("Item name must be at most {max} characters")]
    NameTooLong { max: usize },

    #[error("Quantity must be a non-negative number")]
    InvalidQuantity,
}

/// Refusals from the list coordinator's retry handling.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CoordinatorError {
    #[error("There is no failed operation to retry")]
    NothingToRetry,

    #[error("Retried {max} times already. Please wait a moment and try again")]
    RetryLimitReached { max: u32 },
}

/// True when `err` is a [`ValidationError`].
#[must_use]
pub fn is_validation_error(err: &anyhow::Error) -> bool {
    err.downcast_ref::<ValidationError>().is_some()
}

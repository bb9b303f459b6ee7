use std::sync::PoisonError;

use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum FortunaError {
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),
    #[error("Invalid state: {0}")]
    InvalidState(String),
    #[error("Wrong size: {given} given should be {expected}")]
    SizeError { given: usize, expected: usize },
    #[error("Entropy source failure: {0}")]
    EntropySource(String),
    #[error("{0}")]
    HardwareCapability(String),
}

impl<T> From<PoisonError<T>> for FortunaError {
    fn from(e: PoisonError<T>) -> Self {
        FortunaError::InvalidState(format!("lock poisoned: {e}"))
    }
}

impl From<FortunaError> for rand_core::Error {
    fn from(e: FortunaError) -> Self {
        rand_core::Error::new(e)
    }
}

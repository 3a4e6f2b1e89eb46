use reqwest::StatusCode;
use thiserror::Error;

/// A mapping value that does not match the struct shape it was read as.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DecodeError {
    #[error("malformed {shape} struct: {reason}")]
    MalformedStruct { shape: &'static str, reason: String },
}

impl DecodeError {
    pub(crate) fn malformed(shape: &'static str, reason: impl Into<String>) -> Self {
        DecodeError::MalformedStruct {
            shape,
            reason: reason.into(),
        }
    }
}

#[derive(Debug, Error)]
pub enum FetchError {
    #[error("failed to build HTTP client: {0}")]
    Client(#[source] reqwest::Error),

    #[error("node unreachable: {0}")]
    Unreachable(#[source] reqwest::Error),

    #[error("node responded with unexpected status {0}")]
    Unexpected(StatusCode),

    #[error("node returned an unreadable body: {0}")]
    InvalidBody(String),
}

/// User input rejected before anything is encoded or sent to a wallet.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("market id `{0}` is not a field element")]
    MarketId(String),

    #[error("outcome `{0}` must be 0 (no) or 1 (yes)")]
    Outcome(String),

    #[error("amount `{0}` must be a positive whole number of microcredits")]
    Amount(String),

    #[error("resolution height `{0}` is not a valid block height")]
    ResolutionHeight(String),

    #[error("`{0}` is not an aleo address")]
    Address(String),
}

/// A lifecycle operation invoked from a state that does not allow it.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("cannot {operation} while {state}")]
pub struct InvalidStateError {
    pub operation: &'static str,
    pub state: &'static str,
}

impl InvalidStateError {
    pub fn new(operation: &'static str, state: &'static str) -> Self {
        Self { operation, state }
    }
}

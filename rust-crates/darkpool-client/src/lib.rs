pub mod chain;
pub mod codec;
pub mod config;
pub mod error;
pub mod submission;
pub mod transactions;
pub mod types;
pub mod wallet;

#[cfg(feature = "test-helpers")]
pub mod test_helpers;

pub use chain::ChainStateClient;
pub use config::{
    ClientConfig,
    NetworkEnv,
};
pub use submission::{
    FailureKind,
    SubmissionFlow,
    SubmissionStatus,
    TransactionRecord,
};
pub use transactions::{
    TransactionBuilder,
    TransitionInput,
};
pub use wallet::{
    SessionState,
    WalletProvider,
    WalletSession,
};

use crate::{
    config::ClientConfig,
    error::{
        InvalidStateError,
        ValidationError,
    },
    transactions::{
        BuildError,
        TransactionBuilder,
        TransitionInput,
        TransitionIntent,
    },
    types::TransactionId,
    wallet::{
        ProviderError,
        SessionError,
        WalletProvider,
        WalletSession,
    },
};
use chrono::{
    DateTime,
    Utc,
};
use thiserror::Error;
use tokio::sync::watch;
use tracing::{
    info,
    warn,
};

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum SubmissionStatus {
    #[default]
    Idle,
    Validating,
    Building,
    AwaitingSignature,
    Submitted(TransactionId),
    Confirmed(TransactionId),
    Failed(FailureKind),
}

impl SubmissionStatus {
    pub fn in_progress(&self) -> bool {
        matches!(
            self,
            SubmissionStatus::Validating
                | SubmissionStatus::Building
                | SubmissionStatus::AwaitingSignature
                | SubmissionStatus::Submitted(_)
        )
    }

    pub fn label(&self) -> &'static str {
        match self {
            SubmissionStatus::Idle => "idle",
            SubmissionStatus::Validating => "validating",
            SubmissionStatus::Building => "building",
            SubmissionStatus::AwaitingSignature => "awaiting signature",
            SubmissionStatus::Submitted(_) => "submitted",
            SubmissionStatus::Confirmed(_) => "confirmed",
            SubmissionStatus::Failed(_) => "failed",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FailureKind {
    Validation,
    UserRejected,
    InsufficientFunds,
    ProviderUnavailable,
    Unexpected,
}

impl FailureKind {
    pub fn user_message(self) -> &'static str {
        match self {
            FailureKind::Validation => "Check the market id, outcome and amount.",
            FailureKind::UserRejected => "Transaction was rejected in the wallet.",
            FailureKind::InsufficientFunds => {
                "Not enough credits for the amount and fee."
            }
            FailureKind::ProviderUnavailable => {
                "Wallet is unavailable. Reconnect it and try again."
            }
            FailureKind::Unexpected => "Transaction failed. Try again later.",
        }
    }
}

impl From<&ProviderError> for FailureKind {
    fn from(error: &ProviderError) -> Self {
        match error {
            ProviderError::UserRejected => FailureKind::UserRejected,
            ProviderError::InsufficientFunds => FailureKind::InsufficientFunds,
            ProviderError::NotReady
            | ProviderError::NotConnected
            | ProviderError::Timeout => FailureKind::ProviderUnavailable,
            ProviderError::Other { .. } => FailureKind::Unexpected,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SubmissionError {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error("failed to build transition: {0}")]
    Build(#[from] BuildError),

    #[error("no wallet connected")]
    WalletNotConnected,

    #[error(transparent)]
    InvalidState(#[from] InvalidStateError),

    #[error("no wallet provider named `{0}`")]
    UnknownProvider(String),

    #[error(transparent)]
    Provider(#[from] ProviderError),

    #[error("submission cancelled")]
    Cancelled,
}

impl SubmissionError {
    /// Category shown to the user, `None` for lifecycle misuse and cancellation.
    pub fn kind(&self) -> Option<FailureKind> {
        match self {
            SubmissionError::Validation(_) => Some(FailureKind::Validation),
            SubmissionError::Build(_) => Some(FailureKind::Unexpected),
            SubmissionError::WalletNotConnected | SubmissionError::UnknownProvider(_) => {
                Some(FailureKind::ProviderUnavailable)
            }
            SubmissionError::Provider(error) => Some(error.into()),
            SubmissionError::InvalidState(_) | SubmissionError::Cancelled => None,
        }
    }
}

impl From<SessionError> for SubmissionError {
    fn from(error: SessionError) -> Self {
        match error {
            SessionError::InvalidState(error) => SubmissionError::InvalidState(error),
            SessionError::UnknownProvider(name) => SubmissionError::UnknownProvider(name),
            SessionError::Provider(error) => SubmissionError::Provider(error),
        }
    }
}

/// A transaction the wallet accepted for broadcast. Finality is not tracked.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransactionRecord {
    pub transaction_id: TransactionId,
    pub explorer_url: String,
    pub intent: TransitionIntent,
    pub submitted_at: DateTime<Utc>,
}

pub struct SubmissionFlow<'s, P> {
    session: &'s WalletSession<P>,
    config: &'s ClientConfig,
    status: watch::Sender<SubmissionStatus>,
}

impl<'s, P: WalletProvider> SubmissionFlow<'s, P> {
    pub fn new(session: &'s WalletSession<P>, config: &'s ClientConfig) -> Self {
        let (status, _) = watch::channel(SubmissionStatus::default());
        Self {
            session,
            config,
            status,
        }
    }

    pub fn status(&self) -> SubmissionStatus {
        self.status.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<SubmissionStatus> {
        self.status.subscribe()
    }

    pub async fn place_bet(
        &self,
        market_id: &str,
        outcome: &str,
        amount: &str,
    ) -> Result<TransactionRecord, SubmissionError> {
        self.submit(&TransitionInput::place_bet(market_id, outcome, amount))
            .await
    }

    pub async fn create_market(
        &self,
        market_id: &str,
        resolution_height: &str,
    ) -> Result<TransactionRecord, SubmissionError> {
        self.submit(&TransitionInput::CreateMarket {
            market_id: market_id.to_owned(),
            resolution_height: resolution_height.to_owned(),
        })
        .await
    }

    pub async fn resolve_market(
        &self,
        market_id: &str,
        winning_outcome: &str,
    ) -> Result<TransactionRecord, SubmissionError> {
        self.submit(&TransitionInput::ResolveMarket {
            market_id: market_id.to_owned(),
            winning_outcome: winning_outcome.to_owned(),
        })
        .await
    }

    /// Runs one submission. Provider failures stay visible as `Failed` until the
    /// next submission; every other ending returns the status to `Idle`, including
    /// dropping the returned future.
    pub async fn submit(
        &self,
        input: &TransitionInput,
    ) -> Result<TransactionRecord, SubmissionError> {
        self.begin()?;
        let reset = IdleOnDrop(Some(&self.status));

        let result = self.drive(input).await;
        match &result {
            Ok(record) => {
                info!(
                    transaction = %record.transaction_id,
                    function = record.intent.transition().function_name(),
                    market = %record.intent.market_id(),
                    "transaction submitted"
                );
                let transaction_id = record.transaction_id.clone();
                self.status
                    .send_replace(SubmissionStatus::Confirmed(transaction_id));
            }
            Err(error) => warn!(
                %error,
                hint = error.kind().map_or("", FailureKind::user_message),
                "submission failed"
            ),
        }
        match result.as_ref().err().and_then(SubmissionError::kind) {
            Some(FailureKind::Validation) => {
                self.status
                    .send_replace(SubmissionStatus::Failed(FailureKind::Validation));
            }
            Some(kind) => {
                self.status.send_replace(SubmissionStatus::Failed(kind));
                reset.disarm();
            }
            None => {}
        }
        result
    }

    /// Like [`Self::submit`], abandoned as soon as `cancel` resolves.
    pub async fn submit_until(
        &self,
        input: &TransitionInput,
        cancel: impl Future<Output = ()>,
    ) -> Result<TransactionRecord, SubmissionError> {
        tokio::select! {
            result = self.submit(input) => result,
            () = cancel => {
                info!("submission cancelled");
                Err(SubmissionError::Cancelled)
            }
        }
    }

    fn begin(&self) -> Result<(), InvalidStateError> {
        let mut result = Ok(());
        self.status.send_if_modified(|status| {
            if status.in_progress() {
                result = Err(InvalidStateError::new("submit", status.label()));
                return false;
            }
            *status = SubmissionStatus::Validating;
            true
        });
        result
    }

    async fn drive(
        &self,
        input: &TransitionInput,
    ) -> Result<TransactionRecord, SubmissionError> {
        let intent = input.validate()?;
        if self.session.identity().is_none() {
            return Err(SubmissionError::WalletNotConnected);
        }

        self.status.send_replace(SubmissionStatus::Building);
        let call = TransactionBuilder::new(self.config).build(&intent)?;

        self.status.send_replace(SubmissionStatus::AwaitingSignature);
        let transaction_id = self.session.request_transaction(&call).await?;

        self.status
            .send_replace(SubmissionStatus::Submitted(transaction_id.clone()));
        Ok(TransactionRecord {
            explorer_url: self.config.explorer_transaction_url(&transaction_id),
            transaction_id,
            intent,
            submitted_at: Utc::now(),
        })
    }
}

struct IdleOnDrop<'a>(Option<&'a watch::Sender<SubmissionStatus>>);

impl IdleOnDrop<'_> {
    fn disarm(mut self) {
        self.0 = None;
    }
}

impl Drop for IdleOnDrop<'_> {
    fn drop(&mut self) {
        if let Some(status) = self.0.take() {
            status.send_replace(SubmissionStatus::Idle);
        }
    }
}

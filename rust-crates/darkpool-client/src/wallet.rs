use crate::{
    error::InvalidStateError,
    transactions::TransitionCall,
    types::{
        Address,
        TransactionId,
        WalletIdentity,
    },
};
use thiserror::Error;
use tokio::sync::watch;
use tracing::{
    debug,
    info,
    warn,
};

/// Errors reported by a wallet provider, already classified by the provider.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ProviderError {
    #[error("request rejected by the user")]
    UserRejected,

    #[error("insufficient balance for amount and fee")]
    InsufficientFunds,

    #[error("wallet provider is not ready")]
    NotReady,

    #[error("wallet provider lost the connection")]
    NotConnected,

    #[error("wallet provider timed out")]
    Timeout,

    #[error("{name}: {message}")]
    Other { name: String, message: String },
}

/// A browser-extension style wallet able to hold keys and sign transitions.
pub trait WalletProvider {
    fn name(&self) -> &str;
    /// Installed and able to take a connect request right now.
    fn ready(&self) -> bool;
    fn connect(&self) -> impl Future<Output = Result<Address, ProviderError>>;
    fn disconnect(&self) -> impl Future<Output = Result<(), ProviderError>>;
    fn request_transaction(
        &self,
        call: &TransitionCall,
    ) -> impl Future<Output = Result<TransactionId, ProviderError>>;
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SessionError {
    #[error(transparent)]
    InvalidState(#[from] InvalidStateError),

    #[error("no wallet provider named `{0}`")]
    UnknownProvider(String),

    #[error(transparent)]
    Provider(#[from] ProviderError),
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum SessionState {
    #[default]
    Disconnected,
    Selecting {
        provider: String,
    },
    Connecting {
        provider: String,
    },
    Connected {
        identity: WalletIdentity,
        signing: bool,
    },
    ConnectionFailed {
        provider: String,
        reason: ProviderError,
    },
}

impl SessionState {
    pub fn label(&self) -> &'static str {
        match self {
            SessionState::Disconnected => "disconnected",
            SessionState::Selecting { .. } => "selecting",
            SessionState::Connecting { .. } => "connecting",
            SessionState::Connected { signing: true, .. } => "signing",
            SessionState::Connected { .. } => "connected",
            SessionState::ConnectionFailed { .. } => "connection failed",
        }
    }

    pub fn identity(&self) -> Option<&WalletIdentity> {
        match self {
            SessionState::Connected { identity, .. } => Some(identity),
            _ => None,
        }
    }
}

/// Connection lifecycle for one user. All state changes are check-and-set on the
/// watch channel, so no lock is ever held across a provider call.
pub struct WalletSession<P> {
    providers: Vec<P>,
    state: watch::Sender<SessionState>,
}

impl<P: WalletProvider> WalletSession<P> {
    pub fn new(providers: Vec<P>) -> Self {
        let (state, _) = watch::channel(SessionState::default());
        Self { providers, state }
    }

    pub fn list_providers(&self) -> Vec<&str> {
        self.providers.iter().map(|provider| provider.name()).collect()
    }

    pub fn state(&self) -> SessionState {
        self.state.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<SessionState> {
        self.state.subscribe()
    }

    pub fn identity(&self) -> Option<WalletIdentity> {
        self.state.borrow().identity().cloned()
    }

    /// Picks the provider to connect with. A provider that is not ready fails the
    /// connection straight away, and another one may be selected.
    pub fn select(&self, name: &str) -> Result<(), SessionError> {
        let Some(provider) = self.find(name) else {
            return Err(SessionError::UnknownProvider(name.to_owned()));
        };
        let ready = provider.ready();
        self.transition("select", |state| match state {
            SessionState::Disconnected
            | SessionState::Selecting { .. }
            | SessionState::ConnectionFailed { .. } => {
                *state = if ready {
                    SessionState::Selecting {
                        provider: name.to_owned(),
                    }
                } else {
                    SessionState::ConnectionFailed {
                        provider: name.to_owned(),
                        reason: ProviderError::NotReady,
                    }
                };
                Ok(())
            }
            other => Err(invalid("select", other)),
        })?;
        if !ready {
            warn!(provider = name, "wallet provider not ready");
            return Err(ProviderError::NotReady.into());
        }
        debug!(provider = name, "wallet selected");
        Ok(())
    }

    pub async fn connect(&self) -> Result<WalletIdentity, SessionError> {
        let name = self.transition("connect", |state| match state {
            SessionState::Selecting { provider } => {
                let provider = provider.clone();
                *state = SessionState::Connecting {
                    provider: provider.clone(),
                };
                Ok(provider)
            }
            other => Err(invalid("connect", other)),
        })?;

        // Dropped mid-handshake: the selection survives, the attempt does not.
        let guard = RestoreOnDrop::new(&self.state, {
            let name = name.clone();
            move |state: &mut SessionState| match state {
                SessionState::Connecting { provider } if *provider == name => {
                    *state = SessionState::Selecting { provider: name };
                    true
                }
                _ => false,
            }
        });

        let Some(provider) = self.find(&name) else {
            return Err(SessionError::UnknownProvider(name));
        };
        info!(provider = %name, "connecting wallet");
        let result = provider.connect().await;
        guard.disarm();

        let outcome = result.map(|public_address| WalletIdentity {
            public_address,
            provider_name: name.clone(),
        });
        self.transition("finish connecting", |state| match state {
            SessionState::Connecting { provider } if *provider == name => {
                *state = match &outcome {
                    Ok(identity) => SessionState::Connected {
                        identity: identity.clone(),
                        signing: false,
                    },
                    Err(reason) => SessionState::ConnectionFailed {
                        provider: name.clone(),
                        reason: reason.clone(),
                    },
                };
                Ok(())
            }
            other => Err(invalid("finish connecting", other)),
        })?;

        match outcome {
            Ok(identity) => {
                info!(
                    provider = %identity.provider_name,
                    address = %identity.public_address.short(),
                    "wallet connected"
                );
                Ok(identity)
            }
            Err(reason) => {
                warn!(provider = %name, %reason, "wallet connection failed");
                Err(SessionError::Provider(reason))
            }
        }
    }

    /// Clears the local identity; a provider that fails to disconnect is only logged.
    pub async fn disconnect(&self) -> Result<(), SessionError> {
        let connected = self.transition("disconnect", |state| match state {
            SessionState::Disconnected => Ok(None),
            SessionState::ConnectionFailed { .. } => {
                *state = SessionState::Disconnected;
                Ok(None)
            }
            SessionState::Connected {
                identity,
                signing: false,
            } => {
                let provider = identity.provider_name.clone();
                *state = SessionState::Disconnected;
                Ok(Some(provider))
            }
            other => Err(invalid("disconnect", other)),
        })?;

        let Some(name) = connected else {
            return Ok(());
        };
        if let Some(provider) = self.find(&name) {
            if let Err(error) = provider.disconnect().await {
                warn!(provider = %name, %error, "provider failed to disconnect");
            }
        }
        info!(provider = %name, "wallet disconnected");
        Ok(())
    }

    /// Hands the call to the connected provider. One signature at a time per
    /// session; the signing flag is cleared on completion or when the returned
    /// future is dropped.
    pub async fn request_transaction(
        &self,
        call: &TransitionCall,
    ) -> Result<TransactionId, SessionError> {
        let name = self.transition("request a transaction", |state| match state {
            SessionState::Connected { identity, signing } if !*signing => {
                *signing = true;
                Ok(identity.provider_name.clone())
            }
            other => Err(invalid("request a transaction", other)),
        })?;
        let _signing = RestoreOnDrop::new(&self.state, |state: &mut SessionState| {
            match state {
                SessionState::Connected { signing, .. } if *signing => {
                    *signing = false;
                    true
                }
                _ => false,
            }
        });

        let Some(provider) = self.find(&name) else {
            return Err(SessionError::UnknownProvider(name));
        };
        debug!(
            provider = %name,
            function = call.function_name.function_name(),
            inputs = ?call.inputs,
            fee = %call.fee,
            "requesting signature"
        );
        match provider.request_transaction(call).await {
            Ok(id) => {
                info!(provider = %name, transaction = %id, "transaction accepted");
                Ok(id)
            }
            Err(ProviderError::NotConnected) => {
                self.session_lost();
                Err(SessionError::Provider(ProviderError::NotConnected))
            }
            Err(error) => Err(SessionError::Provider(error)),
        }
    }

    /// The provider dropped the session on its side.
    pub fn session_lost(&self) {
        let changed = self.state.send_if_modified(|state| {
            if *state == SessionState::Disconnected {
                return false;
            }
            *state = SessionState::Disconnected;
            true
        });
        if changed {
            warn!("wallet session lost");
        }
    }

    fn find(&self, name: &str) -> Option<&P> {
        self.providers.iter().find(|provider| provider.name() == name)
    }

    fn transition<T>(
        &self,
        operation: &'static str,
        apply: impl FnOnce(&mut SessionState) -> Result<T, InvalidStateError>,
    ) -> Result<T, InvalidStateError> {
        let mut result = Err(InvalidStateError::new(operation, "unavailable"));
        self.state.send_if_modified(|state| {
            result = apply(state);
            result.is_ok()
        });
        result
    }
}

fn invalid(operation: &'static str, state: &SessionState) -> InvalidStateError {
    InvalidStateError::new(operation, state.label())
}

struct RestoreOnDrop<'a, F>
where
    F: FnOnce(&mut SessionState) -> bool,
{
    state: &'a watch::Sender<SessionState>,
    restore: Option<F>,
}

impl<'a, F> RestoreOnDrop<'a, F>
where
    F: FnOnce(&mut SessionState) -> bool,
{
    fn new(state: &'a watch::Sender<SessionState>, restore: F) -> Self {
        Self {
            state,
            restore: Some(restore),
        }
    }

    fn disarm(mut self) {
        self.restore = None;
    }
}

impl<F> Drop for RestoreOnDrop<'_, F>
where
    F: FnOnce(&mut SessionState) -> bool,
{
    fn drop(&mut self) {
        if let Some(restore) = self.restore.take() {
            self.state.send_if_modified(restore);
        }
    }
}

#[cfg(test)]
mod tests {
    #![allow(non_snake_case)]
    use super::*;

    #[test]
    fn label__distinguishes_signing_from_idle_connection() {
        // given
        let identity = WalletIdentity {
            public_address: "aleo1abc".parse().unwrap(),
            provider_name: "Leo Wallet".to_owned(),
        };

        // when
        let idle = SessionState::Connected {
            identity: identity.clone(),
            signing: false,
        };
        let signing = SessionState::Connected {
            identity,
            signing: true,
        };

        // then
        assert_eq!(idle.label(), "connected");
        assert_eq!(signing.label(), "signing");
    }

    #[test]
    fn identity__only_present_when_connected() {
        let failed = SessionState::ConnectionFailed {
            provider: "Leo Wallet".to_owned(),
            reason: ProviderError::Timeout,
        };
        assert!(failed.identity().is_none());
        assert!(SessionState::default().identity().is_none());
    }
}

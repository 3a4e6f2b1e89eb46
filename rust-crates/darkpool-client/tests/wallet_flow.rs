#![allow(non_snake_case)]

use darkpool_client::{
    ClientConfig,
    FailureKind,
    SessionState,
    SubmissionFlow,
    SubmissionStatus,
    TransitionInput,
    WalletSession,
    error::InvalidStateError,
    submission::SubmissionError,
    test_helpers::{
        FakeProvider,
        Reply,
        TEST_ADDRESS,
    },
    types::{
        Microcredits,
        TransactionId,
    },
    wallet::{
        ProviderError,
        SessionError,
    },
};
use std::pin::pin;

const LEO: &str = "Leo Wallet";
const PUZZLE: &str = "Puzzle Wallet";

fn session_with(providers: &[&FakeProvider]) -> WalletSession<FakeProvider> {
    WalletSession::new(providers.iter().map(|provider| (*provider).clone()).collect())
}

async fn connected_session(provider: &FakeProvider) -> WalletSession<FakeProvider> {
    let session = session_with(&[provider]);
    session.select(LEO).unwrap();
    session.connect().await.unwrap();
    session
}

fn is_signing(session: &WalletSession<FakeProvider>) -> bool {
    matches!(session.state(), SessionState::Connected { signing: true, .. })
}

#[tokio::test]
async fn list_providers__names_every_installed_provider() {
    let leo = FakeProvider::new(LEO);
    let puzzle = FakeProvider::new(PUZZLE);
    let session = session_with(&[&leo, &puzzle]);

    assert_eq!(session.list_providers(), vec![LEO, PUZZLE]);
}

#[tokio::test]
async fn connect__without_selection_is_invalid_state() {
    // given
    let provider = FakeProvider::new(LEO);
    let session = session_with(&[&provider]);

    // when
    let result = session.connect().await;

    // then
    assert_eq!(
        result,
        Err(SessionError::InvalidState(InvalidStateError::new(
            "connect",
            "disconnected"
        )))
    );
    assert_eq!(session.state(), SessionState::Disconnected);
    assert_eq!(provider.connects(), 0);
}

#[tokio::test]
async fn select__unknown_provider_is_rejected() {
    let session = session_with(&[&FakeProvider::new(LEO)]);

    let result = session.select("Shield");

    assert_eq!(result, Err(SessionError::UnknownProvider("Shield".to_owned())));
    assert_eq!(session.state(), SessionState::Disconnected);
}

#[tokio::test]
async fn connect__success_exposes_identity() {
    // given
    let provider = FakeProvider::new(LEO);
    let session = session_with(&[&provider]);
    session.select(LEO).unwrap();

    // when
    let identity = session.connect().await.unwrap();

    // then
    assert_eq!(identity.public_address.as_str(), TEST_ADDRESS);
    assert_eq!(identity.provider_name, LEO);
    assert_eq!(session.identity(), Some(identity));
}

#[tokio::test]
async fn select__while_connected_is_invalid_state() {
    // given
    let leo = FakeProvider::new(LEO);
    let puzzle = FakeProvider::new(PUZZLE);
    let session = session_with(&[&leo, &puzzle]);
    session.select(LEO).unwrap();
    session.connect().await.unwrap();

    // when
    let result = session.select(PUZZLE);

    // then
    assert!(matches!(result, Err(SessionError::InvalidState(_))));
    assert_eq!(session.identity().unwrap().provider_name, LEO);
}

#[tokio::test]
async fn connect__provider_failure_leaves_a_reselectable_session() {
    // given
    let provider = FakeProvider::new(LEO);
    provider.on_connect(Reply::Err(ProviderError::UserRejected));
    let session = session_with(&[&provider]);
    session.select(LEO).unwrap();

    // when
    let result = session.connect().await;

    // then
    assert_eq!(result, Err(SessionError::Provider(ProviderError::UserRejected)));
    assert_eq!(
        session.state(),
        SessionState::ConnectionFailed {
            provider: LEO.to_owned(),
            reason: ProviderError::UserRejected,
        }
    );
    session.select(LEO).unwrap();
    assert_eq!(
        session.state(),
        SessionState::Selecting {
            provider: LEO.to_owned()
        }
    );
}

#[tokio::test]
async fn connect__dropped_future_returns_to_selecting() {
    // given
    let provider = FakeProvider::new(LEO);
    provider.on_connect(Reply::Pending);
    let session = session_with(&[&provider]);
    session.select(LEO).unwrap();

    // when
    {
        let mut connecting = pin!(session.connect());
        assert!(futures::poll!(connecting.as_mut()).is_pending());
        assert_eq!(
            session.state(),
            SessionState::Connecting {
                provider: LEO.to_owned()
            }
        );
    }

    // then
    assert_eq!(
        session.state(),
        SessionState::Selecting {
            provider: LEO.to_owned()
        }
    );
}

#[tokio::test]
async fn connect__second_connect_while_connecting_is_invalid_state() {
    // given
    let provider = FakeProvider::new(LEO);
    provider.on_connect(Reply::Pending);
    let session = session_with(&[&provider]);
    session.select(LEO).unwrap();
    let mut first = pin!(session.connect());
    assert!(futures::poll!(first.as_mut()).is_pending());

    // when
    let second = session.connect().await;

    // then
    assert_eq!(
        second,
        Err(SessionError::InvalidState(InvalidStateError::new(
            "connect",
            "connecting"
        )))
    );
    assert_eq!(provider.connects(), 1);
    assert_eq!(
        session.state(),
        SessionState::Connecting {
            provider: LEO.to_owned()
        }
    );
}

#[tokio::test]
async fn select__unready_provider_fails_connection_until_ready() {
    // given
    let provider = FakeProvider::new(LEO);
    provider.set_ready(false);
    let session = session_with(&[&provider]);

    // when
    let result = session.select(LEO);

    // then
    assert_eq!(result, Err(SessionError::Provider(ProviderError::NotReady)));
    assert_eq!(
        session.state(),
        SessionState::ConnectionFailed {
            provider: LEO.to_owned(),
            reason: ProviderError::NotReady,
        }
    );
    assert!(matches!(
        session.connect().await,
        Err(SessionError::InvalidState(_))
    ));
    assert_eq!(provider.connects(), 0);

    provider.set_ready(true);
    session.select(LEO).unwrap();
    session.connect().await.unwrap();
    assert_eq!(session.identity().unwrap().provider_name, LEO);
}

#[tokio::test]
async fn disconnect__is_a_no_op_when_nothing_is_connected() {
    let provider = FakeProvider::new(LEO);
    let session = session_with(&[&provider]);

    session.disconnect().await.unwrap();

    assert_eq!(session.state(), SessionState::Disconnected);
    assert_eq!(provider.disconnects(), 0);
}

#[tokio::test]
async fn disconnect__clears_identity_and_notifies_provider() {
    // given
    let provider = FakeProvider::new(LEO);
    let session = connected_session(&provider).await;
    let mut states = session.subscribe();

    // when
    session.disconnect().await.unwrap();

    // then
    assert_eq!(session.identity(), None);
    assert_eq!(provider.disconnects(), 1);
    assert!(states.has_changed().unwrap());
    assert_eq!(*states.borrow_and_update(), SessionState::Disconnected);
}

#[tokio::test]
async fn session_lost__drops_identity() {
    let provider = FakeProvider::new(LEO);
    let session = connected_session(&provider).await;

    session.session_lost();

    assert_eq!(session.state(), SessionState::Disconnected);
}

#[tokio::test]
async fn place_bet__returns_record_and_settles_idle() {
    // given
    let provider = FakeProvider::new(LEO);
    provider.on_transaction(Reply::Ok(TransactionId::new("at1accepted")));
    let session = connected_session(&provider).await;
    let config = ClientConfig::default();
    let flow = SubmissionFlow::new(&session, &config);

    // when
    let record = flow.place_bet("42field", "1", "100000").await.unwrap();

    // then
    assert_eq!(record.transaction_id, TransactionId::new("at1accepted"));
    assert_eq!(
        record.explorer_url,
        "https://testnet.explorer.provable.com/transaction/at1accepted"
    );
    assert_eq!(record.intent.market_id().to_input(), "42field");
    let requests = provider.requests();
    assert_eq!(requests.len(), 1);
    assert_eq!(requests[0].program, "zk_dark_pool.aleo");
    assert_eq!(requests[0].inputs, vec!["42field", "1u8", "100000u64"]);
    assert_eq!(requests[0].fee, Microcredits::new(500_000));
    assert_eq!(flow.status(), SubmissionStatus::Idle);
    assert!(!is_signing(&session));
}

#[tokio::test]
async fn place_bet__invalid_input_never_reaches_the_wallet() {
    // given
    let provider = FakeProvider::new(LEO);
    let session = connected_session(&provider).await;
    let config = ClientConfig::default();
    let flow = SubmissionFlow::new(&session, &config);

    // when
    let result = flow.place_bet("42", "2", "100").await;

    // then
    let error = result.unwrap_err();
    assert_eq!(error.kind(), Some(FailureKind::Validation));
    assert_eq!(flow.status(), SubmissionStatus::Idle);
    assert!(provider.requests().is_empty());
}

#[tokio::test]
async fn place_bet__without_wallet_fails_as_provider_unavailable() {
    // given
    let provider = FakeProvider::new(LEO);
    let session = session_with(&[&provider]);
    let config = ClientConfig::default();
    let flow = SubmissionFlow::new(&session, &config);

    // when
    let result = flow.place_bet("42", "1", "100").await;

    // then
    assert_eq!(result, Err(SubmissionError::WalletNotConnected));
    assert_eq!(
        flow.status(),
        SubmissionStatus::Failed(FailureKind::ProviderUnavailable)
    );
    assert!(provider.requests().is_empty());
}

#[tokio::test]
async fn place_bet__while_connect_pending_fails_without_reaching_wallet() {
    // given
    let provider = FakeProvider::new(LEO);
    provider.on_connect(Reply::Pending);
    let session = session_with(&[&provider]);
    session.select(LEO).unwrap();
    let config = ClientConfig::default();
    let flow = SubmissionFlow::new(&session, &config);

    // when
    let during = {
        let mut connecting = pin!(session.connect());
        assert!(futures::poll!(connecting.as_mut()).is_pending());
        flow.place_bet("42", "1", "100").await
    };
    let after_cancel = flow.place_bet("42", "1", "100").await;

    // then
    assert_eq!(during, Err(SubmissionError::WalletNotConnected));
    assert_eq!(after_cancel, Err(SubmissionError::WalletNotConnected));
    assert_eq!(
        session.state(),
        SessionState::Selecting {
            provider: LEO.to_owned()
        }
    );
    assert!(provider.requests().is_empty());
}

#[tokio::test]
async fn place_bet__classifies_provider_rejections() {
    let cases = [
        (ProviderError::UserRejected, FailureKind::UserRejected),
        (ProviderError::InsufficientFunds, FailureKind::InsufficientFunds),
        (ProviderError::Timeout, FailureKind::ProviderUnavailable),
        (
            ProviderError::Other {
                name: "Unknown".to_owned(),
                message: "wasm trap".to_owned(),
            },
            FailureKind::Unexpected,
        ),
    ];

    for (error, expected) in cases {
        // given
        let provider = FakeProvider::new(LEO);
        provider.on_transaction(Reply::Err(error.clone()));
        let session = connected_session(&provider).await;
        let config = ClientConfig::default();
        let flow = SubmissionFlow::new(&session, &config);

        // when
        let result = flow.place_bet("42", "0", "250000").await;

        // then
        assert_eq!(result, Err(SubmissionError::Provider(error)));
        assert_eq!(flow.status(), SubmissionStatus::Failed(expected));
        assert!(!is_signing(&session));
    }
}

#[tokio::test]
async fn place_bet__lost_wallet_disconnects_session() {
    // given
    let provider = FakeProvider::new(LEO);
    provider.on_transaction(Reply::Err(ProviderError::NotConnected));
    let session = connected_session(&provider).await;
    let config = ClientConfig::default();
    let flow = SubmissionFlow::new(&session, &config);

    // when
    let error = flow.place_bet("42", "1", "1").await.unwrap_err();

    // then
    assert_eq!(error.kind(), Some(FailureKind::ProviderUnavailable));
    assert_eq!(session.state(), SessionState::Disconnected);
}

#[tokio::test]
async fn submit_until__cancelled_while_awaiting_signature_returns_to_idle() {
    // given
    let provider = FakeProvider::new(LEO);
    provider.on_transaction(Reply::Pending);
    let session = connected_session(&provider).await;
    let config = ClientConfig::default();
    let flow = SubmissionFlow::new(&session, &config);
    let mut status = flow.subscribe();
    let cancel = async move {
        let _ = status
            .wait_for(|current| *current == SubmissionStatus::AwaitingSignature)
            .await;
    };

    // when
    let result = flow
        .submit_until(&TransitionInput::place_bet("42", "1", "100000"), cancel)
        .await;

    // then
    assert_eq!(result, Err(SubmissionError::Cancelled));
    assert_eq!(flow.status(), SubmissionStatus::Idle);
    assert!(!flow.status().in_progress());
    assert!(!is_signing(&session));
    assert_eq!(provider.requests().len(), 1);
}

#[tokio::test]
async fn submit__second_submission_on_same_flow_is_rejected() {
    // given
    let provider = FakeProvider::new(LEO);
    provider.on_transaction(Reply::Pending);
    let session = connected_session(&provider).await;
    let config = ClientConfig::default();
    let flow = SubmissionFlow::new(&session, &config);
    let input = TransitionInput::place_bet("42", "1", "100000");
    let mut first = pin!(flow.submit(&input));
    assert!(futures::poll!(first.as_mut()).is_pending());

    // when
    let second = flow.submit(&input).await;

    // then
    assert_eq!(
        second,
        Err(SubmissionError::InvalidState(InvalidStateError::new(
            "submit",
            "awaiting signature"
        )))
    );
    assert_eq!(flow.status(), SubmissionStatus::AwaitingSignature);
}

#[tokio::test]
async fn request_transaction__concurrent_signature_is_rejected_by_session() {
    // given
    let provider = FakeProvider::new(LEO);
    provider.on_transaction(Reply::Pending);
    let session = connected_session(&provider).await;
    let config = ClientConfig::default();
    let first_flow = SubmissionFlow::new(&session, &config);
    let second_flow = SubmissionFlow::new(&session, &config);
    let input = TransitionInput::place_bet("42", "1", "100000");
    let mut first = pin!(first_flow.submit(&input));
    assert!(futures::poll!(first.as_mut()).is_pending());
    assert!(is_signing(&session));

    // when
    let second = second_flow.submit(&input).await;

    // then
    assert!(matches!(second, Err(SubmissionError::InvalidState(_))));
    assert_eq!(second_flow.status(), SubmissionStatus::Idle);
    assert_eq!(first_flow.status(), SubmissionStatus::AwaitingSignature);
    assert_eq!(provider.requests().len(), 1);
}

#[tokio::test]
async fn disconnect__while_signing_is_invalid_state() {
    // given
    let provider = FakeProvider::new(LEO);
    provider.on_transaction(Reply::Pending);
    let session = connected_session(&provider).await;
    let config = ClientConfig::default();
    let flow = SubmissionFlow::new(&session, &config);
    let input = TransitionInput::place_bet("42", "1", "100000");
    let mut pending = pin!(flow.submit(&input));
    assert!(futures::poll!(pending.as_mut()).is_pending());

    // when
    let result = session.disconnect().await;

    // then
    assert_eq!(
        result,
        Err(SessionError::InvalidState(InvalidStateError::new(
            "disconnect",
            "signing"
        )))
    );
}

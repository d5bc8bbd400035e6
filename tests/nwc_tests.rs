//! NWC client over scripted relays: racing, matching, timeouts, engine mapping.

mod common;

use beezap::nostr::{kinds, tag_value};
use beezap::nwc::{seal_connection, unseal_connection, NwcClient, NwcConfig, NwcEngine, NwcError};
use beezap::service::{EngineConfig, EngineError, Network, PaymentStatus, WalletEngine};
use common::{bolt11, nwc_uri, pay_success, wallet_error, MockConnector, RelayScript};
use nostr::nips::nip04;
use nostr::Keys;
use serde_json::{json, Value};
use std::time::Duration;

const R1: &str = "wss://one.example";
const R2: &str = "wss://two.example";
const R3: &str = "wss://three.example";

fn client(wallet: &Keys, connector: std::sync::Arc<MockConnector>, relays: &[&str]) -> NwcClient {
    let config = NwcConfig::parse(&nwc_uri(wallet, &Keys::generate(), relays)).unwrap();
    NwcClient::new(config, connector).with_timeout(Duration::from_secs(10))
}

#[tokio::test(start_paused = true)]
async fn silent_relays_time_out_and_every_link_closes_once() {
    let wallet = Keys::generate();
    let connector = MockConnector::new(wallet.clone(), vec![(R1, RelayScript::Silent), (R2, RelayScript::Silent)]);
    let nwc = client(&wallet, connector.clone(), &[R1, R2]);

    let err = nwc.pay_invoice(&bolt11(1_000)).await.unwrap_err();
    assert_eq!(err, NwcError::Timeout(Duration::from_secs(10)));
    assert!(!err.is_definitive());
    assert_eq!(connector.closes(R1), 1);
    assert_eq!(connector.closes(R2), 1);
}

#[tokio::test(start_paused = true)]
async fn error_on_one_relay_does_not_beat_a_later_success() {
    let wallet = Keys::generate();
    let connector = MockConnector::new(
        wallet.clone(),
        vec![
            (R1, RelayScript::reply(wallet_error("INTERNAL", "relay-side glitch"))),
            (R2, RelayScript::reply_after(Duration::from_secs(3), pay_success(&"aa".repeat(32)))),
            (R3, RelayScript::Silent),
        ],
    );
    let nwc = client(&wallet, connector.clone(), &[R1, R2, R3]);

    let paid = nwc.pay_invoice(&bolt11(1_000)).await.unwrap();
    assert_eq!(paid.preimage, "aa".repeat(32));
    assert_eq!(paid.fees_paid, Some(1_000));
    for relay in [R1, R2, R3] {
        assert_eq!(connector.closes(relay), 1, "{relay}");
    }
}

#[tokio::test(start_paused = true)]
async fn responses_for_other_requests_are_ignored() {
    let wallet = Keys::generate();
    let script = match RelayScript::reply(pay_success(&"cc".repeat(32))) {
        RelayScript::Reply { after, respond, .. } => RelayScript::Reply { after, respond, foreign_first: true },
        other => other,
    };
    let connector = MockConnector::new(wallet.clone(), vec![(R1, script)]);
    let nwc = client(&wallet, connector, &[R1]);

    let paid = nwc.pay_invoice(&bolt11(1_000)).await.unwrap();
    assert_eq!(paid.preimage, "cc".repeat(32));
}

#[tokio::test(start_paused = true)]
async fn wallet_error_is_returned_once_all_relays_answer() {
    let wallet = Keys::generate();
    let connector = MockConnector::new(
        wallet.clone(),
        vec![
            (R1, RelayScript::reply(wallet_error("INSUFFICIENT_BALANCE", "not enough funds"))),
            (R2, RelayScript::reply_after(Duration::from_secs(1), wallet_error("INSUFFICIENT_BALANCE", "not enough funds"))),
        ],
    );
    let nwc = client(&wallet, connector, &[R1, R2]);

    let started = tokio::time::Instant::now();
    let err = nwc.pay_invoice(&bolt11(1_000)).await.unwrap_err();
    assert_eq!(err, NwcError::Wallet { code: "INSUFFICIENT_BALANCE".into(), message: "not enough funds".into() });
    assert!(err.is_definitive());
    assert!(started.elapsed() < Duration::from_secs(10));
}

#[tokio::test(start_paused = true)]
async fn wallet_error_wins_over_timeout_when_others_stay_silent() {
    let wallet = Keys::generate();
    let connector = MockConnector::new(
        wallet.clone(),
        vec![(R1, RelayScript::reply(wallet_error("RATE_LIMITED", "slow down"))), (R2, RelayScript::Silent)],
    );
    let nwc = client(&wallet, connector, &[R1, R2]);

    let err = nwc.pay_invoice(&bolt11(1_000)).await.unwrap_err();
    assert!(matches!(err, NwcError::Wallet { ref code, .. } if code == "RATE_LIMITED"));
}

#[tokio::test]
async fn unreachable_relays_fail_fast() {
    let wallet = Keys::generate();
    let connector =
        MockConnector::new(wallet.clone(), vec![(R1, RelayScript::Unreachable), (R2, RelayScript::Unreachable)]);
    let nwc = client(&wallet, connector.clone(), &[R1, R2]);

    assert_eq!(nwc.get_balance().await.unwrap_err(), NwcError::NoRelays);
    assert_eq!(connector.connect_attempts(), 2);
    assert!(connector.published().is_empty());
}

#[tokio::test(start_paused = true)]
async fn connect_deadline_closes_links_already_open() {
    let wallet = Keys::generate();
    let connector =
        MockConnector::new(wallet.clone(), vec![(R1, RelayScript::reply(pay_success("aa"))), (R2, RelayScript::Hang)]);
    let nwc = client(&wallet, connector.clone(), &[R1, R2]);

    assert_eq!(nwc.get_balance().await.unwrap_err(), NwcError::NoRelays);
    assert_eq!(connector.connect_attempts(), 2);
    assert!(connector.published().is_empty());
    assert_eq!(connector.closes(R1), 1);
}

#[tokio::test]
async fn dropped_streams_leave_the_outcome_unknown() {
    let wallet = Keys::generate();
    let connector = MockConnector::new(wallet.clone(), vec![(R1, RelayScript::Drop), (R2, RelayScript::Drop)]);
    let nwc = client(&wallet, connector, &[R1, R2]);

    let err = nwc.pay_invoice(&bolt11(1_000)).await.unwrap_err();
    assert_eq!(err, NwcError::Dropped);
    assert!(!err.is_definitive());
}

#[tokio::test]
async fn relay_rejection_is_reported() {
    let wallet = Keys::generate();
    let connector = MockConnector::new(wallet.clone(), vec![(R1, RelayScript::Reject)]);
    let nwc = client(&wallet, connector, &[R1]);

    match nwc.pay_invoice(&bolt11(1_000)).await {
        Err(NwcError::Rejected(reason)) => assert!(reason.contains("blocked"), "{reason}"),
        other => panic!("expected Rejected, got {other:?}"),
    }
}

#[tokio::test]
async fn request_event_is_encrypted_to_the_wallet() {
    let wallet = Keys::generate();
    let client_keys = Keys::generate();
    let connector = MockConnector::new(wallet.clone(), vec![(R1, RelayScript::reply(pay_success("00")))]);
    let config = NwcConfig::parse(&nwc_uri(&wallet, &client_keys, &[R1])).unwrap();
    let nwc = NwcClient::new(config, connector.clone());

    let invoice = bolt11(2_000);
    nwc.pay_invoice(&invoice).await.unwrap();

    let published = connector.published();
    assert_eq!(published.len(), 1);
    let event = &published[0];
    assert_eq!(event.kind.as_u16(), kinds::NWC_REQUEST);
    assert_eq!(event.pubkey, client_keys.public_key());
    assert_eq!(tag_value(event, "p"), Some(wallet.public_key().to_hex().as_str()));
    assert!(event.verify().is_ok());

    let plain = nip04::decrypt(wallet.secret_key(), &client_keys.public_key(), &event.content).unwrap();
    let body: Value = serde_json::from_str(&plain).unwrap();
    assert_eq!(body, json!({ "method": "pay_invoice", "params": { "invoice": invoice } }));
}

#[test]
fn sealed_connection_opens_only_for_its_owner() {
    let owner = Keys::generate();
    let wallet = Keys::generate();
    let uri = nwc_uri(&wallet, &Keys::generate(), &[R1, R2]);

    let sealed = seal_connection(&owner, &uri).unwrap();
    assert!(!sealed.contains("walletconnect"));
    let opened = unseal_connection(&owner, &sealed).unwrap();
    assert_eq!(opened.wallet_pubkey, wallet.public_key());
    assert_eq!(opened.relays, vec![R1.to_string(), R2.to_string()]);

    assert!(unseal_connection(&Keys::generate(), &sealed).is_err());
}

// =============================================================================
// NwcEngine
// =============================================================================

fn wallet_backend(wallet: &Keys) -> std::sync::Arc<MockConnector> {
    let invoice = bolt11(7_000);
    MockConnector::new(
        wallet.clone(),
        vec![(
            R1,
            RelayScript::wallet(move |method, params| match method {
                "get_info" => json!({ "result_type": method, "result": { "alias": "mock", "methods": ["pay_invoice"] } }),
                "get_balance" => json!({ "result_type": method, "result": { "balance": 123_000 } }),
                "make_invoice" => json!({
                    "result_type": method,
                    "result": { "type": "incoming", "invoice": invoice, "payment_hash": "ph", "amount": params["amount"] }
                }),
                "list_transactions" => json!({
                    "result_type": method,
                    "result": { "transactions": [
                        { "type": "incoming", "payment_hash": "ph", "amount": 7000, "settled_at": 1_700_000_000 },
                        { "type": "outgoing", "state": "failed", "payment_hash": "x", "amount": 1000 }
                    ] }
                }),
                "pay_invoice" => pay_success(&"dd".repeat(32)),
                _ => wallet_error("NOT_IMPLEMENTED", "unknown method"),
            }),
        )],
    )
}

#[tokio::test]
async fn engine_speaks_nip47() {
    let wallet = Keys::generate();
    let engine = NwcEngine::new(wallet_backend(&wallet)).with_timeout(Duration::from_secs(5));
    let config = EngineConfig::new(Network::Bitcoin).with_connection(nwc_uri(&wallet, &Keys::generate(), &[R1]));

    engine.connect(&config).await.unwrap();
    let mut events = engine.subscribe();

    assert_eq!(engine.node_info().await.unwrap().balance_msat, 123_000);

    let received = engine
        .receive_payment(beezap::service::ReceiveRequest { amount_msat: 7_000, description: "tip".into(), expiry: None })
        .await
        .unwrap();
    assert_eq!(received.payment_hash.as_deref(), Some("ph"));

    let payments = engine.list_payments(10).await.unwrap();
    assert_eq!(payments.len(), 2);
    assert_eq!(payments[0].status, PaymentStatus::Complete);
    assert_eq!(payments[1].status, PaymentStatus::Failed);

    let invoice = bolt11(4_000);
    let paid = engine.pay_invoice(&invoice).await.unwrap();
    assert_eq!(paid.amount_msat, 4_000);
    assert_eq!(paid.preimage, Some("dd".repeat(32)));
    assert!(matches!(events.recv().await.unwrap(), beezap::service::EngineEvent::PaymentSent(_)));
}

#[tokio::test]
async fn engine_requires_a_connection_string() {
    let wallet = Keys::generate();
    let engine = NwcEngine::new(wallet_backend(&wallet));

    assert!(matches!(engine.connect(&EngineConfig::new(Network::Bitcoin)).await, Err(EngineError::Config(_))));
    let bad = EngineConfig::new(Network::Bitcoin).with_connection("https://not-nwc.example");
    assert!(matches!(engine.connect(&bad).await, Err(EngineError::Config(_))));
    assert!(matches!(engine.node_info().await, Err(EngineError::NotConnected)));
}

#[tokio::test]
async fn engine_connect_fails_when_no_relay_answers() {
    let wallet = Keys::generate();
    let connector = MockConnector::new(wallet.clone(), vec![(R1, RelayScript::Unreachable)]);
    let engine = NwcEngine::new(connector);
    let config = EngineConfig::new(Network::Bitcoin).with_connection(nwc_uri(&wallet, &Keys::generate(), &[R1]));

    assert!(matches!(engine.connect(&config).await, Err(EngineError::Failed(_))));
}

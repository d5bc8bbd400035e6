//! Shared fakes: wallet engine, NWC relays, LNURL service, WebLN provider.

#![allow(dead_code)]

use async_trait::async_trait;
use beezap::nostr::{kinds, RelayConnector, RelayLink, RelayMessage};
use beezap::nostr::EventFilter;
use beezap::service::{
    EngineConfig, EngineError, EngineEvent, NodeInfo, Payment, PaymentDirection, PaymentStatus, ReceiveRequest,
    ReceiveResponse, WalletEngine,
};
use beezap::zap::{LnurlClient, LnurlError, LnurlPayInfo, WebLnPayment, WebLnProvider};
use bitcoin::hashes::{sha256, Hash};
use bitcoin::secp256k1::{Secp256k1, SecretKey};
use lightning_invoice::{Currency, InvoiceBuilder, PaymentSecret};
use nostr::nips::nip04;
use nostr::{Event, Keys, Kind, Tag, Timestamp, UnsignedEvent};
use serde_json::{json, Value};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::{broadcast, mpsc};

pub const TEST_MNEMONIC: &str =
    "abandon abandon abandon abandon abandon abandon abandon abandon abandon abandon abandon about";

// =============================================================================
// BOLT11
// =============================================================================

/// Signed mainnet invoice for `amount_msat`. `tag` varies the payment hash.
pub fn bolt11_with(amount_msat: u64, tag: u8) -> String {
    let secp = Secp256k1::new();
    let node_key = SecretKey::from_slice(&[0x42; 32]).expect("key");
    let payment_hash = sha256::Hash::hash(&[tag]);
    InvoiceBuilder::new(Currency::Bitcoin)
        .description("beezap test".into())
        .payment_hash(payment_hash)
        .payment_secret(PaymentSecret([tag; 32]))
        .current_timestamp()
        .min_final_cltv_expiry_delta(144)
        .amount_milli_satoshis(amount_msat)
        .build_signed(|msg| secp.sign_ecdsa_recoverable(msg, &node_key))
        .expect("invoice")
        .to_string()
}

pub fn bolt11(amount_msat: u64) -> String { bolt11_with(amount_msat, 1) }

pub fn payment(hash: &str, status: PaymentStatus, amount_msat: u64) -> Payment {
    Payment {
        id: hash.into(),
        payment_hash: Some(hash.into()),
        direction: PaymentDirection::Incoming,
        status,
        amount_msat,
        fee_msat: 0,
        description: None,
        invoice: None,
        preimage: None,
        created_at: 0,
    }
}

// =============================================================================
// Wallet engine
// =============================================================================

pub struct MockEngine {
    pub connect_calls: AtomicUsize,
    pub pay_calls: AtomicUsize,
    pub list_calls: AtomicUsize,
    pub disconnect_calls: AtomicUsize,
    /// Connect attempts fail while set.
    pub fail_connect: AtomicBool,
    pub fail_pay: Mutex<Option<String>>,
    pub fail_balance: AtomicBool,
    pub balance_msat: AtomicU64,
    pub payments: Mutex<Vec<Payment>>,
    pub events: broadcast::Sender<EngineEvent>,
}

impl MockEngine {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            connect_calls: AtomicUsize::new(0),
            pay_calls: AtomicUsize::new(0),
            list_calls: AtomicUsize::new(0),
            disconnect_calls: AtomicUsize::new(0),
            fail_connect: AtomicBool::new(false),
            fail_pay: Mutex::new(None),
            fail_balance: AtomicBool::new(false),
            balance_msat: AtomicU64::new(50_000_000),
            payments: Mutex::new(Vec::new()),
            events: broadcast::channel(16).0,
        })
    }

    pub fn connects(&self) -> usize { self.connect_calls.load(Ordering::SeqCst) }
    pub fn pays(&self) -> usize { self.pay_calls.load(Ordering::SeqCst) }
    pub fn lists(&self) -> usize { self.list_calls.load(Ordering::SeqCst) }

    pub fn emit(&self, event: EngineEvent) { let _ = self.events.send(event); }
}

#[async_trait]
impl WalletEngine for MockEngine {
    async fn connect(&self, _config: &EngineConfig) -> Result<(), EngineError> {
        self.connect_calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_connect.load(Ordering::SeqCst) {
            return Err(EngineError::Failed("engine offline".into()));
        }
        Ok(())
    }

    async fn disconnect(&self) -> Result<(), EngineError> {
        self.disconnect_calls.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn pay_invoice(&self, invoice: &str) -> Result<Payment, EngineError> {
        self.pay_calls.fetch_add(1, Ordering::SeqCst);
        if let Some(reason) = self.fail_pay.lock().unwrap().clone() {
            return Err(EngineError::Failed(reason));
        }
        let mut paid = payment("paid", PaymentStatus::Complete, 21_000);
        paid.direction = PaymentDirection::Outgoing;
        paid.invoice = Some(invoice.to_string());
        paid.preimage = Some("00".repeat(32));
        Ok(paid)
    }

    async fn receive_payment(&self, request: ReceiveRequest) -> Result<ReceiveResponse, EngineError> {
        Ok(ReceiveResponse { invoice: bolt11(request.amount_msat), payment_hash: Some("hash".into()) })
    }

    async fn list_payments(&self, limit: usize) -> Result<Vec<Payment>, EngineError> {
        self.list_calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.payments.lock().unwrap().iter().take(limit).cloned().collect())
    }

    async fn node_info(&self) -> Result<NodeInfo, EngineError> {
        if self.fail_balance.load(Ordering::SeqCst) {
            return Err(EngineError::Failed("node unavailable".into()));
        }
        Ok(NodeInfo {
            balance_msat: self.balance_msat.load(Ordering::SeqCst),
            pending_receive_msat: 0,
            pending_send_msat: 0,
            alias: Some("mock".into()),
            pubkey: None,
        })
    }

    fn subscribe(&self) -> broadcast::Receiver<EngineEvent> { self.events.subscribe() }
}

// =============================================================================
// NWC relays
// =============================================================================

pub type Responder = Arc<dyn Fn(&str, &Value) -> Value + Send + Sync>;

/// How a fake relay (and the wallet behind it) behaves.
#[derive(Clone)]
pub enum RelayScript {
    /// Connection refused.
    Unreachable,
    /// Connection attempt never completes.
    Hang,
    /// Accepts the request, never answers.
    Silent,
    /// Stream ends right after publish.
    Drop,
    /// Publish rejected with `OK false`.
    Reject,
    /// Wallet answers after `after`. With `foreign_first`, a response tagged for
    /// another request arrives first.
    Reply { after: Duration, respond: Responder, foreign_first: bool },
    /// Wallet answers every method except `method`, which it accepts and never answers.
    Stall { method: &'static str, respond: Responder },
}

impl RelayScript {
    pub fn reply(body: Value) -> Self { Self::reply_after(Duration::ZERO, body) }

    pub fn reply_after(after: Duration, body: Value) -> Self {
        Self::Reply { after, respond: Arc::new(move |_, _| body.clone()), foreign_first: false }
    }

    pub fn wallet(respond: impl Fn(&str, &Value) -> Value + Send + Sync + 'static) -> Self {
        Self::Reply { after: Duration::ZERO, respond: Arc::new(respond), foreign_first: false }
    }

    pub fn stall_on(method: &'static str, respond: impl Fn(&str, &Value) -> Value + Send + Sync + 'static) -> Self {
        Self::Stall { method, respond: Arc::new(respond) }
    }
}

pub fn pay_success(preimage: &str) -> Value {
    json!({ "result_type": "pay_invoice", "result": { "preimage": preimage, "fees_paid": 1000 } })
}

pub fn wallet_error(code: &str, message: &str) -> Value {
    json!({ "result_type": "pay_invoice", "error": { "code": code, "message": message } })
}

pub struct MockConnector {
    wallet: Keys,
    scripts: HashMap<String, RelayScript>,
    closes: HashMap<String, Arc<AtomicUsize>>,
    pub connects: AtomicUsize,
    pub published: Arc<Mutex<Vec<Event>>>,
}

impl MockConnector {
    pub fn new(wallet: Keys, scripts: Vec<(&str, RelayScript)>) -> Arc<Self> {
        let closes = scripts.iter().map(|(url, _)| (url.to_string(), Arc::new(AtomicUsize::new(0)))).collect();
        Arc::new(Self {
            wallet,
            scripts: scripts.into_iter().map(|(u, s)| (u.to_string(), s)).collect(),
            closes,
            connects: AtomicUsize::new(0),
            published: Arc::new(Mutex::new(Vec::new())),
        })
    }

    pub fn closes(&self, url: &str) -> usize { self.closes[url].load(Ordering::SeqCst) }
    pub fn connect_attempts(&self) -> usize { self.connects.load(Ordering::SeqCst) }
    pub fn published(&self) -> Vec<Event> { self.published.lock().unwrap().clone() }

    /// NIP-47 methods of every request published so far, in order.
    pub fn methods(&self) -> Vec<String> {
        self.published()
            .iter()
            .map(|e| decrypt_request(&self.wallet, e)["method"].as_str().unwrap_or_default().to_string())
            .collect()
    }
}

#[async_trait]
impl RelayConnector for MockConnector {
    async fn connect(&self, url: &str) -> anyhow::Result<Box<dyn RelayLink>> {
        self.connects.fetch_add(1, Ordering::SeqCst);
        let script = self.scripts.get(url).cloned().ok_or_else(|| anyhow::anyhow!("unknown relay {url}"))?;
        if matches!(script, RelayScript::Unreachable) {
            anyhow::bail!("connection refused: {url}");
        }
        if matches!(script, RelayScript::Hang) {
            std::future::pending::<()>().await;
        }
        let (tx, rx) = mpsc::unbounded_channel();
        Ok(Box::new(MockLink {
            url: url.to_string(),
            script,
            wallet: self.wallet.clone(),
            tx: Some(tx),
            rx,
            closes: self.closes[url].clone(),
            published: self.published.clone(),
        }))
    }
}

struct MockLink {
    url: String,
    script: RelayScript,
    wallet: Keys,
    tx: Option<mpsc::UnboundedSender<RelayMessage>>,
    rx: mpsc::UnboundedReceiver<RelayMessage>,
    closes: Arc<AtomicUsize>,
    published: Arc<Mutex<Vec<Event>>>,
}

#[async_trait]
impl RelayLink for MockLink {
    fn url(&self) -> &str { &self.url }

    async fn subscribe(&mut self, sub_id: &str, filter: &EventFilter) -> anyhow::Result<()> {
        assert_eq!(filter.kinds.as_deref(), Some(&[kinds::NWC_RESPONSE][..]));
        assert!(sub_id.starts_with("nwc-"));
        Ok(())
    }

    async fn publish(&mut self, event: &Event) -> anyhow::Result<()> {
        self.published.lock().unwrap().push(event.clone());
        let Some(tx) = self.tx.clone() else { anyhow::bail!("closed") };
        match &self.script {
            RelayScript::Unreachable | RelayScript::Hang | RelayScript::Silent => {}
            RelayScript::Drop => self.tx = None,
            RelayScript::Reject => {
                let _ = tx.send(RelayMessage::Ok {
                    event_id: event.id.to_hex(),
                    accepted: false,
                    message: Some("blocked: not allowed".into()),
                });
            }
            RelayScript::Stall { method: stalled, respond } => {
                let request = decrypt_request(&self.wallet, event);
                let method = request["method"].as_str().unwrap_or_default();
                if method != *stalled {
                    let reply = response_event(&self.wallet, event, &respond(method, &request["params"]), &event.id.to_hex());
                    let _ = tx.send(RelayMessage::Event { sub_id: "nwc".into(), event: Box::new(reply) });
                }
            }
            RelayScript::Reply { after, respond, foreign_first } => {
                let request = decrypt_request(&self.wallet, event);
                let method = request["method"].as_str().unwrap_or_default().to_string();
                let body = respond(&method, &request["params"]);
                let mut replies = Vec::new();
                if *foreign_first {
                    replies.push(response_event(&self.wallet, event, &json!({"result_type": method, "result": {"preimage": "ff"}}), &"ab".repeat(32)));
                }
                replies.push(response_event(&self.wallet, event, &body, &event.id.to_hex()));
                let after = *after;
                tokio::spawn(async move {
                    tokio::time::sleep(after).await;
                    for reply in replies {
                        let _ = tx.send(RelayMessage::Event { sub_id: "nwc".into(), event: Box::new(reply) });
                    }
                });
            }
        }
        Ok(())
    }

    async fn next_message(&mut self) -> Option<RelayMessage> {
        if self.tx.is_none() {
            self.rx.close();
        }
        self.rx.recv().await
    }

    async fn close(&mut self) {
        self.closes.fetch_add(1, Ordering::SeqCst);
        self.tx = None;
        self.rx.close();
    }
}

fn decrypt_request(wallet: &Keys, event: &Event) -> Value {
    let plain = nip04::decrypt(wallet.secret_key(), &event.pubkey, &event.content).expect("decrypt request");
    serde_json::from_str(&plain).expect("request json")
}

/// Kind 23195 answer from `wallet` to `request`, tagged with `e_tag`.
pub fn response_event(wallet: &Keys, request: &Event, body: &Value, e_tag: &str) -> Event {
    let content = nip04::encrypt(wallet.secret_key(), &request.pubkey, body.to_string()).expect("encrypt");
    let tags = vec![
        Tag::parse(&["e".to_string(), e_tag.to_string()]).expect("e tag"),
        Tag::parse(&["p".to_string(), request.pubkey.to_hex()]).expect("p tag"),
    ];
    UnsignedEvent::new(wallet.public_key(), Timestamp::now(), Kind::Custom(kinds::NWC_RESPONSE), tags, content)
        .sign_with_keys(wallet)
        .expect("sign")
}

pub fn nwc_uri(wallet: &Keys, client: &Keys, relays: &[&str]) -> String {
    let relays: String = relays.iter().map(|r| format!("relay={r}&")).collect();
    format!(
        "nostr+walletconnect://{}?{}secret={}",
        wallet.public_key().to_hex(),
        relays,
        client.secret_key().to_secret_hex()
    )
}

// =============================================================================
// LNURL + WebLN
// =============================================================================

pub struct MockLnurl {
    pub info: Mutex<Result<LnurlPayInfo, LnurlError>>,
    pub invoice: Mutex<Result<String, LnurlError>>,
    pub fetches: AtomicUsize,
    /// (callback, amount_msat, zap request JSON, lnurl)
    pub invoice_requests: Mutex<Vec<(String, u64, String, String)>>,
}

impl MockLnurl {
    pub fn new(invoice: String) -> Arc<Self> {
        Arc::new(Self {
            info: Mutex::new(Ok(zap_pay_info())),
            invoice: Mutex::new(Ok(invoice)),
            fetches: AtomicUsize::new(0),
            invoice_requests: Mutex::new(Vec::new()),
        })
    }

    pub fn fetch_count(&self) -> usize { self.fetches.load(Ordering::SeqCst) }
}

pub fn zap_pay_info() -> LnurlPayInfo {
    LnurlPayInfo {
        callback: "https://pay.example/lnurlp/alice/callback".into(),
        min_sendable: Some(1_000),
        max_sendable: Some(100_000_000),
        metadata: Some(r#"[["text/plain","alice"]]"#.into()),
        tag: Some("payRequest".into()),
        allows_nostr: Some(true),
        nostr_pubkey: Some(Keys::generate().public_key().to_hex()),
        comment_allowed: None,
    }
}

#[async_trait]
impl LnurlClient for MockLnurl {
    async fn fetch_pay_info(&self, _url: &str) -> Result<LnurlPayInfo, LnurlError> {
        self.fetches.fetch_add(1, Ordering::SeqCst);
        self.info.lock().unwrap().clone()
    }

    async fn request_invoice(
        &self,
        callback: &str,
        amount_msat: u64,
        zap_request: &str,
        lnurl: &str,
    ) -> Result<String, LnurlError> {
        self.invoice_requests.lock().unwrap().push((
            callback.to_string(),
            amount_msat,
            zap_request.to_string(),
            lnurl.to_string(),
        ));
        self.invoice.lock().unwrap().clone()
    }
}

pub struct MockWebLn {
    pub calls: AtomicUsize,
    pub refuse: AtomicBool,
}

impl MockWebLn {
    pub fn new() -> Arc<Self> { Arc::new(Self { calls: AtomicUsize::new(0), refuse: AtomicBool::new(false) }) }
    pub fn call_count(&self) -> usize { self.calls.load(Ordering::SeqCst) }
}

#[async_trait]
impl WebLnProvider for MockWebLn {
    async fn enable(&self) -> anyhow::Result<()> { Ok(()) }

    async fn send_payment(&self, _invoice: &str) -> anyhow::Result<WebLnPayment> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.refuse.load(Ordering::SeqCst) {
            anyhow::bail!("user rejected");
        }
        Ok(WebLnPayment { preimage: "11".repeat(32) })
    }
}

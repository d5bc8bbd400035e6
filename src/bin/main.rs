//! Beezap CLI - wallet setup, NWC wallet access and zaps
//!
//!   beezap mnemonic new [--words 12|24]         → {"mnemonic": "..."}
//!   beezap mnemonic check <words...>            → {"valid": true}
//!   beezap init --password <pw> [--mnemonic]    → create or restore the encrypted wallet
//!   beezap unlock --password <pw>               → {"pubkey", "wallet_state", "nwc"}
//!   beezap nwc set <uri> --password <pw>        → seal and store an NWC connection
//!   beezap lnurl <address|lnurl>                → resolved zap endpoint
//!   beezap zap <address|lnurl> --pubkey <hex> --amount <sats>
//!   beezap balance | invoice | pay | payments   → wallet operations over NWC
//!
//! Output is JSON on stdout (pretty on a tty), errors as {"error": "..."} on stderr.

use beezap::config::BeezapConfig;
use beezap::identity::Identity;
use beezap::logging::init_logging;
use beezap::nostr::WsConnector;
use beezap::nwc::{unseal_connection, NwcConfig, NwcEngine};
use beezap::service::{EngineConfig, InvoiceStatus, WalletService};
use beezap::storage::{FileStore, WalletStorage};
use beezap::vault::{self, BackupChallenge};
use beezap::zap::{lnurl, HttpLnurlClient, NwcCredential, PaymentTarget, Recipient, ZapDispatcher, ZapRequest};
use beezap::install_signal_handlers;
use serde_json::{json, Value};
use std::env;
use std::io::IsTerminal;
use std::sync::Arc;
use tracing::{debug, info};

fn main() {
    init_logging();
    let _ = rustls::crypto::ring::default_provider().install_default();

    let args: Vec<String> = env::args().collect();
    let opts = ParsedArgs::parse(&args[1..]);

    if opts.help {
        print_usage();
        return;
    }

    if opts.version {
        println!("beezap {}", env!("CARGO_PKG_VERSION"));
        return;
    }

    let result = match opts.command.as_deref() {
        Some("mnemonic") => cmd_mnemonic(&opts),
        Some(cmd) => run_async(cmd, &opts),
        None => {
            print_usage();
            return;
        }
    };

    let pretty = opts.pretty || (!opts.json && std::io::stdout().is_terminal());
    match result {
        Ok(output) => println!("{}", render(&output, pretty)),
        Err(e) => {
            eprintln!("{}", render(&json!({ "error": e }), pretty));
            std::process::exit(1);
        }
    }
}

fn render(value: &Value, pretty: bool) -> String {
    let rendered = if pretty { serde_json::to_string_pretty(value) } else { serde_json::to_string(value) };
    rendered.unwrap_or_else(|_| value.to_string())
}

fn run_async(cmd: &str, opts: &ParsedArgs) -> Result<Value, String> {
    let rt = tokio::runtime::Runtime::new().map_err(|e| format!("Failed to create runtime: {}", e))?;
    rt.block_on(async {
        match cmd {
            "init" => cmd_init(opts),
            "unlock" => cmd_unlock(opts),
            "nwc" => cmd_nwc(opts),
            "lnurl" => cmd_lnurl(opts).await,
            "zap" => cmd_zap(opts).await,
            "balance" => cmd_balance(opts).await,
            "invoice" => cmd_invoice(opts).await,
            "pay" => cmd_pay(opts).await,
            "payments" => cmd_payments(opts).await,
            other => Err(format!("Unknown command: {}", other)),
        }
    })
}

#[derive(Default)]
struct ParsedArgs {
    command: Option<String>,
    sub: Option<String>,
    rest: Vec<String>,
    password: Option<String>,
    mnemonic: Option<String>,
    words: Option<u8>,
    amount: Option<u64>,
    pubkey: Option<String>,
    note: Option<String>,
    article: Option<String>,
    comment: Option<String>,
    description: Option<String>,
    limit: Option<usize>,
    embedded: bool,
    watch: bool,
    verify: bool,
    json: bool,
    pretty: bool,
    help: bool,
    version: bool,
}

impl ParsedArgs {
    fn parse(args: &[String]) -> Self {
        // Load .env file if present
        if let Ok(contents) = std::fs::read_to_string(".env") {
            for line in contents.lines() {
                let line = line.trim();
                if line.is_empty() || line.starts_with('#') {
                    continue;
                }
                if let Some((key, value)) = line.split_once('=') {
                    let value = value.trim().trim_matches('"');
                    if !value.is_empty() && env::var(key.trim()).is_err() {
                        env::set_var(key.trim(), value);
                    }
                }
            }
        }

        let mut opts = ParsedArgs::default();
        let mut positional = Vec::new();
        let mut i = 0;

        while i < args.len() {
            let arg = &args[i];
            let next = args.get(i + 1).cloned();
            let mut take = |slot: &mut Option<String>| {
                if next.is_some() {
                    *slot = next.clone();
                    i += 1;
                }
            };
            match arg.as_str() {
                "--help" | "-h" => opts.help = true,
                "--version" | "-V" => opts.version = true,
                "--json" => opts.json = true,
                "--pretty" => opts.pretty = true,
                "--embedded" => opts.embedded = true,
                "--watch" | "-w" => opts.watch = true,
                "--verify" => opts.verify = true,
                "--password" | "-P" => take(&mut opts.password),
                "--mnemonic" | "-m" => take(&mut opts.mnemonic),
                "--pubkey" | "-p" => take(&mut opts.pubkey),
                "--note" | "-e" => take(&mut opts.note),
                "--article" | "-a" => take(&mut opts.article),
                "--comment" | "-c" => take(&mut opts.comment),
                "--description" | "-d" => take(&mut opts.description),
                "--words" => {
                    let mut raw = None;
                    take(&mut raw);
                    opts.words = raw.and_then(|s| s.parse().ok());
                }
                "--amount" | "-n" => {
                    let mut raw = None;
                    take(&mut raw);
                    opts.amount = raw.and_then(|s| s.parse().ok());
                }
                "--limit" | "-l" => {
                    let mut raw = None;
                    take(&mut raw);
                    opts.limit = raw.and_then(|s| s.parse().ok());
                }
                _ if !arg.starts_with('-') => positional.push(arg.clone()),
                _ => {} // Ignore unknown flags
            }
            i += 1;
        }

        let mut positional = positional.into_iter();
        opts.command = positional.next();
        opts.sub = positional.next();
        opts.rest = positional.collect();

        // Environment fallbacks (lower priority than CLI args)
        if opts.password.is_none() {
            opts.password = env::var("BEEZAP_PASSWORD").ok().filter(|s| !s.is_empty());
        }
        if opts.mnemonic.is_none() {
            opts.mnemonic = env::var("BEEZAP_MNEMONIC").ok().filter(|s| !s.is_empty());
        }

        opts
    }

    fn password(&self) -> Result<&str, String> {
        self.password.as_deref().ok_or_else(|| "--password required (env: BEEZAP_PASSWORD)".to_string())
    }

    fn amount(&self) -> Result<u64, String> {
        self.amount.filter(|a| *a > 0).ok_or_else(|| "--amount <sats> required".to_string())
    }
}

fn print_usage() {
    println!(
        r#"beezap - Lightning wallet + zaps for Nostr

USAGE:
    beezap <command> [args] [options]

COMMANDS:
    mnemonic new [--words 12|24]        Generate a BIP39 mnemonic
    mnemonic check <words...>           Validate a mnemonic
    init --password <pw>                Create a wallet (or restore with --mnemonic)
    unlock --password <pw>              Decrypt and show identity + wallet state
    nwc set <uri> --password <pw>       Store an NWC connection (sealed to your key)
    lnurl <address|lnurl>               Resolve a zap endpoint
    zap <address|lnurl> --pubkey <hex> --amount <sats>
                                        Zap a profile (--note <id> | --article <kind:pubkey:d>)
    balance                             Wallet balance over NWC
    invoice --amount <sats> [--watch]   Create an invoice, optionally wait for payment
    pay <bolt11>                        Pay a BOLT11 invoice
    payments [--limit N]                Recent payments

OPTIONS:
    --password, -P <pw>     Wallet password (env: BEEZAP_PASSWORD)
    --mnemonic, -m <words>  Restore from mnemonic (env: BEEZAP_MNEMONIC)
    --words <n>             Mnemonic length for new wallets (12 or 24)
    --verify                init: print a backup challenge for the new words
    --comment, -c <text>    Zap comment
    --description, -d <txt> Invoice description
    --embedded              zap: try the connected wallet before NWC
    --json | --pretty       Output format
    --version, -V           Print version

ENVIRONMENT:
    BEEZAP_ROOT, BEEZAP_APP, BEEZAP_NETWORK, BEEZAP_RELAYS, BEEZAP_NWC_TIMEOUT_SECS,
    BEEZAP_RECONNECT_BASE_MS, BEEZAP_RECONNECT_MAX, BEEZAP_POLL_INTERVAL_MS, BEEZAP_LOG_JSON

EXAMPLES:
    beezap init --password hunter2
    beezap nwc set "nostr+walletconnect://...?relay=wss://relay.getalby.com/v1&secret=..." -P hunter2
    beezap zap alice@getalby.com --pubkey <hex> --amount 21 -c "nice post" -P hunter2
"#
    );
}

// =============================================================================
// Helpers
// =============================================================================

fn load_config() -> Result<BeezapConfig, String> {
    BeezapConfig::from_env().map_err(|e| e.to_string())
}

fn open_storage(config: &BeezapConfig) -> WalletStorage<FileStore> {
    debug!(path = %config.storage_path().display(), "opening storage");
    WalletStorage::new(FileStore::at(config.storage_path()))
}

struct Session {
    config: BeezapConfig,
    storage: WalletStorage<FileStore>,
    identity: Identity,
}

fn unlock_session(opts: &ParsedArgs) -> Result<Session, String> {
    let config = load_config()?;
    let storage = open_storage(&config);
    if !storage.has_mnemonic().map_err(|e| e.to_string())? {
        return Err("No wallet found. Run `beezap init` first".into());
    }
    let mnemonic = storage.load_mnemonic(opts.password()?).map_err(|e| e.to_string())?;
    let identity = Identity::from_mnemonic(&mnemonic).map_err(|e| e.to_string())?;
    Ok(Session { config, storage, identity })
}

impl Session {
    fn nwc_config(&self) -> Result<NwcConfig, String> {
        let sealed = self
            .storage
            .load_nwc()
            .map_err(|e| e.to_string())?
            .ok_or_else(|| "No NWC connection. Run `beezap nwc set <uri>` first".to_string())?;
        unseal_connection(&self.identity.nostr_keys, &sealed).map_err(|e| e.to_string())
    }

    async fn connect_service(&self) -> Result<WalletService, String> {
        let nwc = self.nwc_config()?;
        let connector = Arc::new(WsConnector::new(self.config.relay_connect_timeout));
        let engine = NwcEngine::new(connector).with_timeout(self.config.nwc_timeout);
        let service = WalletService::new(Arc::new(engine), self.config.service_config());
        let engine_config = EngineConfig::new(self.config.network).with_connection(nwc.to_uri());
        service.connect(engine_config).await.map_err(|e| e.to_string())?;
        self.storage.mark_connected().map_err(|e| e.to_string())?;
        Ok(service)
    }
}

// =============================================================================
// Commands
// =============================================================================

fn cmd_mnemonic(opts: &ParsedArgs) -> Result<Value, String> {
    match opts.sub.as_deref() {
        Some("new") => {
            let mnemonic = vault::generate_mnemonic(opts.words.unwrap_or(12)).map_err(|e| e.to_string())?;
            Ok(json!({ "mnemonic": mnemonic }))
        }
        Some("check") => {
            let phrase = opts.rest.join(" ");
            Ok(json!({ "valid": vault::validate_mnemonic(&phrase) }))
        }
        _ => Err("Usage: beezap mnemonic new|check".into()),
    }
}

fn cmd_init(opts: &ParsedArgs) -> Result<Value, String> {
    let config = load_config()?;
    let storage = open_storage(&config);
    if storage.has_mnemonic().map_err(|e| e.to_string())? {
        return Err(format!("Wallet already exists at {}", config.storage_path().display()));
    }
    let password = opts.password()?;

    let (record, fresh) = match opts.mnemonic.as_deref() {
        Some(phrase) => (vault::restore_wallet(phrase, password).map_err(|e| e.to_string())?, None),
        None => {
            let created = vault::create_wallet(password, opts.words.unwrap_or(12)).map_err(|e| e.to_string())?;
            (created.record, Some(created.mnemonic))
        }
    };
    storage.save_mnemonic(&record).map_err(|e| e.to_string())?;

    let phrase = match (&fresh, opts.mnemonic.as_deref()) {
        (Some(m), _) => m.as_str().to_string(),
        (None, Some(m)) => vault::normalize(m),
        (None, None) => return Err("no mnemonic".into()),
    };
    let identity = Identity::from_mnemonic(&phrase).map_err(|e| e.to_string())?;
    info!(pubkey = %identity.pubkey_hex, "wallet initialised");

    let mut output = json!({
        "pubkey": identity.pubkey_hex,
        "restored": fresh.is_none(),
        "path": config.storage_path().display().to_string(),
    });
    if let Some(mnemonic) = fresh {
        output["mnemonic"] = json!(mnemonic.as_str());
        if opts.verify {
            let words = mnemonic.split_whitespace().count();
            output["backup_challenge"] = json!(BackupChallenge::random(words, 3).positions);
        }
    }
    Ok(output)
}

fn cmd_unlock(opts: &ParsedArgs) -> Result<Value, String> {
    let session = unlock_session(opts)?;
    let state = session.storage.wallet_state().map_err(|e| e.to_string())?;
    let nwc = session.nwc_config().ok().map(|c| {
        json!({ "wallet_pubkey": c.wallet_pubkey.to_hex(), "relays": c.relays, "lud16": c.lud16 })
    });
    Ok(json!({
        "pubkey": session.identity.pubkey_hex,
        "wallet_state": state,
        "nwc": nwc,
    }))
}

fn cmd_nwc(opts: &ParsedArgs) -> Result<Value, String> {
    match opts.sub.as_deref() {
        Some("set") => {
            let uri = opts.rest.first().ok_or("Usage: beezap nwc set <uri>")?;
            let session = unlock_session(opts)?;
            let config = NwcConfig::parse(uri).map_err(|e| e.to_string())?;
            let sealed = beezap::nwc::seal_connection(&session.identity.nostr_keys, &config.to_uri())
                .map_err(|e| e.to_string())?;
            session.storage.save_nwc(&sealed).map_err(|e| e.to_string())?;
            Ok(json!({ "wallet_pubkey": config.wallet_pubkey.to_hex(), "relays": config.relays }))
        }
        _ => Err("Usage: beezap nwc set <uri>".into()),
    }
}

async fn cmd_lnurl(opts: &ParsedArgs) -> Result<Value, String> {
    let input = opts.sub.as_deref().ok_or("Usage: beezap lnurl <address|lnurl>")?;
    let config = load_config()?;
    let client = HttpLnurlClient::new(config.lnurl_timeout).map_err(|e| e.to_string())?;
    let url = lnurl::recipient_url(&recipient_for(input, String::new())).map_err(|e| e.to_string())?;
    let info = beezap::zap::LnurlClient::fetch_pay_info(&client, &url).await.map_err(|e| e.to_string())?;
    Ok(json!({
        "url": url,
        "lnurl": lnurl::encode_lnurl(&url).map_err(|e| e.to_string())?,
        "pay_info": info,
    }))
}

fn recipient_for(input: &str, pubkey: String) -> Recipient {
    let recipient = Recipient::new(pubkey);
    if input.contains('@') { recipient.with_lud16(input) } else { recipient.with_lud06(input) }
}

async fn cmd_zap(opts: &ParsedArgs) -> Result<Value, String> {
    let input = opts.sub.as_deref().ok_or("Usage: beezap zap <address|lnurl> --pubkey <hex> --amount <sats>")?;
    let pubkey = opts.pubkey.clone().ok_or("--pubkey <hex> required")?;
    let amount = opts.amount()?;
    let session = unlock_session(opts)?;

    let recipient = recipient_for(input, pubkey);
    let target = match (&opts.note, &opts.article) {
        (Some(id), _) => PaymentTarget::Note { event_id: id.clone(), author: recipient },
        (None, Some(coordinate)) => PaymentTarget::Article { coordinate: coordinate.clone(), author: recipient },
        (None, None) => PaymentTarget::Profile { recipient },
    };

    let lnurl_client = HttpLnurlClient::new(session.config.lnurl_timeout).map_err(|e| e.to_string())?;
    let connector = Arc::new(WsConnector::new(session.config.relay_connect_timeout));
    let mut dispatcher =
        ZapDispatcher::new(Arc::new(lnurl_client), connector).with_nwc_timeout(session.config.nwc_timeout);

    let sealed = session.storage.load_nwc().map_err(|e| e.to_string())?;
    if opts.embedded {
        dispatcher = dispatcher.with_wallet(session.connect_service().await?);
    }

    let mut request = ZapRequest::new(target, amount);
    request.comment = opts.comment.clone().unwrap_or_default();
    request.relays = session.config.relays.clone();
    request.nwc = sealed.map(NwcCredential::Sealed);
    request.prefer_embedded = opts.embedded;

    let outcome = dispatcher.zap(&session.identity.nostr_keys, request).await;
    let output = json!({
        "success": outcome.success,
        "rail": outcome.rail,
        "preimage": outcome.preimage,
        "error": outcome.error.as_ref().map(|e| e.to_string()),
        "attempts": outcome.attempts,
        "zap_request": outcome.zap_request.as_ref().map(|e| e.id.to_hex()),
    });
    if outcome.success { Ok(output) } else { Err(render(&output, false)) }
}

async fn cmd_balance(opts: &ParsedArgs) -> Result<Value, String> {
    let service = unlock_session(opts)?.connect_service().await?;
    let balance_sat = service.get_balance().await.map_err(|e| e.to_string())?;
    let _ = service.disconnect().await;
    Ok(json!({ "balance_sat": balance_sat }))
}

async fn cmd_invoice(opts: &ParsedArgs) -> Result<Value, String> {
    let amount = opts.amount()?;
    let service = unlock_session(opts)?.connect_service().await?;
    let description = opts.description.clone().unwrap_or_default();
    let created = service.create_invoice(amount, &description, None).await.map_err(|e| e.to_string())?;
    let mut output = json!({ "invoice": created.invoice, "payment_hash": created.payment_hash });

    if opts.watch {
        let hash = created.payment_hash.clone().ok_or("Wallet returned no payment hash to watch")?;
        // Invoice goes to stderr so it can be shown while stdout waits for the result.
        eprintln!("{}", created.invoice);
        let shutdown = install_signal_handlers();
        let mut watch = service.watch_invoice(hash);
        let status = tokio::select! {
            status = watch.settled() => status,
            _ = shutdown.wait() => None,
        };
        output["status"] = match status {
            Some(InvoiceStatus::Paid { amount_msat }) => json!({ "paid": true, "amount_msat": amount_msat }),
            Some(InvoiceStatus::Failed) => json!({ "paid": false, "failed": true }),
            _ => json!({ "paid": false, "cancelled": true }),
        };
    }
    let _ = service.disconnect().await;
    Ok(output)
}

async fn cmd_pay(opts: &ParsedArgs) -> Result<Value, String> {
    let invoice = opts.sub.as_deref().ok_or("Usage: beezap pay <bolt11>")?;
    let service = unlock_session(opts)?.connect_service().await?;
    let payment = service.pay_invoice(invoice).await.map_err(|e| e.to_string());
    let _ = service.disconnect().await;
    serde_json::to_value(payment?).map_err(|e| e.to_string())
}

async fn cmd_payments(opts: &ParsedArgs) -> Result<Value, String> {
    let service = unlock_session(opts)?.connect_service().await?;
    let payments = service.list_payments(opts.limit.unwrap_or(20)).await.map_err(|e| e.to_string());
    let _ = service.disconnect().await;
    let payments = payments?;
    Ok(json!({ "count": payments.len(), "payments": payments }))
}

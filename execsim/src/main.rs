//! # Execsim — paper execution counterpart
//!
//! Stands in for a broker bridge on the far side of the Crossrelay relay.
//!
//! ## Flow
//! ```text
//! pipeline ─TCP :5555─▶ read_intents (per connection)
//!                            │ mpsc<Intent>
//!                            ▼
//!                        Ledger::apply ── ignored intents are only logged
//!                            │ mpsc<Confirmation>
//!                            ▼
//!                        relay::send_confirmations ─TCP─▶ pipeline :5556 (one reconnecting connection)
//! ```

use std::net::SocketAddr;

use anyhow::Context;
use tokio::{
    io::{AsyncBufReadExt, BufReader},
    net::{TcpListener, TcpStream},
    sync::mpsc,
    time::sleep,
};
use tracing::{debug, error, info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

mod config;
mod ledger;
mod relay;

use config::Config;
use ledger::{Confirmation, Intent, Ledger};
use relay::send_confirmations;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(EnvFilter::from_default_env()
            .add_directive("execsim=debug".parse()?))
        .init();

    info!(r#"

  ╔═══════════════════════════════════════════╗
  ║   EXECSIM — Paper Execution Counterpart   ║
  ║   Crossrelay Trading Pipeline             ║
  ╚═══════════════════════════════════════════╝"#);

    let config = Config::from_env().context("Failed to load config")?;
    let listener = TcpListener::bind(&config.intent_addr)
        .await
        .with_context(|| format!("Failed to bind intent listener on {}", config.intent_addr))?;

    info!(
        intents       = %config.intent_addr,
        confirmations = %config.confirm_addr,
        cash          = config.starting_cash,
        "⏳ Waiting for trade intents"
    );

    let (intent_tx, mut intent_rx) = mpsc::channel::<Intent>(256);
    let (confirm_tx, confirm_rx) = mpsc::channel::<Confirmation>(256);

    tokio::spawn(accept_loop(listener, intent_tx));
    tokio::spawn(send_confirmations(confirm_rx, config.clone()));

    // ── Ledger loop (single writer) ───────────────────────────────────────────
    let mut ledger = Ledger::new(config.starting_cash);
    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => break,
            next = intent_rx.recv() => {
                let Some(intent) = next else { break };
                if let Some(confirmation) = ledger.apply(intent) {
                    if confirm_tx.try_send(confirmation).is_err() {
                        warn!("Confirmation queue full — confirmation dropped");
                    }
                }
            }
        }
    }

    ledger.log_summary();
    Ok(())
}

// ─── Intents ──────────────────────────────────────────────────────────────────

async fn accept_loop(listener: TcpListener, intents: mpsc::Sender<Intent>) {
    loop {
        match listener.accept().await {
            Ok((stream, peer)) => {
                info!(%peer, "🔗 Pipeline connected");
                tokio::spawn(read_intents(stream, peer, intents.clone()));
            }
            Err(e) => {
                error!(error = %e, "❌ Accept failed");
                sleep(std::time::Duration::from_secs(1)).await;
            }
        }
    }
}

async fn read_intents(stream: TcpStream, peer: SocketAddr, intents: mpsc::Sender<Intent>) {
    let mut lines = BufReader::new(stream).lines();

    loop {
        match lines.next_line().await {
            Ok(Some(line)) if line.trim().is_empty() => continue,
            Ok(Some(line)) => match serde_json::from_str::<Intent>(&line) {
                Ok(intent) => {
                    debug!(%peer, action = %intent.action, price = intent.price, "📥 Intent received");
                    if intents.send(intent).await.is_err() {
                        return; // ledger loop stopped
                    }
                }
                Err(e) => error!(%peer, error = %e, raw = %line, "❌ Error processing intent"),
            },
            Ok(None) => {
                info!(%peer, "Pipeline disconnected");
                return;
            }
            Err(e) => {
                warn!(%peer, error = %e, "Intent read failed — dropping connection");
                return;
            }
        }
    }
}

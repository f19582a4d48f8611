//! sigrelay — runs one Signal bridge adapter until Ctrl+C.
//!
//! Inbound events are logged; with `--echo`, text messages are sent back to
//! the conversation they came from.

mod cli;

use anyhow::Context;
use clap::Parser;
use cli::Cli;
use sigrelay_bridge::{Connector, SignalAdapter};
use sigrelay_types::config::AdapterConfig;
use sigrelay_types::event::{EventKind, NormalizedEvent};
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{info, warn};

fn init_tracing(json: bool) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));
    if json {
        tracing_subscriber::fmt()
            .json()
            .with_env_filter(filter)
            .init();
    } else {
        tracing_subscriber::fmt().with_env_filter(filter).init();
    }
}

/// What the echo mode sends back for an inbound event, if anything.
fn echo_reply(event: &NormalizedEvent) -> Option<NormalizedEvent> {
    match &event.kind {
        EventKind::Message { text } => Some(NormalizedEvent::message(event.target.clone(), text)),
        _ => None,
    }
}

async fn handle_event(adapter: &SignalAdapter, event: NormalizedEvent, echo: bool) {
    info!(
        kind = event.kind.name(),
        target = %event.target,
        from = ?event.user_id().map(|a| a.as_str()),
        sent_at = ?event.sent_at(),
        text = ?event.text(),
        "Inbound event"
    );
    if !echo {
        return;
    }
    if let Some(reply) = echo_reply(&event) {
        if let Err(e) = adapter.send(&reply).await {
            warn!(error = %e, target = %reply.target, "Echo reply failed");
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.log_json);

    let path = cli
        .config_path()
        .context("no --config given and no home directory to look in")?;
    let config = AdapterConfig::load(&path)
        .with_context(|| format!("loading config from {}", path.display()))?;

    let (tx, mut rx) = mpsc::channel::<NormalizedEvent>(256);
    let adapter = Arc::new(SignalAdapter::new(config, Arc::new(tx))?);
    adapter.connect().await?;

    let mut listener = {
        let adapter = adapter.clone();
        tokio::spawn(async move { adapter.listen().await })
    };

    let outcome = loop {
        tokio::select! {
            Some(event) = rx.recv() => handle_event(&adapter, event, cli.echo).await,
            _ = tokio::signal::ctrl_c() => {
                info!("Interrupted, shutting down");
                break Ok(());
            }
            joined = &mut listener => {
                break match joined {
                    Ok(result) => result.map_err(anyhow::Error::from),
                    Err(e) => Err(anyhow::Error::from(e).context("listen task failed")),
                };
            }
        }
    };

    adapter.disconnect().await?;
    if !listener.is_finished() {
        let _ = listener.await;
    }
    outcome
}

#[cfg(test)]
mod tests {
    use super::*;
    use sigrelay_types::address::Target;

    #[test]
    fn test_echo_only_replies_to_text() {
        let inbound = NormalizedEvent::message(Target::Alias("room".into()), "ping");
        let reply = echo_reply(&inbound).unwrap();
        assert_eq!(reply.target, "room");
        assert_eq!(reply.text(), Some("ping"));

        let typing = NormalizedEvent::typing(Target::Alias("room".into()), true);
        assert!(echo_reply(&typing).is_none());
    }
}

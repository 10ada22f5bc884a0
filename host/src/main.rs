//! graph-sync-host binary
//!
//! Reads `SessionInput` JSON lines from stdin and writes outbound messages
//! as JSON lines to stdout. Usage: `graph-sync-host [config.json]`.

use std::path::PathBuf;
use std::sync::Arc;

use graph_sync::{ChannelEventSink, OutboundMessage};
use graph_sync_host::constants::paths::CONFIG_FILE;
use graph_sync_host::nodes::builtin_registry;
use graph_sync_host::{run_session, EditorSession, HostConfig, SessionError, SessionInput};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::sync::mpsc;

#[tokio::main]
async fn main() {
    let config_path = std::env::args()
        .nth(1)
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from(CONFIG_FILE));
    let loaded = HostConfig::load(&config_path).await;
    let filter = loaded
        .as_ref()
        .map(|c| c.log_filter.clone())
        .unwrap_or_else(|_| HostConfig::default().log_filter);

    // Logs go to stderr; stdout carries the message stream
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(filter))
        .format_timestamp_millis()
        .init();

    let config = match loaded {
        Ok(config) => config,
        Err(e) => {
            log::warn!("Failed to load {:?}, using defaults: {}", config_path, e);
            HostConfig::default()
        }
    };

    log::info!("graph-sync-host starting...");

    if let Err(e) = run(config).await {
        log::error!("graph-sync-host failed: {}", e);
        std::process::exit(1);
    }
}

async fn run(config: HostConfig) -> Result<(), SessionError> {
    let registry = Arc::new(builtin_registry());
    log::info!("Registered {} node classes", registry.len());

    let (out_tx, out_rx) = mpsc::unbounded_channel();
    let sink = Arc::new(ChannelEventSink::new(out_tx));
    let session = EditorSession::new(&config, registry, sink);

    let (in_tx, in_rx) = mpsc::unbounded_channel();
    let session_task = tokio::spawn(run_session(session, in_rx));
    let writer_task = tokio::spawn(write_messages(out_rx));

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Some(line) = lines.next_line().await? {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        match serde_json::from_str::<SessionInput>(line) {
            Ok(input) => {
                if in_tx.send(input).is_err() {
                    log::warn!("Session closed, stopping input");
                    break;
                }
            }
            Err(e) => log::warn!("Ignoring malformed input line: {}", e),
        }
    }
    drop(in_tx);

    // The session owns the outbound sink; dropping it closes the writer
    let session = session_task
        .await
        .map_err(|e| SessionError::Task(e.to_string()))??;
    log::info!(
        "Final graph: {} node(s), {} edge(s)",
        session.store().nodes().len(),
        session.store().edges().len()
    );
    drop(session);

    writer_task
        .await
        .map_err(|e| SessionError::Task(e.to_string()))?
}

async fn write_messages(mut messages: mpsc::UnboundedReceiver<OutboundMessage>) -> Result<(), SessionError> {
    let mut stdout = tokio::io::stdout();
    while let Some(message) = messages.recv().await {
        let mut line = serde_json::to_vec(&message)?;
        line.push(b'\n');
        stdout.write_all(&line).await?;
        stdout.flush().await?;
    }
    Ok(())
}

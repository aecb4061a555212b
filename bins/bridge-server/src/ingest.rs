//! Inbound publish endpoint: newline-delimited JSON records onto the local bus.
//!
//! Each line is `{"topic": "/odom", "msg_type": "nav_msgs/Odometry", "data": {...}}`;
//! `data` becomes the JSON payload of the published message.

use std::net::SocketAddr;
use std::sync::Arc;

use bridge_api::Message;
use bridge_engine::LocalBus;
use serde::Deserialize;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::net::{TcpListener, TcpStream};
use tokio_util::sync::CancellationToken;

#[derive(Debug, Deserialize)]
struct IngestRecord {
    topic: String,
    msg_type: String,
    #[serde(default)]
    data: serde_json::Value,
}

fn decode(line: &str) -> Result<(String, Message), serde_json::Error> {
    let record: IngestRecord = serde_json::from_str(line)?;
    let message = Message::from_json(record.msg_type, &record.data)?;
    Ok((record.topic, message))
}

/// Accept connections until `token` is cancelled.
pub async fn serve(listener: TcpListener, bus: Arc<LocalBus>, token: CancellationToken) {
    loop {
        tokio::select! {
            accepted = listener.accept() => match accepted {
                Ok((stream, peer)) => {
                    tracing::info!(peer = %peer, "ingest client connected");
                    tokio::spawn(handle_connection(stream, peer, bus.clone(), token.clone()));
                }
                Err(e) => tracing::warn!(error = %e, "ingest accept failed"),
            },
            _ = token.cancelled() => break,
        }
    }
    tracing::info!("ingest endpoint stopped");
}

async fn handle_connection(
    stream: TcpStream,
    peer: SocketAddr,
    bus: Arc<LocalBus>,
    token: CancellationToken,
) {
    let mut lines = BufReader::new(stream).lines();
    let mut published: u64 = 0;
    loop {
        let line = tokio::select! {
            line = lines.next_line() => line,
            _ = token.cancelled() => break,
        };
        let line = match line {
            Ok(Some(line)) => line,
            Ok(None) => break,
            Err(e) => {
                tracing::warn!(peer = %peer, error = %e, "ingest read failed");
                break;
            }
        };
        if line.trim().is_empty() {
            continue;
        }
        match decode(&line) {
            Ok((topic, message)) => match bus.publish(&topic, message) {
                Ok(subscribers) => {
                    published += 1;
                    tracing::trace!(topic = %topic, subscribers, "published");
                }
                Err(e) => tracing::warn!(peer = %peer, topic = %topic, error = %e, "publish rejected"),
            },
            Err(e) => tracing::warn!(peer = %peer, error = %e, "malformed ingest record"),
        }
    }
    tracing::info!(peer = %peer, published, "ingest client disconnected");
}

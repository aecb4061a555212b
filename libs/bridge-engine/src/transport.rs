use std::sync::Mutex;

use bridge_api::{Outbound, SinkError, TransportSink};
use serde::Serialize;
use tokio::io::AsyncWriteExt;
use tokio::net::TcpStream;
use tokio::sync::mpsc::{self, error::TrySendError};
use tokio::task::JoinHandle;

use crate::error::EngineError;
use crate::sync::lock;

/// One line on the wire.
#[derive(Serialize)]
struct Envelope<'a> {
    topic: &'a str,
    payload: &'a Outbound,
}

/// Encode one newline-terminated JSON envelope.
pub fn encode_line(topic: &str, payload: &Outbound) -> Result<Vec<u8>, SinkError> {
    let mut line = serde_json::to_vec(&Envelope { topic, payload })?;
    line.push(b'\n');
    Ok(line)
}

/// Newline-delimited JSON over a single outbound TCP connection.
///
/// `send_message` only queues; a writer task owns the socket. When the
/// connection dies the sink reports [`SinkError::Closed`] from then on.
pub struct TcpSink {
    addr: String,
    tx: Mutex<Option<mpsc::Sender<Vec<u8>>>>,
    writer: Mutex<Option<JoinHandle<()>>>,
}

impl std::fmt::Debug for TcpSink {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TcpSink").field("addr", &self.addr).finish()
    }
}

impl TcpSink {
    /// Connect to `addr` and start the writer task with a queue of `buffer` lines.
    pub async fn connect(addr: &str, buffer: usize) -> Result<Self, EngineError> {
        let stream = TcpStream::connect(addr)
            .await
            .map_err(|e| EngineError::Transport(format!("connect {addr}: {e}")))?;
        stream.set_nodelay(true)?;

        let (tx, rx) = mpsc::channel(buffer.max(1));
        let writer = tokio::spawn(write_loop(stream, rx, addr.to_string()));
        tracing::info!(addr = %addr, buffer, "transport connected");

        Ok(Self {
            addr: addr.to_string(),
            tx: Mutex::new(Some(tx)),
            writer: Mutex::new(Some(writer)),
        })
    }

    pub fn addr(&self) -> &str {
        &self.addr
    }

    /// Stop accepting payloads, flush what is queued and close the socket.
    pub async fn close(&self) {
        lock(&self.tx, "transport sender").take();
        let writer = lock(&self.writer, "transport writer").take();
        if let Some(writer) = writer {
            if let Err(e) = writer.await {
                tracing::error!(addr = %self.addr, error = %e, "transport writer task failed");
            }
        }
    }
}

async fn write_loop(mut stream: TcpStream, mut rx: mpsc::Receiver<Vec<u8>>, addr: String) {
    let mut written: u64 = 0;
    while let Some(line) = rx.recv().await {
        if let Err(e) = stream.write_all(&line).await {
            tracing::error!(addr = %addr, error = %e, "transport write failed, closing");
            return;
        }
        written += 1;
    }
    if let Err(e) = stream.shutdown().await {
        tracing::debug!(addr = %addr, error = %e, "transport shutdown");
    }
    tracing::info!(addr = %addr, written, "transport closed");
}

impl TransportSink for TcpSink {
    fn send_message(&self, topic: &str, payload: Outbound) -> Result<(), SinkError> {
        let line = encode_line(topic, &payload)?;
        let tx = lock(&self.tx, "transport sender");
        let tx = tx.as_ref().ok_or(SinkError::Closed)?;
        tx.try_send(line).map_err(|e| match e {
            TrySendError::Full(_) => SinkError::Full,
            TrySendError::Closed(_) => SinkError::Closed,
        })
    }
}

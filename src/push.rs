//! Push channel: an external controller connects over TCP and writes one JSON
//! payload per line, e.g. `{"imageSource": "https://host/next.jpg"}`.
//!
//! Lines are forwarded verbatim; parsing happens on the frame thread so that
//! malformed payloads reach the observer like every other event. Lines that
//! are too long or not UTF-8 are dropped here and the connection stays open.

use std::net::SocketAddr;
use std::sync::Arc;

use tokio::io::{self, AsyncBufRead, AsyncBufReadExt, AsyncReadExt, BufReader};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::mpsc::UnboundedSender;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::runtime::Inbound;

/// Maximum number of concurrent push connections.
const MAX_CONNECTIONS: usize = 16;

/// Longest accepted payload line, in bytes.
const MAX_LINE_BYTES: usize = 64 * 1024;

/// Binds `addr` and serves push connections on a background task until
/// `cancel` fires.
pub async fn start_listener(
    addr: SocketAddr,
    events: UnboundedSender<Inbound>,
    cancel: CancellationToken,
) -> anyhow::Result<(SocketAddr, JoinHandle<()>)> {
    let listener = TcpListener::bind(addr).await?;
    let local = listener.local_addr()?;
    info!("push listener on {local}");
    let handle = tokio::spawn(serve(listener, events, cancel));
    Ok((local, handle))
}

pub async fn serve(listener: TcpListener, events: UnboundedSender<Inbound>, cancel: CancellationToken) {
    let permits = Arc::new(tokio::sync::Semaphore::new(MAX_CONNECTIONS));
    loop {
        tokio::select! {
            _ = cancel.cancelled() => {
                info!("push listener shutting down");
                break;
            }
            accepted = listener.accept() => {
                let (stream, peer) = match accepted {
                    Ok(pair) => pair,
                    Err(e) => {
                        error!("accept error: {e}");
                        continue;
                    }
                };
                let Ok(permit) = permits.clone().try_acquire_owned() else {
                    warn!(%peer, "connection limit reached, rejecting push client");
                    continue;
                };
                debug!(%peer, "push client connected");
                let events = events.clone();
                let cancel = cancel.clone();
                tokio::spawn(async move {
                    if let Err(e) = handle_client(stream, events, cancel).await {
                        debug!(%peer, "push client disconnected: {e}");
                    }
                    drop(permit);
                });
            }
        }
    }
}

async fn handle_client(
    stream: TcpStream,
    events: UnboundedSender<Inbound>,
    cancel: CancellationToken,
) -> anyhow::Result<()> {
    let mut reader = BufReader::new(stream);
    let mut buf = Vec::new();
    loop {
        let line = tokio::select! {
            _ = cancel.cancelled() => return Ok(()),
            line = read_line(&mut reader, &mut buf) => line?,
        };
        let payload = match line {
            Line::Closed => return Ok(()),
            Line::Oversized => {
                warn!(limit = MAX_LINE_BYTES, "oversized push payload dropped");
                continue;
            }
            Line::NotUtf8 => {
                warn!("push payload is not valid UTF-8, dropped");
                continue;
            }
            Line::Payload(payload) => payload,
        };
        if payload.is_empty() {
            continue;
        }
        if events.send(Inbound::Push(payload)).is_err() {
            anyhow::bail!("frame loop has gone away");
        }
    }
}

#[derive(Debug, PartialEq)]
enum Line {
    /// Trimmed text of one line.
    Payload(String),
    Oversized,
    NotUtf8,
    Closed,
}

/// Reads one newline-terminated line, never buffering more than
/// `MAX_LINE_BYTES + 1` bytes of it. The rest of an oversized line is skipped.
async fn read_line<R>(reader: &mut R, buf: &mut Vec<u8>) -> io::Result<Line>
where
    R: AsyncBufRead + Unpin,
{
    buf.clear();
    let read = (&mut *reader)
        .take(MAX_LINE_BYTES as u64 + 1)
        .read_until(b'\n', buf)
        .await?;
    if read == 0 {
        return Ok(Line::Closed);
    }
    if buf.last() != Some(&b'\n') && buf.len() > MAX_LINE_BYTES {
        skip_line(reader).await?;
        return Ok(Line::Oversized);
    }
    match std::str::from_utf8(buf) {
        Ok(text) => Ok(Line::Payload(text.trim().to_string())),
        Err(_) => Ok(Line::NotUtf8),
    }
}

async fn skip_line<R>(reader: &mut R) -> io::Result<()>
where
    R: AsyncBufRead + Unpin,
{
    loop {
        let available = reader.fill_buf().await?;
        if available.is_empty() {
            return Ok(());
        }
        let newline = available.iter().position(|b| *b == b'\n');
        let len = available.len();
        match newline {
            Some(at) => {
                reader.consume(at + 1);
                return Ok(());
            }
            None => reader.consume(len),
        }
    }
}

//! WebSocket transport: one socket, one reader task, one writer task.
//!
//! ```text
//!   send() ──► outbound mpsc ──► writer task ──► socket
//!   socket ──► reader task ──► Envelope::from_wire ──► inbound mpsc ──► session event loop
//! ```
//!
//! The transport never interprets replies.  It allocates message ids from
//! the session's [`MessageIds`], arms per-call timers, and turns socket lifecycle into `session_started` /
//! `session_ended` envelopes on the same inbound queue as everything else.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use parking_lot::Mutex;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_tungstenite::tungstenite::Message;

use sw_domain::{Error, Result};
use sw_protocol::{commands, Command, Envelope, MessageId, OutboundFrame};

/// Delay between a local close and the `session_ended` notice.
pub const CLOSE_GRACE: Duration = Duration::from_millis(100);

/// Turn an access point `host:port` into a socket URL.
///
/// Port 443 selects `wss://` without an explicit port; anything else is
/// plain `ws://`.  Values that already carry a scheme are used as-is.
pub fn access_point_url(access_point: &str) -> String {
    if access_point.starts_with("ws://") || access_point.starts_with("wss://") {
        return access_point.to_string();
    }
    match access_point.rsplit_once(':') {
        Some((host, "443")) => format!("wss://{host}"),
        _ => format!("ws://{access_point}"),
    }
}

/// Message id allocator owned by a session and shared with every transport
/// it opens, so ids keep increasing across reconnects.
#[derive(Clone, Default)]
pub struct MessageIds(Arc<Mutex<MessageId>>);

impl MessageIds {
    pub fn new() -> Self {
        Self::default()
    }

    /// Last id handed out, `0` before the first send.
    pub fn last(&self) -> MessageId {
        *self.0.lock()
    }
}

/// State shared between the transport handle and its background tasks.
struct Shared {
    connection: u64,
    inbound: mpsc::UnboundedSender<Envelope>,
    open: AtomicBool,
    ended: AtomicBool,
}

impl Shared {
    fn deliver(&self, envelope: Envelope) {
        // The session may already be gone; nothing to deliver to then.
        let _ = self.inbound.send(envelope);
    }

    /// Emit `session_ended` for this connection, at most once.
    fn end(&self) {
        self.open.store(false, Ordering::SeqCst);
        if !self.ended.swap(true, Ordering::SeqCst) {
            tracing::info!(connection = self.connection, "socket closed");
            self.deliver(Envelope::lifecycle(commands::SESSION_ENDED, self.connection));
        }
    }
}

pub struct Transport {
    url: String,
    timeout: Option<Duration>,
    ids: MessageIds,
    outbound: mpsc::UnboundedSender<Message>,
    shared: Arc<Shared>,
    closed: AtomicBool,
    reader: JoinHandle<()>,
}

impl Transport {
    /// Open the socket and start the reader and writer tasks.
    ///
    /// `session_started` is queued on `inbound` before any frame read from
    /// the socket.
    pub async fn open(
        connection: u64,
        url: &str,
        timeout: Option<Duration>,
        ids: MessageIds,
        inbound: mpsc::UnboundedSender<Envelope>,
    ) -> Result<Self> {
        tracing::info!(url = %url, connection, "opening socket");

        let (ws, _response) = tokio_tungstenite::connect_async(url)
            .await
            .map_err(|e| Error::Connection(format!("failed to open {url}: {e}")))?;
        let (mut sink, mut stream) = ws.split();

        let shared = Arc::new(Shared {
            connection,
            inbound,
            open: AtomicBool::new(true),
            ended: AtomicBool::new(false),
        });
        shared.deliver(Envelope::lifecycle(commands::SESSION_STARTED, connection));

        // ── Writer ───────────────────────────────────────────────────
        let (outbound, mut outbound_rx) = mpsc::unbounded_channel::<Message>();
        let writer_shared = shared.clone();
        tokio::spawn(async move {
            while let Some(msg) = outbound_rx.recv().await {
                let closing = matches!(msg, Message::Close(_));
                if let Err(e) = sink.send(msg).await {
                    tracing::warn!(connection = writer_shared.connection, error = %e, "socket write failed");
                    writer_shared.end();
                    break;
                }
                if closing {
                    break;
                }
            }
        });

        // ── Reader ───────────────────────────────────────────────────
        let reader_shared = shared.clone();
        let reader = tokio::spawn(async move {
            while let Some(frame) = stream.next().await {
                match frame {
                    Ok(Message::Text(text)) => match Envelope::from_wire(&text) {
                        Ok(Some(envelope)) => {
                            tracing::debug!(
                                command = %envelope.command,
                                message_id = ?envelope.id,
                                "message received"
                            );
                            reader_shared.deliver(envelope);
                        }
                        Ok(None) => tracing::debug!(frame = %text, "ignoring unrecognised frame"),
                        Err(e) => tracing::warn!(error = %e, "failed to parse frame"),
                    },
                    Ok(Message::Close(_)) => break,
                    Ok(_) => {}
                    Err(e) => {
                        tracing::warn!(connection = reader_shared.connection, error = %e, "socket read failed");
                        break;
                    }
                }
            }
            reader_shared.end();
        });

        Ok(Self {
            url: url.to_string(),
            timeout,
            ids,
            outbound,
            shared,
            closed: AtomicBool::new(false),
            reader,
        })
    }

    pub fn connection(&self) -> u64 {
        self.shared.connection
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    pub fn connected(&self) -> bool {
        self.shared.open.load(Ordering::SeqCst) && !self.closed.load(Ordering::SeqCst)
    }

    /// Send `command` under a fresh message id.
    ///
    /// `register` runs with the id before the frame is queued, so whatever
    /// it sets up is in place before a reply can arrive.  When a timeout is
    /// configured, a `timed out` error reply for the id is delivered once it
    /// elapses; a real reply arriving first makes that one a no-op.
    pub fn send<R>(
        &self,
        command: Command,
        register: impl FnOnce(MessageId) -> Result<R>,
    ) -> Result<(MessageId, R)> {
        if !self.connected() {
            return Err(Error::Connection("connection is not open".into()));
        }

        // Held until the frame is queued so wire order matches id order.
        let mut last_id = self.ids.0.lock();
        let id = *last_id + 1;
        *last_id = id;

        let frame = OutboundFrame::new(id, command);
        let json = serde_json::to_string(&frame)?;
        let registered = register(id)?;

        tracing::debug!(message_id = id, command = %frame.name, "message sent");
        if self.outbound.send(Message::Text(json)).is_err() {
            self.shared.deliver(Envelope::error_reply(id, "connection closed"));
        } else if let Some(timeout) = self.timeout {
            let shared = self.shared.clone();
            tokio::spawn(async move {
                tokio::time::sleep(timeout).await;
                shared.deliver(Envelope::timed_out(id));
            });
        }
        Ok((id, registered))
    }

    /// Begin closing.  Idempotent.  `session_ended` follows after
    /// [`CLOSE_GRACE`] unless the socket reports it first.
    pub fn close(&self) {
        if self.closed.swap(true, Ordering::SeqCst) {
            return;
        }
        tracing::debug!(connection = self.shared.connection, "closing socket");
        let _ = self.outbound.send(Message::Close(None));

        let shared = self.shared.clone();
        match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                handle.spawn(async move {
                    tokio::time::sleep(CLOSE_GRACE).await;
                    shared.end();
                });
            }
            Err(_) => shared.end(),
        }
    }
}

impl Drop for Transport {
    fn drop(&mut self) {
        self.reader.abort();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn message_ids_are_shared_between_clones() {
        let ids = MessageIds::new();
        let other = ids.clone();
        *other.0.lock() += 3;
        assert_eq!(ids.last(), 3);
    }

    #[test]
    fn port_443_selects_secure_scheme() {
        assert_eq!(access_point_url("ap.example.net:443"), "wss://ap.example.net");
    }

    #[test]
    fn other_ports_stay_plain() {
        assert_eq!(access_point_url("ap.example.net:4070"), "ws://ap.example.net:4070");
        assert_eq!(access_point_url("127.0.0.1:80"), "ws://127.0.0.1:80");
    }

    #[test]
    fn explicit_scheme_is_kept() {
        assert_eq!(access_point_url("ws://127.0.0.1:9000/ws"), "ws://127.0.0.1:9000/ws");
        assert_eq!(access_point_url("wss://ap.example.net"), "wss://ap.example.net");
    }
}

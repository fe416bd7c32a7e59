//! Per-connection reader and writer tasks.
//!
//! The reader owns the inbound half of the socket and turns frames into
//! [`InboundMessage`]s. The writer owns the outbound half and drains the
//! session buffer, coalescing queued payloads into one frame. They share only
//! the buffer and a cancellation token; either one exiting unregisters the
//! session, which closes the buffer and stops the other.

use std::fmt::{self, Display};
use std::sync::Arc;
use std::time::Duration;

use axum::extract::ws::Message;
use futures::{Sink, SinkExt, Stream, StreamExt};
use tokio::sync::mpsc::{self, WeakSender, error::TrySendError};
use tokio::task::JoinHandle;
use tokio::time::{self, Instant};
use tokio_util::sync::CancellationToken;

use super::SessionPort;
use super::hub::{Payload, SessionHandle, SessionId};
use super::messages::{InboundMessage, OutboundControl};
use crate::state::SharedClock;

/// Largest inbound frame accepted before the session is torn down.
pub const MAX_FRAME_BYTES: usize = 512;

/// Time allowed between pongs before the peer is considered gone.
pub const READ_DEADLINE: Duration = Duration::from_secs(60);

/// Interval of socket-level pings. Must stay below [`READ_DEADLINE`].
pub const PING_PERIOD: Duration = Duration::from_secs(54);

pub const WRITE_DEADLINE: Duration = Duration::from_secs(10);

pub struct SessionTasks {
    pub reader: JoinHandle<()>,
    pub writer: JoinHandle<()>,
}

#[derive(Debug)]
enum ReadExit {
    Cancelled,
    DeadlineExceeded,
    StreamClosed,
    ClientClosed,
    FrameTooLarge(usize),
    Socket(String),
}

#[derive(Debug)]
enum WriteExit {
    BufferClosed,
    DeadlineExceeded,
    Socket(String),
}

impl fmt::Display for ReadExit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ReadExit::Cancelled => f.write_str("cancelled"),
            ReadExit::DeadlineExceeded => f.write_str("read deadline exceeded"),
            ReadExit::StreamClosed => f.write_str("stream closed"),
            ReadExit::ClientClosed => f.write_str("client closed"),
            ReadExit::FrameTooLarge(len) => write!(f, "frame of {len} bytes exceeds {MAX_FRAME_BYTES}"),
            ReadExit::Socket(error) => write!(f, "socket error: {error}"),
        }
    }
}

impl fmt::Display for WriteExit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WriteExit::BufferClosed => f.write_str("buffer closed"),
            WriteExit::DeadlineExceeded => f.write_str("write deadline exceeded"),
            WriteExit::Socket(error) => write!(f, "socket error: {error}"),
        }
    }
}

/// Spawn the reader and writer for a session that is already registered with the hub.
///
/// `session` is consumed so that the hub keeps the only strong sender; the
/// reader holds a weak one for pong replies.
pub fn start<S, R, E>(
    session: SessionHandle,
    outbound: mpsc::Receiver<Payload>,
    sink: S,
    stream: R,
    port: Arc<dyn SessionPort>,
    clock: SharedClock,
) -> SessionTasks
where
    S: Sink<Message> + Unpin + Send + 'static,
    S::Error: Display + Send,
    R: Stream<Item = Result<Message, E>> + Unpin + Send + 'static,
    E: Display + Send + 'static,
{
    let session_id = session.id;
    let weak_outbound = session.outbound.downgrade();
    drop(session);

    let shutdown = CancellationToken::new();

    let writer = tokio::spawn({
        let port = port.clone();
        let shutdown = shutdown.clone();
        async move {
            let mut sink = sink;
            let reason = write_loop(&mut sink, outbound).await;
            tracing::debug!(session_id, reason = %reason, "session writer stopped");
            port.unregister(session_id);
            shutdown.cancel();
        }
    });

    let reader = tokio::spawn(async move {
        let mut stream = stream;
        let reader = Reader {
            session_id,
            outbound: weak_outbound,
            port: port.clone(),
            clock,
        };
        let reason = reader.run(&mut stream, &shutdown).await;
        match &reason {
            ReadExit::Socket(_) | ReadExit::FrameTooLarge(_) => {
                tracing::warn!(session_id, reason = %reason, "session reader stopped")
            }
            _ => tracing::debug!(session_id, reason = %reason, "session reader stopped"),
        }
        port.unregister(session_id);
        shutdown.cancel();
    });

    SessionTasks { reader, writer }
}

struct Reader {
    session_id: SessionId,
    outbound: WeakSender<Payload>,
    port: Arc<dyn SessionPort>,
    clock: SharedClock,
}

impl Reader {
    async fn run<R, E>(&self, stream: &mut R, shutdown: &CancellationToken) -> ReadExit
    where
        R: Stream<Item = Result<Message, E>> + Unpin,
        E: Display,
    {
        let mut deadline = Instant::now() + READ_DEADLINE;

        loop {
            let next = tokio::select! {
                _ = shutdown.cancelled() => return ReadExit::Cancelled,
                next = time::timeout_at(deadline, stream.next()) => next,
            };

            let message = match next {
                Err(_) => return ReadExit::DeadlineExceeded,
                Ok(None) => return ReadExit::StreamClosed,
                Ok(Some(Err(error))) => return ReadExit::Socket(error.to_string()),
                Ok(Some(Ok(message))) => message,
            };

            match message {
                Message::Pong(_) => deadline = Instant::now() + READ_DEADLINE,
                Message::Text(text) => {
                    let len = text.as_str().len();
                    if len > MAX_FRAME_BYTES {
                        return ReadExit::FrameTooLarge(len);
                    }
                    self.handle(InboundMessage::parse(text.as_str())).await;
                }
                Message::Binary(bytes) => {
                    if bytes.len() > MAX_FRAME_BYTES {
                        return ReadExit::FrameTooLarge(bytes.len());
                    }
                    match std::str::from_utf8(&bytes) {
                        Ok(text) => self.handle(InboundMessage::parse(text)).await,
                        Err(_) => tracing::debug!(session_id = self.session_id, "ignoring non-utf8 frame"),
                    }
                }
                // The socket layer answers pings itself.
                Message::Ping(_) => {}
                Message::Close(_) => return ReadExit::ClientClosed,
            }
        }
    }

    async fn handle(&self, message: InboundMessage) {
        match message {
            InboundMessage::MarkRead { notification_id } => {
                if let Err(error) = self.port.mark_read(notification_id).await {
                    tracing::warn!(
                        session_id = self.session_id,
                        notification_id,
                        error = %error,
                        "failed to mark notification as read"
                    );
                }
            }
            InboundMessage::Ping => self.reply_pong(),
            InboundMessage::Unknown => {}
        }
    }

    fn reply_pong(&self) {
        let pong = OutboundControl::Pong {
            timestamp: self.clock.utc().timestamp(),
        };
        let body = match serde_json::to_string(&pong) {
            Ok(body) => body,
            Err(error) => {
                tracing::warn!(error = %error, "failed to serialize pong");
                return;
            }
        };
        let Some(outbound) = self.outbound.upgrade() else {
            return;
        };
        if let Err(TrySendError::Full(_)) = outbound.try_send(Payload::from(body)) {
            tracing::warn!(session_id = self.session_id, "session buffer full, dropping pong");
        }
    }
}

async fn write_loop<S>(sink: &mut S, mut outbound: mpsc::Receiver<Payload>) -> WriteExit
where
    S: Sink<Message> + Unpin,
    S::Error: Display,
{
    let mut ticker = time::interval_at(Instant::now() + PING_PERIOD, PING_PERIOD);

    loop {
        tokio::select! {
            next = outbound.recv() => {
                let Some(first) = next else {
                    let _ = time::timeout(WRITE_DEADLINE, sink.send(Message::Close(None))).await;
                    return WriteExit::BufferClosed;
                };
                let frame = coalesce(first, &mut outbound);
                if let Err(exit) = send_with_deadline(sink, Message::Text(frame.into())).await {
                    return exit;
                }
            }
            _ = ticker.tick() => {
                if let Err(exit) = send_with_deadline(sink, Message::Ping(Vec::new().into())).await {
                    return exit;
                }
            }
        }
    }
}

/// Join `first` with whatever was already queued when it was taken, newline separated.
fn coalesce(first: Payload, outbound: &mut mpsc::Receiver<Payload>) -> String {
    let queued = outbound.len();
    let mut frame = String::from(&*first);
    for _ in 0..queued {
        match outbound.try_recv() {
            Ok(next) => {
                frame.push('\n');
                frame.push_str(&next);
            }
            Err(_) => break,
        }
    }
    frame
}

async fn send_with_deadline<S>(sink: &mut S, message: Message) -> Result<(), WriteExit>
where
    S: Sink<Message> + Unpin,
    S::Error: Display,
{
    match time::timeout(WRITE_DEADLINE, sink.send(message)).await {
        Ok(Ok(())) => Ok(()),
        Ok(Err(error)) => Err(WriteExit::Socket(error.to_string())),
        Err(_) => Err(WriteExit::DeadlineExceeded),
    }
}

#[cfg(test)]
#[path = "session_tests.rs"]
mod tests;

//! The per-connection read/dispatch/write loop.

use std::net::SocketAddr;
use std::sync::Arc;

use polynet_frame::{FrameConfig, FrameError, FrameReader, FrameWriter};
use polynet_registry::{MessageRegistry, RegistryError};
use tokio::io::{AsyncRead, AsyncWrite};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, trace, warn};

use crate::config::LivenessRole;
use crate::control::LivenessChallenge;
use crate::error::Result;
use crate::handler::{CloseReason, ConnectionId, Disposition, MessageHandler, ResponseBuffer};
use crate::liveness::{run_monitor, LivenessTracker};
use crate::outbound::{OutboundMessage, OutboundReceiver, OutboundSender, OutboundTable};

/// Everything one connection loop needs besides its stream.
pub(crate) struct Connection<H> {
    pub id: ConnectionId,
    pub peer: SocketAddr,
    pub registry: Arc<MessageRegistry>,
    pub handler: Arc<H>,
    pub frame: FrameConfig,
    pub liveness: LivenessRole,
    pub outbound_tx: OutboundSender,
    pub outbound_rx: OutboundReceiver,
    /// Server connections deregister from the shared table on exit.
    pub table: Option<Arc<OutboundTable>>,
    pub cancel: CancellationToken,
}

/// Fail early when the registry cannot carry the configured liveness role.
pub(crate) fn check_liveness_registered(
    registry: &MessageRegistry,
    liveness: &LivenessRole,
) -> Result<()> {
    if matches!(liveness, LivenessRole::Challenger(_)) {
        registry.id_for::<LivenessChallenge>()?;
    }
    Ok(())
}

/// Frame one queued message into the writer's buffer.
///
/// Unregistered messages are dropped with a warning rather than failing the
/// connection they were pushed to.
fn stage<W: AsyncWrite + Unpin>(
    conn: ConnectionId,
    registry: &MessageRegistry,
    writer: &mut FrameWriter<W>,
    message: &OutboundMessage,
) {
    if let Err(err) = registry.write_frame(&**message, writer.buffer_mut()) {
        warn!(%conn, error = %err, "dropping outbound message");
    }
}

/// Releases the connection's shared resources when the loop ends, including
/// by unwinding out of a panicking handler.
struct ExitGuard {
    id: ConnectionId,
    table: Option<Arc<OutboundTable>>,
    cancel: CancellationToken,
}

impl Drop for ExitGuard {
    fn drop(&mut self) {
        if let Some(table) = &self.table {
            table.close(self.id);
        }
        self.cancel.cancel();
    }
}

fn frame_close_reason(err: FrameError) -> CloseReason {
    match err {
        FrameError::ConnectionClosed => CloseReason::PeerClosed,
        FrameError::Io(io) => CloseReason::Transport(io.to_string()),
        timeout @ FrameError::WriteTimeout(_) => CloseReason::Transport(timeout.to_string()),
        other => CloseReason::Protocol(other.to_string()),
    }
}

/// Drive one connection until it closes and return why it closed.
///
/// The handler sees `on_connection_opened` first and `on_connection_closed`
/// exactly once at the end, whatever ended the loop.
pub(crate) async fn run_connection<S, H>(stream: S, conn: Connection<H>) -> CloseReason
where
    S: AsyncRead + AsyncWrite + Send + 'static,
    H: MessageHandler,
{
    let Connection {
        id,
        peer,
        registry,
        handler,
        frame,
        liveness,
        outbound_tx,
        mut outbound_rx,
        table,
        cancel,
    } = conn;

    let exit = ExitGuard {
        id,
        table,
        cancel: cancel.clone(),
    };

    let (read_half, write_half) = tokio::io::split(stream);
    let mut reader = FrameReader::with_config(read_half, frame.clone());
    let mut writer = FrameWriter::with_config(write_half, frame);

    let tracker = Arc::new(LivenessTracker::default());
    let monitor = match liveness {
        LivenessRole::Challenger(config) => Some(tokio::spawn(run_monitor(
            id,
            config,
            Arc::clone(&tracker),
            outbound_tx.clone(),
            cancel.clone(),
        ))),
        LivenessRole::Responder | LivenessRole::Disabled => None,
    };
    drop(outbound_tx);

    handler.on_connection_opened(id, peer).await;
    debug!(conn = %id, %peer, "connection loop started");

    let reason = loop {
        while let Ok(message) = outbound_rx.try_recv() {
            stage(id, &registry, &mut writer, &message);
        }
        if let Err(err) = writer.send_and_clear().await {
            break frame_close_reason(err);
        }

        let read = tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                break if tracker.is_expired() {
                    CloseReason::LivenessTimeout
                } else {
                    CloseReason::Shutdown
                };
            }
            Some(message) = outbound_rx.recv() => {
                stage(id, &registry, &mut writer, &message);
                continue;
            }
            read = reader.read_frame() => read,
        };

        let frame = match read {
            Ok(frame) => frame,
            Err(err) => break frame_close_reason(err),
        };

        let message = match registry.decode(frame.id, &frame.payload) {
            Ok(message) => message,
            Err(RegistryError::UnknownMessageId(message_id)) => {
                warn!(
                    conn = %id,
                    id = message_id,
                    size = frame.payload.len(),
                    "discarding frame with unknown message id"
                );
                continue;
            }
            Err(err) => break CloseReason::Protocol(err.to_string()),
        };
        trace!(conn = %id, id = frame.id, size = frame.payload.len(), "frame received");

        if let Some(challenge) = message.downcast_ref::<LivenessChallenge>() {
            match liveness {
                LivenessRole::Challenger(_) => {
                    if !tracker.acknowledge(challenge.nonce) {
                        debug!(conn = %id, nonce = challenge.nonce, "ignoring stale liveness reply");
                    }
                    continue;
                }
                LivenessRole::Responder => {
                    if let Err(err) = registry.write_frame(challenge, writer.buffer_mut()) {
                        warn!(conn = %id, error = %err, "cannot echo liveness challenge");
                    }
                    continue;
                }
                LivenessRole::Disabled => {}
            }
        }

        let mut responses = ResponseBuffer::new(&registry, writer.buffer_mut());
        let disposition = handler.on_message(id, message, &mut responses).await;

        if disposition == Disposition::Close {
            if let Err(err) = writer.send_and_clear().await {
                debug!(conn = %id, error = %err, "final flush failed");
            }
            break CloseReason::HandlerRequested;
        }
    };

    drop(exit);
    outbound_rx.close();
    if let Some(monitor) = monitor {
        let _ = monitor.await;
    }
    let _ = writer.shutdown().await;

    if reason.is_graceful() {
        info!(conn = %id, %peer, %reason, "connection closed");
    } else {
        warn!(conn = %id, %peer, %reason, "connection closed");
    }
    handler.on_connection_closed(id, &reason).await;
    reason
}

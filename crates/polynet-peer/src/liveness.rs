//! Challenge/response heartbeat.
//!
//! The monitor task runs next to a connection loop. Every interval it queues
//! a [`LivenessChallenge`] with a fresh nonce and arms a timer; the loop
//! reports the echoed nonce back through [`LivenessTracker::acknowledge`].
//! If the timer wins, the monitor marks the tracker expired and cancels the
//! connection.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;
use tokio::sync::oneshot;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace, warn};

use crate::config::LivenessConfig;
use crate::control::LivenessChallenge;
use crate::handler::ConnectionId;
use crate::outbound::OutboundSender;

struct PendingChallenge {
    nonce: u32,
    ack: oneshot::Sender<()>,
}

/// At most one outstanding challenge per connection.
#[derive(Default)]
pub(crate) struct LivenessTracker {
    pending: Mutex<Option<PendingChallenge>>,
    expired: AtomicBool,
}

impl LivenessTracker {
    /// Record a new outstanding challenge, replacing any previous one.
    fn arm(&self, nonce: u32) -> oneshot::Receiver<()> {
        let (ack, acked) = oneshot::channel();
        *self.pending.lock() = Some(PendingChallenge { nonce, ack });
        acked
    }

    /// Clear the outstanding challenge if `nonce` matches it.
    pub(crate) fn acknowledge(&self, nonce: u32) -> bool {
        let mut pending = self.pending.lock();
        match pending.take() {
            Some(challenge) if challenge.nonce == nonce => {
                let _ = challenge.ack.send(());
                true
            }
            other => {
                *pending = other;
                false
            }
        }
    }

    fn disarm(&self) {
        self.pending.lock().take();
    }

    /// Whether a challenge timed out.
    pub(crate) fn is_expired(&self) -> bool {
        self.expired.load(Ordering::Acquire)
    }

    fn expire(&self) {
        self.expired.store(true, Ordering::Release);
    }
}

/// Run the challenger side until `cancel` fires or a challenge times out.
pub(crate) async fn run_monitor(
    conn: ConnectionId,
    config: LivenessConfig,
    tracker: Arc<LivenessTracker>,
    outbound: OutboundSender,
    cancel: CancellationToken,
) {
    let mut ticker = tokio::time::interval(config.interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    ticker.tick().await;

    loop {
        tokio::select! {
            biased;
            _ = cancel.cancelled() => break,
            _ = ticker.tick() => {}
        }

        let challenge = LivenessChallenge::random();
        let acked = tracker.arm(challenge.nonce);
        if outbound.send(Arc::new(challenge)).is_err() {
            break;
        }
        trace!(%conn, nonce = challenge.nonce, "liveness challenge queued");

        tokio::select! {
            biased;
            _ = cancel.cancelled() => break,
            answered = tokio::time::timeout(config.timeout, acked) => match answered {
                Ok(Ok(())) => {
                    trace!(%conn, nonce = challenge.nonce, "liveness challenge answered");
                }
                Ok(Err(_)) => break,
                Err(_) => {
                    warn!(
                        %conn,
                        nonce = challenge.nonce,
                        timeout = ?config.timeout,
                        "liveness challenge unanswered, closing connection"
                    );
                    tracker.expire();
                    cancel.cancel();
                    break;
                }
            },
        }
    }

    tracker.disarm();
    debug!(%conn, "liveness monitor stopped");
}

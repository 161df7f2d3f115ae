use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use polynet_registry::MessageRegistry;
use polynet_transport::{TcpTransport, TransportError};
use tokio::task::JoinSet;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::config::PeerConfig;
use crate::error::Result;
use crate::handler::{CloseReason, ConnectionId, MessageHandler};
use crate::outbound::OutboundTable;
use crate::session::{check_liveness_registered, run_connection, Connection};

/// Pause before accepting again when the process ran out of descriptors.
const ACCEPT_BACKOFF: Duration = Duration::from_millis(100);

/// Accepts peers and runs one connection loop for each.
pub struct PeerListener<H> {
    transport: TcpTransport,
    registry: Arc<MessageRegistry>,
    handler: Arc<H>,
    config: PeerConfig,
    outbound: Arc<OutboundTable>,
    next_id: u32,
}

impl<H: MessageHandler> PeerListener<H> {
    /// Bind a listening socket.
    ///
    /// Fails if the config is invalid or the registry cannot carry the
    /// configured liveness role.
    pub async fn bind(
        addr: SocketAddr,
        registry: Arc<MessageRegistry>,
        handler: Arc<H>,
        config: PeerConfig,
    ) -> Result<Self> {
        config.validate()?;
        check_liveness_registered(&registry, &config.liveness)?;

        let transport = TcpTransport::bind(addr).await?;
        Ok(Self {
            transport,
            registry,
            handler,
            config,
            outbound: Arc::new(OutboundTable::new()),
            next_id: 1,
        })
    }

    /// Actual bound address (resolves port 0).
    pub fn local_addr(&self) -> SocketAddr {
        self.transport.local_addr()
    }

    /// Use `outbound` for the push queues instead of a private table.
    ///
    /// Lets a handler built before the listener push to its connections.
    pub fn with_outbound(mut self, outbound: Arc<OutboundTable>) -> Self {
        self.outbound = outbound;
        self
    }

    /// Push queues of the connections this listener runs.
    pub fn outbound(&self) -> Arc<OutboundTable> {
        Arc::clone(&self.outbound)
    }

    /// Next free id: sequential, never 0, never one still in use.
    fn allocate_id(&mut self) -> ConnectionId {
        loop {
            let candidate = ConnectionId(self.next_id);
            self.next_id = self.next_id.wrapping_add(1).max(1);
            if !self.outbound.contains(candidate) {
                return candidate;
            }
        }
    }

    /// Accept connections until `shutdown` fires.
    ///
    /// On the way out every connection is cancelled and awaited before the
    /// socket is released. A non-transient accept error ends the loop the
    /// same way and is returned.
    pub async fn serve(mut self, shutdown: CancellationToken) -> Result<()> {
        let connections = shutdown.child_token();
        let mut tasks: JoinSet<CloseReason> = JoinSet::new();

        let mut housekeeping = tokio::time::interval(self.config.housekeeping_interval);
        housekeeping.set_missed_tick_behavior(MissedTickBehavior::Delay);
        housekeeping.tick().await;

        info!(addr = %self.local_addr(), "listening");

        let result = loop {
            tokio::select! {
                biased;
                _ = shutdown.cancelled() => break Ok(()),
                _ = housekeeping.tick() => {
                    let reaped = reap_finished(&mut tasks);
                    if reaped > 0 {
                        debug!(reaped, live = tasks.len(), "reaped finished connections");
                    }
                }
                accepted = self.transport.accept() => match accepted {
                    Ok((stream, peer)) => {
                        let id = self.allocate_id();
                        let (outbound_tx, outbound_rx) = self.outbound.open(id);
                        info!(conn = %id, %peer, "connection accepted");

                        let conn = Connection {
                            id,
                            peer,
                            registry: Arc::clone(&self.registry),
                            handler: Arc::clone(&self.handler),
                            frame: self.config.frame.clone(),
                            liveness: self.config.liveness,
                            outbound_tx,
                            outbound_rx,
                            table: Some(Arc::clone(&self.outbound)),
                            cancel: connections.child_token(),
                        };
                        tasks.spawn(run_connection(stream, conn));
                    }
                    Err(err) => match accept_retry_delay(&err) {
                        Some(delay) => {
                            warn!(error = %err, ?delay, "transient accept failure");
                            if !delay.is_zero() {
                                tokio::select! {
                                    _ = shutdown.cancelled() => break Ok(()),
                                    _ = tokio::time::sleep(delay) => {}
                                }
                            }
                        }
                        None => {
                            error!(error = %err, "accept failed");
                            break Err(err.into());
                        }
                    },
                },
            }
        };

        info!(live = tasks.len(), "listener shutting down");
        connections.cancel();
        while let Some(joined) = tasks.join_next().await {
            if let Err(err) = joined {
                error!(error = %err, "connection task failed");
            }
        }
        drop(self.transport);
        info!("listener stopped");

        result
    }
}

/// Wait before the next accept after `err`, or `None` if the socket is broken.
fn accept_retry_delay(err: &TransportError) -> Option<Duration> {
    if err.is_resource_exhausted() {
        Some(ACCEPT_BACKOFF)
    } else if err.is_transient_accept() {
        Some(Duration::ZERO)
    } else {
        None
    }
}

fn reap_finished(tasks: &mut JoinSet<CloseReason>) -> usize {
    let mut reaped = 0;
    while let Some(joined) = tasks.try_join_next() {
        if let Err(err) = joined {
            error!(error = %err, "connection task failed");
        }
        reaped += 1;
    }
    reaped
}

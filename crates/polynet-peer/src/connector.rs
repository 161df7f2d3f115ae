use std::net::SocketAddr;
use std::sync::Arc;

use polynet_registry::{Message, MessageRegistry};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::info;

use crate::config::PeerConfig;
use crate::error::{PeerError, Result};
use crate::handler::{CloseReason, ConnectionId, MessageHandler};
use crate::outbound::OutboundSender;
use crate::session::{check_liveness_registered, run_connection, Connection};

/// Connect to a server and run one connection loop over the stream.
///
/// Inbound messages go to `handler`; outbound ones are sent with
/// [`ClientSession::send`]. Use [`PeerConfig::client`] to answer the server's
/// liveness challenges.
pub async fn connect<H: MessageHandler>(
    addr: SocketAddr,
    registry: Arc<MessageRegistry>,
    handler: Arc<H>,
    config: PeerConfig,
) -> Result<ClientSession> {
    config.validate()?;
    check_liveness_registered(&registry, &config.liveness)?;

    let stream = polynet_transport::connect(addr).await?;
    let local_addr = stream.local_addr().ok();
    info!(%addr, "connected");

    let (outbound_tx, outbound_rx) = mpsc::unbounded_channel();
    let cancel = CancellationToken::new();
    let conn = Connection {
        id: ConnectionId::CLIENT,
        peer: addr,
        registry: Arc::clone(&registry),
        handler,
        frame: config.frame.clone(),
        liveness: config.liveness,
        outbound_tx: outbound_tx.clone(),
        outbound_rx,
        table: None,
        cancel: cancel.clone(),
    };
    let task = tokio::spawn(run_connection(stream, conn));

    Ok(ClientSession {
        peer_addr: addr,
        local_addr,
        registry,
        outbound: outbound_tx,
        cancel,
        task: Some(task),
        reason: None,
    })
}

/// Handle to the single connection of a client.
///
/// Dropping the session closes the connection.
pub struct ClientSession {
    peer_addr: SocketAddr,
    local_addr: Option<SocketAddr>,
    registry: Arc<MessageRegistry>,
    outbound: OutboundSender,
    cancel: CancellationToken,
    task: Option<JoinHandle<CloseReason>>,
    reason: Option<CloseReason>,
}

impl ClientSession {
    /// Queue `message` for the server.
    ///
    /// Fails if the message type is not registered or the connection is gone.
    pub fn send<M: Message>(&self, message: M) -> Result<()> {
        self.registry.id_of(&message)?;
        self.outbound
            .send(Arc::new(message))
            .map_err(|_| PeerError::Disconnected)
    }

    /// Ask the connection to close. Pair with [`closed`](Self::closed).
    pub fn close(&self) {
        self.cancel.cancel();
    }

    /// Wait for the connection to end and return why it did.
    pub async fn closed(&mut self) -> CloseReason {
        if let Some(task) = self.task.take() {
            let reason = task
                .await
                .unwrap_or_else(|err| CloseReason::Transport(format!("connection task failed: {err}")));
            self.reason = Some(reason);
        }
        self.reason.clone().unwrap_or(CloseReason::Shutdown)
    }

    pub fn is_closed(&self) -> bool {
        self.reason.is_some() || self.task.as_ref().is_some_and(|task| task.is_finished())
    }

    /// Token that closes the connection when cancelled.
    pub fn cancel_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    pub fn id(&self) -> ConnectionId {
        ConnectionId::CLIENT
    }

    pub fn peer_addr(&self) -> SocketAddr {
        self.peer_addr
    }

    pub fn local_addr(&self) -> Option<SocketAddr> {
        self.local_addr
    }
}

impl Drop for ClientSession {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use tokio::sync::mpsc::UnboundedReceiver;

    use super::*;
    use crate::config::{LivenessConfig, LivenessRole};
    use crate::listener::PeerListener;
    use crate::testing::{registry, Event, RecordingHandler, TypeA, TypeB};

    #[derive(Debug)]
    struct NotRegistered;

    impl polynet_frame::WireEncode for NotRegistered {
        fn encode(&self, _dst: &mut bytes::BytesMut) {}
    }

    impl Message for NotRegistered {}

    async fn start_server(
        config: PeerConfig,
    ) -> (SocketAddr, UnboundedReceiver<Event>, CancellationToken) {
        let (handler, events) = RecordingHandler::new();
        let listener = PeerListener::bind(
            "127.0.0.1:0".parse().unwrap(),
            Arc::new(registry()),
            Arc::new(handler),
            config,
        )
        .await
        .unwrap();
        let addr = listener.local_addr();
        let shutdown = CancellationToken::new();
        tokio::spawn(listener.serve(shutdown.clone()));
        (addr, events, shutdown)
    }

    async fn next_client_message(events: &mut UnboundedReceiver<Event>) -> Box<dyn Message> {
        loop {
            match events.recv().await.unwrap() {
                Event::Message(id, message) => {
                    assert_eq!(id, ConnectionId::CLIENT);
                    return message;
                }
                Event::Closed(_, reason) => panic!("client closed: {reason}"),
                Event::Opened(_) => {}
            }
        }
    }

    #[tokio::test]
    async fn request_and_response() {
        let (addr, _server_events, shutdown) =
            start_server(PeerConfig::server().with_liveness(LivenessRole::Disabled)).await;
        let (handler, mut events) = RecordingHandler::new();

        let mut session = connect(addr, Arc::new(registry()), Arc::new(handler), PeerConfig::client())
            .await
            .unwrap();
        session
            .send(TypeB {
                name: "ping".to_string(),
            })
            .unwrap();

        let reply = next_client_message(&mut events).await;
        assert_eq!(
            reply.downcast_ref::<TypeB>(),
            Some(&TypeB {
                name: "ping".to_string()
            })
        );

        session.close();
        assert_eq!(session.closed().await, CloseReason::Shutdown);
        assert!(session.is_closed());
        assert!(matches!(
            session.send(TypeA { count: 1 }),
            Err(PeerError::Disconnected)
        ));
        shutdown.cancel();
    }

    #[tokio::test]
    async fn unregistered_message_is_rejected_locally() {
        let (addr, _server_events, shutdown) =
            start_server(PeerConfig::server().with_liveness(LivenessRole::Disabled)).await;
        let (handler, _events) = RecordingHandler::new();

        let session = connect(addr, Arc::new(registry()), Arc::new(handler), PeerConfig::client())
            .await
            .unwrap();
        assert!(matches!(
            session.send(NotRegistered),
            Err(PeerError::Registry(_))
        ));
        shutdown.cancel();
    }

    #[tokio::test]
    async fn responder_survives_many_challenge_cycles() {
        let config = PeerConfig::server().with_liveness(LivenessRole::Challenger(LivenessConfig {
            interval: Duration::from_millis(50),
            timeout: Duration::from_millis(25),
        }));
        let (addr, mut server_events, shutdown) = start_server(config).await;
        let (handler, mut events) = RecordingHandler::new();

        let session = connect(addr, Arc::new(registry()), Arc::new(handler), PeerConfig::client())
            .await
            .unwrap();

        tokio::time::sleep(Duration::from_millis(400)).await;
        assert!(!session.is_closed());
        while let Ok(event) = server_events.try_recv() {
            assert!(!matches!(event, Event::Closed(..)), "server dropped the client");
        }

        session.send(TypeB { name: "still here".to_string() }).unwrap();
        let reply = next_client_message(&mut events).await;
        assert!(reply.is::<TypeB>());
        shutdown.cancel();
    }

    #[tokio::test]
    async fn server_shutdown_is_seen_as_peer_close() {
        let (addr, mut server_events, shutdown) =
            start_server(PeerConfig::server().with_liveness(LivenessRole::Disabled)).await;
        let (handler, mut events) = RecordingHandler::new();

        let mut session = connect(addr, Arc::new(registry()), Arc::new(handler), PeerConfig::client())
            .await
            .unwrap();
        // A stream still in the backlog is reset when the listener goes away.
        while !matches!(server_events.recv().await, Some(Event::Opened(_))) {}
        shutdown.cancel();

        let reason = tokio::time::timeout(Duration::from_secs(2), session.closed())
            .await
            .unwrap();
        assert_eq!(reason, CloseReason::PeerClosed);
        assert!(matches!(events.recv().await, Some(Event::Opened(ConnectionId::CLIENT))));
        assert!(matches!(events.recv().await, Some(Event::Closed(_, CloseReason::PeerClosed))));
    }

    #[tokio::test]
    async fn connect_refused() {
        let (handler, _events) = RecordingHandler::new();
        let vacant = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = vacant.local_addr().unwrap();
        drop(vacant);

        let result = connect(addr, Arc::new(registry()), Arc::new(handler), PeerConfig::client()).await;
        assert!(matches!(result, Err(PeerError::Transport(_))));
    }
}

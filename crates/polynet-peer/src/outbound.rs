use std::sync::Arc;

use dashmap::DashMap;
use polynet_registry::Message;
use tokio::sync::mpsc;
use tracing::trace;

use crate::handler::ConnectionId;

/// A queued push. Shared so one broadcast is built once for every target.
pub type OutboundMessage = Arc<dyn Message>;

pub(crate) type OutboundSender = mpsc::UnboundedSender<OutboundMessage>;
pub(crate) type OutboundReceiver = mpsc::UnboundedReceiver<OutboundMessage>;

/// Push queues for every live connection.
///
/// Any task may enqueue; only the owning connection loop drains its queue,
/// and it does so before each read and whenever it is idle. Enqueueing never
/// blocks. Messages for a connection that has closed are dropped.
#[derive(Default)]
pub struct OutboundTable {
    channels: DashMap<ConnectionId, OutboundSender>,
}

impl OutboundTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create the queue for `id`, replacing any previous one.
    pub(crate) fn open(&self, id: ConnectionId) -> (OutboundSender, OutboundReceiver) {
        let (tx, rx) = mpsc::unbounded_channel();
        self.channels.insert(id, tx.clone());
        (tx, rx)
    }

    /// Forget the queue for `id`.
    pub(crate) fn close(&self, id: ConnectionId) {
        self.channels.remove(&id);
    }

    /// Queue `message` for one connection. Returns `false` if it is not live.
    pub fn enqueue<M: Message>(&self, id: ConnectionId, message: M) -> bool {
        self.enqueue_shared(id, Arc::new(message))
    }

    pub fn enqueue_shared(&self, id: ConnectionId, message: OutboundMessage) -> bool {
        let Some(tx) = self.channels.get(&id) else {
            trace!(conn = %id, "dropping push for unknown connection");
            return false;
        };
        tx.send(message).is_ok()
    }

    /// Queue `message` for every live connection. Returns how many accepted it.
    pub fn broadcast<M: Message>(&self, message: M) -> usize {
        let message: OutboundMessage = Arc::new(message);
        self.channels
            .iter()
            .filter(|entry| entry.value().send(Arc::clone(&message)).is_ok())
            .count()
    }

    /// Queue `message` for each of `ids`. Returns how many accepted it.
    pub fn send_to_many<M, I>(&self, ids: I, message: M) -> usize
    where
        M: Message,
        I: IntoIterator<Item = ConnectionId>,
    {
        let message: OutboundMessage = Arc::new(message);
        ids.into_iter()
            .filter(|id| self.enqueue_shared(*id, Arc::clone(&message)))
            .count()
    }

    pub fn contains(&self, id: ConnectionId) -> bool {
        self.channels.contains_key(&id)
    }

    /// Identifiers of the live connections, in no particular order.
    pub fn ids(&self) -> Vec<ConnectionId> {
        self.channels.iter().map(|entry| *entry.key()).collect()
    }

    pub fn len(&self) -> usize {
        self.channels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.channels.is_empty()
    }
}

impl std::fmt::Debug for OutboundTable {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OutboundTable")
            .field("connections", &self.channels.len())
            .finish()
    }
}

//! Shared fixtures for the unit tests in this crate.

use bytes::BytesMut;
use polynet_frame::{WireCursor, WireDecode, WireEncode};
use polynet_registry::{Message, MessageRegistry};
use tokio::sync::mpsc;

use crate::control::LivenessChallenge;
use crate::handler::{CloseReason, ConnectionId, Disposition, MessageHandler, ResponseBuffer};

/// A `TypeA` with this count makes [`RecordingHandler`] say goodbye and close.
pub(crate) const CLOSE_COUNT: u32 = 999;

#[derive(Debug, Clone, PartialEq)]
pub(crate) struct TypeA {
    pub count: u32,
}

impl WireEncode for TypeA {
    fn encode(&self, dst: &mut BytesMut) {
        self.count.encode(dst);
    }
}

impl WireDecode for TypeA {
    const MIN_WIRE_SIZE: usize = 4;

    fn decode(src: &mut WireCursor<'_>) -> polynet_frame::Result<Self> {
        Ok(Self { count: src.read()? })
    }
}

impl Message for TypeA {}

#[derive(Debug, Clone, PartialEq)]
pub(crate) struct TypeB {
    pub name: String,
}

impl WireEncode for TypeB {
    fn encode(&self, dst: &mut BytesMut) {
        self.name.encode(dst);
    }
}

impl WireDecode for TypeB {
    const MIN_WIRE_SIZE: usize = 4;

    fn decode(src: &mut WireCursor<'_>) -> polynet_frame::Result<Self> {
        Ok(Self { name: src.read()? })
    }
}

impl Message for TypeB {}

/// TypeA = 0, TypeB = 1, LivenessChallenge = 2.
pub(crate) fn registry() -> MessageRegistry {
    let mut builder = MessageRegistry::builder();
    builder.register::<TypeA>(0).unwrap();
    builder.register::<TypeB>(1).unwrap();
    builder.register::<LivenessChallenge>(2).unwrap();
    builder.build()
}

#[derive(Debug)]
pub(crate) enum Event {
    Opened(ConnectionId),
    Message(ConnectionId, Box<dyn Message>),
    Closed(ConnectionId, CloseReason),
}

/// Reports every callback and echoes `TypeB` messages back.
pub(crate) struct RecordingHandler {
    events: mpsc::UnboundedSender<Event>,
}

impl RecordingHandler {
    pub(crate) fn new() -> (Self, mpsc::UnboundedReceiver<Event>) {
        let (events, rx) = mpsc::unbounded_channel();
        (Self { events }, rx)
    }
}

impl MessageHandler for RecordingHandler {
    async fn on_connection_opened(&self, id: ConnectionId, _peer: std::net::SocketAddr) {
        let _ = self.events.send(Event::Opened(id));
    }

    async fn on_message(
        &self,
        id: ConnectionId,
        message: Box<dyn Message>,
        responses: &mut ResponseBuffer<'_>,
    ) -> Disposition {
        let mut disposition = Disposition::Continue;
        if let Some(b) = message.downcast_ref::<TypeB>() {
            responses.push(b).unwrap();
        }
        if message.downcast_ref::<TypeA>().map(|a| a.count) == Some(CLOSE_COUNT) {
            responses
                .push(&TypeB {
                    name: "bye".to_string(),
                })
                .unwrap();
            disposition = Disposition::Close;
        }
        let _ = self.events.send(Event::Message(id, message));
        disposition
    }

    async fn on_connection_closed(&self, id: ConnectionId, reason: &CloseReason) {
        let _ = self.events.send(Event::Closed(id, reason.clone()));
    }
}

use bytes::BytesMut;
use polynet_frame::{WireCursor, WireDecode, WireEncode};
use polynet_registry::Message;

/// Heartbeat challenge. The responder echoes it back unchanged.
///
/// Must be registered in the message registry on both ends; the reference
/// table uses id 0.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LivenessChallenge {
    pub nonce: u32,
}

impl LivenessChallenge {
    pub fn new(nonce: u32) -> Self {
        Self { nonce }
    }

    /// A challenge with a fresh random nonce.
    pub fn random() -> Self {
        Self::new(rand::random())
    }
}

impl WireEncode for LivenessChallenge {
    fn encode(&self, dst: &mut BytesMut) {
        self.nonce.encode(dst);
    }
}

impl WireDecode for LivenessChallenge {
    const MIN_WIRE_SIZE: usize = 4;

    fn decode(src: &mut WireCursor<'_>) -> polynet_frame::Result<Self> {
        Ok(Self { nonce: src.read()? })
    }
}

impl Message for LivenessChallenge {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn nonce_is_the_whole_payload() {
        let mut buf = BytesMut::new();
        LivenessChallenge::new(0xDEAD_BEEF).encode(&mut buf);
        assert_eq!(buf.as_ref(), &[0xDE, 0xAD, 0xBE, 0xEF]);

        let decoded: LivenessChallenge = WireCursor::new(&buf).read().unwrap();
        assert_eq!(decoded.nonce, 0xDEAD_BEEF);
    }
}

use polynet_frame::FrameError;

/// Errors that can occur while building or using a message registry.
#[derive(Debug, thiserror::Error)]
pub enum RegistryError {
    /// The identifier is already taken by another type.
    #[error("message id {id} already registered for {existing}, cannot register {attempted}")]
    DuplicateId {
        id: u32,
        existing: &'static str,
        attempted: &'static str,
    },

    /// The type is already registered under another identifier.
    #[error("message type {name} already registered with id {id}")]
    DuplicateType { name: &'static str, id: u32 },

    /// No type is registered for the identifier.
    #[error("no message type registered for id {0}")]
    UnknownMessageId(u32),

    /// The type was never registered.
    #[error("message type {0} is not registered")]
    UnknownMessageType(&'static str),

    /// A registered message failed to decode from its payload.
    #[error("failed to decode {name} (id {id}): {source}")]
    Decode {
        id: u32,
        name: &'static str,
        #[source]
        source: FrameError,
    },

    /// Framing an outbound message failed.
    #[error(transparent)]
    Frame(#[from] FrameError),
}

impl RegistryError {
    /// Whether the error only concerns one unrecognised frame and the
    /// connection can keep going.
    pub fn is_unknown_id(&self) -> bool {
        matches!(self, Self::UnknownMessageId(_))
    }
}

pub type Result<T> = std::result::Result<T, RegistryError>;

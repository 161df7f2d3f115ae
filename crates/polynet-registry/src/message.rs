use std::any::Any;
use std::fmt;

use polynet_frame::WireEncode;

/// Type-erasure helpers every [`Message`] gets for free.
pub trait AsAny: Any + Send + Sync {
    fn as_any(&self) -> &dyn Any;
    fn into_any(self: Box<Self>) -> Box<dyn Any + Send + Sync>;
    /// Rust type name of the concrete message.
    fn type_name(&self) -> &'static str;
}

impl<T: Any + Send + Sync> AsAny for T {
    fn as_any(&self) -> &dyn Any {
        self
    }

    fn into_any(self: Box<Self>) -> Box<dyn Any + Send + Sync> {
        self
    }

    fn type_name(&self) -> &'static str {
        std::any::type_name::<T>()
    }
}

/// A value that can travel in a frame.
///
/// Implementors supply the field encoding through [`WireEncode`]; decoding
/// is registered separately with the concrete type, so this trait stays
/// object-safe and decoded messages can be handed around as
/// `Box<dyn Message>`.
///
/// ```
/// use bytes::BytesMut;
/// use polynet_frame::WireEncode;
/// use polynet_registry::Message;
///
/// #[derive(Debug)]
/// struct Ping {
///     seq: u32,
/// }
///
/// impl WireEncode for Ping {
///     fn encode(&self, dst: &mut BytesMut) {
///         self.seq.encode(dst);
///     }
/// }
///
/// impl Message for Ping {}
///
/// let boxed: Box<dyn Message> = Box::new(Ping { seq: 3 });
/// assert_eq!(boxed.downcast_ref::<Ping>().map(|p| p.seq), Some(3));
/// ```
pub trait Message: WireEncode + AsAny + fmt::Debug {}

impl dyn Message {
    /// Whether the message is a `T`.
    pub fn is<T: Message>(&self) -> bool {
        self.as_any().is::<T>()
    }

    pub fn downcast_ref<T: Message>(&self) -> Option<&T> {
        self.as_any().downcast_ref::<T>()
    }

    /// Take ownership of the concrete message, or get the box back unchanged.
    pub fn downcast<T: Message>(self: Box<Self>) -> Result<Box<T>, Box<dyn Message>> {
        if !self.is::<T>() {
            return Err(self);
        }
        self.into_any()
            .downcast::<T>()
            .map_err(|_| unreachable!("type checked above"))
    }
}

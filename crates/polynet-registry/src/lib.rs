//! Message types and the id <-> type registry.
//!
//! Every message kind is registered once at startup under a caller-chosen
//! 32-bit identifier. The frozen [`MessageRegistry`] is then shared by every
//! connection and answers both directions without locking:
//!
//! - outbound: message value -> identifier, for [`MessageRegistry::write_frame`]
//! - inbound: identifier -> decode constructor, for [`MessageRegistry::decode`]
//!
//! Both ends of a connection must register the same table.

pub mod error;
pub mod message;
pub mod registry;

pub use error::{RegistryError, Result};
pub use message::{AsAny, Message};
pub use registry::{MessageDescriptor, MessageRegistry, MessageRegistryBuilder};

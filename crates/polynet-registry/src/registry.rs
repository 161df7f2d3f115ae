use std::any::TypeId;
use std::collections::HashMap;

use bytes::{BufMut, BytesMut};
use polynet_frame::{FrameError, WireCursor, WireDecode, ID_SIZE, LENGTH_SIZE};
use tracing::trace;

use crate::error::{RegistryError, Result};
use crate::message::Message;

type DecodeFn = fn(&mut WireCursor<'_>) -> polynet_frame::Result<Box<dyn Message>>;

fn decode_boxed<T: Message + WireDecode>(
    src: &mut WireCursor<'_>,
) -> polynet_frame::Result<Box<dyn Message>> {
    Ok(Box::new(T::decode(src)?))
}

/// Public view of one registered message kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MessageDescriptor {
    pub id: u32,
    pub name: &'static str,
}

#[derive(Clone, Copy)]
struct Entry {
    name: &'static str,
    decode: DecodeFn,
}

/// Collects registrations before the registry is frozen.
#[derive(Default)]
pub struct MessageRegistryBuilder {
    by_id: HashMap<u32, Entry>,
    by_type: HashMap<TypeId, u32>,
}

impl MessageRegistryBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `T` under `id`.
    ///
    /// Each identifier and each type can be registered once.
    pub fn register<T: Message + WireDecode>(&mut self, id: u32) -> Result<&mut Self> {
        let name = std::any::type_name::<T>();

        if let Some(existing) = self.by_id.get(&id) {
            return Err(RegistryError::DuplicateId {
                id,
                existing: existing.name,
                attempted: name,
            });
        }
        if let Some(&existing_id) = self.by_type.get(&TypeId::of::<T>()) {
            return Err(RegistryError::DuplicateType {
                name,
                id: existing_id,
            });
        }

        self.by_id.insert(
            id,
            Entry {
                name,
                decode: decode_boxed::<T>,
            },
        );
        self.by_type.insert(TypeId::of::<T>(), id);
        Ok(self)
    }

    /// Freeze the registrations.
    pub fn build(self) -> MessageRegistry {
        MessageRegistry {
            by_id: self.by_id,
            by_type: self.by_type,
        }
    }
}

/// Immutable id <-> type table shared by every connection.
pub struct MessageRegistry {
    by_id: HashMap<u32, Entry>,
    by_type: HashMap<TypeId, u32>,
}

impl MessageRegistry {
    pub fn builder() -> MessageRegistryBuilder {
        MessageRegistryBuilder::new()
    }

    /// Identifier registered for `T`.
    pub fn id_for<T: Message>(&self) -> Result<u32> {
        self.by_type
            .get(&TypeId::of::<T>())
            .copied()
            .ok_or(RegistryError::UnknownMessageType(std::any::type_name::<T>()))
    }

    /// Identifier registered for the concrete type behind `message`.
    pub fn id_of(&self, message: &dyn Message) -> Result<u32> {
        self.by_type
            .get(&message.as_any().type_id())
            .copied()
            .ok_or(RegistryError::UnknownMessageType(message.type_name()))
    }

    pub fn descriptor(&self, id: u32) -> Option<MessageDescriptor> {
        self.by_id
            .get(&id)
            .map(|entry| MessageDescriptor { id, name: entry.name })
    }

    pub fn contains_id(&self, id: u32) -> bool {
        self.by_id.contains_key(&id)
    }

    /// All registrations, ordered by identifier.
    pub fn descriptors(&self) -> Vec<MessageDescriptor> {
        let mut all: Vec<MessageDescriptor> = self
            .by_id
            .iter()
            .map(|(&id, entry)| MessageDescriptor { id, name: entry.name })
            .collect();
        all.sort_by_key(|d| d.id);
        all
    }

    pub fn len(&self) -> usize {
        self.by_id.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_id.is_empty()
    }

    /// Construct the message registered under `id` from a frame payload.
    ///
    /// Bytes left over after the message's fields are ignored.
    pub fn decode(&self, id: u32, payload: &[u8]) -> Result<Box<dyn Message>> {
        let entry = self
            .by_id
            .get(&id)
            .ok_or(RegistryError::UnknownMessageId(id))?;

        let mut cursor = WireCursor::new(payload);
        let message = (entry.decode)(&mut cursor).map_err(|source| RegistryError::Decode {
            id,
            name: entry.name,
            source,
        })?;

        if !cursor.is_empty() {
            trace!(
                id,
                message = entry.name,
                trailing = cursor.remaining(),
                "ignoring trailing payload bytes"
            );
        }
        Ok(message)
    }

    /// Append `message` to `dst` as one complete frame.
    ///
    /// The length prefix is reserved first and patched once the payload size
    /// is known, so the message is encoded straight into `dst`. On error
    /// `dst` is left as it was.
    pub fn write_frame(&self, message: &dyn Message, dst: &mut BytesMut) -> Result<()> {
        let id = self.id_of(message)?;

        let start = dst.len();
        dst.put_u32(0);
        dst.put_u32(id);
        message.encode(dst);

        let body = dst.len() - start - LENGTH_SIZE;
        let Ok(declared) = u32::try_from(body) else {
            dst.truncate(start);
            return Err(FrameError::FrameTooLarge {
                size: body,
                max: u32::MAX as usize,
            }
            .into());
        };
        dst[start..start + LENGTH_SIZE].copy_from_slice(&declared.to_be_bytes());

        trace!(id, size = body - ID_SIZE, "message framed");
        Ok(())
    }
}

impl std::fmt::Debug for MessageRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_list().entries(self.descriptors()).finish()
    }
}

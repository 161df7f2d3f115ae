//! Field-level wire codec.
//!
//! Fields are written back to back with no tags, so a message's decode order
//! must mirror its encode order exactly:
//!
//! ```text
//! u32 / i32   4 bytes, big-endian
//! bool        1 byte, 1 or 0
//! text        u32 char count, then one byte per char (Latin-1)
//! sequence    u32 element count, then the encoded elements
//! ```

use bytes::{BufMut, BytesMut};

use crate::error::{FrameError, Result};

/// Byte substituted for chars that do not fit in a single byte.
const UNREPRESENTABLE_CHAR: u8 = b'?';

/// Appends a value's fields to an outbound buffer.
pub trait WireEncode {
    /// Append the encoded form of `self` to `dst`.
    fn encode(&self, dst: &mut BytesMut);
}

/// Reads a value back from a bounded frame payload.
pub trait WireDecode: Sized {
    /// Smallest number of bytes one encoded value can occupy.
    ///
    /// Used to reject sequence counts that cannot possibly fit in the rest
    /// of the frame before anything is allocated.
    const MIN_WIRE_SIZE: usize = 0;

    /// Decode a value, advancing `src` past exactly the bytes it consumed.
    fn decode(src: &mut WireCursor<'_>) -> Result<Self>;
}

/// Read position inside one frame payload.
///
/// All reads are bounded by the payload the cursor was created over; running
/// past the end is an error, never an out-of-bounds read.
#[derive(Debug, Clone)]
pub struct WireCursor<'a> {
    bytes: &'a [u8],
    pos: usize,
}

impl<'a> WireCursor<'a> {
    pub fn new(bytes: &'a [u8]) -> Self {
        Self { bytes, pos: 0 }
    }

    /// Bytes consumed so far.
    pub fn position(&self) -> usize {
        self.pos
    }

    /// Bytes left before the end of the payload.
    pub fn remaining(&self) -> usize {
        self.bytes.len() - self.pos
    }

    pub fn is_empty(&self) -> bool {
        self.remaining() == 0
    }

    /// Consume exactly `n` bytes.
    pub fn take(&mut self, n: usize) -> Result<&'a [u8]> {
        let remaining = self.remaining();
        if n > remaining {
            return Err(FrameError::Truncated {
                needed: n,
                remaining,
            });
        }
        let slice = &self.bytes[self.pos..self.pos + n];
        self.pos += n;
        Ok(slice)
    }

    pub fn read_u32(&mut self) -> Result<u32> {
        let raw = self.take(4)?;
        Ok(u32::from_be_bytes([raw[0], raw[1], raw[2], raw[3]]))
    }

    /// Decode the next value of type `T`.
    pub fn read<T: WireDecode>(&mut self) -> Result<T> {
        T::decode(self)
    }

    /// Read a u32 count of items that each occupy at least `min_item_size`
    /// bytes, rejecting counts the rest of the payload cannot hold.
    fn read_count(&mut self, min_item_size: usize) -> Result<usize> {
        let declared = self.read_u32()?;
        let count = declared as usize;
        let remaining = self.remaining();
        if count.saturating_mul(min_item_size) > remaining {
            return Err(FrameError::LengthOverflow {
                declared,
                remaining,
            });
        }
        Ok(count)
    }
}

impl WireEncode for u32 {
    fn encode(&self, dst: &mut BytesMut) {
        dst.put_u32(*self);
    }
}

impl WireDecode for u32 {
    const MIN_WIRE_SIZE: usize = 4;

    fn decode(src: &mut WireCursor<'_>) -> Result<Self> {
        src.read_u32()
    }
}

impl WireEncode for i32 {
    fn encode(&self, dst: &mut BytesMut) {
        dst.put_i32(*self);
    }
}

impl WireDecode for i32 {
    const MIN_WIRE_SIZE: usize = 4;

    fn decode(src: &mut WireCursor<'_>) -> Result<Self> {
        let raw = src.take(4)?;
        Ok(i32::from_be_bytes([raw[0], raw[1], raw[2], raw[3]]))
    }
}

impl WireEncode for bool {
    fn encode(&self, dst: &mut BytesMut) {
        dst.put_u8(u8::from(*self));
    }
}

impl WireDecode for bool {
    const MIN_WIRE_SIZE: usize = 1;

    fn decode(src: &mut WireCursor<'_>) -> Result<Self> {
        // Only 1 means true; any other byte reads as false.
        Ok(src.take(1)?[0] == 1)
    }
}

impl WireEncode for String {
    fn encode(&self, dst: &mut BytesMut) {
        self.as_str().encode(dst);
    }
}

impl WireEncode for str {
    fn encode(&self, dst: &mut BytesMut) {
        let count = self.chars().count();
        dst.reserve(4 + count);
        dst.put_u32(count as u32);
        for ch in self.chars() {
            dst.put_u8(u8::try_from(u32::from(ch)).unwrap_or(UNREPRESENTABLE_CHAR));
        }
    }
}

impl WireDecode for String {
    const MIN_WIRE_SIZE: usize = 4;

    fn decode(src: &mut WireCursor<'_>) -> Result<Self> {
        let len = src.read_count(1)?;
        let raw = src.take(len)?;
        Ok(raw.iter().map(|&b| char::from(b)).collect())
    }
}

impl<T: WireEncode> WireEncode for Vec<T> {
    fn encode(&self, dst: &mut BytesMut) {
        self.as_slice().encode(dst);
    }
}

impl<T: WireEncode> WireEncode for [T] {
    fn encode(&self, dst: &mut BytesMut) {
        dst.put_u32(self.len() as u32);
        for item in self {
            item.encode(dst);
        }
    }
}

impl<T: WireDecode> WireDecode for Vec<T> {
    const MIN_WIRE_SIZE: usize = 4;

    fn decode(src: &mut WireCursor<'_>) -> Result<Self> {
        let count = src.read_count(T::MIN_WIRE_SIZE)?;
        let mut items = Vec::with_capacity(count.min(src.remaining()));
        for _ in 0..count {
            items.push(T::decode(src)?);
        }
        Ok(items)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Clone, PartialEq)]
    struct Seat {
        name: String,
        ready: bool,
    }

    impl WireEncode for Seat {
        fn encode(&self, dst: &mut BytesMut) {
            self.name.encode(dst);
            self.ready.encode(dst);
        }
    }

    impl WireDecode for Seat {
        const MIN_WIRE_SIZE: usize = 5;

        fn decode(src: &mut WireCursor<'_>) -> Result<Self> {
            Ok(Self {
                name: src.read()?,
                ready: src.read()?,
            })
        }
    }

    fn encoded<T: WireEncode + ?Sized>(value: &T) -> BytesMut {
        let mut buf = BytesMut::new();
        value.encode(&mut buf);
        buf
    }

    #[test]
    fn u32_is_big_endian() {
        let buf = encoded(&0x0102_0304u32);
        assert_eq!(buf.as_ref(), &[0x01, 0x02, 0x03, 0x04]);

        let mut cursor = WireCursor::new(&buf);
        assert_eq!(cursor.read::<u32>().unwrap(), 0x0102_0304);
        assert!(cursor.is_empty());
    }

    #[test]
    fn i32_keeps_sign() {
        let buf = encoded(&-2i32);
        assert_eq!(buf.as_ref(), &[0xFF, 0xFF, 0xFF, 0xFE]);
        assert_eq!(WireCursor::new(&buf).read::<i32>().unwrap(), -2);
    }

    #[test]
    fn bool_is_one_byte() {
        assert_eq!(encoded(&true).as_ref(), &[1]);
        assert_eq!(encoded(&false).as_ref(), &[0]);
        assert!(!WireCursor::new(&[7]).read::<bool>().unwrap());
    }

    #[test]
    fn text_is_counted_single_bytes() {
        let buf = encoded("abc");
        assert_eq!(buf.as_ref(), &[0, 0, 0, 3, b'a', b'b', b'c']);

        let mut cursor = WireCursor::new(&buf);
        assert_eq!(cursor.read::<String>().unwrap(), "abc");
        assert_eq!(cursor.position(), 7);
    }

    #[test]
    fn text_latin1_survives_and_wider_chars_degrade() {
        let latin = "caf\u{e9}".to_string();
        let buf = encoded(&latin);
        assert_eq!(buf.len(), 4 + 4);
        assert_eq!(WireCursor::new(&buf).read::<String>().unwrap(), latin);

        let buf = encoded("a\u{1F600}b");
        assert_eq!(buf.as_ref(), &[0, 0, 0, 3, b'a', b'?', b'b']);
    }

    #[test]
    fn nested_sequence_decodes_in_order() {
        let seats = vec![
            Seat {
                name: "north".to_string(),
                ready: true,
            },
            Seat {
                name: String::new(),
                ready: false,
            },
        ];
        let buf = encoded(&seats);

        let mut cursor = WireCursor::new(&buf);
        let decoded: Vec<Seat> = cursor.read().unwrap();
        assert_eq!(decoded, seats);
        assert!(cursor.is_empty());
    }

    #[test]
    fn truncated_field_is_an_error() {
        let mut cursor = WireCursor::new(&[0, 0, 1]);
        let err = cursor.read::<u32>().unwrap_err();
        assert!(matches!(
            err,
            FrameError::Truncated {
                needed: 4,
                remaining: 3
            }
        ));
    }

    #[test]
    fn text_length_beyond_payload_is_rejected() {
        let mut cursor = WireCursor::new(&[0, 0, 0, 9, b'x']);
        let err = cursor.read::<String>().unwrap_err();
        assert!(matches!(
            err,
            FrameError::LengthOverflow {
                declared: 9,
                remaining: 1
            }
        ));
    }

    #[test]
    fn sequence_count_beyond_payload_is_rejected_before_allocating() {
        // Claims u32::MAX u32 elements with only four bytes left.
        let mut cursor = WireCursor::new(&[0xFF, 0xFF, 0xFF, 0xFF, 0, 0, 0, 1]);
        let err = cursor.read::<Vec<u32>>().unwrap_err();
        assert!(matches!(err, FrameError::LengthOverflow { .. }));
    }
}

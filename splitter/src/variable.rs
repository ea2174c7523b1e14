//! Length-prefixed byte strings.
//!
//! A [VariableLengthValue] is encoded as a 4-byte big-endian length followed by the payload:
//!
//! ```text
//! +---+---+---+---+---+---+---+---+---+
//! | 0 | 1 | 2 | 3 | 4 |    ...    | N |
//! +---+---+---+---+---+---+---+---+---+
//! |  Length (u32) |      Payload      |
//! +---+---+---+---+---+---+---+---+---+
//! ```
//!
//! Equality only considers the payload.

use crate::{
    construct::{FromBytes, Options},
    layout::{Declaration, Length},
    Error, Splitter, Value,
};
use bytes::{Buf, BufMut, Bytes, BytesMut};
use std::{
    hash::{Hash, Hasher},
    ops::Add,
};

/// Width of the length prefix.
pub const VARIABLE_HEADER_LENGTH: usize = 4;

/// Largest payload the length prefix can describe.
pub const MAX_PAYLOAD_LENGTH: usize = u32::MAX as usize;

/// A payload paired with its big-endian length prefix.
#[derive(Clone, Debug)]
pub struct VariableLengthValue {
    len: u32,
    payload: Bytes,
}

impl VariableLengthValue {
    /// Wraps `payload`, failing if its length does not fit in the prefix.
    pub fn new(payload: impl Into<Bytes>) -> Result<Self, Error> {
        let payload = payload.into();
        let len = u32::try_from(payload.len()).map_err(|_| Error::PayloadTooLong {
            len: payload.len(),
            max: MAX_PAYLOAD_LENGTH,
        })?;
        Ok(Self { len, payload })
    }

    pub fn payload(&self) -> &Bytes {
        &self.payload
    }

    pub fn into_payload(self) -> Bytes {
        self.payload
    }

    pub fn length_prefix(&self) -> [u8; VARIABLE_HEADER_LENGTH] {
        self.len.to_be_bytes()
    }

    pub fn write(&self, buf: &mut impl BufMut) {
        buf.put_u32(self.len);
        buf.put_slice(&self.payload);
    }

    pub fn encode_size(&self) -> usize {
        VARIABLE_HEADER_LENGTH + self.payload.len()
    }

    /// Returns the prefixed encoding.
    pub fn to_bytes(&self) -> Bytes {
        let mut buf = BytesMut::with_capacity(self.encode_size());
        self.write(&mut buf);
        buf.freeze()
    }

    /// Packs a collection into a single value whose payload is the concatenation of each
    /// item's own prefixed encoding.
    pub fn bundle<I, B>(items: I) -> Result<Self, Error>
    where
        I: IntoIterator<Item = B>,
        B: AsRef<[u8]>,
    {
        let mut joined = BytesMut::new();
        for item in items {
            Self::new(Bytes::copy_from_slice(item.as_ref()))?.write(&mut joined);
        }
        Self::new(joined.freeze())
    }

    /// Reverses [VariableLengthValue::bundle] on an encoded value.
    ///
    /// If the payload is not itself a sequence of prefixed items, it is returned as the only
    /// item.
    pub fn dispense(mut encoded: &[u8]) -> Result<Vec<Bytes>, Error> {
        if encoded.len() < VARIABLE_HEADER_LENGTH {
            return Err(Error::InsufficientBytes {
                layout: "variable-length value".to_string(),
                expected: VARIABLE_HEADER_LENGTH,
                actual: encoded.len(),
            });
        }
        let claimed = encoded.get_u32() as usize;
        if claimed != encoded.len() {
            return Err(Error::MalformedVariable {
                claimed,
                found: encoded.len(),
            });
        }
        if encoded.is_empty() {
            return Ok(Vec::new());
        }

        let splitter = Splitter::new([Declaration::variable()])?;
        match splitter.repeat(encoded) {
            Ok(items) => Ok(items.into_iter().filter_map(Value::into_bytes).collect()),
            Err(_) => Ok(vec![Bytes::copy_from_slice(encoded)]),
        }
    }
}

impl FromBytes for VariableLengthValue {
    type Error = Error;

    fn from_bytes(bytes: Bytes, _: &Options) -> Result<Self, Self::Error> {
        Self::new(bytes)
    }

    fn expected_length() -> Option<Length> {
        Some(Length::Variable)
    }
}

impl PartialEq for VariableLengthValue {
    fn eq(&self, other: &Self) -> bool {
        self.payload == other.payload
    }
}

impl Eq for VariableLengthValue {}

impl Hash for VariableLengthValue {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.payload.hash(state);
    }
}

impl PartialEq<[u8]> for VariableLengthValue {
    fn eq(&self, other: &[u8]) -> bool {
        self.payload == other
    }
}

impl PartialEq<&[u8]> for VariableLengthValue {
    fn eq(&self, other: &&[u8]) -> bool {
        self.payload == *other
    }
}

impl PartialEq<Bytes> for VariableLengthValue {
    fn eq(&self, other: &Bytes) -> bool {
        self.payload == *other
    }
}

impl<B: AsRef<[u8]>> Add<B> for VariableLengthValue {
    type Output = Vec<u8>;

    fn add(self, rhs: B) -> Vec<u8> {
        let rhs = rhs.as_ref();
        let mut out = Vec::with_capacity(self.encode_size() + rhs.len());
        self.write(&mut out);
        out.extend_from_slice(rhs);
        out
    }
}

impl Add<VariableLengthValue> for Vec<u8> {
    type Output = Vec<u8>;

    fn add(mut self, rhs: VariableLengthValue) -> Vec<u8> {
        rhs.write(&mut self);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_length_prefix() {
        let value = VariableLengthValue::new(&b"llamas"[..]).unwrap();
        assert_eq!(value.length_prefix(), [0, 0, 0, 6]);
        assert_eq!(value.to_bytes(), &b"\x00\x00\x00\x06llamas"[..]);
        assert_eq!(value.encode_size(), 10);
        assert_eq!(value, &b"llamas"[..]);
    }

    #[test]
    fn test_concatenation() {
        let value = VariableLengthValue::new(&b"ab"[..]).unwrap();
        assert_eq!(value.clone() + b"cd", b"\x00\x00\x00\x02abcd".to_vec());
        assert_eq!(b"zz".to_vec() + value.clone(), b"zz\x00\x00\x00\x02ab".to_vec());
        assert_eq!(
            value.clone() + value.to_bytes(),
            b"\x00\x00\x00\x02ab\x00\x00\x00\x02ab".to_vec()
        );
    }

    #[test]
    fn test_bundle_and_dispense() {
        let items = [&b"llamas"[..], &b"dingos"[..], &b"christmas-tree"[..]];
        let bundled = VariableLengthValue::bundle(items).unwrap().to_bytes();
        let dispensed = VariableLengthValue::dispense(&bundled).unwrap();
        assert_eq!(dispensed, items);
    }

    #[test]
    fn test_dispense_empty_items() {
        let bundled = VariableLengthValue::bundle(Vec::<Vec<u8>>::new())
            .unwrap()
            .to_bytes();
        assert!(VariableLengthValue::dispense(&bundled).unwrap().is_empty());

        let bundled = VariableLengthValue::bundle([b""]).unwrap().to_bytes();
        assert_eq!(
            VariableLengthValue::dispense(&bundled).unwrap(),
            vec![Bytes::new()]
        );
    }

    #[test]
    fn test_dispense_plain_payload() {
        let encoded = VariableLengthValue::new(&b"not bundled"[..])
            .unwrap()
            .to_bytes();
        assert_eq!(
            VariableLengthValue::dispense(&encoded).unwrap(),
            vec![Bytes::from_static(b"not bundled")]
        );
    }

    #[test]
    fn test_dispense_wrong_length() {
        assert!(matches!(
            VariableLengthValue::dispense(b"\x00\x00\x00\x05abc"),
            Err(Error::MalformedVariable {
                claimed: 5,
                found: 3
            })
        ));
        assert!(matches!(
            VariableLengthValue::dispense(b"\x00\x00"),
            Err(Error::InsufficientBytes { .. })
        ));
    }
}

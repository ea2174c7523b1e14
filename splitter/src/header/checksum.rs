//! Structural checksum header.
//!
//! The checksum identifies a layout's shape, not its contents: the first 8 bytes of a SHA-256
//! digest over one token per field, `0x00 || u64be(width)` for fixed fields and `0x01` for
//! variable fields. Two layouts with the same sequence of widths share a checksum regardless
//! of their constructors.

use super::{HeaderChain, HeaderField};
use crate::{
    layout::{Layout, Length},
    Error, Value,
};
use bytes::Bytes;
use sha2::{Digest, Sha256};
use tracing::warn;

/// Tag of the [Checksum] header.
pub const CHECKSUM_TAG: &str = "checksum";

/// Width of the [Checksum] header.
pub const CHECKSUM_LENGTH: usize = 8;

const FIXED: u8 = 0;
const VARIABLE: u8 = 1;

/// Computes the structural checksum of `layout`.
pub fn signature(layout: &Layout) -> [u8; CHECKSUM_LENGTH] {
    let mut hasher = Sha256::new();
    for length in layout.fingerprint() {
        match length {
            Length::Fixed(width) => {
                hasher.update([FIXED]);
                hasher.update((width as u64).to_be_bytes());
            }
            Length::Variable => hasher.update([VARIABLE]),
        }
    }
    let digest = hasher.finalize();
    let mut signature = [0u8; CHECKSUM_LENGTH];
    signature.copy_from_slice(&digest[..CHECKSUM_LENGTH]);
    signature
}

/// Compares the checksum header in `buffer` against the checksum of `layout`.
///
/// On mismatch, returns [Error::StructureMismatch] if `raise_on_mismatch` is set and `false`
/// otherwise.
pub fn validate(
    layout: &Layout,
    headers: &HeaderChain,
    buffer: &[u8],
    raise_on_mismatch: bool,
) -> Result<bool, Error> {
    let (offset, field) = headers.locate(CHECKSUM_TAG).ok_or(Error::MissingChecksum)?;
    let end = offset + field.length();
    let Some(found) = buffer.get(offset..end) else {
        return Err(Error::InsufficientBytes {
            layout: format!("header {CHECKSUM_TAG}"),
            expected: end,
            actual: buffer.len(),
        });
    };
    if found == signature(layout) {
        return Ok(true);
    }
    let expected = layout.describe();
    warn!(%expected, "structural checksum mismatch");
    if raise_on_mismatch {
        return Err(Error::StructureMismatch { expected });
    }
    Ok(false)
}

/// A header holding the structural checksum of the engine's layout.
#[derive(Clone, Copy, Debug, Default)]
pub struct Checksum;

impl HeaderField for Checksum {
    fn tag(&self) -> &str {
        CHECKSUM_TAG
    }

    fn length(&self) -> usize {
        CHECKSUM_LENGTH
    }

    fn serialize(&self, value: &Value) -> Result<Bytes, Error> {
        match value.as_bytes() {
            Some(bytes) if bytes.len() == CHECKSUM_LENGTH => Ok(bytes.clone()),
            _ => Err(Error::InvalidHeaderValue(
                CHECKSUM_TAG.to_string(),
                format!("expected {CHECKSUM_LENGTH} bytes"),
            )),
        }
    }

    fn deserialize(&self, bytes: Bytes) -> Result<Value, Error> {
        Ok(Value::Bytes(bytes))
    }

    fn generate(&self, layout: &Layout, _: &[u8]) -> Option<Value> {
        Some(Value::Bytes(Bytes::copy_from_slice(&signature(layout))))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        construct::Text,
        layout::{Declaration, Length},
        Record,
    };

    #[test]
    fn test_signature_is_structural() {
        let raw = Layout::new([Declaration::fixed(3), Declaration::variable()]).unwrap();
        let text = Layout::new([
            Declaration::with(Text, Length::Fixed(3)),
            Declaration::variable(),
        ])
        .unwrap();
        let other = Layout::new([Declaration::fixed(4), Declaration::variable()]).unwrap();
        assert_eq!(signature(&raw), signature(&text));
        assert_ne!(signature(&raw), signature(&other));

        let fixed = Layout::new([Declaration::fixed(3)]).unwrap();
        let variable = Layout::new([Declaration::variable()]).unwrap();
        assert_ne!(signature(&fixed), signature(&variable));
    }

    #[test]
    fn test_validate() {
        let layout = Layout::new([Declaration::fixed(2)]).unwrap();
        let headers = HeaderChain::new().with(Checksum).unwrap();
        let buffer = headers.render(&layout, b"ab", &Record::new()).unwrap();
        assert_eq!(&buffer[..CHECKSUM_LENGTH], &signature(&layout)[..]);
        assert!(validate(&layout, &headers, &buffer, true).unwrap());

        let other = Layout::new([Declaration::fixed(3)]).unwrap();
        assert!(!validate(&other, &headers, &buffer, false).unwrap());
        assert!(matches!(
            validate(&other, &headers, &buffer, true),
            Err(Error::StructureMismatch { expected }) if expected == "[(bytes, 3)]"
        ));
        assert!(matches!(
            validate(&layout, &headers, b"abc", true),
            Err(Error::InsufficientBytes { .. })
        ));
    }

    #[test]
    fn test_validate_without_checksum() {
        let layout = Layout::new([Declaration::fixed(2)]).unwrap();
        assert!(matches!(
            validate(&layout, &HeaderChain::new(), b"ab", true),
            Err(Error::MissingChecksum)
        ));
    }

    #[test]
    fn test_explicit_checksum_wins() {
        let layout = Layout::new([Declaration::fixed(2)]).unwrap();
        let headers = HeaderChain::new().with(Checksum).unwrap();
        let values = Record::new().with(CHECKSUM_TAG, &[7u8; CHECKSUM_LENGTH][..]);
        let buffer = headers.render(&layout, b"ab", &values).unwrap();
        assert_eq!(&buffer[..CHECKSUM_LENGTH], &[7u8; CHECKSUM_LENGTH][..]);
        assert!(!validate(&layout, &headers, &buffer, false).unwrap());
    }
}

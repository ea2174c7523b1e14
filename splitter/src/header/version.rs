//! Protocol version header.

use super::HeaderField;
use crate::{Error, Value};
use bytes::{Buf, Bytes};

/// Tag of the [Version] header.
pub const VERSION_TAG: &str = "version";

/// Width of the [Version] header.
pub const VERSION_LENGTH: usize = 2;

/// A big-endian u16 version number. Has no default.
#[derive(Clone, Copy, Debug, Default)]
pub struct Version;

impl HeaderField for Version {
    fn tag(&self) -> &str {
        VERSION_TAG
    }

    fn length(&self) -> usize {
        VERSION_LENGTH
    }

    fn serialize(&self, value: &Value) -> Result<Bytes, Error> {
        let version = value.as_uint().ok_or_else(|| {
            Error::InvalidHeaderValue(
                VERSION_TAG.to_string(),
                format!("expected uint, got {}", value.kind()),
            )
        })?;
        let version = u16::try_from(version).map_err(|_| {
            Error::InvalidHeaderValue(
                VERSION_TAG.to_string(),
                format!("{version} does not fit in {VERSION_LENGTH} bytes"),
            )
        })?;
        Ok(Bytes::copy_from_slice(&version.to_be_bytes()))
    }

    fn deserialize(&self, mut bytes: Bytes) -> Result<Value, Error> {
        if bytes.len() != VERSION_LENGTH {
            return Err(Error::InvalidHeaderValue(
                VERSION_TAG.to_string(),
                format!("expected {VERSION_LENGTH} bytes, got {}", bytes.len()),
            ));
        }
        Ok(Value::UInt(bytes.get_u16().into()))
    }
}

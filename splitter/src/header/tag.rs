//! Fixed-width opaque tag headers.

use super::HeaderField;
use crate::{Error, Value};
use bytes::Bytes;

/// A fixed-width byte tag with an optional default.
#[derive(Clone, Debug)]
pub struct Tag {
    tag: String,
    length: usize,
    default: Option<Bytes>,
    ascii: bool,
}

impl Tag {
    pub fn new(tag: impl Into<String>, length: usize) -> Self {
        Self {
            tag: tag.into(),
            length,
            default: None,
            ascii: false,
        }
    }

    /// Sets the value used when none is supplied or configured.
    pub fn with_default(mut self, default: impl Into<Bytes>) -> Self {
        self.default = Some(default.into());
        self
    }

    /// Reads the header back as ascii text instead of bytes.
    pub fn ascii(mut self) -> Self {
        self.ascii = true;
        self
    }

    fn invalid(&self, reason: String) -> Error {
        Error::InvalidHeaderValue(self.tag.clone(), reason)
    }
}

impl HeaderField for Tag {
    fn tag(&self) -> &str {
        &self.tag
    }

    fn length(&self) -> usize {
        self.length
    }

    fn serialize(&self, value: &Value) -> Result<Bytes, Error> {
        let bytes = match value {
            Value::Bytes(bytes) => bytes.clone(),
            Value::Str(s) => Bytes::copy_from_slice(s.as_bytes()),
            other => return Err(self.invalid(format!("expected bytes, got {}", other.kind()))),
        };
        if bytes.len() != self.length {
            return Err(self.invalid(format!(
                "expected {} bytes, got {}",
                self.length,
                bytes.len()
            )));
        }
        Ok(bytes)
    }

    fn deserialize(&self, bytes: Bytes) -> Result<Value, Error> {
        if !self.ascii {
            return Ok(Value::Bytes(bytes));
        }
        if !bytes.is_ascii() {
            return Err(self.invalid("not ascii".to_string()));
        }
        String::from_utf8(bytes.to_vec())
            .map(Value::Str)
            .map_err(|err| self.invalid(err.to_string()))
    }

    fn default_value(&self) -> Option<Value> {
        self.default.clone().map(Value::Bytes)
    }
}

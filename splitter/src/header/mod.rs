//! Metadata headers prepended to payloads.
//!
//! A [HeaderChain] is an ordered list of fixed-width [HeaderField]s. Headers appear on the wire
//! in declaration order, ahead of the payload:
//!
//! ```text
//! +----------+----------+-----+----------+---------+
//! | Header 0 | Header 1 | ... | Header N | Payload |
//! +----------+----------+-----+----------+---------+
//! ```
//!
//! Assignment resolves header values from last to first, then writes every header and the
//! payload into one buffer. Stripping and reading walk the chain from first to last.

use crate::{layout::Layout, Error, Record, Value};
use bytes::{BufMut, Bytes, BytesMut};
use std::{fmt, sync::Arc};
use tracing::debug;

mod checksum;
pub use checksum::{signature, validate, Checksum, CHECKSUM_LENGTH, CHECKSUM_TAG};
mod tag;
pub use tag::Tag;
mod version;
pub use version::{Version, VERSION_LENGTH, VERSION_TAG};

/// A fixed-width metadata field.
pub trait HeaderField: Send + Sync {
    /// Unique name of this header within a chain.
    fn tag(&self) -> &str;

    /// Width of the serialized header.
    fn length(&self) -> usize;

    fn serialize(&self, value: &Value) -> Result<Bytes, Error>;

    fn deserialize(&self, bytes: Bytes) -> Result<Value, Error>;

    /// Value used when none is supplied or configured.
    fn default_value(&self) -> Option<Value> {
        None
    }

    /// Computes a value from the layout and payload, if this header can.
    fn generate(&self, _layout: &Layout, _payload: &[u8]) -> Option<Value> {
        None
    }
}

/// An ordered collection of headers with per-engine value overrides.
#[derive(Clone, Default)]
pub struct HeaderChain {
    fields: Vec<Arc<dyn HeaderField>>,
    overrides: Record,
}

impl HeaderChain {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a header, failing if its tag is already present.
    pub fn with(mut self, field: impl HeaderField + 'static) -> Result<Self, Error> {
        if self.fields.iter().any(|f| f.tag() == field.tag()) {
            return Err(Error::DuplicateHeader(field.tag().to_string()));
        }
        if self.header_length().checked_add(field.length()).is_none() {
            return Err(Error::LayoutTooLong("headers".to_string()));
        }
        self.fields.push(Arc::new(field));
        Ok(self)
    }

    /// Sets the value used for `tag` when a caller supplies none.
    pub fn with_override(mut self, tag: impl Into<String>, value: impl Into<Value>) -> Self {
        self.overrides.insert(tag, value);
        self
    }

    pub fn fields(&self) -> impl Iterator<Item = &dyn HeaderField> {
        self.fields.iter().map(|field| field.as_ref())
    }

    pub fn overrides(&self) -> &Record {
        &self.overrides
    }

    /// Combined width of every header. [HeaderChain::with] keeps this from overflowing.
    pub fn header_length(&self) -> usize {
        self.fields.iter().map(|field| field.length()).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Returns the header's offset and definition.
    pub fn locate(&self, tag: &str) -> Option<(usize, &dyn HeaderField)> {
        let mut offset = 0;
        for field in &self.fields {
            if field.tag() == tag {
                return Some((offset, field.as_ref()));
            }
            offset += field.length();
        }
        None
    }

    /// Removes every header from the front of `buffer`.
    pub fn strip<'a>(&self, buffer: &'a [u8]) -> Result<&'a [u8], Error> {
        let mut rest = buffer;
        for field in &self.fields {
            rest = rest
                .get(field.length()..)
                .ok_or_else(|| Self::truncated(field.as_ref(), rest.len()))?;
        }
        Ok(rest)
    }

    /// Prepends every header to `payload`.
    ///
    /// A header's value is taken from `values`, then from the configured overrides, then from
    /// the header's default.
    pub fn assign(&self, payload: &[u8], values: &Record) -> Result<Bytes, Error> {
        self.prepend(payload, values, None)
    }

    /// Like [HeaderChain::assign], but headers that can generate their own value from the
    /// layout and payload do so unless `values` supplies one.
    pub fn render(&self, layout: &Layout, payload: &[u8], values: &Record) -> Result<Bytes, Error> {
        self.prepend(payload, values, Some(layout))
    }

    /// Reads every header from the front of `buffer`, keyed by tag.
    pub fn metadata(&self, buffer: &[u8]) -> Result<Record, Error> {
        let mut record = Record::new();
        let mut rest = buffer;
        for field in &self.fields {
            let length = field.length();
            if rest.len() < length {
                return Err(Self::truncated(field.as_ref(), rest.len()));
            }
            let value = field.deserialize(Bytes::copy_from_slice(&rest[..length]))?;
            record.insert(field.tag(), value);
            rest = &rest[length..];
        }
        Ok(record)
    }

    fn prepend(
        &self,
        payload: &[u8],
        values: &Record,
        layout: Option<&Layout>,
    ) -> Result<Bytes, Error> {
        let mut headers = Vec::with_capacity(self.fields.len());
        for field in self.fields.iter().rev() {
            let value = self.resolve(field.as_ref(), values, layout, payload)?;
            let header = field.serialize(&value)?;
            if header.len() != field.length() {
                return Err(Error::InvalidHeaderValue(
                    field.tag().to_string(),
                    format!("serialized to {} bytes, expected {}", header.len(), field.length()),
                ));
            }
            headers.push(header);
        }
        let capacity = self
            .header_length()
            .checked_add(payload.len())
            .ok_or_else(|| Error::LayoutTooLong("headers and payload".to_string()))?;
        let mut buffer = BytesMut::with_capacity(capacity);
        for header in headers.iter().rev() {
            buffer.put_slice(header);
        }
        buffer.put_slice(payload);
        debug!(
            headers = self.fields.len(),
            payload = payload.len(),
            "assigned headers"
        );
        Ok(buffer.freeze())
    }

    fn resolve(
        &self,
        field: &dyn HeaderField,
        values: &Record,
        layout: Option<&Layout>,
        payload: &[u8],
    ) -> Result<Value, Error> {
        let tag = field.tag();
        if let Some(value) = values.get(tag) {
            return Ok(value.clone());
        }
        if let Some(value) = layout.and_then(|layout| field.generate(layout, payload)) {
            return Ok(value);
        }
        if let Some(value) = self.overrides.get(tag) {
            return Ok(value.clone());
        }
        field
            .default_value()
            .ok_or_else(|| Error::MissingHeaderValue(tag.to_string()))
    }

    fn truncated(field: &dyn HeaderField, actual: usize) -> Error {
        Error::InsufficientBytes {
            layout: format!("header {}", field.tag()),
            expected: field.length(),
            actual,
        }
    }
}

impl fmt::Debug for HeaderChain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HeaderChain")
            .field("tags", &self.fields().map(|field| field.tag()).collect::<Vec<_>>())
            .field("overrides", &self.overrides)
            .finish()
    }
}

//! The cursor walk shared by [crate::Splitter] and [crate::Kwargifier].
//!
//! Fields are consumed left to right. Fixed fields take their declared width; variable fields
//! first read a 4-byte big-endian length at the cursor. Each slice is handed to the field's
//! constructor, and length-prefixed values are unwrapped to their payload before being
//! stored.

use crate::{
    header::{self, HeaderChain, Version, CHECKSUM_LENGTH, VERSION_TAG},
    layout::{FieldSpec, Layout, Length},
    remainder::RemainderCodec,
    variable::{VariableLengthValue, VARIABLE_HEADER_LENGTH},
    Error, Record, Value,
};
use bytes::{Buf, Bytes};
use std::sync::Arc;
use tracing::trace;

/// Configuration shared by every engine.
#[derive(Clone, Default)]
pub struct Config {
    /// Metadata headers expected in front of every payload.
    pub headers: HeaderChain,

    /// Codec used to decode trailing bytes, if any.
    pub remainder: Option<Arc<dyn RemainderCodec>>,
}

impl Config {
    /// Configuration with a single [Version] header set to `version`.
    pub fn versioned(version: u16) -> Result<Self, Error> {
        Ok(Self {
            headers: HeaderChain::new()
                .with(Version)?
                .with_override(VERSION_TAG, version),
            remainder: None,
        })
    }
}

/// Per-call options for remainder handling.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct SplitCfg {
    /// Return bytes left after the last field instead of failing.
    pub return_remainder: bool,

    /// Decode bytes left after the last field with the configured [RemainderCodec].
    pub decode_remainder: bool,
}

impl SplitCfg {
    pub fn remainder() -> Self {
        Self {
            return_remainder: true,
            decode_remainder: false,
        }
    }

    pub fn decode() -> Self {
        Self {
            return_remainder: false,
            decode_remainder: true,
        }
    }

    /// Returns true if trailing bytes are allowed.
    pub fn wants_remainder(&self) -> bool {
        self.return_remainder || self.decode_remainder
    }
}

/// Collects constructed values.
pub trait Container: Default {
    fn store(&mut self, field: &FieldSpec, value: Value);
}

impl Container for Vec<Value> {
    fn store(&mut self, _: &FieldSpec, value: Value) {
        self.push(value);
    }
}

impl Container for Record {
    /// Stores by field name; unnamed fields are keyed by position.
    fn store(&mut self, field: &FieldSpec, value: Value) {
        match field.name() {
            Some(name) => self.insert(name, value),
            None => self.insert(self.len().to_string(), value),
        };
    }
}

/// Header operations available on every engine.
pub trait Engine {
    fn layout(&self) -> &Layout;

    fn config(&self) -> &Config;

    /// Removes every header from the front of `buffer`.
    fn strip<'a>(&self, buffer: &'a [u8]) -> Result<&'a [u8], Error> {
        self.config().headers.strip(buffer)
    }

    /// Prepends every header to `payload`, resolving values from `values`, then configured
    /// overrides, then defaults.
    fn assign(&self, payload: &[u8], values: &Record) -> Result<Bytes, Error> {
        self.config().headers.assign(payload, values)
    }

    /// Like [Engine::assign], but headers that can generate their own value do so.
    fn render(&self, payload: &[u8], values: &Record) -> Result<Bytes, Error> {
        self.config().headers.render(self.layout(), payload, values)
    }

    /// Reads every header without parsing the payload.
    fn metadata(&self, buffer: &[u8]) -> Result<Record, Error> {
        self.config().headers.metadata(buffer)
    }

    /// The structural checksum of this engine's layout.
    fn checksum(&self) -> [u8; CHECKSUM_LENGTH] {
        header::signature(self.layout())
    }

    /// Compares the checksum header in `buffer` against this engine's layout.
    fn validate(&self, buffer: &[u8], raise_on_mismatch: bool) -> Result<bool, Error> {
        header::validate(
            self.layout(),
            &self.config().headers,
            buffer,
            raise_on_mismatch,
        )
    }
}

/// Returns the part of `buffer` that follows `headers`, without copying.
pub(crate) fn payload(headers: &HeaderChain, buffer: &Bytes) -> Result<Bytes, Error> {
    let payload = headers.strip(buffer)?;
    Ok(buffer.slice(buffer.len() - payload.len()..))
}

/// Checks the buffer length against a layout without variable fields.
pub(crate) fn check_length(layout: &Layout, actual: usize, remainder: bool) -> Result<(), Error> {
    if layout.has_variable_fields() {
        return Ok(());
    }
    let expected = layout.total_fixed_length();
    if !remainder && actual != expected {
        return Err(Error::LengthMismatch {
            layout: layout.describe(),
            expected,
            actual,
        });
    }
    if expected > actual {
        return Err(Error::InsufficientBytes {
            layout: layout.describe(),
            expected,
            actual,
        });
    }
    Ok(())
}

/// Slices the next field at `cursor`, advancing it past the field (and its length prefix).
pub(crate) fn next_field(
    field: &FieldSpec,
    buffer: &Bytes,
    cursor: &mut usize,
) -> Result<Bytes, Error> {
    let length = match field.length() {
        Length::Fixed(length) => length,
        Length::Variable => {
            let remaining = buffer.len() - *cursor;
            if remaining < VARIABLE_HEADER_LENGTH {
                return Err(Error::LengthOverrun {
                    field: field.label().to_string(),
                    claimed: VARIABLE_HEADER_LENGTH,
                    remaining,
                });
            }
            let mut prefix = &buffer[*cursor..*cursor + VARIABLE_HEADER_LENGTH];
            *cursor += VARIABLE_HEADER_LENGTH;
            prefix.get_u32() as usize
        }
    };

    let remaining = buffer.len() - *cursor;
    if length > remaining {
        return Err(Error::LengthOverrun {
            field: field.label().to_string(),
            claimed: length,
            remaining,
        });
    }
    let bytes = buffer.slice(*cursor..*cursor + length);
    trace!(field = field.label(), cursor = *cursor, length, "sliced field");
    *cursor += length;
    Ok(bytes)
}

/// Builds a field's value from its bytes.
pub(crate) fn construct(field: &FieldSpec, bytes: Bytes) -> Result<Value, Error> {
    let len = bytes.len();
    let value = field
        .constructor()
        .construct(bytes, field.options())
        .map_err(|source| Error::Construction {
            field: field.label().to_string(),
            constructor: field.constructor().name().to_string(),
            len,
            source,
        })?;

    // Length-prefixed values are stored as their payload
    Ok(match value {
        Value::Object(object) => match object.downcast::<VariableLengthValue>() {
            Ok(variable) => Value::Bytes(variable.payload().clone()),
            Err(object) => Value::Object(object),
        },
        value => value,
    })
}

/// Constructs every field of `layout` from `buffer`, returning the values and the bytes left
/// after the last field.
pub(crate) fn split<C: Container>(
    layout: &Layout,
    buffer: &Bytes,
    remainder: bool,
) -> Result<(C, Bytes), Error> {
    check_length(layout, buffer.len(), remainder)?;
    let mut cursor = 0;
    let mut values = C::default();
    for field in layout.fields() {
        let bytes = next_field(field, buffer, &mut cursor)?;
        values.store(field, construct(field, bytes)?);
    }
    Ok((values, buffer.slice(cursor..)))
}

/// Constructs the first field of `layout`, which must span all of `buffer`.
pub(crate) fn split_single(layout: &Layout, buffer: &Bytes) -> Result<Value, Error> {
    check_length(layout, buffer.len(), false)?;
    let field = layout.fields().first().ok_or(Error::NoFields)?;
    let mut cursor = 0;
    let bytes = next_field(field, buffer, &mut cursor)?;
    let value = construct(field, bytes)?;
    let extra = buffer.len() - cursor;
    if extra > 0 {
        return Err(Error::CountMismatch {
            constructor: field.constructor().name().to_string(),
            extra,
        });
    }
    Ok(value)
}

/// Constructs one record of `layout`, which must span all of `buffer`.
pub(crate) fn split_nested<C: Container>(
    layout: &Layout,
    buffer: &Bytes,
    name: &str,
) -> Result<C, Error> {
    let (values, remainder) = split::<C>(layout, buffer, true)?;
    if !remainder.is_empty() {
        return Err(Error::CountMismatch {
            constructor: name.to_string(),
            extra: remainder.len(),
        });
    }
    Ok(values)
}

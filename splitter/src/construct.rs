//! Turn sliced bytes into values.
//!
//! Every field of a layout carries a [Constructor]. Two adapters cover user-defined types:
//! [Factory] for types implementing [FromBytes] and [Callable] for plain functions. The
//! builtin [Raw], [Text], and [UInt] constructors cover the common cases.

use crate::{error::BoxError, layout::Length, Value};
use bytes::Bytes;
use std::{collections::BTreeMap, marker::PhantomData, sync::Arc};

/// Option set on fields whose constructor is itself a layout engine.
pub const SINGLE: &str = "single";

/// Named options passed to a constructor alongside its bytes.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Options(BTreeMap<String, Value>);

impl Options {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.0.insert(key.into(), value.into());
        self
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    pub fn str(&self, key: &str) -> Option<&str> {
        self.get(key).and_then(Value::as_str)
    }

    pub fn bool(&self, key: &str) -> Option<bool> {
        self.get(key).and_then(Value::as_bool)
    }

    /// Returns true if the field must hold exactly one nested record.
    pub fn single(&self) -> bool {
        self.bool(SINGLE).unwrap_or(false)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// Capability to build a value from a field's bytes.
pub trait Constructor: Send + Sync {
    /// Identity used in diagnostics and structural descriptions.
    fn name(&self) -> &str;

    /// Builds a value from exactly the bytes of one field.
    fn construct(&self, bytes: Bytes, options: &Options) -> Result<Value, BoxError>;

    /// The width this constructor declares for itself, if any.
    fn expected_length(&self) -> Option<Length> {
        None
    }

    /// Returns true if this constructor is a layout engine (and so nests).
    fn is_layout(&self) -> bool {
        false
    }
}

impl<C: Constructor + ?Sized> Constructor for Arc<C> {
    fn name(&self) -> &str {
        (**self).name()
    }

    fn construct(&self, bytes: Bytes, options: &Options) -> Result<Value, BoxError> {
        (**self).construct(bytes, options)
    }

    fn expected_length(&self) -> Option<Length> {
        (**self).expected_length()
    }

    fn is_layout(&self) -> bool {
        (**self).is_layout()
    }
}

/// Types that can be built from their own byte representation.
pub trait FromBytes: Sized + Send + Sync + 'static {
    type Error: Into<BoxError>;

    fn from_bytes(bytes: Bytes, options: &Options) -> Result<Self, Self::Error>;

    /// The width of every encoded value of this type, if known.
    fn expected_length() -> Option<Length> {
        None
    }
}

/// Adapter for types implementing [FromBytes]. Values are wrapped as [Value::Object].
pub struct Factory<T> {
    name: &'static str,
    _marker: PhantomData<fn() -> T>,
}

impl<T: FromBytes> Factory<T> {
    pub fn new() -> Self {
        let name = std::any::type_name::<T>();
        Self {
            name: name.rsplit("::").next().unwrap_or(name),
            _marker: PhantomData,
        }
    }
}

impl<T: FromBytes> Default for Factory<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: FromBytes> Constructor for Factory<T> {
    fn name(&self) -> &str {
        self.name
    }

    fn construct(&self, bytes: Bytes, options: &Options) -> Result<Value, BoxError> {
        T::from_bytes(bytes, options)
            .map(Value::object)
            .map_err(Into::into)
    }

    fn expected_length(&self) -> Option<Length> {
        T::expected_length()
    }
}

/// Shorthand for [Factory::new].
pub fn factory<T: FromBytes>() -> Factory<T> {
    Factory::new()
}

/// Adapter for functions invoked directly with a field's bytes.
pub struct Callable<F> {
    name: &'static str,
    expected: Option<Length>,
    f: F,
}

impl<F> Callable<F>
where
    F: Fn(Bytes, &Options) -> Result<Value, BoxError> + Send + Sync,
{
    pub fn new(name: &'static str, f: F) -> Self {
        Self {
            name,
            expected: None,
            f,
        }
    }

    /// Declares the width of every value this function builds.
    pub fn with_length(mut self, length: Length) -> Self {
        self.expected = Some(length);
        self
    }
}

impl<F> Constructor for Callable<F>
where
    F: Fn(Bytes, &Options) -> Result<Value, BoxError> + Send + Sync,
{
    fn name(&self) -> &str {
        self.name
    }

    fn construct(&self, bytes: Bytes, options: &Options) -> Result<Value, BoxError> {
        (self.f)(bytes, options)
    }

    fn expected_length(&self) -> Option<Length> {
        self.expected
    }
}

/// Shorthand for [Callable::new].
pub fn callable<F>(name: &'static str, f: F) -> Callable<F>
where
    F: Fn(Bytes, &Options) -> Result<Value, BoxError> + Send + Sync,
{
    Callable::new(name, f)
}

/// Passes bytes through unchanged.
#[derive(Clone, Copy, Debug, Default)]
pub struct Raw;

impl Constructor for Raw {
    fn name(&self) -> &str {
        "bytes"
    }

    fn construct(&self, bytes: Bytes, _: &Options) -> Result<Value, BoxError> {
        Ok(Value::Bytes(bytes))
    }
}

/// Decodes text. The `encoding` option selects `utf-8` (default) or `ascii`.
#[derive(Clone, Copy, Debug, Default)]
pub struct Text;

impl Constructor for Text {
    fn name(&self) -> &str {
        "str"
    }

    fn construct(&self, bytes: Bytes, options: &Options) -> Result<Value, BoxError> {
        match options.str("encoding").unwrap_or("utf-8") {
            "utf-8" | "utf8" => Ok(Value::Str(std::str::from_utf8(&bytes)?.to_string())),
            "ascii" => {
                if let Some(byte) = bytes.iter().find(|b| !b.is_ascii()) {
                    return Err(format!("byte 0x{byte:02x} is not ascii").into());
                }
                Ok(Value::Str(String::from_utf8(bytes.to_vec())?))
            }
            other => Err(format!("unsupported encoding: {other}").into()),
        }
    }
}

/// Decodes an unsigned integer of at most 8 bytes. The `byteorder` option selects `big`
/// (default) or `little`.
#[derive(Clone, Copy, Debug, Default)]
pub struct UInt;

impl Constructor for UInt {
    fn name(&self) -> &str {
        "int"
    }

    fn construct(&self, bytes: Bytes, options: &Options) -> Result<Value, BoxError> {
        if bytes.len() > 8 {
            return Err(format!("{} bytes do not fit in a u64", bytes.len()).into());
        }
        let big = bytes.iter().fold(0u64, |acc, b| (acc << 8) | u64::from(*b));
        match options.str("byteorder").unwrap_or("big") {
            "big" => Ok(Value::UInt(big)),
            "little" => Ok(Value::UInt(
                bytes
                    .iter()
                    .rev()
                    .fold(0u64, |acc, b| (acc << 8) | u64::from(*b)),
            )),
            other => Err(format!("unsupported byteorder: {other}").into()),
        }
    }
}

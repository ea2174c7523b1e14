//! Split byte strings into positional fields.

use crate::{
    construct::{Constructor, Options},
    engine::{self, Config, Engine, SplitCfg},
    error::BoxError,
    layout::{Declaration, Layout, Length},
    partial::Partial,
    Error, Value,
};
use bytes::Bytes;
use std::{
    collections::HashSet,
    fmt,
    ops::{Add, Mul},
};
use tracing::debug;

/// Splits byte strings into a list of values, one per field.
#[derive(Clone)]
pub struct Splitter {
    layout: Layout,
    cfg: Config,
}

impl Splitter {
    /// Builds a splitter without headers or a remainder codec.
    pub fn new(declarations: impl IntoIterator<Item = Declaration>) -> Result<Self, Error> {
        Self::init(declarations, Config::default())
    }

    pub fn init(
        declarations: impl IntoIterator<Item = Declaration>,
        cfg: Config,
    ) -> Result<Self, Error> {
        Ok(Self::from_layout(Layout::new(declarations)?, cfg))
    }

    pub fn from_layout(layout: Layout, cfg: Config) -> Self {
        Self { layout, cfg }
    }

    /// Splits a buffer that must hold exactly one record.
    pub fn split(&self, buffer: &[u8]) -> Result<Vec<Value>, Error> {
        let (values, _) = self.split_cfg(buffer, SplitCfg::default())?;
        Ok(values)
    }

    /// Splits one record, returning the values and any bytes after the last field.
    ///
    /// If the remainder is requested (or decoded), it is also appended as the last value.
    pub fn split_cfg(&self, buffer: &[u8], cfg: SplitCfg) -> Result<(Vec<Value>, Bytes), Error> {
        let (mut values, remainder) =
            self.parse(Bytes::copy_from_slice(buffer), cfg.wants_remainder())?;
        if cfg.decode_remainder {
            values.push(self.decode_remainder(&remainder)?);
        } else if cfg.return_remainder {
            values.push(Value::Bytes(remainder.clone()));
        }
        Ok((values, remainder))
    }

    /// Slices one record without constructing any field.
    pub fn split_partial(
        &self,
        buffer: &[u8],
        return_remainder: bool,
    ) -> Result<(Partial<Vec<Value>>, Bytes), Error> {
        let buffer = Bytes::copy_from_slice(buffer);
        let payload = engine::payload(&self.cfg.headers, &buffer)?;
        let (partial, remainder) = Partial::split(&self.layout, &payload, return_remainder)?;
        if !return_remainder && !remainder.is_empty() {
            return Err(Error::UnrequestedRemainder(remainder.len()));
        }
        Ok((partial, remainder))
    }

    /// Constructs only the first field, which must span the whole payload.
    pub fn split_single(&self, buffer: &[u8]) -> Result<Value, Error> {
        let buffer = Bytes::copy_from_slice(buffer);
        let payload = engine::payload(&self.cfg.headers, &buffer)?;
        engine::split_single(&self.layout, &payload)
    }

    /// Splits consecutive records until the buffer is exhausted.
    ///
    /// Each record of a single-field layout is returned as its bare value, otherwise as a
    /// [Value::List].
    pub fn repeat(&self, buffer: &[u8]) -> Result<Vec<Value>, Error> {
        let mut records = Vec::new();
        self.for_each_record(buffer, |record| records.push(record))?;
        Ok(records)
    }

    /// Like [Splitter::repeat], but collects distinct records.
    pub fn repeat_set(&self, buffer: &[u8]) -> Result<HashSet<Value>, Error> {
        let mut records = HashSet::new();
        self.for_each_record(buffer, |record| {
            records.insert(record);
        })?;
        Ok(records)
    }

    /// Returns a splitter whose fields are this splitter's followed by `other`'s.
    ///
    /// The result keeps this splitter's configuration. Fails if the combined fixed width
    /// overflows.
    pub fn concat(&self, other: &Splitter) -> Result<Splitter, Error> {
        Ok(Self::from_layout(self.layout.concat(&other.layout)?, self.cfg.clone()))
    }

    /// Returns a splitter whose fields are this splitter's repeated `times` times.
    pub fn repeated(&self, times: usize) -> Result<Splitter, Error> {
        Ok(Self::from_layout(self.layout.repeat(times)?, self.cfg.clone()))
    }

    fn parse(&self, buffer: Bytes, remainder: bool) -> Result<(Vec<Value>, Bytes), Error> {
        let payload = engine::payload(&self.cfg.headers, &buffer)?;
        let (values, rest) = engine::split::<Vec<Value>>(&self.layout, &payload, remainder)?;
        if !remainder && !rest.is_empty() {
            return Err(Error::UnrequestedRemainder(rest.len()));
        }
        Ok((values, rest))
    }

    fn decode_remainder(&self, remainder: &[u8]) -> Result<Value, Error> {
        let codec = self
            .cfg
            .remainder
            .as_ref()
            .ok_or(Error::MissingRemainderCodec)?;
        let value = codec
            .decode(remainder)
            .map_err(|source| Error::RemainderDecode {
                codec: codec.name().to_string(),
                source,
            })?;
        debug!(codec = codec.name(), len = remainder.len(), "decoded remainder");
        Ok(value)
    }

    fn for_each_record(&self, buffer: &[u8], mut collect: impl FnMut(Value)) -> Result<(), Error> {
        let mut remaining = Bytes::copy_from_slice(buffer);
        loop {
            let (values, rest) = self.parse(remaining.clone(), true)?;
            if !rest.is_empty() && rest.len() == remaining.len() {
                return Err(Error::NoProgress);
            }
            collect(bare(values));
            if rest.is_empty() {
                return Ok(());
            }
            remaining = rest;
        }
    }
}

/// Unwraps a one-value list.
pub(crate) fn bare(values: Vec<Value>) -> Value {
    match <[Value; 1]>::try_from(values) {
        Ok([value]) => value,
        Err(values) => Value::List(values),
    }
}

/// Width of one encoded record of `layout` behind `cfg`'s headers, or `None` if it overflows.
pub(crate) fn encoded_length(layout: &Layout, cfg: &Config) -> Option<Length> {
    if layout.has_variable_fields() {
        return Some(Length::Variable);
    }
    layout
        .total_fixed_length()
        .checked_add(cfg.headers.header_length())
        .map(Length::Fixed)
}

impl Engine for Splitter {
    fn layout(&self) -> &Layout {
        &self.layout
    }

    fn config(&self) -> &Config {
        &self.cfg
    }
}

impl Constructor for Splitter {
    fn name(&self) -> &str {
        "Splitter"
    }

    /// Nested in a `single` field, the bytes must hold exactly one record. Otherwise they are
    /// split as a strict record into a list.
    fn construct(&self, bytes: Bytes, options: &Options) -> Result<Value, BoxError> {
        if !options.single() {
            let (values, _) = self.parse(bytes, false)?;
            return Ok(Value::List(values));
        }
        let payload = engine::payload(&self.cfg.headers, &bytes)?;
        let values = engine::split_nested::<Vec<Value>>(&self.layout, &payload, self.name())?;
        Ok(bare(values))
    }

    fn expected_length(&self) -> Option<Length> {
        encoded_length(&self.layout, &self.cfg)
    }

    fn is_layout(&self) -> bool {
        true
    }
}

impl Add<&Splitter> for &Splitter {
    type Output = Result<Splitter, Error>;

    fn add(self, rhs: &Splitter) -> Self::Output {
        self.concat(rhs)
    }
}

impl Add for Splitter {
    type Output = Result<Splitter, Error>;

    fn add(self, rhs: Splitter) -> Self::Output {
        self.concat(&rhs)
    }
}

impl Mul<usize> for &Splitter {
    type Output = Result<Splitter, Error>;

    fn mul(self, times: usize) -> Self::Output {
        self.repeated(times)
    }
}

impl Mul<usize> for Splitter {
    type Output = Result<Splitter, Error>;

    fn mul(self, times: usize) -> Self::Output {
        self.repeated(times)
    }
}

impl fmt::Debug for Splitter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Splitter")
            .field("layout", &self.layout)
            .field("headers", &self.cfg.headers)
            .finish()
    }
}

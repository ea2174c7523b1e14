//! Split byte strings into named fields and hand them to a receiver.
//!
//! A [Kwargifier] slices named fields into a [Record], merges in any configured extras, and
//! passes the record to a receiver that builds the caller's type. Buffers holding several
//! consecutive records fabricate one object per record.

use crate::{
    construct::{Constructor, Options},
    engine::{self, Config, Engine},
    error::BoxError,
    layout::{Declaration, Layout, Length},
    partial::Partial,
    splitter::encoded_length,
    Error, Record, Value,
};
use bytes::Bytes;
use std::{fmt, sync::Arc};
use tracing::debug;

/// Builds an object from a record of named values.
pub type Receiver<T> = Arc<dyn Fn(Record) -> Result<T, BoxError> + Send + Sync>;

/// The objects fabricated from a buffer.
#[derive(Debug, PartialEq)]
pub enum Fabricated<T> {
    /// The buffer held exactly one record.
    One(T),
    /// The buffer held several consecutive records.
    Many(Vec<T>),
}

impl<T> Fabricated<T> {
    pub fn one(self) -> Option<T> {
        match self {
            Self::One(object) => Some(object),
            Self::Many(_) => None,
        }
    }

    /// Returns every object, in buffer order.
    pub fn into_vec(self) -> Vec<T> {
        match self {
            Self::One(object) => vec![object],
            Self::Many(objects) => objects,
        }
    }
}

/// Splits byte strings into records of named fields.
pub struct Kwargifier<T> {
    layout: Layout,
    cfg: Config,
    receiver: Option<Receiver<T>>,
    extras: Record,
}

impl<T> Kwargifier<T> {
    /// Builds a kwargifier without headers, extras, or a receiver.
    pub fn new<N: Into<String>>(
        declarations: impl IntoIterator<Item = (N, Declaration)>,
    ) -> Result<Self, Error> {
        Self::init(declarations, Config::default())
    }

    pub fn init<N: Into<String>>(
        declarations: impl IntoIterator<Item = (N, Declaration)>,
        cfg: Config,
    ) -> Result<Self, Error> {
        Ok(Self {
            layout: Layout::named(declarations)?,
            cfg,
            receiver: None,
            extras: Record::new(),
        })
    }

    /// Sets the receiver used when a call does not supply its own.
    pub fn with_receiver<F>(mut self, receiver: F) -> Self
    where
        F: Fn(Record) -> Result<T, BoxError> + Send + Sync + 'static,
    {
        self.receiver = Some(Arc::new(receiver));
        self
    }

    /// Adds a value passed to the receiver alongside every record.
    ///
    /// Fails if `name` is also a field name.
    pub fn with_extra(
        mut self,
        name: impl Into<String>,
        value: impl Into<Value>,
    ) -> Result<Self, Error> {
        let name = name.into();
        if self
            .layout
            .fields()
            .iter()
            .any(|field| field.name() == Some(name.as_str()))
        {
            return Err(Error::DuplicateField(name));
        }
        self.extras.insert(name, value);
        Ok(self)
    }

    pub fn extras(&self) -> &Record {
        &self.extras
    }

    /// Fabricates every record in `buffer` with the configured receiver.
    pub fn fabricate(&self, buffer: &[u8]) -> Result<Fabricated<T>, Error> {
        let receiver = self.receiver(None)?;
        self.fabricate_all(buffer, &receiver)
    }

    /// Fabricates every record in `buffer` with `receiver` instead of the configured one.
    pub fn fabricate_with(
        &self,
        buffer: &[u8],
        receiver: &Receiver<T>,
    ) -> Result<Fabricated<T>, Error> {
        let receiver = self.receiver(Some(receiver))?;
        self.fabricate_all(buffer, &receiver)
    }

    /// Fabricates every record in `buffer`, always returning a list.
    pub fn repeat(&self, buffer: &[u8]) -> Result<Vec<T>, Error> {
        let receiver = self.receiver(None)?;
        self.collect(Bytes::copy_from_slice(buffer), &receiver)
    }

    /// Fabricates the first record, returning it with the bytes that follow.
    pub fn fabricate_remainder(&self, buffer: &[u8]) -> Result<(T, Bytes), Error> {
        let receiver = self.receiver(None)?;
        let buffer = Bytes::copy_from_slice(buffer);
        let (record, remainder) = self.next_record(&buffer)?;
        let consumed = buffer.len() - remainder.len();
        let object = receive(&receiver, &self.extras, record, consumed)?;
        Ok((object, remainder))
    }

    /// Slices the first record without constructing any field.
    ///
    /// Fields are constructed on access; [PartialObject::finish] builds the object.
    pub fn fabricate_partial(
        &self,
        buffer: &[u8],
        return_remainder: bool,
    ) -> Result<(PartialObject<T>, Bytes), Error> {
        let receiver = self.receiver(None)?;
        let original = Bytes::copy_from_slice(buffer);
        let payload = engine::payload(&self.cfg.headers, &original)?;
        let (partial, remainder) = Partial::split(&self.layout, &payload, return_remainder)?;
        if !return_remainder && !remainder.is_empty() {
            return Err(Error::UnrequestedRemainder(remainder.len()));
        }
        let partial = PartialObject {
            partial,
            receiver,
            extras: self.extras.clone(),
            original,
        };
        Ok((partial, remainder))
    }

    fn receiver(&self, receiver: Option<&Receiver<T>>) -> Result<Receiver<T>, Error> {
        receiver
            .or(self.receiver.as_ref())
            .cloned()
            .ok_or(Error::MissingReceiver)
    }

    fn next_record(&self, buffer: &Bytes) -> Result<(Record, Bytes), Error> {
        let payload = engine::payload(&self.cfg.headers, buffer)?;
        engine::split::<Record>(&self.layout, &payload, true)
    }

    fn fabricate_all(
        &self,
        buffer: &[u8],
        receiver: &Receiver<T>,
    ) -> Result<Fabricated<T>, Error> {
        let objects = self.collect(Bytes::copy_from_slice(buffer), receiver)?;
        Ok(match <[T; 1]>::try_from(objects) {
            Ok([object]) => Fabricated::One(object),
            Err(objects) => Fabricated::Many(objects),
        })
    }

    fn collect(&self, buffer: Bytes, receiver: &Receiver<T>) -> Result<Vec<T>, Error> {
        let mut objects = Vec::new();
        let mut remaining = buffer;
        loop {
            let (record, rest) = self.next_record(&remaining)?;
            if !rest.is_empty() && rest.len() == remaining.len() {
                return Err(Error::NoProgress);
            }
            let consumed = remaining.len() - rest.len();
            objects.push(receive(receiver, &self.extras, record, consumed)?);
            if rest.is_empty() {
                break;
            }
            remaining = rest;
        }
        if objects.len() > 1 {
            debug!(records = objects.len(), "fabricated consecutive records");
        }
        Ok(objects)
    }
}

/// Merges `extras` into `record` and hands it to `receiver`.
fn receive<T>(
    receiver: &Receiver<T>,
    extras: &Record,
    mut record: Record,
    len: usize,
) -> Result<T, Error> {
    for (name, value) in extras.iter() {
        record.insert(name, value.clone());
    }
    (**receiver)(record).map_err(|source| Error::Construction {
        field: "record".to_string(),
        constructor: short_name::<T>().to_string(),
        len,
        source,
    })
}

fn short_name<T>() -> &'static str {
    let name = std::any::type_name::<T>();
    name.rsplit("::").next().unwrap_or(name)
}

impl<T> Clone for Kwargifier<T> {
    fn clone(&self) -> Self {
        Self {
            layout: self.layout.clone(),
            cfg: self.cfg.clone(),
            receiver: self.receiver.clone(),
            extras: self.extras.clone(),
        }
    }
}

impl<T> Engine for Kwargifier<T> {
    fn layout(&self) -> &Layout {
        &self.layout
    }

    fn config(&self) -> &Config {
        &self.cfg
    }
}

impl<T: Send + Sync + 'static> Constructor for Kwargifier<T> {
    fn name(&self) -> &str {
        short_name::<T>()
    }

    /// Nested in a `single` field, the bytes must hold exactly one record, fabricated as a
    /// [Value::Object]. Otherwise every record is fabricated into a list.
    fn construct(&self, bytes: Bytes, options: &Options) -> Result<Value, BoxError> {
        let receiver = self.receiver(None)?;
        if !options.single() {
            let objects = self.collect(bytes, &receiver)?;
            return Ok(Value::List(objects.into_iter().map(Value::object).collect()));
        }
        let payload = engine::payload(&self.cfg.headers, &bytes)?;
        let record = engine::split_nested::<Record>(&self.layout, &payload, self.name())?;
        let object = receive(&receiver, &self.extras, record, bytes.len())?;
        Ok(Value::object(object))
    }

    fn expected_length(&self) -> Option<Length> {
        encoded_length(&self.layout, &self.cfg)
    }

    fn is_layout(&self) -> bool {
        true
    }
}

impl<T> fmt::Debug for Kwargifier<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Kwargifier")
            .field("layout", &self.layout)
            .field("headers", &self.cfg.headers)
            .field("extras", &self.extras)
            .finish()
    }
}

/// A record whose fields are constructed on access, and whose object is built on
/// [PartialObject::finish].
pub struct PartialObject<T> {
    partial: Partial<Record>,
    receiver: Receiver<T>,
    extras: Record,
    original: Bytes,
}

impl<T> PartialObject<T> {
    /// Returns the value of the field named `name`, constructing it if needed.
    pub fn get(&mut self, name: &str) -> Result<&Value, Error> {
        self.partial.get(name)
    }

    /// Values constructed so far.
    pub fn resolved(&self) -> Record {
        self.partial.resolved()
    }

    pub fn pending(&self) -> Vec<String> {
        self.partial.pending()
    }

    /// The buffer this record was sliced from, headers included.
    pub fn original(&self) -> &Bytes {
        &self.original
    }

    /// Constructs every pending field and builds the object.
    pub fn finish(self) -> Result<T, Error> {
        let record = self.partial.finish()?;
        receive(&self.receiver, &self.extras, record, self.original.len())
    }
}

impl<T> fmt::Debug for PartialObject<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PartialObject")
            .field("partial", &self.partial)
            .field("original", &self.original)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::construct::{Text, UInt};

    #[derive(Debug, PartialEq)]
    struct Cup {
        blend: String,
        size: u64,
        origin: Option<String>,
    }

    fn cups() -> Kwargifier<Cup> {
        Kwargifier::new([
            ("blend", Declaration::with(Text, Length::Fixed(4))),
            ("size", Declaration::with(UInt, Length::Fixed(1))),
        ])
        .unwrap()
        .with_receiver(|mut record: Record| {
            Ok(Cup {
                blend: record.take_str("blend")?,
                size: record.take_uint("size")?,
                origin: record.take_str("origin").ok(),
            })
        })
    }

    #[test]
    fn test_fabricate_one() {
        let cup = cups().fabricate(b"dark\x10").unwrap();
        assert_eq!(
            cup,
            Fabricated::One(Cup {
                blend: "dark".into(),
                size: 16,
                origin: None,
            })
        );
    }

    #[test]
    fn test_fabricate_many() {
        let cups = cups().fabricate(b"dark\x10mild\x08").unwrap().into_vec();
        assert_eq!(cups.len(), 2);
        assert_eq!(cups[1].blend, "mild");
        assert_eq!(cups[1].size, 8);
    }

    #[test]
    fn test_extras() {
        let cups = cups().with_extra("origin", "Kenya").unwrap();
        let cup = cups.fabricate(b"dark\x10").unwrap().one().unwrap();
        assert_eq!(cup.origin.as_deref(), Some("Kenya"));
        assert!(matches!(
            cups.with_extra("blend", "light"),
            Err(Error::DuplicateField(name)) if name == "blend"
        ));
    }

    #[test]
    fn test_missing_receiver() {
        let kwargifier = Kwargifier::<Cup>::new([("blend", Declaration::fixed(4))]).unwrap();
        assert!(matches!(
            kwargifier.fabricate(b"dark"),
            Err(Error::MissingReceiver)
        ));
    }

    #[test]
    fn test_receiver_failure() {
        let kwargifier = Kwargifier::<Cup>::new([("blend", Declaration::fixed(4))])
            .unwrap()
            .with_receiver(|_| Err("out of beans".into()));
        match kwargifier.fabricate(b"dark") {
            Err(Error::Construction {
                field,
                constructor,
                len,
                source,
            }) => {
                assert_eq!(field, "record");
                assert_eq!(constructor, "Cup");
                assert_eq!(len, 4);
                assert_eq!(source.to_string(), "out of beans");
            }
            other => panic!("unexpected result: {other:?}"),
        }
    }

    #[test]
    fn test_fabricate_with() {
        let receiver: Receiver<Cup> = Arc::new(|mut record: Record| -> Result<Cup, BoxError> {
            Ok(Cup {
                blend: record.take_str("blend")?.to_uppercase(),
                size: record.take_uint("size")?,
                origin: None,
            })
        });
        let cup = cups().fabricate_with(b"dark\x10", &receiver).unwrap();
        assert_eq!(cup.one().unwrap().blend, "DARK");
    }

    #[test]
    fn test_fabricate_remainder() {
        let (cup, remainder) = cups().fabricate_remainder(b"dark\x10extra").unwrap();
        assert_eq!(cup.blend, "dark");
        assert_eq!(remainder, &b"extra"[..]);
    }

    #[test]
    fn test_fabricate_partial() {
        let (mut partial, remainder) = cups().fabricate_partial(b"dark\x10", false).unwrap();
        assert!(remainder.is_empty());
        assert!(partial.resolved().is_empty());
        assert_eq!(partial.get("blend").unwrap(), &Value::from("dark"));
        assert_eq!(partial.resolved(), Record::new().with("blend", "dark"));
        assert_eq!(partial.pending(), vec!["size"]);
        assert_eq!(partial.original(), &b"dark\x10"[..]);
        let cup = partial.finish().unwrap();
        assert_eq!(cup.size, 16);

        assert!(matches!(
            cups().fabricate_partial(b"dark\x10more", false),
            Err(Error::UnrequestedRemainder(4))
        ));
    }
}

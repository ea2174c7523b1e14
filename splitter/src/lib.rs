//! Split byte strings into typed fields.
//!
//! # Overview
//!
//! Many protocols pack several values into one byte string: some with a fixed width, others
//! behind a 4-byte big-endian length prefix. This crate describes such a string once, as a
//! [Layout] of field declarations, and then splits any number of buffers against it:
//! - [Splitter] produces a list of values, one per field
//! - [Kwargifier] produces a record of named values and hands it to a receiver that builds
//!   the caller's type
//!
//! Either engine can carry a [HeaderChain] of fixed-width metadata headers (a [Version], a
//! structural [Checksum], or arbitrary [Tag]s) expected in front of every payload, and either
//! can be nested inside another layout as a field constructor.
//!
//! # Declarations
//!
//! Each field is declared as one of:
//! - a bare width, for raw bytes ([Declaration::fixed])
//! - a constructor that knows its own width ([Declaration::of])
//! - a constructor with an explicit width and options ([Declaration::with_options])
//!
//! A width of [VARIABLE] reads the field's length from a prefix at parse time.
//!
//! # Example (Positional)
//!
//! ```
//! use commonware_splitter::{Declaration, Splitter, Value};
//!
//! let splitter = Splitter::new([5, 1, 5].map(Declaration::fixed)).unwrap();
//! let values = splitter.split(b"hello world").unwrap();
//! assert_eq!(values, vec![Value::from(b"hello"), Value::from(b" "), Value::from(b"world")]);
//! ```
//!
//! # Example (Named)
//!
//! ```
//! use commonware_splitter::{Declaration, Kwargifier, Length, Record, Text, UInt, VARIABLE};
//!
//! #[derive(Debug, PartialEq)]
//! struct Coffee {
//!     blend: String,
//!     size: u64,
//! }
//!
//! let coffee = Kwargifier::new([
//!     ("blend", Declaration::with(Text, VARIABLE)),
//!     ("size", Declaration::with(UInt, Length::Fixed(2))),
//! ])
//! .unwrap()
//! .with_receiver(|mut record: Record| {
//!     Ok(Coffee {
//!         blend: record.take_str("blend")?,
//!         size: record.take_uint("size")?,
//!     })
//! });
//!
//! let cup = coffee.fabricate(b"\x00\x00\x00\x04dark\x00\x10").unwrap();
//! assert_eq!(
//!     cup.one(),
//!     Some(Coffee { blend: "dark".to_string(), size: 16 })
//! );
//! ```

pub mod construct;
pub mod engine;
pub mod error;
pub mod header;
pub mod kwargifier;
pub mod layout;
pub mod partial;
pub mod remainder;
pub mod splitter;
pub mod value;
pub mod variable;

// Re-export main types and traits
pub use construct::{
    callable, factory, Callable, Constructor, Factory, FromBytes, Options, Raw, Text, UInt,
};
pub use engine::{Config, Container, Engine, SplitCfg};
pub use error::{BoxError, Error};
pub use header::{Checksum, HeaderChain, HeaderField, Tag, Version};
pub use kwargifier::{Fabricated, Kwargifier, PartialObject, Receiver};
pub use layout::{Declaration, FieldSpec, Layout, Length, VARIABLE};
pub use partial::Partial;
#[cfg(feature = "json")]
pub use remainder::Json;
pub use remainder::RemainderCodec;
pub use splitter::Splitter;
pub use value::{Object, Record, Value};
pub use variable::{VariableLengthValue, VARIABLE_HEADER_LENGTH};

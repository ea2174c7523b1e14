//! Decoders for the bytes left after a layout's last field.

use crate::{error::BoxError, Value};

/// Decodes trailing bytes into a value.
pub trait RemainderCodec: Send + Sync {
    /// Identity used in diagnostics.
    fn name(&self) -> &str;

    fn decode(&self, bytes: &[u8]) -> Result<Value, BoxError>;
}

#[cfg(feature = "json")]
mod json {
    use super::RemainderCodec;
    use crate::{error::BoxError, Record, Value};

    /// Decodes the remainder as a JSON document.
    ///
    /// Objects become records, arrays become lists, and non-negative integers, strings, and
    /// booleans map to their scalar counterparts. Other numbers and `null` are rejected.
    #[derive(Clone, Copy, Debug, Default)]
    pub struct Json;

    impl RemainderCodec for Json {
        fn name(&self) -> &str {
            "json"
        }

        fn decode(&self, bytes: &[u8]) -> Result<Value, BoxError> {
            convert(serde_json::from_slice(bytes)?)
        }
    }

    fn convert(value: serde_json::Value) -> Result<Value, BoxError> {
        match value {
            serde_json::Value::Null => Err("null has no equivalent value".into()),
            serde_json::Value::Bool(b) => Ok(Value::Bool(b)),
            serde_json::Value::Number(n) => n
                .as_u64()
                .map(Value::UInt)
                .ok_or_else(|| format!("unsupported number: {n}").into()),
            serde_json::Value::String(s) => Ok(Value::Str(s)),
            serde_json::Value::Array(items) => Ok(Value::List(
                items.into_iter().map(convert).collect::<Result<_, _>>()?,
            )),
            serde_json::Value::Object(map) => {
                let mut record = Record::new();
                for (key, value) in map {
                    record.insert(key, convert(value)?);
                }
                Ok(Value::Record(record))
            }
        }
    }

}

#[cfg(feature = "json")]
pub use json::Json;

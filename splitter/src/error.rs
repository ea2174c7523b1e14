//! Error types for splitting operations

use thiserror::Error;

/// Boxed error returned by user-supplied constructors, receivers, and codecs.
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Error type for splitting operations
#[derive(Error, Debug)]
pub enum Error {
    // Layout and engine configuration
    #[error("must specify at least one field")]
    NoFields,
    #[error("ambiguous declaration: pass the length of {0} alongside it, not as the next field")]
    AmbiguousDeclaration(String),
    #[error("no way to know the expected length of {0}: pass it explicitly or expose an expected length")]
    UnknownLength(String),
    #[error("duplicate field: {0}")]
    DuplicateField(String),
    #[error("duplicate header: {0}")]
    DuplicateHeader(String),
    #[error("a layout can only be repeated a positive number of times, got {0}")]
    InvalidMultiplier(usize),
    #[error("can't fabricate without a receiver")]
    MissingReceiver,
    #[error("remainder present but not requested: {0} bytes")]
    UnrequestedRemainder(usize),
    #[error("no value for header {0}")]
    MissingHeaderValue(String),
    #[error("invalid value for header {0}: {1}")]
    InvalidHeaderValue(String, String), // tag, reason
    #[error("no remainder codec available")]
    MissingRemainderCodec,
    #[error("no checksum header configured")]
    MissingChecksum,
    #[error("layout consumed no bytes from a non-empty buffer")]
    NoProgress,
    #[error("combined width of {0} overflows usize")]
    LayoutTooLong(String),

    // Buffer lengths
    #[error("wrong number of bytes to constitute {layout}: need {expected}, got {actual} (did you mean to return the remainder?)")]
    LengthMismatch {
        layout: String,
        expected: usize,
        actual: usize,
    },
    #[error("not enough bytes to constitute {layout}: need {expected}, got {actual}")]
    InsufficientBytes {
        layout: String,
        expected: usize,
        actual: usize,
    },
    #[error("can't split a field with more bytes than remain: {field} claimed a length of {claimed}, {remaining} remaining")]
    LengthOverrun {
        field: String,
        claimed: usize,
        remaining: usize,
    },
    #[error("expected a single {constructor}, found {extra} extra bytes")]
    CountMismatch { constructor: String, extra: usize },

    // Construction
    #[error("while constructing {field}: unable to create a {constructor} from {len} bytes: {source}")]
    Construction {
        field: String,
        constructor: String,
        len: usize,
        source: BoxError,
    },
    #[error("unable to decode remainder with {codec}: {source}")]
    RemainderDecode { codec: String, source: BoxError },

    // Deferred and named access
    #[error("no field named {name} (pending: {pending:?})")]
    UnknownField { name: String, pending: Vec<String> },
    #[error("field {0} is not a {1}")]
    UnexpectedValue(String, &'static str), // name, expected kind

    // Structure
    #[error("structural checksum mismatch: expected layout {expected}")]
    StructureMismatch { expected: String },

    // Variable-length values
    #[error("payload too long: max {max} bytes, got {len}")]
    PayloadTooLong { len: usize, max: usize },
    #[error("not a variable-length value: prefix claims {claimed} bytes, found {found}")]
    MalformedVariable { claimed: usize, found: usize },
}

//! Normalize field declarations into a [Layout].
//!
//! A declaration is one of:
//! - a bare length, which becomes a raw byte field ([Declaration::Fixed]),
//! - a bare constructor that declares its own width ([Declaration::Type]),
//! - a constructor with an explicit width and options ([Declaration::Explicit]).
//!
//! Normalization resolves each declaration into a [FieldSpec] once, so parsing never has to
//! inspect constructors to find their width.

use crate::{
    construct::{factory, Constructor, Options, Raw, SINGLE},
    variable::VariableLengthValue,
    Error,
};
use std::{collections::HashSet, fmt, sync::Arc};

/// Width of a field.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Length {
    /// A known number of bytes.
    Fixed(usize),
    /// A 4-byte big-endian length prefix read at parse time.
    Variable,
}

/// Marker for variable-length fields.
pub const VARIABLE: Length = Length::Variable;

impl fmt::Display for Length {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Fixed(n) => write!(f, "{n}"),
            Self::Variable => write!(f, "variable"),
        }
    }
}

/// A user-supplied field declaration.
#[derive(Clone)]
pub enum Declaration {
    /// Raw bytes of a fixed width.
    Fixed(usize),
    /// A constructor that declares its own width.
    Type(Arc<dyn Constructor>),
    /// A constructor with an explicit width and options.
    ///
    /// A width of `Fixed(0)` is not usable and falls back to the constructor's own width.
    Explicit {
        constructor: Arc<dyn Constructor>,
        length: Length,
        options: Options,
    },
}

impl Declaration {
    pub fn fixed(length: usize) -> Self {
        Self::Fixed(length)
    }

    pub fn of(constructor: impl Constructor + 'static) -> Self {
        Self::Type(Arc::new(constructor))
    }

    pub fn with(constructor: impl Constructor + 'static, length: Length) -> Self {
        Self::with_options(constructor, length, Options::new())
    }

    pub fn with_options(
        constructor: impl Constructor + 'static,
        length: Length,
        options: Options,
    ) -> Self {
        Self::Explicit {
            constructor: Arc::new(constructor),
            length,
            options,
        }
    }

    /// A length-prefixed byte field.
    pub fn variable() -> Self {
        Self::of(factory::<VariableLengthValue>())
    }
}

impl fmt::Debug for Declaration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Fixed(n) => f.debug_tuple("Fixed").field(n).finish(),
            Self::Type(constructor) => f.debug_tuple("Type").field(&constructor.name()).finish(),
            Self::Explicit {
                constructor,
                length,
                options,
            } => f
                .debug_struct("Explicit")
                .field("constructor", &constructor.name())
                .field("length", length)
                .field("options", options)
                .finish(),
        }
    }
}

impl From<usize> for Declaration {
    fn from(length: usize) -> Self {
        Self::Fixed(length)
    }
}

impl From<Length> for Declaration {
    fn from(length: Length) -> Self {
        match length {
            Length::Fixed(n) => Self::Fixed(n),
            Length::Variable => Self::variable(),
        }
    }
}

impl<C: Constructor + 'static> From<(C, usize)> for Declaration {
    fn from((constructor, length): (C, usize)) -> Self {
        Self::with(constructor, Length::Fixed(length))
    }
}

impl<C: Constructor + 'static> From<(C, Length)> for Declaration {
    fn from((constructor, length): (C, Length)) -> Self {
        Self::with(constructor, length)
    }
}

impl<C: Constructor + 'static> From<(C, usize, Options)> for Declaration {
    fn from((constructor, length, options): (C, usize, Options)) -> Self {
        Self::with_options(constructor, Length::Fixed(length), options)
    }
}

impl<C: Constructor + 'static> From<(C, Length, Options)> for Declaration {
    fn from((constructor, length, options): (C, Length, Options)) -> Self {
        Self::with_options(constructor, length, options)
    }
}

/// A resolved field: optional name, constructor, width, and construction options.
#[derive(Clone)]
pub struct FieldSpec {
    name: Option<String>,
    constructor: Arc<dyn Constructor>,
    length: Length,
    options: Options,
}

impl FieldSpec {
    fn resolve(name: Option<String>, declaration: Declaration) -> Result<Self, Error> {
        let (constructor, length, mut options) = match declaration {
            Declaration::Fixed(n) => {
                let constructor: Arc<dyn Constructor> = Arc::new(Raw);
                (constructor, Length::Fixed(n), Options::new())
            }
            Declaration::Type(constructor) => {
                let length = expected_length(constructor.as_ref())?;
                (constructor, length, Options::new())
            }
            Declaration::Explicit {
                constructor,
                length,
                options,
            } => {
                let length = match length {
                    Length::Fixed(0) => expected_length(constructor.as_ref())?,
                    length => length,
                };
                (constructor, length, options)
            }
        };

        // Nested layouts must consume their region exactly
        if constructor.is_layout() {
            options = options.with(SINGLE, true);
        }

        Ok(Self {
            name,
            constructor,
            length,
            options,
        })
    }

    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    pub fn constructor(&self) -> &dyn Constructor {
        self.constructor.as_ref()
    }

    pub fn length(&self) -> Length {
        self.length
    }

    pub fn options(&self) -> &Options {
        &self.options
    }

    /// Names the field for diagnostics: its name if it has one, else its constructor.
    pub fn label(&self) -> &str {
        self.name.as_deref().unwrap_or_else(|| self.constructor.name())
    }
}

impl fmt::Debug for FieldSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FieldSpec")
            .field("name", &self.name)
            .field("constructor", &self.constructor.name())
            .field("length", &self.length)
            .field("options", &self.options)
            .finish()
    }
}

fn expected_length(constructor: &dyn Constructor) -> Result<Length, Error> {
    constructor
        .expected_length()
        .ok_or_else(|| Error::UnknownLength(constructor.name().to_string()))
}

/// An ordered, immutable sequence of fields.
#[derive(Clone)]
pub struct Layout {
    fields: Arc<[FieldSpec]>,
    total_fixed_length: usize,
    has_variable_fields: bool,
}

impl Layout {
    /// Normalizes positional declarations.
    pub fn new(declarations: impl IntoIterator<Item = Declaration>) -> Result<Self, Error> {
        let declarations: Vec<Declaration> = declarations.into_iter().collect();
        if declarations.is_empty() {
            return Err(Error::NoFields);
        }

        // A bare constructor followed by a bare length was almost certainly meant as a pair
        if let [Declaration::Type(constructor), Declaration::Fixed(_), ..] =
            declarations.as_slice()
        {
            return Err(Error::AmbiguousDeclaration(constructor.name().to_string()));
        }

        let fields = declarations
            .into_iter()
            .map(|declaration| FieldSpec::resolve(None, declaration))
            .collect::<Result<Vec<_>, _>>()?;
        Self::from_fields(fields)
    }

    /// Normalizes named declarations. Names must be unique.
    pub fn named<N: Into<String>>(
        declarations: impl IntoIterator<Item = (N, Declaration)>,
    ) -> Result<Self, Error> {
        let mut seen = HashSet::new();
        let mut fields = Vec::new();
        for (name, declaration) in declarations {
            let name = name.into();
            if !seen.insert(name.clone()) {
                return Err(Error::DuplicateField(name));
            }
            fields.push(FieldSpec::resolve(Some(name), declaration)?);
        }
        if fields.is_empty() {
            return Err(Error::NoFields);
        }
        Self::from_fields(fields)
    }

    fn from_fields(fields: Vec<FieldSpec>) -> Result<Self, Error> {
        let mut total_fixed_length: usize = 0;
        let mut has_variable_fields = false;
        for field in &fields {
            match field.length {
                Length::Fixed(n) => {
                    total_fixed_length = total_fixed_length
                        .checked_add(n)
                        .ok_or_else(|| Error::LayoutTooLong("fields".to_string()))?;
                }
                Length::Variable => has_variable_fields = true,
            }
        }
        Ok(Self {
            fields: fields.into(),
            total_fixed_length,
            has_variable_fields,
        })
    }

    pub fn fields(&self) -> &[FieldSpec] {
        &self.fields
    }

    /// Sum of all fixed field widths.
    ///
    /// Only comparable against a buffer length when [Layout::has_variable_fields] is false.
    pub fn total_fixed_length(&self) -> usize {
        self.total_fixed_length
    }

    pub fn has_variable_fields(&self) -> bool {
        self.has_variable_fields
    }

    pub fn is_named(&self) -> bool {
        self.fields.iter().any(|field| field.name.is_some())
    }

    /// Returns a layout with `other`'s fields appended to this one's.
    ///
    /// Fails if the combined fixed width overflows.
    pub fn concat(&self, other: &Layout) -> Result<Layout, Error> {
        Self::from_fields(self.fields.iter().chain(other.fields.iter()).cloned().collect())
    }

    /// Returns a layout with this one's fields repeated `times` times.
    pub fn repeat(&self, times: usize) -> Result<Layout, Error> {
        if times == 0 {
            return Err(Error::InvalidMultiplier(times));
        }
        let mut layout = self.clone();
        for _ in 1..times {
            layout = layout.concat(self)?;
        }
        Ok(layout)
    }

    /// The shape of the layout: each field's width, ignoring names and constructors.
    pub fn fingerprint(&self) -> Vec<Length> {
        self.fields.iter().map(|field| field.length).collect()
    }

    /// Describes the layout as `(constructor, width)` pairs.
    pub fn describe(&self) -> String {
        let pairs: Vec<String> = self
            .fields
            .iter()
            .map(|field| format!("({}, {})", field.constructor.name(), field.length))
            .collect();
        format!("[{}]", pairs.join(", "))
    }
}

impl fmt::Debug for Layout {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.fields.iter()).finish()
    }
}

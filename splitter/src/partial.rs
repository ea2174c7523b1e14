//! Deferred construction.
//!
//! A [Partial] records each field's slice at split time but only runs a field's constructor
//! when that field is first accessed. Resolved values are cached, and [Partial::finish]
//! constructs whatever is still pending.

use crate::{
    engine::{check_length, construct, next_field, Container},
    layout::Layout,
    Error, Record, Value,
};
use bytes::Bytes;
use std::{fmt, marker::PhantomData};
use tracing::trace;

/// A field's bytes and, once constructed, its value.
struct Slot {
    raw: Bytes,
    value: Option<Value>,
}

/// A split whose fields are constructed on first access.
pub struct Partial<C> {
    layout: Layout,
    slots: Vec<Slot>,
    _container: PhantomData<C>,
}

impl<C: Container> Partial<C> {
    /// Slices every field of `layout` without constructing any of them.
    pub(crate) fn split(
        layout: &Layout,
        buffer: &Bytes,
        remainder: bool,
    ) -> Result<(Self, Bytes), Error> {
        check_length(layout, buffer.len(), remainder)?;
        let mut cursor = 0;
        let mut slots = Vec::with_capacity(layout.fields().len());
        for field in layout.fields() {
            slots.push(Slot {
                raw: next_field(field, buffer, &mut cursor)?,
                value: None,
            });
        }
        trace!(fields = slots.len(), consumed = cursor, "deferred split");
        let partial = Self {
            layout: layout.clone(),
            slots,
            _container: PhantomData,
        };
        Ok((partial, buffer.slice(cursor..)))
    }

    /// Returns the value of the field named `name`, constructing it if needed.
    pub fn get(&mut self, name: &str) -> Result<&Value, Error> {
        let Some(index) = self
            .layout
            .fields()
            .iter()
            .position(|field| field.name() == Some(name))
        else {
            return Err(Error::UnknownField {
                name: name.to_string(),
                pending: self.pending(),
            });
        };
        self.resolve(index)
    }

    /// Returns the value of the field at `index`, constructing it if needed.
    pub fn get_index(&mut self, index: usize) -> Result<&Value, Error> {
        if index >= self.slots.len() {
            return Err(Error::UnknownField {
                name: format!("#{index}"),
                pending: self.pending(),
            });
        }
        self.resolve(index)
    }

    fn resolve(&mut self, index: usize) -> Result<&Value, Error> {
        let Slot { raw, value } = &mut self.slots[index];
        match value {
            Some(value) => Ok(value),
            empty => {
                let constructed = construct(&self.layout.fields()[index], raw.clone())?;
                Ok(empty.insert(constructed))
            }
        }
    }

    /// Returns the still-unconstructed bytes of the field named `name`.
    pub fn raw(&self, name: &str) -> Option<&Bytes> {
        self.layout
            .fields()
            .iter()
            .zip(&self.slots)
            .find_map(|(field, slot)| match slot.value {
                None if field.name() == Some(name) => Some(&slot.raw),
                _ => None,
            })
    }

    /// Values constructed so far, keyed by field name (or position, for unnamed fields).
    pub fn resolved(&self) -> Record {
        let mut resolved = Record::new();
        for (index, slot) in self.slots.iter().enumerate() {
            if let Some(value) = &slot.value {
                resolved.insert(self.key(index), value.clone());
            }
        }
        resolved
    }

    /// Fields not yet constructed. Unnamed fields are listed as `#<position>`.
    pub fn pending(&self) -> Vec<String> {
        self.slots
            .iter()
            .enumerate()
            .filter(|(_, slot)| slot.value.is_none())
            .map(|(index, _)| match self.layout.fields()[index].name() {
                Some(name) => name.to_string(),
                None => format!("#{index}"),
            })
            .collect()
    }

    pub fn is_resolved(&self, name: &str) -> bool {
        self.resolved().contains(name)
    }

    /// Constructs every pending field, returning all values in layout order.
    pub fn finish(self) -> Result<C, Error> {
        let Self { layout, slots, .. } = self;
        let mut values = C::default();
        for (field, slot) in layout.fields().iter().zip(slots) {
            let value = match slot.value {
                Some(value) => value,
                None => construct(field, slot.raw)?,
            };
            values.store(field, value);
        }
        Ok(values)
    }

    fn key(&self, index: usize) -> String {
        match self.layout.fields()[index].name() {
            Some(name) => name.to_string(),
            None => index.to_string(),
        }
    }
}

impl<C: Container> fmt::Debug for Partial<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Partial")
            .field("resolved", &self.resolved())
            .field("pending", &self.pending())
            .finish()
    }
}

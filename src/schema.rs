//! Schema module: resolves field names to typed accessors on record types.
//!
//! This module provides the Record trait, the per-type RecordSchema registry
//! and its builder, typed FieldKey handles, and the `impl_record!` macro.

use crate::types::{ConversionError, FieldType, FieldValue, NativeValue};
use std::collections::HashMap;
use std::fmt;
use std::marker::PhantomData;

type Reader<T> = Box<dyn Fn(&T) -> FieldValue + Send + Sync>;
type Writer<T> = Box<dyn Fn(&mut T, FieldValue) -> Result<(), ConversionError> + Send + Sync>;
type Converter = Box<dyn Fn(FieldValue) -> Result<FieldValue, ConversionError> + Send + Sync>;

/// Read/write access to one named field of `T`.
pub struct FieldAccessor<T> {
    name: String,
    field_type: FieldType,
    read: Reader<T>,
    write: Writer<T>,
    convert: Converter,
}

impl<T> FieldAccessor<T> {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn field_type(&self) -> FieldType {
        self.field_type
    }

    pub fn read(&self, record: &T) -> FieldValue {
        (self.read)(record)
    }

    /// Writes `value` into the field, converting it to the native type first.
    pub fn write(&self, record: &mut T, value: FieldValue) -> Result<(), ConversionError> {
        (self.write)(record, value)
    }

    /// Converts `value` through the field's native type, so the result holds
    /// exactly what the field could store.
    pub fn convert(&self, value: FieldValue) -> Result<FieldValue, ConversionError> {
        (self.convert)(value)
    }
}

impl<T> fmt::Debug for FieldAccessor<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FieldAccessor")
            .field("name", &self.name)
            .field("field_type", &self.field_type)
            .finish()
    }
}

/// The fields of a record type, in registration order.
pub struct RecordSchema<T> {
    fields: Vec<FieldAccessor<T>>,
    field_ids: HashMap<String, usize>, // name -> index into fields
}

impl<T> RecordSchema<T> {
    /// Looks up a field by name. Absence is an ordinary outcome.
    pub fn resolve(&self, name: &str) -> Option<&FieldAccessor<T>> {
        self.field_ids.get(name).map(|&id| &self.fields[id])
    }

    pub fn field_type(&self, name: &str) -> Option<FieldType> {
        self.resolve(name).map(FieldAccessor::field_type)
    }

    pub fn field_names(&self) -> impl Iterator<Item = &str> {
        self.fields.iter().map(FieldAccessor::name)
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// The Rust type name of `T`, for diagnostics.
    pub fn record_name(&self) -> &'static str {
        std::any::type_name::<T>()
    }
}

impl<T> fmt::Debug for RecordSchema<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RecordSchema")
            .field("record", &self.record_name())
            .field("fields", &self.fields)
            .finish()
    }
}

pub struct RecordSchemaBuilder<T> {
    fields: Vec<FieldAccessor<T>>,
}

impl<T: 'static> RecordSchemaBuilder<T> {
    pub fn new() -> Self {
        Self { fields: Vec::new() }
    }

    /// Registers a field. Registering a name twice replaces the first entry.
    pub fn field<V, G, M>(mut self, name: impl Into<String>, get: G, get_mut: M) -> Self
    where
        V: NativeValue + 'static,
        G: Fn(&T) -> &V + Send + Sync + 'static,
        M: Fn(&mut T) -> &mut V + Send + Sync + 'static,
    {
        let name = name.into();
        self.fields.retain(|f| f.name != name);
        self.fields.push(FieldAccessor {
            name,
            field_type: V::FIELD_TYPE,
            read: Box::new(move |record: &T| get(record).to_value()),
            write: Box::new(move |record: &mut T, value: FieldValue| -> Result<(), ConversionError> {
                *get_mut(record) = V::from_value(value)?;
                Ok(())
            }),
            convert: Box::new(|value: FieldValue| V::from_value(value).map(|native| native.to_value())),
        });
        self
    }

    pub fn build(self) -> RecordSchema<T> {
        let field_ids = self
            .fields
            .iter()
            .enumerate()
            .map(|(id, f)| (f.name.clone(), id))
            .collect();
        RecordSchema {
            fields: self.fields,
            field_ids,
        }
    }
}

impl<T: 'static> Default for RecordSchemaBuilder<T> {
    fn default() -> Self {
        Self::new()
    }
}

/// A type whose fields can be looked up by name.
///
/// The schema is built once and shared; implementations usually keep it in a
/// `OnceLock`, which is what [`impl_record!`](crate::impl_record) generates.
pub trait Record: Sized + 'static {
    fn schema() -> &'static RecordSchema<Self>;
}

/// A typed handle naming field of native type `V` on `T`.
///
/// Only the name is kept by a filter, so a key declared on one type can be
/// used against any other record exposing the same field name.
pub struct FieldKey<T, V> {
    name: &'static str,
    _marker: PhantomData<fn(&T) -> V>,
}

impl<T, V> FieldKey<T, V> {
    pub const fn new(name: &'static str) -> Self {
        Self { name, _marker: PhantomData }
    }

    pub const fn name(&self) -> &'static str {
        self.name
    }
}

impl<T, V> Clone for FieldKey<T, V> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<T, V> Copy for FieldKey<T, V> {}

impl<T, V> fmt::Debug for FieldKey<T, V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("FieldKey").field(&self.name).finish()
    }
}

/// Implements [`Record`] for a struct.
///
/// ```
/// use dynfilter::impl_record;
///
/// #[derive(Default)]
/// struct Item {
///     id: i64,
///     description: String,
/// }
///
/// // Fields exposed under their own names:
/// impl_record!(Item { id, description });
///
/// #[derive(Default)]
/// struct Renamed {
///     id: i64,
///     description: String,
/// }
///
/// // Fields exposed under other names:
/// impl_record!(Renamed { "Id" => id, "desc" => description });
/// ```
#[macro_export]
macro_rules! impl_record {
    ($ty:ty { $($field:ident),* $(,)? }) => {
        $crate::impl_record!($ty { $(stringify!($field) => $field),* });
    };
    ($ty:ty { $($name:expr => $field:ident),* $(,)? }) => {
        impl $crate::Record for $ty {
            fn schema() -> &'static $crate::RecordSchema<Self> {
                static SCHEMA: ::std::sync::OnceLock<$crate::RecordSchema<$ty>> = ::std::sync::OnceLock::new();
                SCHEMA.get_or_init(|| {
                    $crate::RecordSchemaBuilder::<$ty>::new()
                        $(.field($name, |r: &$ty| &r.$field, |r: &mut $ty| &mut r.$field))*
                        .build()
                })
            }
        }
    };
}

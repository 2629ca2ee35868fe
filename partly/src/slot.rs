//! Type-erased per-key storage.

use alloc::boxed::Box;
use core::any::Any;
use core::fmt;

use crate::{FromPartial, KeyId, Partial, PartialError, Property, UnwrappablePartial};

/// Object-safe view of a [`Property`] value.
pub(crate) trait ErasedValue: Any + Send + Sync + fmt::Debug {
    fn as_any(&self) -> &dyn Any;
    fn clone_boxed(&self) -> Box<dyn ErasedValue>;
    fn eq_dyn(&self, other: &dyn ErasedValue) -> bool;
}

impl<T: Property> ErasedValue for T {
    fn as_any(&self) -> &dyn Any {
        self
    }

    fn clone_boxed(&self) -> Box<dyn ErasedValue> {
        Box::new(self.clone())
    }

    fn eq_dyn(&self, other: &dyn ErasedValue) -> bool {
        other
            .as_any()
            .downcast_ref::<T>()
            .is_some_and(|other| self == other)
    }
}

/// A nested partial waiting to be unwrapped into the value type of its key.
///
/// `T` is the nested partial's wrapped type and `V` the key's value type.
/// They differ for optional properties, where `wrap` is `Some`.
pub(crate) trait ErasedNested: Send + Sync {
    /// Unwrap the nested partial and box the key's value.
    fn unwrap_any(&self) -> Result<Box<dyn Any>, PartialError>;
    /// The stored `Partial<T>`.
    fn partial(&self) -> &dyn ErasedValue;
    fn to_unwrappable(&self) -> UnwrappablePartial;
    fn clone_boxed(&self) -> Box<dyn ErasedNested>;
}

pub(crate) struct NestedPartial<T, V> {
    partial: Partial<T>,
    wrap: fn(T) -> V,
}

impl<T, V> NestedPartial<T, V> {
    pub(crate) fn new(partial: Partial<T>, wrap: fn(T) -> V) -> Self {
        Self { partial, wrap }
    }
}

impl<T: FromPartial, V: Property> ErasedNested for NestedPartial<T, V> {
    fn unwrap_any(&self) -> Result<Box<dyn Any>, PartialError> {
        let unwrapped = T::from_partial(&self.partial)?;
        Ok(Box::new((self.wrap)(unwrapped)))
    }

    fn partial(&self) -> &dyn ErasedValue {
        &self.partial
    }

    fn to_unwrappable(&self) -> UnwrappablePartial {
        UnwrappablePartial::new(self.partial.clone())
    }

    fn clone_boxed(&self) -> Box<dyn ErasedNested> {
        Box::new(Self {
            partial: self.partial.clone(),
            wrap: self.wrap,
        })
    }
}

/// What a set key holds. Unset keys have no slot at all.
pub(crate) enum Slot {
    Value(Box<dyn ErasedValue>),
    Nested(Box<dyn ErasedNested>),
}

impl Clone for Slot {
    fn clone(&self) -> Self {
        match self {
            Slot::Value(value) => Slot::Value((**value).clone_boxed()),
            Slot::Nested(nested) => Slot::Nested((**nested).clone_boxed()),
        }
    }
}

impl PartialEq for Slot {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Slot::Value(a), Slot::Value(b)) => (**a).eq_dyn(&**b),
            (Slot::Nested(a), Slot::Nested(b)) => a.partial().eq_dyn(b.partial()),
            _ => false,
        }
    }
}

impl fmt::Debug for Slot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Slot::Value(value) => f.debug_tuple("Value").field(value).finish(),
            Slot::Nested(nested) => f.debug_tuple("Nested").field(&nested.partial()).finish(),
        }
    }
}

/// Downcast a stored value to the key's value type.
///
/// Slots are indexed by [`KeyId`], which includes the value's `TypeId`, so a
/// mismatch means the map itself is corrupt.
pub(crate) fn downcast_ref<'a, V: Property>(value: &'a dyn ErasedValue, key: &KeyId) -> &'a V {
    match value.as_any().downcast_ref::<V>() {
        Some(value) => value,
        None => unreachable!(
            "slot for `{key}` holds a value that is not a {}",
            key.type_name()
        ),
    }
}

/// Downcast an unwrapped nested value to the key's value type.
pub(crate) fn downcast_box<V: Property>(value: Box<dyn Any>, key: &KeyId) -> V {
    match value.downcast::<V>() {
        Ok(value) => *value,
        Err(_) => unreachable!(
            "nested partial for `{key}` unwrapped into something that is not a {}",
            key.type_name()
        ),
    }
}

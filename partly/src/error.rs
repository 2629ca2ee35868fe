use alloc::boxed::Box;
use core::fmt;

use crate::slot::ErasedValue;
use crate::{KeyId, Partial, Property};

/// Errors that can occur when resolving a value out of a [`Partial`].
#[derive(Debug, Clone, PartialEq)]
#[non_exhaustive]
pub enum PartialError {
    /// No value could be resolved for the key: it was never set (or was
    /// removed) and the partial has no backing instance.
    KeyPathNotSet {
        /// The key that was looked up.
        key: KeyId,
    },

    /// A nested partial was stored for the key, but it could not be
    /// unwrapped into a value because it is itself incomplete.
    FoundUnwrappablePartial {
        /// The key that was looked up.
        key: KeyId,
        /// The nested partial, exactly as it was stored.
        partial: UnwrappablePartial,
        /// Why unwrapping the nested partial failed.
        cause: Box<PartialError>,
    },
}

impl PartialError {
    /// The key this error was raised for.
    pub fn key(&self) -> KeyId {
        match self {
            PartialError::KeyPathNotSet { key }
            | PartialError::FoundUnwrappablePartial { key, .. } => *key,
        }
    }

    /// Follow the chain of unwrap failures down to the innermost missing key.
    pub fn root_cause(&self) -> &PartialError {
        match self {
            PartialError::KeyPathNotSet { .. } => self,
            PartialError::FoundUnwrappablePartial { cause, .. } => cause.root_cause(),
        }
    }
}

impl fmt::Display for PartialError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PartialError::KeyPathNotSet { key } => {
                write!(f, "no value is set for key `{key}`")
            }
            PartialError::FoundUnwrappablePartial { key, partial, cause } => {
                write!(
                    f,
                    "key `{key}` holds a partial {} that cannot be unwrapped: {cause}",
                    partial.type_name()
                )
            }
        }
    }
}

impl core::error::Error for PartialError {
    fn source(&self) -> Option<&(dyn core::error::Error + 'static)> {
        match self {
            PartialError::KeyPathNotSet { .. } => None,
            PartialError::FoundUnwrappablePartial { cause, .. } => Some(&**cause),
        }
    }
}

/// A nested partial that failed to unwrap, carried by
/// [`PartialError::FoundUnwrappablePartial`].
///
/// The partial is type-erased so the error stays a single concrete type;
/// recover it with [`UnwrappablePartial::downcast_ref`].
pub struct UnwrappablePartial {
    partial: Box<dyn ErasedValue>,
    type_name: &'static str,
}

impl UnwrappablePartial {
    pub(crate) fn new<T: Property>(partial: Partial<T>) -> Self {
        Self {
            partial: Box::new(partial),
            type_name: core::any::type_name::<T>(),
        }
    }

    /// Get the nested partial back if it wraps `T`.
    pub fn downcast_ref<T: Property>(&self) -> Option<&Partial<T>> {
        (*self.partial).as_any().downcast_ref::<Partial<T>>()
    }

    /// The name of the nested partial's wrapped type.
    pub fn type_name(&self) -> &'static str {
        self.type_name
    }
}

impl Clone for UnwrappablePartial {
    fn clone(&self) -> Self {
        Self {
            partial: (*self.partial).clone_boxed(),
            type_name: self.type_name,
        }
    }
}

impl PartialEq for UnwrappablePartial {
    fn eq(&self, other: &Self) -> bool {
        (*self.partial).eq_dyn(&*other.partial)
    }
}

impl fmt::Debug for UnwrappablePartial {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(&*self.partial, f)
    }
}

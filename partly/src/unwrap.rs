use core::any::Any;
use core::fmt::Debug;

use crate::{Partial, PartialError};

/// A type whose values can be stored in a [`Partial`].
///
/// Blanket-implemented for everything that is `'static`, cloneable,
/// comparable, debuggable and thread-safe. These bounds are what give a
/// partial value semantics: cloning a partial clones every stored value.
pub trait Property: Any + Clone + PartialEq + Debug + Send + Sync {}

impl<T> Property for T where T: Any + Clone + PartialEq + Debug + Send + Sync {}

/// A type that can be rebuilt from a [`Partial`] of itself.
///
/// Implementations resolve every required property with
/// [`Partial::value`] and propagate the first failure with `?`. No partially
/// built value is ever produced.
///
/// Implementing this trait is what allows a whole `Partial<T>` to be stored
/// in place of a `T` with [`Partial::set_nested_partial`].
///
/// ```
/// use partly::{FromPartial, Key, Partial, PartialError};
///
/// #[derive(Debug, Clone, PartialEq)]
/// struct Address {
///     city: String,
/// }
///
/// impl Address {
///     const CITY: Key<Address, String> = Key::new("city", |a| &a.city);
/// }
///
/// impl FromPartial for Address {
///     fn from_partial(partial: &Partial<Self>) -> Result<Self, PartialError> {
///         Ok(Self {
///             city: partial.value(&Self::CITY)?,
///         })
///     }
/// }
///
/// let mut partial = Partial::<Address>::new();
/// assert!(partial.build().is_err());
/// partial.set_value(&Address::CITY, "Lisbon".to_string());
/// assert_eq!(partial.build().unwrap().city, "Lisbon");
/// ```
pub trait FromPartial: Property {
    /// Build a value out of `partial`, failing on the first missing property.
    fn from_partial(partial: &Partial<Self>) -> Result<Self, PartialError>;
}

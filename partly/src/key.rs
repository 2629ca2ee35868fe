//! Typed identifiers for the properties of a wrapped type.

use core::any::TypeId;
use core::fmt;
use core::hash::{Hash, Hasher};

/// Identifies one property of type `V` on the wrapped type `W`.
///
/// A key carries a stable name and an accessor used to read the property
/// from a backing instance. Keys are cheap to copy and can be built in a
/// `const` context, so the usual way to declare them is one associated
/// constant per property:
///
/// ```
/// use partly::Key;
///
/// struct Person {
///     name: String,
///     nickname: Option<String>,
/// }
///
/// impl Person {
///     const NAME: Key<Person, String> = Key::new("name", |p| &p.name);
///     const NICKNAME: Key<Person, Option<String>> = Key::new("nickname", |p| &p.nickname);
/// }
///
/// assert_eq!(Person::NAME.name(), "name");
/// assert_ne!(Person::NAME.id(), Person::NICKNAME.id());
/// ```
///
/// `#[derive(PartialKeys)]` generates these constants for every field.
pub struct Key<W, V> {
    name: &'static str,
    accessor: fn(&W) -> &V,
}

impl<W, V> Key<W, V> {
    /// Create a key from a property name and an accessor into `W`.
    pub const fn new(name: &'static str, accessor: fn(&W) -> &V) -> Self {
        Self { name, accessor }
    }

    /// The property name this key was declared with.
    pub const fn name(&self) -> &'static str {
        self.name
    }

    /// Read the property from an instance of the wrapped type.
    pub fn read<'w>(&self, wrapped: &'w W) -> &'w V {
        (self.accessor)(wrapped)
    }
}

impl<W, V: 'static> Key<W, V> {
    /// The identity of this key: its name together with its value type.
    pub fn id(&self) -> KeyId {
        KeyId::of::<V>(self.name)
    }
}

impl<W, V> Clone for Key<W, V> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<W, V> Copy for Key<W, V> {}

impl<W, V: 'static> PartialEq for Key<W, V> {
    fn eq(&self, other: &Self) -> bool {
        self.id() == other.id()
    }
}

impl<W, V: 'static> Eq for Key<W, V> {}

impl<W, V: 'static> Hash for Key<W, V> {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.id().hash(state);
    }
}

impl<W, V> fmt::Debug for Key<W, V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Key<{}>({}: {})",
            core::any::type_name::<W>(),
            self.name,
            core::any::type_name::<V>()
        )
    }
}

impl<W, V> fmt::Display for Key<W, V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name)
    }
}

/// Type-erased identity of a [`Key`].
///
/// Two keys share an id when they have the same name and the same value
/// type. The wrapped type is not part of the id: a partial is only ever
/// indexed by keys of its own wrapped type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct KeyId {
    name: &'static str,
    type_id: TypeId,
    type_name: &'static str,
}

impl KeyId {
    pub(crate) fn of<V: 'static>(name: &'static str) -> Self {
        Self {
            name,
            type_id: TypeId::of::<V>(),
            type_name: core::any::type_name::<V>(),
        }
    }

    /// The property name.
    pub const fn name(&self) -> &'static str {
        self.name
    }

    /// The name of the property's value type, for diagnostics only.
    pub const fn type_name(&self) -> &'static str {
        self.type_name
    }
}

impl fmt::Display for KeyId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloc::string::String;

    struct Point {
        x: i32,
        label: String,
    }

    const X: Key<Point, i32> = Key::new("x", |p| &p.x);
    const LABEL: Key<Point, String> = Key::new("label", |p| &p.label);

    #[test]
    fn keys_with_same_name_and_type_are_equal() {
        let again: Key<Point, i32> = Key::new("x", |p| &p.x);
        assert_eq!(X, again);
        assert_eq!(X.id(), again.id());
    }

    #[test]
    fn keys_with_same_name_but_different_type_differ() {
        let other: Key<Point, String> = Key::new("x", |p| &p.label);
        assert_ne!(X.id(), other.id());
    }

    #[test]
    fn read_goes_through_the_accessor() {
        let p = Point {
            x: 7,
            label: String::from("seven"),
        };
        assert_eq!(*X.read(&p), 7);
        assert_eq!(LABEL.read(&p), "seven");
    }

    #[test]
    fn display_is_the_property_name() {
        assert_eq!(alloc::format!("{LABEL}"), "label");
        assert_eq!(alloc::format!("{}", LABEL.id()), "label");
        assert_eq!(LABEL.id().type_name(), "alloc::string::String");
    }
}

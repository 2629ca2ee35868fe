//! The partial container.
//!
//! A [`Partial<W>`] records some of the properties of a `W`. Every property,
//! identified by a [`Key`], is in one of three states:
//!
//! - unset: nothing was recorded, so reads fall back to the backing
//!   instance if there is one, and fail otherwise;
//! - set to a value, which may be `None` for an `Option` property;
//! - set to a nested partial of the property's own type, which is unwrapped
//!   through [`FromPartial`] when the value is read.
//!
//! An explicit set always masks the backing instance, and the backing
//! instance always wins over an error. `Option` properties are not special:
//! a never-set `Option` property is an error, not `None`.

use alloc::boxed::Box;
use alloc::collections::BTreeMap;
use alloc::sync::Arc;
use core::fmt;

use crate::slot::{self, NestedPartial, Slot};
use crate::{FromPartial, Key, KeyId, PartialError, Property, debug, trace};

/// Observable state of one key in a [`Partial`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SlotState {
    /// Nothing recorded for the key.
    Unset,
    /// A value was recorded.
    Value,
    /// A nested partial was recorded in place of a value.
    NestedPartial,
}

/// A subset of the properties of a `W`, optionally layered over a backing
/// instance of `W`.
///
/// See the [module documentation](self) for how values are resolved.
pub struct Partial<W> {
    slots: BTreeMap<KeyId, Slot>,
    backing: Option<Arc<W>>,
}

impl<W> Partial<W> {
    /// Create an empty partial with no backing instance.
    pub const fn new() -> Self {
        Self {
            slots: BTreeMap::new(),
            backing: None,
        }
    }

    /// Create a partial that falls back to `backing` for unset keys.
    pub fn from_backing(backing: W) -> Self {
        Self::from_shared(Arc::new(backing))
    }

    /// Like [`Partial::from_backing`], sharing an instance that is already
    /// reference counted.
    pub fn from_shared(backing: Arc<W>) -> Self {
        Self {
            slots: BTreeMap::new(),
            backing: Some(backing),
        }
    }

    /// The backing instance, if this partial has one.
    pub fn backing(&self) -> Option<&W> {
        self.backing.as_deref()
    }

    /// Ids of every key that is not unset, in a stable order.
    pub fn keys(&self) -> impl Iterator<Item = &KeyId> + '_ {
        self.slots.keys()
    }

    /// Number of keys that are not unset.
    pub fn len(&self) -> usize {
        self.slots.len()
    }

    /// Whether every key is unset. The backing instance is not considered.
    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /// Reset every key to unset. The backing instance is kept.
    pub fn clear(&mut self) {
        trace!("clear: dropping {} slots", self.slots.len());
        self.slots.clear();
    }

    /// Current state of `key`, without resolving anything.
    pub fn state<V: 'static>(&self, key: &Key<W, V>) -> SlotState {
        match self.slots.get(&key.id()) {
            None => SlotState::Unset,
            Some(Slot::Value(_)) => SlotState::Value,
            Some(Slot::Nested(_)) => SlotState::NestedPartial,
        }
    }

    /// Whether `key` holds a value or a nested partial.
    pub fn is_set<V: 'static>(&self, key: &Key<W, V>) -> bool {
        self.slots.contains_key(&key.id())
    }

    /// Resolve the value of `key`.
    ///
    /// In order, the first match wins:
    /// 1. a recorded value is returned as is (including `None`);
    /// 2. a recorded nested partial is unwrapped with [`FromPartial`];
    ///    if that fails the error carries the nested partial;
    /// 3. an unset key reads the backing instance;
    /// 4. an unset key without backing fails with
    ///    [`PartialError::KeyPathNotSet`].
    pub fn value<V: Property>(&self, key: &Key<W, V>) -> Result<V, PartialError> {
        let id = key.id();
        match self.slots.get(&id) {
            Some(Slot::Value(stored)) => {
                trace!("value({id}): recorded value");
                Ok(slot::downcast_ref::<V>(&**stored, &id).clone())
            }
            Some(Slot::Nested(nested)) => {
                trace!("value({id}): unwrapping nested partial");
                match nested.unwrap_any() {
                    Ok(unwrapped) => Ok(slot::downcast_box::<V>(unwrapped, &id)),
                    Err(cause) => {
                        debug!("value({id}): nested partial cannot be unwrapped: {cause}");
                        Err(PartialError::FoundUnwrappablePartial {
                            key: id,
                            partial: nested.to_unwrappable(),
                            cause: Box::new(cause),
                        })
                    }
                }
            }
            None => match self.backing.as_deref() {
                Some(backing) => {
                    trace!("value({id}): reading backing instance");
                    Ok(key.read(backing).clone())
                }
                None => {
                    trace!("value({id}): not set");
                    Err(PartialError::KeyPathNotSet { key: id })
                }
            },
        }
    }

    /// Best-effort version of [`Partial::value`]: any error becomes `None`.
    ///
    /// For an `Option` property this returns `Some(None)` when the property
    /// was explicitly set to `None`, and `None` when it is not known.
    pub fn get<V: Property>(&self, key: &Key<W, V>) -> Option<V> {
        self.value(key).ok()
    }

    /// A partial of the property behind `key`. Never fails.
    ///
    /// - a recorded nested partial is returned unchanged;
    /// - a recorded value becomes the backing of a new partial;
    /// - an unset key with a backing instance yields a partial backed by the
    ///   backing's property;
    /// - otherwise the result is empty.
    ///
    /// A nested partial recorded with [`Partial::set_optional_nested_partial`]
    /// is a `Partial<T>`, which cannot be returned as a `Partial<Option<T>>`:
    /// it is unwrapped and the result backed by `Some(t)`, or empty if it
    /// cannot be unwrapped. Use [`Partial::optional_partial_value`] to get
    /// the recorded partial itself.
    pub fn partial_value<V: Property>(&self, key: &Key<W, V>) -> Partial<V> {
        let id = key.id();
        match self.slots.get(&id) {
            Some(Slot::Value(stored)) => {
                Partial::from_backing(slot::downcast_ref::<V>(&**stored, &id).clone())
            }
            Some(Slot::Nested(nested)) => {
                match nested.partial().as_any().downcast_ref::<Partial<V>>() {
                    Some(partial) => partial.clone(),
                    // An optional key holds a `Partial<T>`, not a `Partial<Option<T>>`.
                    None => match nested.unwrap_any() {
                        Ok(unwrapped) => Partial::from_backing(slot::downcast_box::<V>(unwrapped, &id)),
                        Err(_) => {
                            debug!("partial_value({id}): optional nested partial cannot be unwrapped");
                            Partial::new()
                        }
                    },
                }
            }
            None => match self.backing.as_deref() {
                Some(backing) => Partial::from_backing(key.read(backing).clone()),
                None => Partial::new(),
            },
        }
    }

    /// [`Partial::partial_value`] for an `Option` property, looking through
    /// the `Option`: `Some(v)` becomes the backing of the result and `None`
    /// yields an empty partial.
    pub fn optional_partial_value<T: Property>(&self, key: &Key<W, Option<T>>) -> Partial<T> {
        let id = key.id();
        match self.slots.get(&id) {
            Some(Slot::Value(stored)) => {
                match slot::downcast_ref::<Option<T>>(&**stored, &id) {
                    Some(value) => Partial::from_backing(value.clone()),
                    None => Partial::new(),
                }
            }
            Some(Slot::Nested(nested)) => nested
                .partial()
                .as_any()
                .downcast_ref::<Partial<T>>()
                .cloned()
                .unwrap_or_default(),
            None => match self.backing.as_deref().and_then(|backing| key.read(backing).as_ref()) {
                Some(value) => Partial::from_backing(value.clone()),
                None => Partial::new(),
            },
        }
    }

    /// Record `value` for `key`, replacing whatever was there.
    pub fn set_value<V: Property>(&mut self, key: &Key<W, V>, value: V) {
        let id = key.id();
        trace!("set_value({id})");
        self.slots.insert(id, Slot::Value(Box::new(value)));
    }

    /// Chaining form of [`Partial::set_value`].
    pub fn with_value<V: Property>(mut self, key: &Key<W, V>, value: V) -> Self {
        self.set_value(key, value);
        self
    }

    /// Record a nested partial for `key`, replacing whatever was there.
    ///
    /// The nested partial is unwrapped when the value is read.
    pub fn set_nested_partial<V: FromPartial>(&mut self, key: &Key<W, V>, partial: Partial<V>) {
        let id = key.id();
        trace!("set_nested_partial({id})");
        let nested = NestedPartial::new(partial, core::convert::identity::<V>);
        self.slots.insert(id, Slot::Nested(Box::new(nested)));
    }

    /// Record a nested partial for an `Option` property. Reading the key
    /// yields `Some` of the unwrapped value.
    pub fn set_optional_nested_partial<T: FromPartial>(
        &mut self,
        key: &Key<W, Option<T>>,
        partial: Partial<T>,
    ) {
        let id = key.id();
        trace!("set_optional_nested_partial({id})");
        let nested = NestedPartial::new(partial, Some::<T>);
        self.slots.insert(id, Slot::Nested(Box::new(nested)));
    }

    /// Reset `key` to unset. The backing instance is not touched, so reads
    /// fall back to it again.
    pub fn remove_value<V: 'static>(&mut self, key: &Key<W, V>) {
        let id = key.id();
        trace!("remove_value({id})");
        self.slots.remove(&id);
    }
}

impl<W: FromPartial> Partial<W> {
    /// Unwrap this partial into a `W`.
    pub fn build(&self) -> Result<W, PartialError> {
        W::from_partial(self)
    }
}

impl<W> Default for Partial<W> {
    fn default() -> Self {
        Self::new()
    }
}

impl<W> Clone for Partial<W> {
    fn clone(&self) -> Self {
        Self {
            slots: self.slots.clone(),
            backing: self.backing.clone(),
        }
    }
}

impl<W> From<W> for Partial<W> {
    fn from(backing: W) -> Self {
        Self::from_backing(backing)
    }
}

impl<W: PartialEq> PartialEq for Partial<W> {
    fn eq(&self, other: &Self) -> bool {
        self.slots == other.slots && self.backing == other.backing
    }
}

impl<W: fmt::Debug> fmt::Debug for Partial<W> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        struct Slots<'a>(&'a BTreeMap<KeyId, Slot>);

        impl fmt::Debug for Slots<'_> {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.debug_map()
                    .entries(self.0.iter().map(|(id, slot)| (id.name(), slot)))
                    .finish()
            }
        }

        f.debug_struct("Partial")
            .field("slots", &Slots(&self.slots))
            .field("backing", &self.backing.as_deref())
            .finish()
    }
}

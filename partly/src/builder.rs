//! A [`Partial`] that reports its changes to subscribers.

use alloc::boxed::Box;
use alloc::vec::Vec;
use core::fmt;
use core::ops::Deref;

use crate::{FromPartial, Key, KeyId, Partial, Property, trace};

/// What happened to a key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ChangeKind {
    /// A value was recorded.
    Set,
    /// A nested partial was recorded.
    NestedSet,
    /// The key went back to unset.
    Removed,
}

/// Passed to [`PartialBuilder::subscribe`] callbacks.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KeyUpdate {
    /// The key that changed.
    pub key: KeyId,
    /// How it changed.
    pub kind: ChangeKind,
}

/// Passed to [`PartialBuilder::subscribe_to`] callbacks.
///
/// Values are resolved best-effort, as with [`Partial::get`]: a key that
/// could not be resolved before or after the change reads as `None`.
#[derive(Debug, Clone, PartialEq)]
pub struct PropertyUpdate<V> {
    /// The key that changed.
    pub key: KeyId,
    /// How it changed.
    pub kind: ChangeKind,
    /// The resolved value before the change.
    pub old_value: Option<V>,
    /// The resolved value after the change.
    pub new_value: Option<V>,
}

/// Handle returned when subscribing, used to unsubscribe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Subscription(u64);

type Notify<W> = Box<dyn FnMut(&Partial<W>, &Partial<W>, KeyId, ChangeKind)>;

struct Subscriber<W> {
    subscription: Subscription,
    /// `None` for subscribers to every key.
    key: Option<KeyId>,
    notify: Notify<W>,
}

impl<W> Subscriber<W> {
    fn wants(&self, id: KeyId) -> bool {
        self.key.is_none_or(|key| key == id)
    }
}

/// Owns a [`Partial`] and calls back subscribers whenever one of its keys
/// changes.
///
/// Reads go through [`Deref`] to the inner partial; writes must go through
/// the builder so subscribers see them.
pub struct PartialBuilder<W> {
    partial: Partial<W>,
    subscribers: Vec<Subscriber<W>>,
    next_subscription: u64,
}

impl<W: 'static> PartialBuilder<W> {
    /// A builder over an empty partial.
    pub fn new() -> Self {
        Self::from(Partial::new())
    }

    /// A builder over a partial backed by `backing`.
    pub fn from_backing(backing: W) -> Self {
        Self::from(Partial::from_backing(backing))
    }

    /// The partial being built.
    pub fn partial(&self) -> &Partial<W> {
        &self.partial
    }

    /// Drop every subscriber and return the partial.
    pub fn into_partial(self) -> Partial<W> {
        self.partial
    }

    /// Call `on_change` after every change to any key.
    pub fn subscribe(&mut self, mut on_change: impl FnMut(&KeyUpdate) + 'static) -> Subscription {
        self.push(
            None,
            Box::new(
                move |_before: &Partial<W>, _after: &Partial<W>, key: KeyId, kind: ChangeKind| {
                    on_change(&KeyUpdate { key, kind })
                },
            ),
        )
    }

    /// Call `on_change` after every change to `key`, with the resolved
    /// value before and after the change.
    pub fn subscribe_to<V: Property>(
        &mut self,
        key: &Key<W, V>,
        mut on_change: impl FnMut(&PropertyUpdate<V>) + 'static,
    ) -> Subscription {
        let key = *key;
        self.push(
            Some(key.id()),
            Box::new(
                move |before: &Partial<W>, after: &Partial<W>, id: KeyId, kind: ChangeKind| {
                    on_change(&PropertyUpdate {
                        key: id,
                        kind,
                        old_value: before.get(&key),
                        new_value: after.get(&key),
                    })
                },
            ),
        )
    }

    /// Stop calling the subscriber behind `subscription`. Returns whether it
    /// was still subscribed.
    pub fn unsubscribe(&mut self, subscription: Subscription) -> bool {
        let before = self.subscribers.len();
        self.subscribers
            .retain(|subscriber| subscriber.subscription != subscription);
        self.subscribers.len() != before
    }

    /// Number of live subscriptions.
    pub fn subscriber_count(&self) -> usize {
        self.subscribers.len()
    }

    /// [`Partial::set_value`], then notify.
    pub fn set_value<V: Property>(&mut self, key: &Key<W, V>, value: V) {
        self.apply(key.id(), ChangeKind::Set, |partial| {
            partial.set_value(key, value)
        });
    }

    /// [`Partial::set_nested_partial`], then notify.
    pub fn set_nested_partial<V: FromPartial>(&mut self, key: &Key<W, V>, nested: Partial<V>) {
        self.apply(key.id(), ChangeKind::NestedSet, |partial| {
            partial.set_nested_partial(key, nested)
        });
    }

    /// [`Partial::set_optional_nested_partial`], then notify.
    pub fn set_optional_nested_partial<T: FromPartial>(
        &mut self,
        key: &Key<W, Option<T>>,
        nested: Partial<T>,
    ) {
        self.apply(key.id(), ChangeKind::NestedSet, |partial| {
            partial.set_optional_nested_partial(key, nested)
        });
    }

    /// [`Partial::remove_value`], then notify. Removing a key that is
    /// already unset changes nothing and notifies nobody.
    pub fn remove_value<V: 'static>(&mut self, key: &Key<W, V>) {
        if !self.partial.is_set(key) {
            return;
        }
        self.apply(key.id(), ChangeKind::Removed, |partial| {
            partial.remove_value(key)
        });
    }

    fn push(&mut self, key: Option<KeyId>, notify: Notify<W>) -> Subscription {
        let subscription = Subscription(self.next_subscription);
        self.next_subscription += 1;
        self.subscribers.push(Subscriber {
            subscription,
            key,
            notify,
        });
        subscription
    }

    fn apply(&mut self, id: KeyId, kind: ChangeKind, mutate: impl FnOnce(&mut Partial<W>)) {
        if !self.subscribers.iter().any(|subscriber| subscriber.wants(id)) {
            mutate(&mut self.partial);
            return;
        }

        let before = self.partial.clone();
        mutate(&mut self.partial);
        for subscriber in self.subscribers.iter_mut() {
            if subscriber.wants(id) {
                trace!("notifying {:?} of {kind:?} on `{id}`", subscriber.subscription);
                (subscriber.notify)(&before, &self.partial, id, kind);
            }
        }
    }
}

impl<W: 'static> Default for PartialBuilder<W> {
    fn default() -> Self {
        Self::new()
    }
}

impl<W> From<Partial<W>> for PartialBuilder<W> {
    fn from(partial: Partial<W>) -> Self {
        Self {
            partial,
            subscribers: Vec::new(),
            next_subscription: 0,
        }
    }
}

impl<W> Deref for PartialBuilder<W> {
    type Target = Partial<W>;

    fn deref(&self) -> &Partial<W> {
        &self.partial
    }
}

impl<W: fmt::Debug> fmt::Debug for PartialBuilder<W> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PartialBuilder")
            .field("partial", &self.partial)
            .field("subscribers", &self.subscribers.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use alloc::rc::Rc;
    use alloc::string::{String, ToString};
    use alloc::vec;
    use core::cell::RefCell;

    use partly_testhelpers::test;

    use super::*;
    use crate::PartialError;

    #[derive(Debug, Clone, PartialEq)]
    struct Settings {
        theme: String,
        font_size: u32,
    }

    impl Settings {
        const THEME: Key<Settings, String> = Key::new("theme", |s| &s.theme);
        const FONT_SIZE: Key<Settings, u32> = Key::new("font_size", |s| &s.font_size);
    }

    impl FromPartial for Settings {
        fn from_partial(partial: &Partial<Self>) -> Result<Self, PartialError> {
            Ok(Self {
                theme: partial.value(&Self::THEME)?,
                font_size: partial.value(&Self::FONT_SIZE)?,
            })
        }
    }

    fn defaults() -> Settings {
        Settings {
            theme: "light".to_string(),
            font_size: 12,
        }
    }

    #[test]
    fn subscribers_see_every_change() {
        let seen = Rc::new(RefCell::new(Vec::new()));
        let mut builder = PartialBuilder::<Settings>::new();
        builder.subscribe({
            let seen = Rc::clone(&seen);
            move |update| seen.borrow_mut().push(*update)
        });

        builder.set_value(&Settings::THEME, "dark".to_string());
        builder.remove_value(&Settings::THEME);
        builder.set_value(&Settings::FONT_SIZE, 14);

        assert_eq!(
            *seen.borrow(),
            vec![
                KeyUpdate {
                    key: Settings::THEME.id(),
                    kind: ChangeKind::Set
                },
                KeyUpdate {
                    key: Settings::THEME.id(),
                    kind: ChangeKind::Removed
                },
                KeyUpdate {
                    key: Settings::FONT_SIZE.id(),
                    kind: ChangeKind::Set
                },
            ]
        );
    }

    #[test]
    fn key_subscribers_get_old_and_new_values() {
        let seen = Rc::new(RefCell::new(Vec::new()));
        let mut builder = PartialBuilder::from_backing(defaults());
        builder.subscribe_to(&Settings::FONT_SIZE, {
            let seen = Rc::clone(&seen);
            move |update: &PropertyUpdate<u32>| {
                seen.borrow_mut()
                    .push((update.kind, update.old_value, update.new_value))
            }
        });

        builder.set_value(&Settings::THEME, "dark".to_string());
        builder.set_value(&Settings::FONT_SIZE, 16);
        builder.remove_value(&Settings::FONT_SIZE);

        assert_eq!(
            *seen.borrow(),
            vec![
                (ChangeKind::Set, Some(12), Some(16)),
                (ChangeKind::Removed, Some(16), Some(12)),
            ]
        );
    }

    #[test]
    fn removing_an_unset_key_is_silent() {
        let calls = Rc::new(RefCell::new(0));
        let mut builder = PartialBuilder::<Settings>::new();
        builder.subscribe({
            let calls = Rc::clone(&calls);
            move |_| *calls.borrow_mut() += 1
        });

        builder.remove_value(&Settings::THEME);
        assert_eq!(*calls.borrow(), 0);
    }

    #[derive(Debug, Clone, PartialEq)]
    struct Window {
        settings: Settings,
        fallback: Option<Settings>,
    }

    impl Window {
        const SETTINGS: Key<Window, Settings> = Key::new("settings", |w| &w.settings);
        const FALLBACK: Key<Window, Option<Settings>> = Key::new("fallback", |w| &w.fallback);
    }

    #[test]
    fn nested_sets_are_reported() {
        let seen = Rc::new(RefCell::new(Vec::new()));
        let mut builder = PartialBuilder::<Window>::new();
        builder.subscribe_to(&Window::SETTINGS, {
            let seen = Rc::clone(&seen);
            move |update: &PropertyUpdate<Settings>| {
                seen.borrow_mut().push((update.kind, update.new_value.clone()))
            }
        });

        builder.set_nested_partial(&Window::SETTINGS, Partial::new());
        builder.set_nested_partial(&Window::SETTINGS, Partial::from_backing(defaults()));
        builder.set_optional_nested_partial(&Window::FALLBACK, Partial::from_backing(defaults()));

        assert_eq!(
            *seen.borrow(),
            vec![
                (ChangeKind::NestedSet, None),
                (ChangeKind::NestedSet, Some(defaults())),
            ]
        );
        assert_eq!(builder.value(&Window::FALLBACK), Ok(Some(defaults())));
    }

    #[test]
    fn unsubscribe_stops_notifications() {
        let calls = Rc::new(RefCell::new(0));
        let mut builder = PartialBuilder::<Settings>::new();
        let subscription = builder.subscribe({
            let calls = Rc::clone(&calls);
            move |_| *calls.borrow_mut() += 1
        });

        builder.set_value(&Settings::FONT_SIZE, 10);
        assert!(builder.unsubscribe(subscription));
        assert!(!builder.unsubscribe(subscription));
        assert_eq!(builder.subscriber_count(), 0);
        builder.set_value(&Settings::FONT_SIZE, 11);

        assert_eq!(*calls.borrow(), 1);
        assert_eq!(builder.into_partial().get(&Settings::FONT_SIZE), Some(11));
    }

    #[test]
    fn reads_go_through_to_the_partial() {
        let mut builder = PartialBuilder::from(Partial::from_backing(defaults()));
        builder.set_value(&Settings::THEME, "dark".to_string());
        assert_eq!(builder.value(&Settings::THEME).as_deref(), Ok("dark"));
        assert_eq!(builder.partial().get(&Settings::FONT_SIZE), Some(12));
        assert_eq!(builder.len(), 1);
    }
}

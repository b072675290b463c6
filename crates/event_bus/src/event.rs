//! Event traits and subscription filters.
//!
//! Events travelling over an [`EventBus`](crate::EventBus) are plain tagged
//! values. Routing is decided from the event's discriminant alone, so there is
//! no runtime type inspection and no serialization on the hot path.

use std::fmt::Debug;

/// Core trait that all bus events must implement.
///
/// An event is an immutable tagged value: a discriminant returned by
/// [`BusEvent::kind`] plus a payload whose shape is fixed per kind. Events are
/// cloned once per matching subscriber and are never mutated after publication.
pub trait BusEvent: Clone + Send + Sync + Debug + 'static {
    /// Discriminant type used by subscribers to select a sub-stream.
    type Kind: Copy + Eq + Debug + Send + Sync + 'static;

    /// Returns the discriminant of this event.
    fn kind(&self) -> Self::Kind;
}

/// Predicate over event kinds, fixed at subscribe time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum KindFilter<K> {
    /// Accepts every event published on the bus
    Any,
    /// Accepts only the listed kinds
    OneOf(Vec<K>),
}

impl<K: Copy + Eq> KindFilter<K> {
    /// Accepts every kind.
    pub fn any() -> Self {
        Self::Any
    }

    /// Accepts a single kind.
    pub fn only(kind: K) -> Self {
        Self::OneOf(vec![kind])
    }

    /// Accepts any of the given kinds.
    pub fn one_of(kinds: impl IntoIterator<Item = K>) -> Self {
        Self::OneOf(kinds.into_iter().collect())
    }

    /// Returns `true` if an event of `kind` belongs to this sub-stream.
    #[inline]
    pub fn matches(&self, kind: K) -> bool {
        match self {
            Self::Any => true,
            Self::OneOf(kinds) => kinds.contains(&kind),
        }
    }
}

//! The typed, multi-producer / multi-subscriber event bus.
//!
//! Each subscriber owns a bounded delivery queue. `publish` never waits: it
//! offers the event to every matching queue and returns. A full queue is
//! reported back to the producer as [`BusError::SubscriberSaturated`] naming the
//! slow subscriber, while every other subscriber still receives the event.
//! Events are never dropped silently and never evicted from a queue.

use crate::error::BusError;
use crate::event::{BusEvent, KindFilter};
use crate::stats::{BusCounters, BusStats};
use futures::Stream;
use std::pin::Pin;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::task::{Context, Poll};
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;
use tracing::{debug, error, trace};

/// Outcome of offering an event to a subscriber queue.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum OfferError {
    /// The queue is at capacity
    Full,
    /// The consumer is gone; the slot can be pruned
    Closed,
}

impl<T> From<TrySendError<T>> for OfferError {
    fn from(err: TrySendError<T>) -> Self {
        match err {
            TrySendError::Full(_) => Self::Full,
            TrySendError::Closed(_) => Self::Closed,
        }
    }
}

/// Delivery end of a subscription. Implementations must never block.
pub(crate) trait Sink<E>: Send + Sync {
    fn offer(&self, event: E) -> Result<(), OfferError>;
}

impl<E: Send> Sink<E> for mpsc::Sender<E> {
    fn offer(&self, event: E) -> Result<(), OfferError> {
        self.try_send(event).map_err(OfferError::from)
    }
}

struct Slot<E: BusEvent> {
    name: String,
    filter: KindFilter<E::Kind>,
    sink: Box<dyn Sink<E>>,
}

/// A typed publish/subscribe channel for one logical domain.
///
/// Delivery for a single `publish` happens inside one critical section, so
/// all subscribers observe the same relative order of any two events: the
/// order in which their `publish` calls completed. The critical section only
/// covers non-blocking queue pushes.
pub struct EventBus<E: BusEvent> {
    name: String,
    queue_capacity: usize,
    slots: Mutex<Vec<Slot<E>>>,
    closed: AtomicBool,
    counters: BusCounters,
}

impl<E: BusEvent> std::fmt::Debug for EventBus<E> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventBus")
            .field("name", &self.name)
            .field("queue_capacity", &self.queue_capacity)
            .field("closed", &self.is_closed())
            .finish()
    }
}

impl<E: BusEvent> EventBus<E> {
    /// Creates an empty bus. `queue_capacity` bounds each plain subscriber's
    /// queue and is clamped to at least one.
    pub fn new(name: impl Into<String>, queue_capacity: usize) -> Self {
        Self {
            name: name.into(),
            queue_capacity: queue_capacity.max(1),
            slots: Mutex::new(Vec::new()),
            closed: AtomicBool::new(false),
            counters: BusCounters::default(),
        }
    }

    /// Name of this bus, used in logs and errors.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns true once [`EventBus::close`] has been called.
    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    /// Publishes an event to every subscriber whose filter matches its kind.
    ///
    /// Returns the number of subscribers the event was queued for.
    ///
    /// # Errors
    ///
    /// * [`BusError::Closed`] if the bus has been closed.
    /// * [`BusError::SubscriberSaturated`] if at least one matching subscriber
    ///   had a full queue. The first such subscriber is named; every other
    ///   matching subscriber still received the event.
    pub fn publish(&self, event: E) -> Result<usize, BusError> {
        let kind = event.kind();
        let mut slots = self.lock_slots();
        if self.is_closed() {
            return Err(BusError::Closed {
                bus: self.name.clone(),
            });
        }

        let mut delivered = 0usize;
        let mut saturated: Vec<String> = Vec::new();
        slots.retain(|slot| {
            if !slot.filter.matches(kind) {
                return true;
            }
            match slot.sink.offer(event.clone()) {
                Ok(()) => {
                    delivered += 1;
                    true
                }
                Err(OfferError::Full) => {
                    saturated.push(slot.name.clone());
                    true
                }
                Err(OfferError::Closed) => {
                    debug!("🧹 Pruning closed subscriber '{}' from bus '{}'", slot.name, self.name);
                    false
                }
            }
        });
        drop(slots);

        self.counters.record(delivered, saturated.len());
        trace!("📤 Bus '{}' delivered {:?} to {} subscriber(s)", self.name, kind, delivered);

        match saturated.into_iter().next() {
            None => Ok(delivered),
            Some(subscriber) => {
                error!(
                    "🔥 Subscriber '{}' on bus '{}' is saturated, {:?} event was not queued for it",
                    subscriber, self.name, kind
                );
                Err(BusError::SubscriberSaturated {
                    bus: self.name.clone(),
                    subscriber,
                })
            }
        }
    }

    /// Derives a private, ordered sub-stream of events whose kind matches `filter`.
    ///
    /// Subscribing to a closed bus yields a subscription that is already finished.
    pub fn subscribe(&self, name: impl Into<String>, filter: KindFilter<E::Kind>) -> Subscription<E> {
        let name = name.into();
        let (sender, receiver) = mpsc::channel(self.queue_capacity);
        self.attach(name.clone(), filter, Box::new(sender));
        Subscription { name, receiver }
    }

    pub(crate) fn attach(&self, name: String, filter: KindFilter<E::Kind>, sink: Box<dyn Sink<E>>) {
        let mut slots = self.lock_slots();
        if self.is_closed() {
            debug!("Bus '{}' is closed, subscription '{}' starts finished", self.name, name);
            return;
        }
        debug!("📝 '{}' subscribed to bus '{}' with filter {:?}", name, self.name, filter);
        slots.push(Slot { name, filter, sink });
    }

    /// Closes the bus. Further publishes fail with [`BusError::Closed`]; every
    /// subscriber sees end-of-stream once it has drained what was already queued.
    pub fn close(&self) {
        let mut slots = self.lock_slots();
        if !self.closed.swap(true, Ordering::AcqRel) {
            let dropped = slots.len();
            slots.clear();
            debug!("🔒 Bus '{}' closed, released {} subscriber(s)", self.name, dropped);
        }
    }

    /// Number of subscribers currently attached.
    pub fn subscriber_count(&self) -> usize {
        self.lock_slots().len()
    }

    /// Returns a snapshot of this bus's counters.
    pub fn stats(&self) -> BusStats {
        let subscribers = self.subscriber_count();
        self.counters.snapshot(&self.name, subscribers)
    }

    fn lock_slots(&self) -> MutexGuard<'_, Vec<Slot<E>>> {
        // Slot pushes cannot leave the vector half-updated, so a poisoned lock is still usable.
        self.slots.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// A subscriber's private, ordered stream of matching events.
///
/// Dropping the subscription detaches it from the bus at the next publish.
#[derive(Debug)]
pub struct Subscription<E> {
    name: String,
    receiver: mpsc::Receiver<E>,
}

impl<E> Subscription<E> {
    /// Name given at subscribe time.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Waits for the next event. Returns `None` once the bus is closed and
    /// every queued event has been received.
    pub async fn recv(&mut self) -> Option<E> {
        self.receiver.recv().await
    }

    /// Returns the next queued event without waiting.
    pub fn try_recv(&mut self) -> Option<E> {
        self.receiver.try_recv().ok()
    }

    /// Number of events waiting in this subscriber's queue.
    pub fn pending(&self) -> usize {
        self.receiver.len()
    }
}

impl<E> Stream for Subscription<E> {
    type Item = E;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<E>> {
        self.receiver.poll_recv(cx)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tests::{Tick, TickKind};
    use futures::StreamExt;

    #[tokio::test]
    async fn test_filtered_subscription_receives_matching_kinds_only() {
        let bus = EventBus::new("ticks", 16);
        let mut evens = bus.subscribe("evens", KindFilter::only(TickKind::Even));
        let mut all = bus.subscribe("all", KindFilter::any());

        for n in 0..4 {
            bus.publish(Tick::new(0, n)).expect("publish should succeed");
        }
        bus.close();

        let even_seqs: Vec<u64> = (&mut evens).map(|tick| tick.seq).collect().await;
        let all_seqs: Vec<u64> = (&mut all).map(|tick| tick.seq).collect().await;
        assert_eq!(even_seqs, vec![0, 2]);
        assert_eq!(all_seqs, vec![0, 1, 2, 3]);
    }

    #[tokio::test]
    async fn test_publish_reports_saturated_subscriber_but_delivers_to_others() {
        let bus = EventBus::new("ticks", 1);
        let mut slow = bus.subscribe("slow", KindFilter::any());
        let mut fast = bus.subscribe("fast", KindFilter::any());

        assert_eq!(bus.publish(Tick::new(0, 0)), Ok(2));
        assert_eq!(fast.recv().await.map(|t| t.seq), Some(0));

        let err = bus.publish(Tick::new(0, 1)).expect_err("slow queue is full");
        assert_eq!(
            err,
            BusError::SubscriberSaturated {
                bus: "ticks".into(),
                subscriber: "slow".into(),
            }
        );
        assert_eq!(fast.try_recv().map(|t| t.seq), Some(1));
        assert_eq!(slow.try_recv().map(|t| t.seq), Some(0));
        assert!(slow.try_recv().is_none());
        assert_eq!(bus.stats().saturations, 1);
    }

    #[tokio::test]
    async fn test_dropped_subscription_is_pruned() {
        let bus = EventBus::new("ticks", 4);
        let kept = bus.subscribe("kept", KindFilter::any());
        let dropped = bus.subscribe("dropped", KindFilter::any());
        assert_eq!(bus.subscriber_count(), 2);

        drop(dropped);
        assert_eq!(bus.publish(Tick::new(0, 0)), Ok(1));
        assert_eq!(bus.subscriber_count(), 1);
        assert_eq!(kept.pending(), 1);
    }

    #[tokio::test]
    async fn test_closed_bus_rejects_publish_and_finishes_streams() {
        let bus = EventBus::new("ticks", 4);
        let mut early = bus.subscribe("early", KindFilter::any());
        bus.publish(Tick::new(0, 7)).expect("publish before close");
        bus.close();

        assert_eq!(
            bus.publish(Tick::new(0, 8)),
            Err(BusError::Closed { bus: "ticks".into() })
        );
        assert_eq!(early.recv().await.map(|t| t.seq), Some(7));
        assert!(early.recv().await.is_none());

        let mut late = bus.subscribe("late", KindFilter::any());
        assert!(late.recv().await.is_none());
        assert_eq!(bus.subscriber_count(), 0);
    }

    #[test]
    fn test_publish_without_subscribers_counts_zero_deliveries() {
        let bus: EventBus<Tick> = EventBus::new("ticks", 0);
        assert_eq!(bus.publish(Tick::new(0, 0)), Ok(0));
        let stats = bus.stats();
        assert_eq!(stats.events_published, 1);
        assert_eq!(stats.deliveries, 0);
        assert_eq!(stats.name, "ticks");
    }
}

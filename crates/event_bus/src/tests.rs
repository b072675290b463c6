//! Shared fixtures and cross-module ordering tests.

use crate::{BusEvent, EventBus, Handler, KindFilter};
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

/// Test event: a sequence number stamped by a numbered producer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct Tick {
    pub producer: u32,
    pub seq: u64,
}

impl Tick {
    pub(crate) fn new(producer: u32, seq: u64) -> Self {
        Self { producer, seq }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum TickKind {
    Even,
    Odd,
}

impl BusEvent for Tick {
    type Kind = TickKind;

    fn kind(&self) -> TickKind {
        if self.seq % 2 == 0 {
            TickKind::Even
        } else {
            TickKind::Odd
        }
    }
}

const PRODUCERS: u32 = 8;
const PER_PRODUCER: u64 = 500;

fn assert_per_producer_order(ticks: &[Tick]) {
    let mut last: HashMap<u32, u64> = HashMap::new();
    for tick in ticks {
        if let Some(previous) = last.insert(tick.producer, tick.seq) {
            assert!(
                previous < tick.seq,
                "producer {} reordered: {} observed after {}",
                tick.producer,
                tick.seq,
                previous
            );
        }
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_producers_keep_per_producer_order_for_every_subscriber() {
    let bus = Arc::new(EventBus::new("ticks", (PRODUCERS as usize) * (PER_PRODUCER as usize)));
    let mut first = bus.subscribe("first", KindFilter::any());
    let mut second = bus.subscribe("second", KindFilter::any());

    let producers: Vec<_> = (0..PRODUCERS)
        .map(|producer| {
            let bus = Arc::clone(&bus);
            tokio::spawn(async move {
                for seq in 0..PER_PRODUCER {
                    bus.publish(Tick::new(producer, seq)).expect("queue is large enough");
                    if seq % 64 == 0 {
                        tokio::task::yield_now().await;
                    }
                }
            })
        })
        .collect();
    for producer in producers {
        producer.await.expect("producer task panicked");
    }
    bus.close();

    let mut seen_first = Vec::new();
    while let Some(tick) = first.recv().await {
        seen_first.push(tick);
    }
    let mut seen_second = Vec::new();
    while let Some(tick) = second.recv().await {
        seen_second.push(tick);
    }

    assert_eq!(seen_first.len() as u64, PRODUCERS as u64 * PER_PRODUCER);
    assert_per_producer_order(&seen_first);
    // Both subscribers observe the same global publish order.
    assert_eq!(seen_first, seen_second);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_handler_processes_concurrent_stream_sequentially() {
    let bus = Arc::new(EventBus::new("ticks", 16));
    // Tracked outside the handler state, so overlapping callbacks would show up here.
    let in_flight = Arc::new(AtomicUsize::new(0));
    let max_in_flight = Arc::new(AtomicUsize::new(0));
    let handle = {
        let in_flight = Arc::clone(&in_flight);
        let max_in_flight = Arc::clone(&max_in_flight);
        Handler::new("sequential", Vec::new())
            .on(&bus, KindFilter::any(), move |seen: &mut Vec<Tick>, tick: Tick| {
                let now = in_flight.fetch_add(1, Ordering::SeqCst) + 1;
                max_in_flight.fetch_max(now, Ordering::SeqCst);
                std::thread::yield_now();
                seen.push(tick);
                in_flight.fetch_sub(1, Ordering::SeqCst);
                Ok(())
            })
            .start()
    };

    let producers: Vec<_> = (0..PRODUCERS)
        .map(|producer| {
            let bus = Arc::clone(&bus);
            tokio::spawn(async move {
                for seq in 0..PER_PRODUCER {
                    // The default mailbox holds every tick, so the handler never saturates.
                    bus.publish(Tick::new(producer, seq)).expect("mailbox has room");
                    if seq % 32 == 0 {
                        tokio::task::yield_now().await;
                    }
                }
            })
        })
        .collect();
    for producer in producers {
        producer.await.expect("producer task panicked");
    }

    let seen = handle.stop().await.expect("handler stops cleanly");
    assert_eq!(seen.len() as u64, PRODUCERS as u64 * PER_PRODUCER);
    assert_eq!(max_in_flight.load(Ordering::SeqCst), 1);
    assert_per_producer_order(&seen);
}

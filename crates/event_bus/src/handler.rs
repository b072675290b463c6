//! Serialized handlers: one mailbox, one worker, one callback at a time.
//!
//! A [`Handler`] subscribes to filtered sub-streams of any number of buses.
//! Every subscription delivers into the same bounded FIFO mailbox, so events
//! are merged by arrival while each bus's own order is preserved. A single
//! tokio task drains the mailbox and runs the matching callback with exclusive
//! access to the handler's state.
//!
//! # Lifecycle
//!
//! ```text
//! Handler::new(..).on(..).on(..)  ──start()──►  HandlerHandle  ──stop()──►  final state
//!        (subscriptions fixed)                (worker running)          (mailbox drained)
//! ```
//!
//! Subscriptions are attached while building, so nothing published after
//! `on(..)` returns can be missed; events queued before `start()` are
//! processed first.
//!
//! # Shutdown policy
//!
//! [`HandlerHandle::stop`] drains: the mailbox stops accepting deliveries, every
//! event already queued is processed, then the worker returns its state.

use crate::bus::{EventBus, OfferError, Sink};
use crate::error::HandlerError;
use crate::event::{BusEvent, KindFilter};
use crate::shutdown::ShutdownState;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

/// Default mailbox capacity for handlers built with [`Handler::new`].
pub const DEFAULT_MAILBOX_CAPACITY: usize = 10_000;

type Job<S> = Box<dyn FnOnce(&mut S) -> Result<(), HandlerError> + Send>;
type Callback<S, E> = Arc<dyn Fn(&mut S, E) -> Result<(), HandlerError> + Send + Sync>;

/// Bus-side end of a handler subscription: turns an event into a mailbox job.
struct MailboxSink<S, E> {
    mailbox: mpsc::Sender<Job<S>>,
    callback: Callback<S, E>,
}

impl<S, E> Sink<E> for MailboxSink<S, E>
where
    S: Send + 'static,
    E: BusEvent,
{
    fn offer(&self, event: E) -> Result<(), OfferError> {
        let callback = Arc::clone(&self.callback);
        let job: Job<S> = Box::new(move |state: &mut S| callback(state, event));
        self.mailbox.try_send(job).map_err(OfferError::from)
    }
}

/// A named actor that owns state `S` and processes its events sequentially.
///
/// Callbacks are synchronous and receive `&mut S`; because only the worker
/// ever touches the state, handler bodies need no locking.
pub struct Handler<S> {
    name: String,
    state: S,
    mailbox_tx: mpsc::Sender<Job<S>>,
    mailbox_rx: mpsc::Receiver<Job<S>>,
    shutdown: Option<ShutdownState>,
    subscriptions: usize,
}

impl<S: Send + 'static> Handler<S> {
    /// Creates a handler with the default mailbox capacity.
    pub fn new(name: impl Into<String>, state: S) -> Self {
        Self::with_capacity(name, state, DEFAULT_MAILBOX_CAPACITY)
    }

    /// Creates a handler whose mailbox holds at most `capacity` pending events
    /// (clamped to at least one).
    pub fn with_capacity(name: impl Into<String>, state: S, capacity: usize) -> Self {
        let (mailbox_tx, mailbox_rx) = mpsc::channel(capacity.max(1));
        Self {
            name: name.into(),
            state,
            mailbox_tx,
            mailbox_rx,
            shutdown: None,
            subscriptions: 0,
        }
    }

    /// Initiates process shutdown through `shutdown` if a callback fails fatally.
    pub fn with_shutdown(mut self, shutdown: ShutdownState) -> Self {
        self.shutdown = Some(shutdown);
        self
    }

    /// Subscribes to events of `bus` matching `filter`, handled by `callback`.
    pub fn on<E, F>(mut self, bus: &EventBus<E>, filter: KindFilter<E::Kind>, callback: F) -> Self
    where
        E: BusEvent,
        F: Fn(&mut S, E) -> Result<(), HandlerError> + Send + Sync + 'static,
    {
        let sink = MailboxSink {
            mailbox: self.mailbox_tx.clone(),
            callback: Arc::new(callback),
        };
        bus.attach(self.name.clone(), filter, Box::new(sink));
        self.subscriptions += 1;
        self
    }

    /// Starts the worker. No further subscriptions can be added afterwards.
    pub fn start(self) -> HandlerHandle<S> {
        let Handler {
            name,
            state,
            mailbox_tx,
            mailbox_rx,
            shutdown,
            subscriptions,
        } = self;
        // Only bus slots keep the mailbox open from here on.
        drop(mailbox_tx);

        let processed = Arc::new(AtomicU64::new(0));
        let (stop_tx, stop_rx) = oneshot::channel();
        info!("▶️ Handler '{}' started with {} subscription(s)", name, subscriptions);

        let worker = Worker {
            name: name.clone(),
            processed: Arc::clone(&processed),
            shutdown,
        };
        let task = tokio::spawn(worker.run(state, mailbox_rx, stop_rx));

        HandlerHandle {
            name,
            stop_tx,
            task,
            processed,
        }
    }
}

struct Worker {
    name: String,
    processed: Arc<AtomicU64>,
    shutdown: Option<ShutdownState>,
}

impl Worker {
    async fn run<S>(
        self,
        mut state: S,
        mut mailbox: mpsc::Receiver<Job<S>>,
        mut stop_rx: oneshot::Receiver<()>,
    ) -> S {
        loop {
            tokio::select! {
                biased;
                // A dropped handle counts as a stop request.
                _ = &mut stop_rx => {
                    mailbox.close();
                    let mut drained = 0usize;
                    while let Some(job) = mailbox.recv().await {
                        drained += 1;
                        if !self.execute(&mut state, job) {
                            self.discard_after_fatal(&mut mailbox);
                            break;
                        }
                    }
                    info!("⏹️ Handler '{}' stopped after draining {} queued event(s)", self.name, drained);
                    return state;
                }
                job = mailbox.recv() => match job {
                    Some(job) => {
                        if !self.execute(&mut state, job) {
                            self.discard_after_fatal(&mut mailbox);
                            return state;
                        }
                    }
                    None => {
                        debug!("Handler '{}' mailbox closed by every bus", self.name);
                        return state;
                    }
                }
            }
        }
    }

    /// Closes the mailbox after a fatal error and reports how many queued jobs
    /// will never run.
    fn discard_after_fatal<S>(&self, mailbox: &mut mpsc::Receiver<Job<S>>) -> usize {
        mailbox.close();
        let discarded = mailbox.len();
        if discarded > 0 {
            warn!("Handler '{}' discarded {} queued event(s) after a fatal error", self.name, discarded);
        }
        discarded
    }

    /// Runs one job. Returns false if the handler must stop.
    fn execute<S>(&self, state: &mut S, job: Job<S>) -> bool {
        self.processed.fetch_add(1, Ordering::Relaxed);
        match job(state) {
            Ok(()) => true,
            Err(e) if e.is_fatal() => {
                error!("💥 Handler '{}' failed fatally: {}", self.name, e);
                if let Some(shutdown) = &self.shutdown {
                    shutdown.initiate_shutdown();
                }
                false
            }
            Err(e) => {
                warn!("Handler '{}' callback error: {}", self.name, e);
                true
            }
        }
    }
}

/// Control handle for a running [`Handler`].
///
/// Dropping the handle stops the handler with the same drain policy as
/// [`HandlerHandle::stop`], without waiting for it.
#[derive(Debug)]
pub struct HandlerHandle<S> {
    name: String,
    stop_tx: oneshot::Sender<()>,
    task: JoinHandle<S>,
    processed: Arc<AtomicU64>,
}

impl<S> HandlerHandle<S> {
    /// Name of the handler.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Number of events processed so far.
    pub fn processed(&self) -> u64 {
        self.processed.load(Ordering::Relaxed)
    }

    /// Returns true if the worker has exited, e.g. after a fatal error.
    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }

    /// Stops accepting deliveries, drains the mailbox and returns the final state.
    pub async fn stop(self) -> Result<S, HandlerError> {
        let HandlerHandle {
            name,
            stop_tx,
            task,
            ..
        } = self;
        // The worker may already be gone after a fatal error.
        let _ = stop_tx.send(());
        task.await.map_err(|e| HandlerError::Join {
            handler: name,
            reason: e.to_string(),
        })
    }
}

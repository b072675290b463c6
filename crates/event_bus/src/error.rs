//! Error types for buses and handlers.

/// Errors returned by [`EventBus::publish`](crate::EventBus::publish).
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum BusError {
    /// The bus has been closed; shutdown is in progress
    #[error("Event bus '{bus}' is closed")]
    Closed { bus: String },

    /// A subscriber's delivery queue is full. Every other matching subscriber
    /// still received the event; only the named subscriber missed it.
    #[error("Subscriber '{subscriber}' on event bus '{bus}' is saturated")]
    SubscriberSaturated { bus: String, subscriber: String },
}

/// Errors produced by handler callbacks and handler lifecycle operations.
#[derive(Debug, thiserror::Error)]
pub enum HandlerError {
    /// Unrecoverable condition; the handler stops processing
    #[error("Fatal handler error: {0}")]
    Fatal(String),

    /// Publishing from inside a callback failed
    #[error("Bus error: {0}")]
    Bus(#[from] BusError),

    /// A single event could not be processed; the handler keeps running
    #[error("Callback error: {0}")]
    Callback(String),

    /// The worker task panicked or was cancelled
    #[error("Handler '{handler}' worker failed: {reason}")]
    Join { handler: String, reason: String },
}

impl HandlerError {
    /// Returns `true` if the error must stop the handler.
    ///
    /// A saturated downstream subscriber is fatal: dropping the event would
    /// silently corrupt client-visible state. A closed bus is not, it only
    /// means shutdown has started.
    pub fn is_fatal(&self) -> bool {
        match self {
            Self::Fatal(_) | Self::Join { .. } => true,
            Self::Bus(BusError::SubscriberSaturated { .. }) => true,
            Self::Bus(BusError::Closed { .. }) | Self::Callback(_) => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fatality_classification() {
        assert!(HandlerError::Fatal("stuck".into()).is_fatal());
        assert!(HandlerError::from(BusError::SubscriberSaturated {
            bus: "runtime".into(),
            subscriber: "gateway".into(),
        })
        .is_fatal());
        assert!(!HandlerError::from(BusError::Closed { bus: "runtime".into() }).is_fatal());
        assert!(!HandlerError::Callback("bad payload".into()).is_fatal());
    }

    #[test]
    fn test_error_messages_name_the_subscriber() {
        let err = BusError::SubscriberSaturated {
            bus: "transport".into(),
            subscriber: "gateway".into(),
        };
        assert_eq!(
            err.to_string(),
            "Subscriber 'gateway' on event bus 'transport' is saturated"
        );
    }
}

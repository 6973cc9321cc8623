//! Outbound delivery
//!
//! The router addresses peers by [`ConnectionId`] only. Whatever owns the
//! sockets implements [`Outbox`]; the server uses [`ConnectionHub`], which
//! keeps one bounded queue per connection drained by that connection's
//! writer task.

use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock};

use tokio::sync::mpsc;

use crate::error::SignalError;
use crate::protocol::Envelope;
use crate::registry::ConnectionId;

/// Sink for envelopes addressed to a connection
///
/// Delivery is best effort and must not block: a failed delivery is
/// reported, never retried.
pub trait Outbox: Send + Sync {
    /// Hand an envelope to the transport of `to`
    fn deliver(&self, to: ConnectionId, envelope: Envelope) -> Result<(), SignalError>;
}

impl<T: Outbox + ?Sized> Outbox for Arc<T> {
    fn deliver(&self, to: ConnectionId, envelope: Envelope) -> Result<(), SignalError> {
        (**self).deliver(to, envelope)
    }
}

/// Map of live connections to their outbound queues
pub struct ConnectionHub {
    queues: RwLock<HashMap<ConnectionId, mpsc::Sender<Envelope>>>,
    capacity: usize,
}

impl ConnectionHub {
    /// Create a hub whose per-connection queues hold `capacity` envelopes
    pub fn new(capacity: usize) -> Self {
        Self {
            queues: RwLock::new(HashMap::new()),
            capacity: capacity.max(1),
        }
    }

    /// Register a connection, returning the receiving end of its queue
    ///
    /// Registering an id twice replaces the previous queue.
    pub fn register(&self, conn: ConnectionId) -> mpsc::Receiver<Envelope> {
        let (tx, rx) = mpsc::channel(self.capacity);
        self.queues
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(conn, tx);
        rx
    }

    /// Remove a connection; its writer task sees the queue close
    pub fn unregister(&self, conn: ConnectionId) {
        self.queues
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&conn);
    }

    /// Check if a connection is registered
    pub fn is_registered(&self, conn: ConnectionId) -> bool {
        self.queues
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .contains_key(&conn)
    }

    /// Number of registered connections
    pub fn connection_count(&self) -> usize {
        self.queues
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }
}

impl Outbox for ConnectionHub {
    fn deliver(&self, to: ConnectionId, envelope: Envelope) -> Result<(), SignalError> {
        let queues = self.queues.read().unwrap_or_else(PoisonError::into_inner);

        let Some(tx) = queues.get(&to) else {
            tracing::debug!(connection = %to, kind = %envelope.kind, "Delivery to unknown connection");
            return Err(SignalError::DeliveryFailure(to));
        };

        tx.try_send(envelope).map_err(|e| {
            let reason = match e {
                mpsc::error::TrySendError::Full(_) => "queue full",
                mpsc::error::TrySendError::Closed(_) => "queue closed",
            };
            tracing::debug!(connection = %to, reason = reason, "Delivery failed");
            SignalError::DeliveryFailure(to)
        })
    }
}

//! The push-channel seam: named-event delivery from backend to client.
//!
//! The store never talks to a concrete message bus. It subscribes through
//! the [`PushChannel`] trait and owns the returned [`Subscription`], a
//! handle pairing the event stream with an unsubscribe hook that fires
//! exactly once, on explicit [`close`](Subscription::close) or on drop.

use std::fmt;
use std::pin::Pin;

use async_trait::async_trait;
use tokio_stream::{Stream, StreamExt};

use crate::error::ChannelError;

/// A single message delivered on a push subscription.
#[derive(Debug, Clone)]
pub enum PushMessage {
    /// A named event carrying its raw JSON payload.
    ///
    /// For the application-states event the payload is a full snapshot;
    /// the store validates it and ignores anything malformed.
    Event(serde_json::Value),

    /// In-band signal that the channel dropped and re-established its
    /// transport underneath this subscription.
    ///
    /// Pushes emitted during the outage are gone. The store reacts by
    /// re-issuing a pull when configured to do so.
    Reconnected,
}

/// Boxed message stream yielded by a subscription.
type MessageStream = Pin<Box<dyn Stream<Item = PushMessage> + Send>>;

/// Hook invoked exactly once when the subscription is released.
type UnsubscribeFn = Box<dyn FnOnce() + Send>;

/// Ownership handle on one push-channel registration.
///
/// Exists exactly while the store has at least one observer and is
/// exclusively owned by the store's sync task. Dropping the handle (or
/// calling [`close`](Subscription::close)) releases the registration on
/// the channel; the hook never fires twice.
pub struct Subscription {
    stream: MessageStream,
    unsubscribe: Option<UnsubscribeFn>,
}

impl Subscription {
    /// Build a subscription from a message stream and an unsubscribe hook.
    ///
    /// # Arguments
    ///
    /// * `stream` - Messages delivered for the subscribed event name.
    /// * `unsubscribe` - Channel-side cleanup, run once on close or drop.
    pub fn new(
        stream: impl Stream<Item = PushMessage> + Send + 'static,
        unsubscribe: impl FnOnce() + Send + 'static,
    ) -> Self {
        Self {
            stream: Box::pin(stream),
            unsubscribe: Some(Box::new(unsubscribe)),
        }
    }

    /// Receive the next message, or `None` once the channel has dropped
    /// this subscription.
    pub async fn next(&mut self) -> Option<PushMessage> {
        self.stream.next().await
    }

    /// Release the registration explicitly instead of waiting for drop.
    pub fn close(mut self) {
        self.fire_unsubscribe();
    }

    fn fire_unsubscribe(&mut self) {
        if let Some(hook) = self.unsubscribe.take() {
            hook();
        }
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.fire_unsubscribe();
    }
}

impl fmt::Debug for Subscription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subscription")
            .field("released", &self.unsubscribe.is_none())
            .finish()
    }
}

/// Asynchronous named-event delivery from the backend.
///
/// Implementations own transport concerns entirely, including reconnection
/// after a drop; a reconnect is reported in-band as
/// [`PushMessage::Reconnected`] rather than by ending the stream. Ending
/// the stream means the subscription itself is gone and the caller must
/// subscribe again.
#[async_trait]
pub trait PushChannel: Send + Sync + 'static {
    /// Open a subscription for one named event.
    ///
    /// # Arguments
    ///
    /// * `event` - The event name to register for.
    ///
    /// # Errors
    ///
    /// Returns [`ChannelError`] if the registration cannot be established.
    async fn subscribe(&self, event: &str) -> Result<Subscription, ChannelError>;
}

#[cfg(test)]
pub(crate) mod test_fixtures {
    use std::collections::HashMap;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use parking_lot::Mutex;
    use tokio::sync::mpsc;
    use tokio_stream::wrappers::UnboundedReceiverStream;

    use super::*;

    /// In-process push channel for store tests.
    ///
    /// Counts subscribe and unsubscribe calls, can be scripted to fail the
    /// next N subscribe attempts, and delivers emitted payloads to every
    /// live subscription on the event name.
    pub(crate) struct MemoryChannel {
        topics: Mutex<HashMap<String, Vec<mpsc::UnboundedSender<PushMessage>>>>,
        subscribes: AtomicUsize,
        unsubscribes: Arc<AtomicUsize>,
        fail_subscribes: AtomicUsize,
    }

    impl MemoryChannel {
        pub(crate) fn new() -> Self {
            Self {
                topics: Mutex::new(HashMap::new()),
                subscribes: AtomicUsize::new(0),
                unsubscribes: Arc::new(AtomicUsize::new(0)),
                fail_subscribes: AtomicUsize::new(0),
            }
        }

        /// Make the next `n` subscribe attempts fail with `Unavailable`.
        pub(crate) fn fail_next_subscribes(&self, n: usize) {
            self.fail_subscribes.store(n, Ordering::SeqCst);
        }

        /// Deliver an event payload to every live subscription on `event`.
        pub(crate) fn emit(&self, event: &str, payload: serde_json::Value) {
            self.broadcast(event, PushMessage::Event(payload));
        }

        /// Deliver a reconnect signal to every live subscription on `event`.
        pub(crate) fn emit_reconnected(&self, event: &str) {
            self.broadcast(event, PushMessage::Reconnected);
        }

        /// Drop every live subscription on `event`, ending their streams.
        pub(crate) fn drop_subscriptions(&self, event: &str) {
            self.topics.lock().remove(event);
        }

        pub(crate) fn subscribe_count(&self) -> usize {
            self.subscribes.load(Ordering::SeqCst)
        }

        pub(crate) fn unsubscribe_count(&self) -> usize {
            self.unsubscribes.load(Ordering::SeqCst)
        }

        fn broadcast(&self, event: &str, message: PushMessage) {
            let mut topics = self.topics.lock();
            if let Some(senders) = topics.get_mut(event) {
                senders.retain(|tx| tx.send(message.clone()).is_ok());
            }
        }
    }

    #[async_trait]
    impl PushChannel for MemoryChannel {
        async fn subscribe(&self, event: &str) -> Result<Subscription, ChannelError> {
            let remaining = self.fail_subscribes.load(Ordering::SeqCst);
            if remaining > 0 {
                self.fail_subscribes.store(remaining - 1, Ordering::SeqCst);
                return Err(ChannelError::Unavailable("scripted failure".to_string()));
            }

            let (tx, rx) = mpsc::unbounded_channel();
            self.topics.lock().entry(event.to_string()).or_default().push(tx);
            self.subscribes.fetch_add(1, Ordering::SeqCst);

            let unsubscribes = Arc::clone(&self.unsubscribes);
            Ok(Subscription::new(UnboundedReceiverStream::new(rx), move || {
                unsubscribes.fetch_add(1, Ordering::SeqCst);
            }))
        }
    }
}

//! Sync configuration and the background subscription loop.
//!
//! This module provides [`SyncConfig`] for tuning reconnection and re-pull
//! behaviour, and the loop that the store spawns per activation: subscribe
//! to the push event, forward validated snapshots into the store, and
//! re-establish the subscription with exponential backoff when it is lost.

use std::sync::Arc;
use std::time::Duration;

use crate::channel::PushMessage;
use crate::state::{StateSnapshot, decode_snapshot};
use crate::store::StoreInner;

/// Configuration for the sync loop's reconnection and re-pull behaviour.
///
/// All fields have sensible defaults accessible via [`SyncConfig::default()`].
/// Pass to [`StateStoreBuilder::sync_config`](crate::StateStoreBuilder::sync_config)
/// to customize.
///
/// # Examples
///
/// ```
/// use std::time::Duration;
/// use appstate_sync::SyncConfig;
///
/// let config = SyncConfig {
///     reconnect_base_delay: Duration::from_millis(250),
///     ..SyncConfig::default()
/// };
/// assert_eq!(config.reconnect_base_delay, Duration::from_millis(250));
/// assert_eq!(config.reconnect_max_delay, Duration::from_secs(30));
/// assert!(config.repull_on_reconnect);
/// ```
#[derive(Debug, Clone)]
pub struct SyncConfig {
    /// Base delay for exponential backoff when subscribing fails or the
    /// subscription is lost.
    ///
    /// After a failure, the loop waits `reconnect_base_delay`, then
    /// `2 * reconnect_base_delay`, etc., up to
    /// [`reconnect_max_delay`](SyncConfig::reconnect_max_delay). A
    /// successful subscribe resets the backoff.
    ///
    /// Default: 1 second.
    pub reconnect_base_delay: Duration,

    /// Maximum delay between subscribe attempts.
    ///
    /// Default: 30 seconds.
    pub reconnect_max_delay: Duration,

    /// Whether to re-issue a state pull after the channel reconnects or
    /// the loop re-establishes a lost subscription.
    ///
    /// Pushes emitted during an outage are gone; the re-pull closes that
    /// gap instead of waiting for the next push.
    ///
    /// Default: `true`.
    pub repull_on_reconnect: bool,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            reconnect_base_delay: Duration::from_secs(1),
            reconnect_max_delay: Duration::from_secs(30),
            repull_on_reconnect: true,
        }
    }
}

/// Run the push-subscription loop for one store activation.
///
/// Spawned by the store on the 0-to-1 observer transition and aborted on
/// the 1-to-0 transition; aborting drops the live [`Subscription`], which
/// releases the channel registration. Each received payload is validated
/// and handed to [`StoreInner::accept`] under the activation's generation;
/// malformed payloads are logged and ignored so observers never see an
/// error.
///
/// [`Subscription`]: crate::Subscription
pub(crate) async fn run_sync_loop(inner: Arc<StoreInner>, generation: u64) {
    let config = inner.config.clone();
    let mut backoff = config.reconnect_base_delay;
    let mut resubscribing = false;

    loop {
        let mut subscription = match inner.channel.subscribe(&inner.event).await {
            Ok(sub) => sub,
            Err(e) => {
                tracing::warn!(event = %inner.event, error = %e, "subscribe failed, will retry");
                tokio::time::sleep(backoff).await;
                backoff = (backoff * 2).min(config.reconnect_max_delay);
                continue;
            }
        };
        backoff = config.reconnect_base_delay;
        tracing::debug!(event = %inner.event, generation, "push subscription open");

        // A re-established subscription may have missed pushes.
        if resubscribing && config.repull_on_reconnect {
            spawn_pull(Arc::clone(&inner), generation);
        }

        while let Some(message) = subscription.next().await {
            match message {
                PushMessage::Event(payload) => match decode_snapshot(payload) {
                    Ok(snapshot) => inner.accept(generation, snapshot),
                    Err(e) => {
                        tracing::warn!(
                            event = %inner.event,
                            error = %e,
                            "ignoring malformed push payload"
                        );
                    }
                },
                PushMessage::Reconnected => {
                    tracing::debug!(event = %inner.event, "push channel reconnected");
                    if config.repull_on_reconnect {
                        spawn_pull(Arc::clone(&inner), generation);
                    }
                }
            }
        }

        // Stream exhausted: the channel dropped this subscription. Release
        // it and reopen after a backoff.
        tracing::debug!(event = %inner.event, "push subscription ended, resubscribing");
        drop(subscription);
        resubscribing = true;
        tokio::time::sleep(backoff).await;
        backoff = (backoff * 2).min(config.reconnect_max_delay);
    }
}

/// Issue one state pull and hand the outcome to the store.
///
/// Success is accepted like any push. Failure degrades to an empty
/// snapshot: observers receive the empty collection rather than an error,
/// and the condition is logged for operability. The task is detached on
/// purpose; a pull outliving its activation is discarded by the
/// generation check inside [`StoreInner::accept`].
pub(crate) fn spawn_pull(inner: Arc<StoreInner>, generation: u64) {
    tokio::spawn(async move {
        match inner.client.fetch_application_states().await {
            Ok(snapshot) => inner.accept(generation, snapshot),
            Err(e) => {
                tracing::warn!(error = %e, "state pull failed, degrading to empty snapshot");
                inner.accept(generation, StateSnapshot::new());
            }
        }
    });
}

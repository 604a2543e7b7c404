//! The reactive state store: latest authoritative snapshot, observer
//! broadcast, and observer-count-driven activation of the upstream sync.
//!
//! The store is built via [`StateStoreBuilder`], which wires the push
//! channel and pull client seams together with the event name and
//! [`SyncConfig`]. While at least one observer is registered the store
//! keeps a push subscription open and has issued one pull for the initial
//! snapshot; when the last observer is disposed the subscription is
//! released and the last snapshot is retained for the next observer.

use std::fmt;
use std::sync::{Arc, Weak};

use parking_lot::Mutex;
use tokio::task::JoinHandle;

use crate::channel::PushChannel;
use crate::client::StateClient;
use crate::state::StateSnapshot;
use crate::sync::{SyncConfig, run_sync_loop, spawn_pull};

/// Default push event name on which the backend publishes state snapshots.
pub const APPLICATION_STATES_EVENT: &str = "new-applications-state";

/// Callback registered by an observer; receives every accepted snapshot.
type ObserverCallback = Box<dyn Fn(&StateSnapshot) + Send + Sync>;

/// One registered observer. Ids increase monotonically and are never
/// reused, which makes disposal idempotent by construction.
struct Observer {
    id: u64,
    callback: ObserverCallback,
}

/// State guarded by the store's single mutex: the snapshot-and-observer-set
/// pair plus the activation bookkeeping. Never held across an await.
struct Shared {
    /// `None` until the first snapshot is accepted; retained across
    /// deactivation so a re-attaching observer is served immediately.
    snapshot: Option<StateSnapshot>,
    /// Registered observers in registration order.
    observers: Vec<Observer>,
    next_observer_id: u64,
    /// Bumped on every activation and deactivation. A snapshot is accepted
    /// only if it carries the current generation, so work spawned by a
    /// previous activation can never mutate the store late.
    generation: u64,
    /// The running sync loop, present exactly while observers exist.
    sync_task: Option<JoinHandle<()>>,
}

/// Store internals shared with the spawned sync and pull tasks.
pub(crate) struct StoreInner {
    pub(crate) channel: Arc<dyn PushChannel>,
    pub(crate) client: Arc<dyn StateClient>,
    pub(crate) event: String,
    pub(crate) config: SyncConfig,
    shared: Mutex<Shared>,
}

impl StoreInner {
    /// Accept a snapshot: replace the current value and notify observers.
    ///
    /// The snapshot is discarded when it carries a stale generation or when
    /// no observers remain, so late pull results and pushes racing a
    /// teardown cannot resurrect state invisibly. Observers are notified
    /// synchronously, in registration order, under the lock; notification
    /// rounds never interleave.
    pub(crate) fn accept(&self, generation: u64, snapshot: StateSnapshot) {
        let mut guard = self.shared.lock();
        if guard.generation != generation {
            tracing::debug!(event = %self.event, "discarding snapshot from a stale generation");
            return;
        }
        if guard.observers.is_empty() {
            tracing::debug!(event = %self.event, "discarding snapshot with no observers");
            return;
        }

        guard.snapshot = Some(snapshot);
        let shared = &*guard;
        if let Some(current) = shared.snapshot.as_ref() {
            for observer in &shared.observers {
                (observer.callback)(current);
            }
        }
    }
}

/// Reactive container holding the latest authoritative [`StateSnapshot`].
///
/// Observers register through [`observe`](StateStore::observe) and are
/// notified of every accepted snapshot; they never see an error value.
/// The first observer activates the upstream sync (push subscription plus
/// one initial pull) and the last disposal deactivates it.
///
/// `Clone` is cheap: clones share the same mirror.
///
/// # Examples
///
/// ```no_run
/// use std::sync::Arc;
/// use appstate_sync::{PushChannel, StateClient, StateStore};
///
/// # fn example(channel: Arc<dyn PushChannel>, client: Arc<dyn StateClient>) {
/// let store = StateStore::builder(channel, client).build();
/// let handle = store.observe(|states| {
///     println!("{} applications", states.len());
/// });
/// // ... later, when the view goes away:
/// handle.dispose();
/// # }
/// ```
#[derive(Clone)]
pub struct StateStore {
    inner: Arc<StoreInner>,
}

impl fmt::Debug for StateStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StateStore")
            .field("event", &self.inner.event)
            .finish()
    }
}

impl StateStore {
    /// Start building a store over the given collaborator seams.
    ///
    /// # Arguments
    ///
    /// * `channel` - Push channel delivering snapshot events.
    /// * `client` - Pull client for the one-shot initial snapshot.
    pub fn builder(channel: Arc<dyn PushChannel>, client: Arc<dyn StateClient>) -> StateStoreBuilder {
        StateStoreBuilder {
            channel,
            client,
            event: APPLICATION_STATES_EVENT.to_string(),
            config: SyncConfig::default(),
        }
    }

    /// Register a callback to receive the current snapshot (if one has been
    /// accepted) and every subsequent accepted snapshot.
    ///
    /// If this is the first observer, activation runs: the sync loop task
    /// is spawned and one initial pull is issued. Registration itself never
    /// blocks; the side effects happen asynchronously on the runtime, so
    /// this must be called from within a tokio runtime.
    ///
    /// The callback runs on whichever task accepts a snapshot and must not
    /// call back into the store.
    ///
    /// # Returns
    ///
    /// An [`ObserverHandle`] for removing the callback again. Dropping the
    /// handle does **not** remove it; call
    /// [`dispose`](ObserverHandle::dispose).
    pub fn observe(
        &self,
        callback: impl Fn(&StateSnapshot) + Send + Sync + 'static,
    ) -> ObserverHandle {
        let mut guard = self.inner.shared.lock();
        let id = guard.next_observer_id;
        guard.next_observer_id += 1;

        if let Some(current) = guard.snapshot.as_ref() {
            callback(current);
        }
        guard.observers.push(Observer {
            id,
            callback: Box::new(callback),
        });

        if guard.observers.len() == 1 {
            Self::activate(&self.inner, &mut guard);
        }

        ObserverHandle {
            store: Arc::downgrade(&self.inner),
            id,
        }
    }

    /// Clone of the retained snapshot, or `None` if nothing has been
    /// accepted yet.
    pub fn latest(&self) -> Option<StateSnapshot> {
        self.inner.shared.lock().snapshot.clone()
    }

    /// Number of currently registered observers.
    pub fn observer_count(&self) -> usize {
        self.inner.shared.lock().observers.len()
    }

    /// Runs once per 0-to-1 observer transition, with the lock held.
    fn activate(inner: &Arc<StoreInner>, shared: &mut Shared) {
        shared.generation = shared.generation.wrapping_add(1);
        let generation = shared.generation;
        tracing::debug!(event = %inner.event, generation, "activating state sync");

        shared.sync_task = Some(tokio::spawn(run_sync_loop(Arc::clone(inner), generation)));
        spawn_pull(Arc::clone(inner), generation);
    }

    /// Runs once per 1-to-0 observer transition, with the lock held.
    ///
    /// Aborting the sync task drops its live `Subscription`, which releases
    /// the channel registration. An in-flight pull is left to finish; the
    /// generation bump makes its result a no-op.
    fn deactivate(shared: &mut Shared, event: &str) {
        shared.generation = shared.generation.wrapping_add(1);
        if let Some(task) = shared.sync_task.take() {
            task.abort();
            tracing::debug!(event = %event, "deactivated state sync");
        }
    }
}

/// Handle for removing one registered observer callback.
///
/// Disposal is idempotent; disposing twice has no additional effect. If
/// the store itself has already been dropped, disposal is a no-op.
pub struct ObserverHandle {
    store: Weak<StoreInner>,
    id: u64,
}

impl ObserverHandle {
    /// Remove the callback from the notification set.
    ///
    /// If this removes the last observer, the push subscription is
    /// released and the retained snapshot is kept for any future observer.
    pub fn dispose(&self) {
        let Some(inner) = self.store.upgrade() else {
            return;
        };
        let mut guard = inner.shared.lock();
        let before = guard.observers.len();
        guard.observers.retain(|observer| observer.id != self.id);
        if guard.observers.len() < before && guard.observers.is_empty() {
            StateStore::deactivate(&mut guard, &inner.event);
        }
    }
}

impl fmt::Debug for ObserverHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ObserverHandle").field("id", &self.id).finish()
    }
}

/// Builder for configuring and creating a [`StateStore`].
///
/// Created via [`StateStore::builder`]. Construction is purely local; no
/// connection is opened until the first observer attaches.
pub struct StateStoreBuilder {
    channel: Arc<dyn PushChannel>,
    client: Arc<dyn StateClient>,
    event: String,
    config: SyncConfig,
}

impl StateStoreBuilder {
    /// Override the push event name to subscribe to.
    ///
    /// Defaults to [`APPLICATION_STATES_EVENT`].
    pub fn event(mut self, name: impl Into<String>) -> Self {
        self.event = name.into();
        self
    }

    /// Override the sync loop configuration.
    ///
    /// Defaults to [`SyncConfig::default()`].
    pub fn sync_config(mut self, config: SyncConfig) -> Self {
        self.config = config;
        self
    }

    /// Create the store. Upstream connections are opened lazily on the
    /// first [`observe`](StateStore::observe) call.
    pub fn build(self) -> StateStore {
        StateStore {
            inner: Arc::new(StoreInner {
                channel: self.channel,
                client: self.client,
                event: self.event,
                config: self.config,
                shared: Mutex::new(Shared {
                    snapshot: None,
                    observers: Vec::new(),
                    next_observer_id: 0,
                    generation: 0,
                    sync_task: None,
                }),
            }),
        }
    }
}

//! Continuously up-to-date client-side mirror of backend-managed
//! application states.
//!
//! One [`StateStore`] pulls the current snapshot when its first observer
//! attaches, subscribes to pushed full-state updates, reconciles the two
//! last-accepted-wins, and releases its subscription when the last
//! observer is disposed. Transport lives behind the [`PushChannel`] and
//! [`StateClient`] seams; observers only ever see [`StateSnapshot`]
//! values, never errors.

mod channel;
pub use channel::{PushChannel, PushMessage, Subscription};
mod client;
pub use client::StateClient;
mod error;
pub use error::{ChannelError, ClientError};
mod state;
pub use state::{ApplicationState, StateSnapshot};
mod store;
pub use store::{APPLICATION_STATES_EVENT, ObserverHandle, StateStore, StateStoreBuilder};
mod sync;
pub use sync::SyncConfig;

//! Cross-process publish/subscribe event bus and badging state machine for
//! shell overlay handlers.
//!
//! The bus (`bus`) lives inside a named shared memory region (`region`) that
//! every participating process maps. Each overlay handler process runs a
//! `client::SubscriptionClient` that pulls events off its channel and feeds
//! an `overlay::OverlayAdapter`, which keeps a `badge::BadgeStore` and
//! answers the host overlay ABI directly from it.

pub mod badge;
pub mod bus;
pub mod client;
pub mod config;
pub mod error;
pub mod ids;
pub mod liveness;
pub mod overlay;
pub mod region;
pub mod wait;

pub use bus::{BusServer, Channel, PublishOutcome, SubscribeOutcome};
pub use config::BusConfig;
pub use error::{Error, Result};
pub use ids::{PublisherId, SubscriberId, SyncboxId};

//! Badge Store (BST) and Root Store: the per-overlay-process path databases
//! that answer the host overlay ABI (spec §4.4).

pub mod record;
pub mod store;

pub use record::{BadgeKind, BadgeRecord};
pub use store::{BadgeStore, BadgeStoreHost};

//! Typed callback references a [`super::SubscriptionClient`] dispatches
//! into, one per event kind plus the watcher's tick and liveness signals
//! (spec §4.3, §9: "a set of typed function references held in a small
//! struct per SC; no global event hub").

use crate::badge::record::BadgeKind;
use crate::ids::SyncboxId;

/// `on_add_root`/`on_remove_root`'s selector: `None` means the broadcast
/// form (every overlay kind processes it), `Some(kind)` scopes it to one.
pub type RootSelector = Option<BadgeKind>;

pub struct Callbacks {
    pub on_add_badge:
        Box<dyn Fn(&str, BadgeKind, u64, SyncboxId) -> crate::Result<()> + Send + Sync>,
    pub on_remove_badge: Box<dyn Fn(&str, u64, SyncboxId) + Send + Sync>,
    pub on_add_root:
        Box<dyn Fn(&str, RootSelector, u64, SyncboxId) -> crate::Result<()> + Send + Sync>,
    pub on_remove_root:
        Box<dyn Fn(&str, RootSelector, u64, SyncboxId) -> crate::Result<()> + Send + Sync>,
    pub on_tick: Box<dyn Fn() + Send + Sync>,
    /// Invoked by the watcher loop when it decides the subscriber loop is
    /// stuck and is about to restart it.
    pub on_watcher_failed: Box<dyn Fn() + Send + Sync>,
}

impl Callbacks {
    /// Wires every callback to the given [`crate::badge::BadgeStore`],
    /// matching spec §4.5's OA wiring step exactly.
    pub fn for_badge_store(store: std::sync::Arc<crate::badge::BadgeStore>) -> Self {
        let add_badge_store = store.clone();
        let remove_badge_store = store.clone();
        let add_root_store = store.clone();
        let remove_root_store = store.clone();
        let tick_store = store;
        Self {
            on_add_badge: Box::new(move |path, kind, pid, syncbox| {
                add_badge_store.on_add_badge(path, kind, pid, syncbox)
            }),
            on_remove_badge: Box::new(move |path, pid, syncbox| {
                remove_badge_store.on_remove_badge(path, pid, syncbox);
            }),
            on_add_root: Box::new(move |path, selector, pid, syncbox| {
                add_root_store.on_add_root(path, selector, pid, syncbox)
            }),
            on_remove_root: Box::new(move |path, selector, pid, syncbox| {
                remove_root_store.on_remove_root(path, selector, pid, syncbox)
            }),
            on_tick: Box::new(move || tick_store.on_tick()),
            on_watcher_failed: Box::new(|| {}),
        }
    }
}

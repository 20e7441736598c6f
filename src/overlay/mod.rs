//! Overlay Adapter (OA): one instance per badge kind, answering the host
//! overlay ABI directly from its [`crate::badge::BadgeStore`] with no IPC on
//! the hot path (spec §4.5, §6).

use std::sync::Arc;

use crate::badge::{BadgeKind, BadgeStore, BadgeStoreHost};
use crate::bus::event::{EventKind, EventPayload, Subkind};
use crate::bus::{BusServer, Channel};
use crate::client::{Callbacks, SubscriptionClient};
use crate::config::BusConfig;
use crate::ids::{PublisherId, SubscriberId, SyncboxId};
use crate::Result;

/// Overlay icon flags from the host ABI (spec §6): the handler answers with
/// a file path plus an index rather than an inline bitmap.
pub const ICON_FILE: u32 = 0x1;
pub const ICON_INDEX: u32 = 0x2;

/// The host-callable surface every overlay handler implements (spec §6's
/// "Host overlay ABI (consumed, not produced)"). Kept as a trait so the
/// shell-host glue can hold a `dyn OverlayHost` without depending on this
/// crate's concrete adapter type.
pub trait OverlayHost: Send + Sync {
    /// Returns (icon resource path, icon index, flags).
    fn get_overlay_info(&self) -> (String, u32, u32);
    fn get_priority(&self) -> u32;
    /// `attributes` is the host's opaque file-attribute bitmask; kept for
    /// ABI fidelity with the original but ignored by the decision itself
    /// (spec: `BadgeStore::should_badge` never branches on it).
    fn is_member_of(&self, path: &str, attributes: u32) -> bool;
}

/// One running overlay handler instance: its [`SubscriptionClient`] pulling
/// from the `App->Overlay` channel, and the [`BadgeStore`] that client feeds.
pub struct OverlayAdapter {
    badge_store: Arc<BadgeStore>,
    client: SubscriptionClient,
    publisher_id: PublisherId,
}

impl OverlayAdapter {
    /// Starts the adapter for `kind`: subscribes on `App->Overlay` with a
    /// freshly generated subscriber-id, wires callbacks into a fresh
    /// `BadgeStore`, then publishes an `Init` event on `Overlay->App`
    /// carrying this kind and a freshly minted publisher-id (spec §4.5 step
    /// 4) so the controlling app resends its current state.
    pub fn start(kind: BadgeKind, bus: Arc<BusServer>, host: Arc<dyn BadgeStoreHost>, config: BusConfig) -> Result<Self> {
        let badge_store = Arc::new(BadgeStore::new(kind, host));
        let callbacks = Callbacks::for_badge_store(badge_store.clone());
        let subscriber_id = SubscriberId::generate();
        let client = SubscriptionClient::start(
            bus.clone(),
            Channel::AppToOverlay,
            subscriber_id,
            callbacks,
            config,
        );

        let publisher_id = PublisherId::generate();
        let init_event = EventPayload::new(
            EventKind::Init,
            Subkind(kind as u32),
            kind,
            String::new(),
            std::process::id() as u64,
            0,
            SyncboxId::from_bytes(*publisher_id.as_bytes()),
        );
        bus.publish(Channel::OverlayToApp, init_event)?;
        log::info!("overlay adapter for {kind:?} started as publisher {publisher_id}");

        Ok(Self {
            badge_store,
            client,
            publisher_id,
        })
    }

    pub fn kind(&self) -> BadgeKind {
        self.badge_store.kind()
    }

    pub fn publisher_id(&self) -> PublisherId {
        self.publisher_id
    }

    pub fn subscriber_id(&self) -> SubscriberId {
        self.client.subscriber_id()
    }

    pub fn badge_store(&self) -> &Arc<BadgeStore> {
        &self.badge_store
    }

    pub fn shutdown(&self) {
        self.client.shutdown();
    }
}

impl OverlayHost for OverlayAdapter {
    fn get_overlay_info(&self) -> (String, u32, u32) {
        let index = self.badge_store.kind().icon_index().unwrap_or(0);
        (
            "overlay-bus.icons".to_string(),
            index,
            ICON_FILE | ICON_INDEX,
        )
    }

    fn get_priority(&self) -> u32 {
        0
    }

    fn is_member_of(&self, path: &str, _attributes: u32) -> bool {
        self.badge_store.should_badge(path)
    }
}

/// Sniffs the host process image name (spec §4.5 step 1: "if it is the
/// host's verification helper, return immediately — no state created"). The
/// verification helper name is a configuration detail of the shell host, not
/// this crate, so callers pass the name they are comparing against.
pub fn is_verification_helper(process_image_name: &str, helper_name: &str) -> bool {
    process_image_name.eq_ignore_ascii_case(helper_name)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::region::Region;
    use std::sync::Mutex;
    use tempfile::tempdir;

    struct RecordingHost {
        notifications: Mutex<Vec<String>>,
    }

    impl BadgeStoreHost for RecordingHost {
        fn notify_path_changed(&self, path: &str) {
            self.notifications.lock().unwrap().push(path.to_string());
        }
        fn notify_refresh(&self) {}
    }

    #[test]
    fn start_publishes_an_init_event_on_the_overlay_to_app_channel() {
        let dir = tempdir().unwrap();
        let bus = Arc::new(BusServer::new(Region::attach_at(dir.path().join("r.bin")).unwrap()));
        let host = Arc::new(RecordingHost {
            notifications: Mutex::new(Vec::new()),
        });
        let probe_id = SubscriberId::generate();
        // Subscribe before starting the adapter so this test observes the
        // Init event the adapter publishes on start.
        let _ = bus
            .subscribe(Channel::OverlayToApp, probe_id, std::time::Duration::from_millis(1))
            .unwrap();

        let adapter = OverlayAdapter::start(
            BadgeKind::Synced,
            bus.clone(),
            host,
            BusConfig::default(),
        )
        .unwrap();

        match bus
            .subscribe(Channel::OverlayToApp, probe_id, std::time::Duration::from_secs(1))
            .unwrap()
        {
            crate::bus::SubscribeOutcome::GotEvent(payload) => {
                assert_eq!(payload.kind, EventKind::Init);
                assert_eq!(payload.badge_kind, BadgeKind::Synced);
            }
            other => panic!("expected an Init event, got {other:?}"),
        }
        assert_eq!(adapter.kind(), BadgeKind::Synced);
        adapter.shutdown();
    }

    #[test]
    fn is_member_of_reflects_the_badge_store() {
        let dir = tempdir().unwrap();
        let bus = Arc::new(BusServer::new(Region::attach_at(dir.path().join("r.bin")).unwrap()));
        let host = Arc::new(RecordingHost {
            notifications: Mutex::new(Vec::new()),
        });
        let adapter = OverlayAdapter::start(BadgeKind::Failed, bus, host, BusConfig::default()).unwrap();
        assert!(!adapter.is_member_of("C:\\x", 0));
        adapter
            .badge_store()
            .on_add_badge("C:\\x", BadgeKind::Failed, 1, SyncboxId::generate())
            .unwrap();
        assert!(adapter.is_member_of("C:\\x", 0));
        assert_eq!(adapter.get_priority(), 0);
        let (_, index, flags) = adapter.get_overlay_info();
        assert_eq!(index, 3);
        assert_eq!(flags, ICON_FILE | ICON_INDEX);
        adapter.shutdown();
    }

    #[test]
    fn recognizes_the_verification_helper_by_name() {
        assert!(is_verification_helper("TestComSide.exe", "TestComSide.exe"));
        assert!(!is_verification_helper("explorer.exe", "TestComSide.exe"));
    }
}

//! Scenario 3 from spec.md §8: removing a syncbox root's last contributor
//! fans out and removes every badge entry rooted under it.

use std::sync::Arc;
use std::time::{Duration, Instant};

use overlay_bus::badge::{BadgeKind, BadgeStoreHost};
use overlay_bus::bus::event::{EventKind, EventPayload, Subkind};
use overlay_bus::bus::BusServer;
use overlay_bus::config::BusConfig;
use overlay_bus::ids::SyncboxId;
use overlay_bus::overlay::{OverlayAdapter, OverlayHost};
use overlay_bus::region::Region;
use overlay_bus::Channel;
use tempfile::tempdir;

struct NullHost;
impl BadgeStoreHost for NullHost {
    fn notify_path_changed(&self, _path: &str) {}
    fn notify_refresh(&self) {}
}

fn fast_config() -> BusConfig {
    BusConfig {
        subscribe_poll_timeout: Duration::from_millis(20),
        watcher_tick_interval: Duration::from_millis(500),
        started_latch_timeout: Duration::from_secs(2),
        shutdown_grace_step: Duration::from_millis(20),
        shutdown_grace_steps: 10,
        ..BusConfig::default()
    }
}

fn wait_until(deadline: Instant, mut predicate: impl FnMut() -> bool) -> bool {
    while Instant::now() < deadline {
        if predicate() {
            return true;
        }
        std::thread::sleep(Duration::from_millis(10));
    }
    predicate()
}

#[test]
fn removing_a_root_fans_out_to_its_descendant_badges() {
    let dir = tempdir().unwrap();
    let bus = Arc::new(BusServer::new(Region::attach_at(dir.path().join("region.bin")).unwrap()));
    let synced = OverlayAdapter::start(BadgeKind::Synced, bus.clone(), Arc::new(NullHost), fast_config()).unwrap();

    let syncbox = SyncboxId::generate();
    let publish = |kind, path: &str| {
        bus.publish(
            Channel::AppToOverlay,
            EventPayload::new(kind, Subkind(0), BadgeKind::Synced, path, 100, 1, syncbox),
        )
        .unwrap();
    };

    publish(EventKind::AddRoot, "C:\\Cloud");
    publish(EventKind::AddBadge, "C:\\Cloud\\a");

    let deadline = Instant::now() + Duration::from_secs(2);
    assert!(wait_until(deadline, || synced.is_member_of("C:\\cloud\\a", 0)));

    publish(EventKind::RemoveRoot, "C:\\Cloud");

    let deadline = Instant::now() + Duration::from_secs(2);
    assert!(wait_until(deadline, || !synced.is_member_of("C:\\cloud\\a", 0)));

    synced.shutdown();
}

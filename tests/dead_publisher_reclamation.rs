//! Scenario 4 from spec.md §8: once a publisher process is no longer alive,
//! reclamation strips only its contributions, leaving entries with a live
//! remaining contributor intact.

use std::sync::{Arc, Mutex};

use overlay_bus::badge::{BadgeKind, BadgeStore, BadgeStoreHost};
use overlay_bus::ids::SyncboxId;

struct RecordingHost {
    refreshes: Mutex<u32>,
}

impl BadgeStoreHost for RecordingHost {
    fn notify_path_changed(&self, _path: &str) {}
    fn notify_refresh(&self) {
        *self.refreshes.lock().unwrap() += 1;
    }
}

/// Spawns and fully reaps a child process, returning a pid that is
/// guaranteed dead (not merely unlikely to exist): `kill(pid, 0)` returns
/// ESRCH for it once `wait()` below has run.
fn spawn_and_reap() -> u64 {
    let mut child = std::process::Command::new("true")
        .spawn()
        .expect("spawn /bin/true");
    let pid = child.id() as u64;
    child.wait().expect("reap child");
    pid
}

#[test]
fn reclaiming_a_dead_publisher_preserves_entries_with_a_live_contributor() {
    let host = Arc::new(RecordingHost {
        refreshes: Mutex::new(0),
    });
    let store = BadgeStore::new(BadgeKind::Synced, host.clone());
    let syncbox = SyncboxId::generate();

    let dead_pid = spawn_and_reap();
    let live_pid = std::process::id() as u64;

    store
        .on_add_badge("C:\\shared", BadgeKind::Synced, dead_pid, syncbox)
        .unwrap();
    store
        .on_add_badge("C:\\shared", BadgeKind::Synced, live_pid, syncbox)
        .unwrap();

    store.on_tick();
    assert!(store.should_badge("C:\\shared"));
    assert_eq!(*host.refreshes.lock().unwrap(), 1);

    // Now the only remaining contributor dies too: the whole entry goes.
    store.reclaim(live_pid);
    assert!(!store.should_badge("C:\\shared"));
    assert_eq!(*host.refreshes.lock().unwrap(), 2);
}

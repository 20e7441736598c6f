//! Scenario 5 from spec.md §8: filling one subscriber's queue does not
//! affect another subscriber on the same channel, and `Publish` keeps
//! reporting overflow for only the full one afterwards.

use std::time::Duration;

use overlay_bus::badge::BadgeKind;
use overlay_bus::bus::event::{EventKind, EventPayload, Subkind};
use overlay_bus::bus::{BusServer, SubscribeOutcome};
use overlay_bus::ids::{SubscriberId, SyncboxId};
use overlay_bus::region::layout::QUEUE_CAPACITY;
use overlay_bus::region::Region;
use overlay_bus::Channel;
use tempfile::tempdir;

fn payload() -> EventPayload {
    EventPayload::new(
        EventKind::AddBadge,
        Subkind(0),
        BadgeKind::Synced,
        "C:\\Cloud\\a.txt",
        100,
        1,
        SyncboxId::generate(),
    )
}

#[test]
fn filling_one_subscriber_does_not_starve_another() {
    let dir = tempdir().unwrap();
    let server = BusServer::new(Region::attach_at(dir.path().join("region.bin")).unwrap());

    let s1 = SubscriberId::generate();
    let s2 = SubscriberId::generate();
    server
        .subscribe(Channel::AppToOverlay, s1, Duration::from_millis(1))
        .unwrap();
    server
        .subscribe(Channel::AppToOverlay, s2, Duration::from_millis(1))
        .unwrap();

    for _ in 0..QUEUE_CAPACITY {
        let outcome = server.publish(Channel::AppToOverlay, payload()).unwrap();
        assert!(outcome.overflowed.is_empty());
    }

    // s1's queue is now full; further publishes overflow for s1 but s2 still
    // has room and receives every one of them.
    for _ in 0..3 {
        let outcome = server.publish(Channel::AppToOverlay, payload()).unwrap();
        assert_eq!(outcome.overflowed, vec![s1]);
    }

    let mut s2_count = 0;
    while let SubscribeOutcome::GotEvent(_) = server
        .subscribe(Channel::AppToOverlay, s2, Duration::from_millis(1))
        .unwrap()
    {
        s2_count += 1;
    }
    assert_eq!(s2_count, QUEUE_CAPACITY + 3);

    // s1 never lost the events it did receive; draining it recovers
    // exactly QUEUE_CAPACITY of them (the 3 overflowed ones were dropped,
    // per spec: Publish never blocks on a consumer and an overflowed event
    // is not retried).
    let mut s1_count = 0;
    while let SubscribeOutcome::GotEvent(_) = server
        .subscribe(Channel::AppToOverlay, s1, Duration::from_millis(1))
        .unwrap()
    {
        s1_count += 1;
    }
    assert_eq!(s1_count, QUEUE_CAPACITY);
}

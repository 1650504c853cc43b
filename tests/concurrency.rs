//! Concurrent lookups, refreshes and configuration reads

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Instant;

use guidmap::{
    IdentityResolver, Kind, MemoryConfig, Options, PermissionContext, Snapshot,
    PERMISSION_GIDS, PERMISSION_UID,
};

const READERS: usize = 4;
const ROUNDS: usize = 500;

fn snapshot(uid: i32, gid: i32) -> Snapshot {
    Snapshot {
        users: vec![("alice".into(), uid), ("bob".into(), uid + 1)],
        groups: vec![("ml".into(), gid)],
    }
}

// =============================================================================
// Store consistency under refresh
// =============================================================================

/// Verify readers only ever see ids from a complete snapshot
#[test]
fn lookups_during_refresh_see_whole_snapshots() {
    let r = Arc::new(IdentityResolver::new("fs", &Options::distributed()).unwrap());
    r.refresh(Some(snapshot(5001, 6001))).unwrap();
    let done = Arc::new(AtomicBool::new(false));

    let readers: Vec<_> = (0..READERS)
        .map(|_| {
            let r = r.clone();
            let done = done.clone();
            thread::spawn(move || {
                while !done.load(Ordering::Relaxed) {
                    let uid = r.lookup_by_name(Kind::User, "alice").unwrap();
                    assert!(uid == 5001 || uid == 7001, "unexpected uid {}", uid);
                    let gid = r.lookup_by_name(Kind::Group, "ml").unwrap();
                    assert!(gid == 6001 || gid == 8001, "unexpected gid {}", gid);
                    let name = r.lookup_by_id(Kind::User, uid).unwrap();
                    assert!(name == "alice" || name == uid.to_string());
                }
            })
        })
        .collect();

    for i in 0..ROUNDS {
        let snap = if i % 2 == 0 { snapshot(7001, 8001) } else { snapshot(5001, 6001) };
        r.refresh(Some(snap)).unwrap();
    }
    done.store(true, Ordering::Relaxed);
    for h in readers {
        h.join().unwrap();
    }

    // last round applied the 5001 snapshot
    assert_eq!(r.lookup_by_name(Kind::User, "alice").unwrap(), 5001);
    assert_eq!(r.lookup_by_id(Kind::User, 5002).unwrap(), "bob");
}

/// Verify concurrent misses on the same name agree on one id
#[test]
fn concurrent_generation_agrees() {
    let r = Arc::new(IdentityResolver::new("fs", &Options::distributed()).unwrap());
    let handles: Vec<_> = (0..READERS)
        .map(|_| {
            let r = r.clone();
            thread::spawn(move || {
                (0..200)
                    .map(|i| r.lookup_by_name(Kind::User, &format!("user{}", i)).unwrap())
                    .collect::<Vec<_>>()
            })
        })
        .collect();
    let results: Vec<Vec<i32>> = handles.into_iter().map(|h| h.join().unwrap()).collect();
    for other in &results[1..] {
        assert_eq!(&results[0], other);
    }
    assert_eq!(r.store().len(Kind::User), 200);
}

// =============================================================================
// Published configuration
// =============================================================================

/// Verify uid and gids are never observed from different refreshes
#[test]
fn published_configuration_is_never_torn() {
    let cfg = Arc::new(MemoryConfig::new());
    let ctx = Arc::new(PermissionContext::new(cfg.clone(), Options::distributed()));
    ctx.configure("fs", "alice", "ml", "hdfs", "supergroup", 0o022).unwrap();
    ctx.refresh_identities("alice:5001", "ml:6001:x:alice").unwrap();
    let done = Arc::new(AtomicBool::new(false));

    let readers: Vec<_> = (0..READERS)
        .map(|_| {
            let cfg = cfg.clone();
            let ctx = ctx.clone();
            let done = done.clone();
            thread::spawn(move || {
                while !done.load(Ordering::Relaxed) {
                    let pair = cfg.get_many(&[PERMISSION_UID, PERMISSION_GIDS]);
                    let pair: Vec<&str> = pair.iter().map(|v| v.as_deref().unwrap()).collect();
                    assert!(pair == ["5001", "6001"] || pair == ["7001", "8001"], "torn read {:?}", pair);

                    let e = ctx.effective().unwrap();
                    assert!(
                        (e.uid == 5001 && e.gids == [6001]) || (e.uid == 7001 && e.gids == [8001]),
                        "torn identity {:?}",
                        e
                    );
                }
            })
        })
        .collect();

    for i in 0..ROUNDS {
        if i % 2 == 0 {
            ctx.refresh_identities("alice:7001", "ml:8001:x:alice").unwrap();
        } else {
            ctx.refresh_identities("alice:5001", "ml:6001:x:alice").unwrap();
        }
    }
    done.store(true, Ordering::Relaxed);
    for h in readers {
        h.join().unwrap();
    }
}

// =============================================================================
// Scale
// =============================================================================

/// Verify a large pushed listing applies and resolves both ways
#[test]
fn large_snapshot_round_trips() {
    let r = IdentityResolver::new("fs", &Options::distributed()).unwrap();
    let users: Vec<(String, i32)> = (0..20_000).map(|i| (format!("user{}", i), 100_000 + i)).collect();

    let start = Instant::now();
    r.refresh(Some(Snapshot { users, groups: Vec::new() })).unwrap();
    println!("  apply 20k users: {:?}", start.elapsed());

    let start = Instant::now();
    for i in (0..20_000).step_by(97) {
        assert_eq!(r.lookup_by_name(Kind::User, &format!("user{}", i)).unwrap(), 100_000 + i);
        assert_eq!(r.lookup_by_id(Kind::User, 100_000 + i).unwrap(), format!("user{}", i));
    }
    println!("  sampled lookups: {:?}", start.elapsed());
    assert_eq!(r.store().len(Kind::User), 20_000);
}

//! End-to-end scenarios from §8, driven against real loopback sockets.
//! These need `CAP_NET_RAW` (or root); each test skips cleanly rather than
//! failing the suite when that privilege isn't available.

use std::time::Duration;

use probenet::mtr::{Mtr, MtrOptions};
use probenet::ping::{AddOptions, Ping};

macro_rules! skip_without_privilege {
    ($result:expr) => {
        match $result {
            Ok(v) => v,
            Err(_) => {
                eprintln!("skipping: no raw-socket privilege in this environment");
                return;
            }
        }
    };
}

#[test]
fn ping_success_on_loopback() {
    let mut ping = Ping::new(1, Duration::from_millis(10));
    let add_result = ping.add(
        "127.0.0.1",
        AddOptions {
            count: Some(3),
            data_size: Some(16),
            timeout: Some(Duration::from_secs(1)),
            interval: Some(Duration::from_millis(10)),
            ..Default::default()
        },
    );
    skip_without_privilege!(add_result);

    let results = skip_without_privilege!(ping.start());
    assert_eq!(results.len(), 1);
    let r = &results[0];
    assert_eq!(r.packets, 3);
    assert_eq!(r.received, 3);
    assert!(r.times.iter().all(|t| matches!(t, probenet::ping::entry::Elapsed::Value(d) if *d > Duration::ZERO)));
    assert!(r.stddev >= 0.0);
}

#[test]
fn ping_loss_on_silent_host() {
    // TEST-NET-2 (RFC 5737): reserved for documentation, routed nowhere, never replies.
    let mut ping = Ping::new(2, Duration::from_millis(10));
    let add_result = ping.add(
        "198.51.100.1",
        AddOptions {
            count: Some(2),
            timeout: Some(Duration::from_millis(50)),
            interval: Some(Duration::from_millis(10)),
            ..Default::default()
        },
    );
    skip_without_privilege!(add_result);

    let results = skip_without_privilege!(ping.start());
    assert_eq!(results.len(), 1);
    let r = &results[0];
    assert_eq!(r.packets, 2);
    assert_eq!(r.received, 0);
    assert_eq!(r.loss(), 100.0);
}

#[test]
fn ping_mixed_targets() {
    let mut ping = Ping::new(3, Duration::from_millis(10));
    let reachable = ping.add(
        "127.0.0.1",
        AddOptions {
            count: Some(2),
            timeout: Some(Duration::from_millis(200)),
            interval: Some(Duration::from_millis(10)),
            ..Default::default()
        },
    );
    skip_without_privilege!(reachable);
    ping.add(
        "198.51.100.1",
        AddOptions {
            count: Some(2),
            timeout: Some(Duration::from_millis(50)),
            interval: Some(Duration::from_millis(10)),
            ..Default::default()
        },
    )
    .unwrap();

    let results = skip_without_privilege!(ping.start());
    assert_eq!(results.len(), 2);
    let loopback = results.iter().find(|r| r.host == "127.0.0.1").unwrap();
    let silent = results.iter().find(|r| r.host == "198.51.100.1").unwrap();
    assert_eq!(loopback.received, 2);
    assert_eq!(silent.received, 0);
}

#[test]
fn mtr_direct_to_loopback() {
    let options = MtrOptions {
        count: 1,
        max_ttl: 5,
        data_size: 32,
        timeout: Duration::from_millis(200),
        interval: Duration::from_millis(10),
        ..Default::default()
    };
    let mut mtr = skip_without_privilege!(Mtr::new("127.0.0.1", 4, options));
    let result = skip_without_privilege!(mtr.start());

    assert!(!result.ttl.is_empty());
    let last_hop = result.ttl.last().unwrap();
    let target_entry = last_hop
        .entries
        .iter()
        .find(|e| e.ip == Some(result.target_ip));
    let entry = target_entry.expect("last hop should carry the target's address");
    assert!(entry.elapsed.unwrap() > Duration::ZERO);
}

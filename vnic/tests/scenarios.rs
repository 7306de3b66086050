//! End-to-end behaviour of the simulated NIC
//!
//! Drives the engine, the driver upper half and the peer together and checks
//! ordering, drop accounting and buffer release.

mod common;

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use common::{ids, ready_nic, Pool, Tracked};
use vnic::{
    IrqLine, Loopback, NapiState, NetDevice, PendingFlag, Peer, ReadyState, Vnic, VnicConfig,
    VnicError,
};

fn small_config(ring: usize) -> VnicConfig {
    VnicConfig {
        tx_ring_size: ring,
        rx_ring_size: ring,
        ..VnicConfig::default()
    }
}

#[test]
fn test_delivery_with_recording_handler() {
    let pool = Pool::new();
    let nic = ready_nic(4);
    let fired = Arc::new(AtomicUsize::new(0));
    let counter = fired.clone();
    nic.register_handler(move |_: &IrqLine| {
        counter.fetch_add(1, Ordering::SeqCst);
    });

    let p1 = pool.buffer();
    let p2 = pool.buffer();
    assert!(nic.deliver_incoming(p1).is_ok());
    assert!(nic.deliver_incoming(p2).is_ok());

    // Interrupts were never masked, so each delivery fired
    assert_eq!(fired.load(Ordering::SeqCst), 2);
    assert_eq!(nic.hw_rx_pkt().map(|b| b.id), Some(0));
    assert_eq!(nic.hw_rx_pkt().map(|b| b.id), Some(1));
    assert!(nic.hw_rx_pkt().is_none());
    assert_eq!(pool.released(), 2);
}

#[test]
fn test_delivery_with_napi_handler() {
    let pool = Pool::new();
    let scheduled = Arc::new(AtomicUsize::new(0));
    let counter = scheduled.clone();
    let dev: NetDevice<Tracked> = NetDevice::from_config(
        &small_config(4),
        Arc::new(move || {
            counter.fetch_add(1, Ordering::SeqCst);
        }),
    )
    .unwrap();
    dev.open();

    dev.nic().deliver_incoming(pool.buffer()).unwrap();
    assert_eq!(scheduled.load(Ordering::SeqCst), 1);
    assert!(!dev.nic().intr_enabled());

    dev.nic().deliver_incoming(pool.buffer()).unwrap();
    assert_eq!(scheduled.load(Ordering::SeqCst), 1);

    let mut stack = Vec::new();
    let outcome = dev.poll(&mut stack);
    assert_eq!(outcome.work_done, 2);
    assert!(outcome.complete);
    assert_eq!(ids(&stack), vec![0, 1]);
    assert!(dev.nic().intr_enabled());
    assert_eq!(dev.napi().state(), NapiState::Idle);
}

#[test]
fn test_full_rx_ring_drops() {
    let pool = Pool::new();
    let nic = ready_nic(4);
    for _ in 0..3 {
        nic.deliver_incoming(pool.buffer()).unwrap();
    }

    let rejected = nic.deliver_incoming(pool.buffer()).unwrap_err();
    assert_eq!(rejected.error, VnicError::Dropped);
    assert_eq!(nic.stats().rx_dropped, 1);
    assert_eq!(nic.rx_pending(), 3);

    // The refused buffer comes back unreleased
    assert_eq!(pool.released(), 0);
    assert_eq!(rejected.into_buffer().id, 3);
    assert_eq!(pool.released(), 1);

    let drained: Vec<u32> = std::iter::from_fn(|| nic.hw_rx_pkt()).map(|b| b.id).collect();
    assert_eq!(drained, vec![0, 1, 2]);
}

#[test]
fn test_shutdown_releases_queued_tx() {
    let pool = Pool::new();
    let nic = ready_nic(4);
    nic.hw_tx_pkt(pool.buffer()).unwrap();
    nic.hw_tx_pkt(pool.buffer()).unwrap();

    nic.hw_shut();
    let leftovers = nic.teardown();
    assert_eq!(ids(&leftovers.tx), vec![0, 1]);
    assert!(leftovers.rx.is_empty());
    drop(leftovers);
    assert_eq!(pool.released(), 2);

    let rejected = nic.hw_tx_pkt(pool.buffer()).unwrap_err();
    assert_eq!(rejected.error, VnicError::NotReady);
    assert_eq!(nic.state(), ReadyState::Uninitialized);
}

#[test]
fn test_tx_round_trip() {
    let pool = Pool::new();
    let nic = ready_nic(4);
    nic.hw_tx_pkt(pool.buffer()).unwrap();

    let mut wire = Vec::new();
    assert_eq!(nic.drain_outgoing(1, &mut wire), 1);
    assert_eq!(ids(&wire), vec![0]);
    assert_eq!(nic.tx_pending(), 0);
    assert_eq!(nic.drain_outgoing(1, &mut wire), 0);
}

#[test]
fn test_ring_of_four_boundary() {
    let pool = Pool::new();
    let nic = ready_nic(4);
    for _ in 0..3 {
        assert!(nic.hw_tx_pkt(pool.buffer()).is_ok());
    }
    let rejected = nic.hw_tx_pkt(pool.buffer()).unwrap_err();
    assert_eq!(rejected.error, VnicError::Dropped);

    let mut wire = Vec::new();
    nic.drain_outgoing(1, &mut wire);
    assert!(nic.hw_tx_pkt(rejected.into_buffer()).is_ok());
    assert_eq!(nic.tx_pending(), 3);
}

#[test]
fn test_hw_shut_twice() {
    let nic = ready_nic(4);
    nic.hw_shut();
    nic.hw_shut();
    assert!(!nic.is_ready());
    assert!(!nic.intr_enabled());
}

#[test]
fn test_every_buffer_released_once() {
    let pool = Pool::new();
    let config = small_config(8);
    let flag = Arc::new(PendingFlag::new());
    let dev: NetDevice<Tracked> = NetDevice::from_config(&config, flag.clone()).unwrap();
    let peer = Peer::new(dev.nic().clone());
    dev.open();

    // Some frames make it through in each direction, some stay queued,
    // some are refused for a full ring
    let mut wire = Vec::new();
    for _ in 0..10 {
        let _ = dev.start_xmit(pool.buffer());
    }
    peer.poll(3, &mut wire);
    for _ in 0..10 {
        let _ = peer.transmit(pool.buffer());
    }
    let mut stack = Vec::new();
    if flag.take() {
        dev.poll(&mut stack);
    }

    dev.close();
    drop(wire);
    drop(stack);
    assert_eq!(pool.released(), pool.allocated());
    assert_eq!(pool.allocated(), 20);
}

#[test]
fn test_loopback_driver_to_driver() {
    let pool = Pool::new();
    let flag = Arc::new(PendingFlag::new());
    let dev: NetDevice<Tracked> = NetDevice::from_config(&small_config(16), flag.clone()).unwrap();
    let peer = Peer::new(dev.nic().clone());
    dev.open();

    for _ in 0..5 {
        dev.start_xmit(pool.buffer()).unwrap();
    }
    assert!(peer.take_pending());
    assert_eq!(peer.poll(16, &mut Loopback::new(&peer)), 5);

    let mut stack = Vec::new();
    while flag.take() {
        dev.poll(&mut stack);
    }
    assert_eq!(ids(&stack), vec![0, 1, 2, 3, 4]);

    let dev_stats = dev.stats();
    assert_eq!(dev_stats.tx_packets, 5);
    assert_eq!(dev_stats.rx_packets, 5);
    let peer_stats = peer.stats();
    assert_eq!(peer_stats.rx_packets, 5);
    assert_eq!(peer_stats.tx_packets, 5);
}

#[test]
fn test_independent_instances() {
    let pool = Pool::new();
    let a = ready_nic(4);
    let b: Vnic<Tracked> = Vnic::new(4, 4);
    a.hw_tx_pkt(pool.buffer()).unwrap();
    assert_eq!(a.tx_pending(), 1);
    assert_eq!(b.tx_pending(), 0);
    assert!(b.hw_tx_pkt(pool.buffer()).is_err());
    assert_eq!(a.stats().tx_packets, 1);
    assert_eq!(b.stats().tx_dropped, 1);
}

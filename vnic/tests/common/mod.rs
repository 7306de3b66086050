//! Shared helpers for the integration tests
//!
//! `Tracked` buffers count their own release so tests can check that every
//! buffer is released exactly once, wherever it ends up.

#![allow(dead_code)]

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use vnic::{PacketBuffer, Vnic};

/// Buffer that records when it is dropped
#[derive(Debug)]
pub struct Tracked {
    pub id: u32,
    bytes: Vec<u8>,
    released: Arc<AtomicUsize>,
}

impl PartialEq for Tracked {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl PacketBuffer for Tracked {
    fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }
}

impl Drop for Tracked {
    fn drop(&mut self) {
        self.released.fetch_add(1, Ordering::SeqCst);
    }
}

/// Hands out numbered `Tracked` buffers and counts their releases
#[derive(Debug, Default)]
pub struct Pool {
    next: AtomicUsize,
    released: Arc<AtomicUsize>,
}

impl Pool {
    pub fn new() -> Self {
        Self::default()
    }

    /// A 60-byte buffer whose first bytes carry its id
    pub fn buffer(&self) -> Tracked {
        let id = self.next.fetch_add(1, Ordering::SeqCst) as u32;
        let mut bytes = vec![0u8; 60];
        bytes[..4].copy_from_slice(&id.to_be_bytes());
        Tracked {
            id,
            bytes,
            released: self.released.clone(),
        }
    }

    pub fn allocated(&self) -> usize {
        self.next.load(Ordering::SeqCst)
    }

    pub fn released(&self) -> usize {
        self.released.load(Ordering::SeqCst)
    }
}

/// NIC with both rings of `size` slots, set up and brought to Ready
pub fn ready_nic(size: usize) -> Vnic<Tracked> {
    let nic = Vnic::new(size, size);
    nic.setup();
    nic.hw_init();
    nic
}

pub fn ids(buffers: &[Tracked]) -> Vec<u32> {
    buffers.iter().map(|b| b.id).collect()
}

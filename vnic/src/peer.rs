// The wire side of the simulated NIC
//
// A Peer stands for whatever sits at the other end of the cable: it injects
// frames into the receive ring and collects what the driver transmitted.

use crate::buffer::PacketBuffer;
use crate::engine::{Vnic, WireSink};
use crate::error::VnicError;
use crate::napi::{PendingFlag, PollScheduler};
use crate::stats::{NetStats, StatCounters};
use alloc::sync::Arc;

/// Other end of one simulated NIC
///
/// Counters are kept from the peer's point of view: `tx_*` for frames sent
/// towards the driver, `rx_*` for frames collected from it.
pub struct Peer<B> {
    nic: Arc<Vnic<B>>,
    stats: StatCounters,
    pending: Arc<PendingFlag>,
    hook: Arc<dyn PollScheduler>,
}

impl<B: PacketBuffer> Peer<B> {
    /// Attach to `nic`; from now on each successful `hw_tx_pkt` marks the
    /// peer as having work (see [`Peer::take_pending`]).
    pub fn new(nic: Arc<Vnic<B>>) -> Self {
        let pending = Arc::new(PendingFlag::new());
        let hook: Arc<dyn PollScheduler> = pending.clone();
        nic.set_tx_notify(hook.clone());
        Self {
            nic,
            stats: StatCounters::new(),
            pending,
            hook,
        }
    }

    pub fn nic(&self) -> &Arc<Vnic<B>> {
        &self.nic
    }

    /// Send a frame to the driver
    ///
    /// Refused frames are released here and counted as `tx_dropped`.
    pub fn transmit(&self, buffer: B) -> Result<(), VnicError> {
        let len = buffer.len();
        match self.nic.deliver_incoming(buffer) {
            Ok(()) => {
                self.stats.record_tx(len);
                Ok(())
            }
            Err(rejected) => {
                self.stats.tx_dropped();
                log::debug!("peer: transmit refused: {}", rejected.error);
                Err(rejected.into())
            }
        }
    }

    /// Collect up to `budget` frames the driver transmitted
    ///
    /// A pass that finds nothing counts as an `rx_errors` event: the peer was
    /// signalled, but the buffers were already gone (taken by a teardown).
    pub fn poll<W: WireSink<B>>(&self, budget: usize, wire: &mut W) -> usize {
        let stats = &self.stats;
        let mut counted = Counted { stats, wire };
        let drained = self.nic.drain_outgoing(budget, &mut counted);
        if drained == 0 && budget > 0 {
            log::debug!("peer: poll found no buffers");
            self.stats.rx_error();
        }
        drained
    }

    /// Consume the "driver transmitted something" signal
    pub fn take_pending(&self) -> bool {
        self.pending.take()
    }

    pub fn stats(&self) -> NetStats {
        self.stats.snapshot()
    }
}

impl<B> Drop for Peer<B> {
    fn drop(&mut self) {
        // A newer peer may have replaced the hook
        self.nic.clear_tx_notify_if(&self.hook);
    }
}

struct Counted<'a, W> {
    stats: &'a StatCounters,
    wire: &'a mut W,
}

impl<B: PacketBuffer, W: WireSink<B>> WireSink<B> for Counted<'_, W> {
    fn transmit(&mut self, buffer: B) {
        self.stats.record_rx(buffer.len());
        self.wire.transmit(buffer);
    }
}

/// Wire that reflects every drained frame back into the receive ring
pub struct Loopback<'a, B> {
    peer: &'a Peer<B>,
}

impl<'a, B: PacketBuffer> Loopback<'a, B> {
    pub fn new(peer: &'a Peer<B>) -> Self {
        Self { peer }
    }
}

impl<B: PacketBuffer> WireSink<B> for Loopback<'_, B> {
    fn transmit(&mut self, buffer: B) {
        // Refusals are already counted and the buffer released
        let _ = self.peer.transmit(buffer);
    }
}

// vNIC engine: two descriptor rings, the readiness gate and the handler slot
//
// Driver side (upper half):  hw_tx_pkt -> [tx ring] -> drain_outgoing  (wire side)
// Wire side (lower half):    deliver_incoming -> [rx ring] -> hw_rx_pkt (driver side)

use crate::buffer::PacketBuffer;
use crate::error::{Rejected, VnicError};
use crate::gate::{Gate, HandlerSlot, InterruptHandler, ReadyState};
use crate::napi::PollScheduler;
use crate::ring::DescRing;
use crate::stats::{NetStats, StatCounters};
use alloc::boxed::Box;
use alloc::sync::Arc;
use alloc::vec::Vec;
use spin::Mutex;
use vnic_config::{ConfigError, VnicConfig};

/// Destination for frames leaving the NIC towards the wire
pub trait WireSink<B> {
    fn transmit(&mut self, buffer: B);
}

impl<B> WireSink<B> for Vec<B> {
    fn transmit(&mut self, buffer: B) {
        self.push(buffer);
    }
}

impl<B, W: WireSink<B> + ?Sized> WireSink<B> for &mut W {
    fn transmit(&mut self, buffer: B) {
        (**self).transmit(buffer)
    }
}

/// Buffers still resident in the rings at teardown
///
/// `tx` goes back to the driver side, `rx` to the wire side. Dropping a
/// buffer releases it.
#[derive(Debug)]
pub struct Leftovers<B> {
    pub tx: Vec<B>,
    pub rx: Vec<B>,
}

impl<B> Leftovers<B> {
    pub fn len(&self) -> usize {
        self.tx.len() + self.rx.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tx.is_empty() && self.rx.is_empty()
    }
}

/// State guarded by the engine lock
struct Inner<B> {
    /// Transmit-pending: driver produces, wire consumes
    tx: DescRing<B>,
    /// Receive-ready: wire produces, driver consumes
    rx: DescRing<B>,
    handler: HandlerSlot,
    /// Signalled after a successful `hw_tx_pkt` so the wire side drains
    tx_notify: Option<Arc<dyn PollScheduler>>,
}

/// Software-simulated network interface card
///
/// All ring access goes through this type, under one lock per instance.
/// Instances are independent; share one between the driver and the wire
/// side with an `Arc`.
pub struct Vnic<B> {
    inner: Mutex<Inner<B>>,
    gate: Gate,
    counters: StatCounters,
}

impl<B> Vnic<B> {
    /// Hook run (outside the lock) after each successful `hw_tx_pkt`
    pub fn set_tx_notify(&self, notify: Arc<dyn PollScheduler>) {
        self.inner.lock().tx_notify = Some(notify);
    }

    pub fn clear_tx_notify(&self) {
        let previous = self.inner.lock().tx_notify.take();
        drop(previous);
    }

    /// Clear the hook only if it is still `notify`
    pub fn clear_tx_notify_if(&self, notify: &Arc<dyn PollScheduler>) {
        let previous = {
            let mut inner = self.inner.lock();
            let installed = inner
                .tx_notify
                .as_ref()
                .is_some_and(|current| same_hook(current, notify));
            if installed {
                inner.tx_notify.take()
            } else {
                None
            }
        };
        drop(previous);
    }
}

// Compare data pointers only; vtable pointers of one type may differ
// between codegen units
fn same_hook(a: &Arc<dyn PollScheduler>, b: &Arc<dyn PollScheduler>) -> bool {
    core::ptr::eq(Arc::as_ptr(a) as *const (), Arc::as_ptr(b) as *const ())
}

impl<B: PacketBuffer> Vnic<B> {
    /// Create a NIC with the given ring sizes (each including the one
    /// reserved slot)
    ///
    /// # Panics
    /// If either size is below 2.
    pub fn new(tx_ring_size: usize, rx_ring_size: usize) -> Self {
        Self {
            inner: Mutex::new(Inner {
                tx: DescRing::new(tx_ring_size),
                rx: DescRing::new(rx_ring_size),
                handler: HandlerSlot::default(),
                tx_notify: None,
            }),
            gate: Gate::new(),
            counters: StatCounters::new(),
        }
    }

    /// Create a NIC with the ring sizes from `config`, after validating it
    pub fn from_config(config: &VnicConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(Self::new(config.tx_ring_size, config.rx_ring_size))
    }

    /// Reset both rings before bringing the NIC up
    ///
    /// Ignored while Ready: live rings are only reset through `hw_init`.
    pub fn setup(&self) {
        let mut inner = self.inner.lock();
        if self.gate.is_ready() {
            log::warn!("vnic: setup while ready ignored");
            return;
        }
        let released = inner.tx.reset() + inner.rx.reset();
        if released > 0 {
            log::warn!("vnic: setup released {} stale buffers", released);
        }
    }

    /// Empty both rings and return the NIC to Uninitialized
    ///
    /// Must follow `hw_shut`; if the NIC is still Ready it is shut first.
    pub fn teardown(&self) -> Leftovers<B> {
        if self.gate.is_ready() {
            log::error!("vnic: teardown while ready, shutting down first");
            self.hw_shut();
        }

        let mut inner = self.inner.lock();
        let leftovers = Leftovers {
            tx: inner.tx.drain_all(),
            rx: inner.rx.drain_all(),
        };
        inner.tx.reset();
        inner.rx.reset();
        self.gate.set_state(ReadyState::Uninitialized);
        drop(inner);

        if !leftovers.is_empty() {
            log::warn!(
                "vnic: teardown returned {} tx / {} rx buffers",
                leftovers.tx.len(),
                leftovers.rx.len()
            );
        }
        leftovers
    }

    /// Install the receive interrupt handler, replacing any previous one
    pub fn register_handler<H: InterruptHandler + 'static>(&self, handler: H) {
        let previous = self.inner.lock().handler.replace(Box::new(handler));
        if previous.is_some() {
            log::debug!("vnic: replaced interrupt handler");
        }
    }

    /// Remove the receive interrupt handler
    ///
    /// Once this returns, the old handler is not running and will not run
    /// again: firing happens under the same lock.
    pub fn unregister_handler(&self) {
        let previous = self.inner.lock().handler.clear();
        drop(previous);
    }

    pub fn has_handler(&self) -> bool {
        self.inner.lock().handler.is_registered()
    }

    /// Bring the NIC to Ready with empty rings and interrupts enabled
    pub fn hw_init(&self) {
        let mut inner = self.inner.lock();
        if self.gate.is_ready() {
            log::debug!("vnic: already ready");
            return;
        }
        let released = inner.tx.reset() + inner.rx.reset();
        if released > 0 {
            log::warn!("vnic: init released {} stale buffers", released);
        }
        self.gate.set_state(ReadyState::Ready);
        self.gate.irq().enable();
        drop(inner);
        log::info!("vnic: hardware ready");
    }

    /// Mask interrupts, then stop accepting buffers
    ///
    /// Idempotent. Buffers already queued stay drainable until `teardown`.
    pub fn hw_shut(&self) {
        let _inner = self.inner.lock();
        self.gate.irq().disable();
        if self.gate.state() == ReadyState::Ready {
            self.gate.set_state(ReadyState::ShuttingDown);
            log::info!("vnic: hardware shutting down");
        }
    }

    /// Re-arm receive interrupts
    ///
    /// If buffers arrived while interrupts were masked and a handler is
    /// registered, it fires now so those buffers are not stranded.
    pub fn enable_intr(&self) {
        let inner = self.inner.lock();
        self.gate.irq().enable();
        if self.gate.is_ready() && !inner.rx.is_empty() {
            inner.handler.fire(self.gate.irq());
        }
    }

    pub fn disable_intr(&self) {
        // Taken so the store cannot land in the middle of a firing
        let _inner = self.inner.lock();
        self.gate.irq().disable();
    }

    /// Queue `buffer` for transmission (driver side)
    ///
    /// On refusal the buffer comes back inside the error and `tx_dropped`
    /// is counted.
    pub fn hw_tx_pkt(&self, buffer: B) -> Result<(), Rejected<B>> {
        let len = buffer.len();

        let notify = {
            let mut inner = self.inner.lock();
            if !self.gate.is_ready() {
                self.counters.tx_dropped();
                return Err(Rejected::new(VnicError::NotReady, buffer));
            }
            if let Err(buffer) = inner.tx.try_enqueue(buffer) {
                self.counters.tx_dropped();
                log::warn!("vnic: tx ring full, dropping {} byte packet", len);
                return Err(Rejected::new(VnicError::Dropped, buffer));
            }
            inner.tx_notify.clone()
        };

        self.counters.record_tx(len);
        if let Some(notify) = notify {
            notify.schedule();
        }
        Ok(())
    }

    /// Take the next received buffer (driver side); never blocks
    pub fn hw_rx_pkt(&self) -> Option<B> {
        let mut inner = self.inner.lock();
        if !self.gate.state().can_drain() {
            return None;
        }
        inner.rx.try_dequeue()
    }

    /// Inject a frame arriving from the network (wire side)
    ///
    /// Refusals count as `rx_dropped` and hand the buffer back. On success
    /// the interrupt handler, if registered and enabled, runs before this
    /// returns.
    pub fn deliver_incoming(&self, buffer: B) -> Result<(), Rejected<B>> {
        let len = buffer.len();
        let mut inner = self.inner.lock();

        if !self.gate.is_ready() {
            self.counters.rx_dropped();
            return Err(Rejected::new(VnicError::NotReady, buffer));
        }
        if let Err(buffer) = inner.rx.try_enqueue(buffer) {
            self.counters.rx_dropped();
            log::warn!("vnic: rx ring full, dropping {} byte packet", len);
            return Err(Rejected::new(VnicError::Dropped, buffer));
        }
        self.counters.record_rx(len);

        if inner.handler.fire(self.gate.irq()) {
            log::trace!("vnic: rx interrupt raised");
        }
        Ok(())
    }

    /// Move up to `budget` queued transmit buffers to `wire` (wire side)
    ///
    /// Buffers are handed over outside the lock. Returns how many moved.
    pub fn drain_outgoing<W: WireSink<B>>(&self, budget: usize, wire: &mut W) -> usize {
        let mut drained = 0;
        while drained < budget {
            let buffer = {
                let mut inner = self.inner.lock();
                if !self.gate.state().can_drain() {
                    break;
                }
                inner.tx.try_dequeue()
            };
            match buffer {
                Some(buffer) => {
                    wire.transmit(buffer);
                    drained += 1;
                }
                None => break,
            }
        }
        drained
    }

    pub fn state(&self) -> ReadyState {
        self.gate.state()
    }

    pub fn is_ready(&self) -> bool {
        self.gate.is_ready()
    }

    pub fn intr_enabled(&self) -> bool {
        self.gate.irq().is_enabled()
    }

    /// Buffers waiting in the transmit ring (diagnostics)
    pub fn tx_pending(&self) -> usize {
        self.inner.lock().tx.count()
    }

    /// Buffers waiting in the receive ring (diagnostics)
    pub fn rx_pending(&self) -> usize {
        self.inner.lock().rx.count()
    }

    pub fn tx_capacity(&self) -> usize {
        self.inner.lock().tx.capacity()
    }

    pub fn rx_capacity(&self) -> usize {
        self.inner.lock().rx.capacity()
    }

    /// Engine counters: `tx_*` for `hw_tx_pkt`, `rx_*` for
    /// `deliver_incoming`
    pub fn stats(&self) -> NetStats {
        self.counters.snapshot()
    }
}

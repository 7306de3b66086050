// Driver upper half for the simulated NIC
//
// Mirrors a netdev's entry points: open/close bring the hardware up and
// down, start_xmit feeds the transmit ring, and poll is the NAPI routine
// that moves received buffers to the network stack.

use crate::buffer::PacketBuffer;
use crate::engine::Vnic;
use crate::error::VnicError;
use crate::frame::log_frame;
use crate::gate::{InterruptHandler, IrqLine};
use crate::napi::{Napi, PacketSink, PollOutcome, PollScheduler};
use crate::stats::{NetStats, StatCounters};
use alloc::sync::Arc;
use alloc::vec::Vec;
use smoltcp::wire::EthernetAddress;
use vnic_config::{types::IfName, ConfigError, MacAddress, VnicConfig};

/// Largest frame accepted for transmission: 1500-byte MTU plus the
/// Ethernet header
pub const MAX_FRAME_LEN: usize = 1514;

/// Trait for network drivers
///
/// Byte-oriented view of a driver, used by the network stack adapter.
pub trait NetworkDriver: Send {
    /// Send a raw Ethernet frame
    ///
    /// # Returns
    /// * `Ok(())` if the frame was queued for transmission
    /// * `Err(VnicError)` if it was dropped
    fn send(&mut self, packet: &[u8]) -> Result<(), VnicError>;

    /// Receive a raw Ethernet frame (non-blocking)
    ///
    /// # Returns
    /// * `Ok(Some(packet))` if a frame was received
    /// * `Ok(None)` if no frame is available
    fn receive(&mut self) -> Result<Option<Vec<u8>>, VnicError>;

    /// The 6-byte MAC address of the interface
    fn mac_address(&self) -> [u8; 6];

    /// Whether the interface is up
    fn is_link_up(&self) -> bool;

    /// Process pending work (must be called regularly)
    fn poll(&mut self) -> Result<(), VnicError>;
}

/// Receive interrupt handler: mask the NIC interrupt, schedule NAPI
struct NapiHandler {
    napi: Arc<Napi>,
}

impl InterruptHandler for NapiHandler {
    fn notify(&self, irq: &IrqLine) {
        irq.disable();
        self.napi.schedule();
    }
}

/// Counts and logs each received buffer before the stack gets it
struct RxAccounting<'a, S: ?Sized> {
    name: &'a str,
    stats: &'a StatCounters,
    sink: &'a mut S,
}

impl<B, S> PacketSink<B> for RxAccounting<'_, S>
where
    B: PacketBuffer,
    S: PacketSink<B> + ?Sized,
{
    fn receive(&mut self, buffer: B) {
        log_frame(self.name, "rx", buffer.as_bytes());
        self.stats.record_rx(buffer.len());
        self.sink.receive(buffer);
    }
}

/// Network device bound to one simulated NIC
pub struct NetDevice<B> {
    name: IfName,
    mac: MacAddress,
    nic: Arc<Vnic<B>>,
    napi: Arc<Napi>,
    weight: usize,
    stats: StatCounters,
}

impl<B: PacketBuffer + Send + 'static> NetDevice<B> {
    /// Create a device with its own NIC, sized from `config`
    pub fn from_config(
        config: &VnicConfig,
        scheduler: Arc<dyn PollScheduler>,
    ) -> Result<Self, ConfigError> {
        let nic = Arc::new(Vnic::from_config(config)?);
        Self::new(config, nic, scheduler)
    }

    /// Create a device for `nic`; `scheduler` is told when a poll pass is
    /// wanted and must eventually call [`NetDevice::poll`].
    pub fn new(
        config: &VnicConfig,
        nic: Arc<Vnic<B>>,
        scheduler: Arc<dyn PollScheduler>,
    ) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(Self {
            name: config.name.clone(),
            mac: config.mac,
            nic,
            napi: Arc::new(Napi::new(scheduler)),
            weight: config.napi_weight,
            stats: StatCounters::new(),
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn nic(&self) -> &Arc<Vnic<B>> {
        &self.nic
    }

    pub fn napi(&self) -> &Napi {
        &self.napi
    }

    pub fn weight(&self) -> usize {
        self.weight
    }

    pub fn mac_address(&self) -> MacAddress {
        self.mac
    }

    /// Change the hardware address; multicast and all-zero are refused
    pub fn set_mac_address(&mut self, mac: MacAddress) -> Result<(), VnicError> {
        let addr = EthernetAddress(mac);
        if !addr.is_unicast() || mac == [0; 6] {
            return Err(VnicError::AddressNotAvailable);
        }
        log::info!("{}: set_mac {}", self.name, addr);
        self.mac = mac;
        Ok(())
    }

    pub fn is_up(&self) -> bool {
        self.nic.is_ready()
    }

    /// Bring the interface up
    pub fn open(&self) {
        log::info!("{}: open", self.name);
        self.nic.setup();
        self.napi.enable();
        self.nic.register_handler(NapiHandler {
            napi: self.napi.clone(),
        });
        self.nic.hw_init();
    }

    /// Bring the interface down, releasing every buffer still queued
    pub fn close(&self) {
        log::info!("{}: close", self.name);
        self.nic.hw_shut();
        self.nic.unregister_handler();
        self.napi.disable();
        let leftovers = self.nic.teardown();
        if !leftovers.is_empty() {
            log::debug!("{}: released {} queued buffers", self.name, leftovers.len());
        }
        drop(leftovers);
        self.stats.reset();
    }

    /// Hand a frame to the NIC for transmission
    ///
    /// A refused frame is released here and counted as dropped; an
    /// oversized one counts as a transmit error.
    pub fn start_xmit(&self, buffer: B) -> Result<(), VnicError> {
        log_frame(&self.name, "tx", buffer.as_bytes());
        let len = buffer.len();
        if len > MAX_FRAME_LEN {
            log::warn!("{}: tx frame of {} bytes exceeds {}", self.name, len, MAX_FRAME_LEN);
            self.stats.tx_error();
            return Err(VnicError::FrameTooLong(len));
        }
        match self.nic.hw_tx_pkt(buffer) {
            Ok(()) => {
                self.stats.record_tx(len);
                Ok(())
            }
            Err(rejected) => {
                self.stats.tx_dropped();
                Err(rejected.into())
            }
        }
    }

    /// NAPI poll routine: move up to `weight` received buffers to `stack`
    pub fn poll<S: PacketSink<B> + ?Sized>(&self, stack: &mut S) -> PollOutcome {
        log::trace!("{}: poll", self.name);
        let mut accounting = RxAccounting {
            name: &self.name,
            stats: &self.stats,
            sink: stack,
        };
        self.napi.poll(&self.nic, &mut accounting, self.weight)
    }

    pub fn stats(&self) -> NetStats {
        self.stats.snapshot()
    }
}

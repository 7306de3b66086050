// smoltcp network stack integration
// Adapts a NetDevice to the NetworkDriver trait and that trait to smoltcp's
// phy::Device

use crate::buffer::Frame;
use crate::driver::{NetDevice, NetworkDriver, MAX_FRAME_LEN};
use crate::engine::Vnic;
use crate::error::VnicError;
use crate::napi::PendingFlag;
use alloc::collections::VecDeque;
use alloc::sync::Arc;
use alloc::vec::Vec;
use smoltcp::phy::{Device, DeviceCapabilities, Medium, RxToken, TxToken};
use smoltcp::time::Instant;
use vnic_config::{ConfigError, VnicConfig};

/// A `NetDevice<Frame>` driven from a run loop
///
/// Received frames land in a backlog that `receive` serves. Each `poll`
/// runs at most one NAPI pass, and only when one was scheduled.
pub struct StackPort {
    dev: NetDevice<Frame>,
    backlog: VecDeque<Frame>,
    pending: Arc<PendingFlag>,
}

impl StackPort {
    pub fn new(config: &VnicConfig, nic: Arc<Vnic<Frame>>) -> Result<Self, ConfigError> {
        let pending = Arc::new(PendingFlag::new());
        Ok(Self {
            dev: NetDevice::new(config, nic, pending.clone())?,
            backlog: VecDeque::new(),
            pending,
        })
    }

    pub fn device(&self) -> &NetDevice<Frame> {
        &self.dev
    }

    pub fn device_mut(&mut self) -> &mut NetDevice<Frame> {
        &mut self.dev
    }

    pub fn open(&mut self) {
        self.dev.open();
    }

    /// Close the device; frames still in the backlog are released
    pub fn close(&mut self) {
        self.dev.close();
        self.backlog.clear();
        self.pending.take();
    }

    /// Frames received but not yet handed to the stack
    pub fn backlog_len(&self) -> usize {
        self.backlog.len()
    }
}

impl NetworkDriver for StackPort {
    fn send(&mut self, packet: &[u8]) -> Result<(), VnicError> {
        self.dev.start_xmit(Frame::from(packet))
    }

    fn receive(&mut self) -> Result<Option<Vec<u8>>, VnicError> {
        if self.backlog.is_empty() {
            self.poll()?;
        }
        Ok(self.backlog.pop_front().map(Frame::into_vec))
    }

    fn mac_address(&self) -> [u8; 6] {
        self.dev.mac_address()
    }

    fn is_link_up(&self) -> bool {
        self.dev.is_up()
    }

    fn poll(&mut self) -> Result<(), VnicError> {
        if self.pending.take() {
            self.dev.poll(&mut self.backlog);
        }
        Ok(())
    }
}

/// Device wrapper that adapts a NetworkDriver to smoltcp's Device trait
pub struct VnicDevice<D> {
    driver: D,
}

impl<D: NetworkDriver> VnicDevice<D> {
    pub fn new(driver: D) -> Self {
        Self { driver }
    }

    pub fn driver(&self) -> &D {
        &self.driver
    }

    pub fn driver_mut(&mut self) -> &mut D {
        &mut self.driver
    }

    pub fn into_inner(self) -> D {
        self.driver
    }
}

/// RX token implementation for smoltcp
pub struct RxTokenWrapper {
    buffer: Vec<u8>,
}

impl RxToken for RxTokenWrapper {
    fn consume<R, F>(mut self, f: F) -> R
    where
        F: FnOnce(&mut [u8]) -> R,
    {
        f(&mut self.buffer)
    }
}

/// TX token implementation for smoltcp
pub struct TxTokenWrapper<'a, D> {
    driver: &'a mut D,
}

impl<D: NetworkDriver> TxToken for TxTokenWrapper<'_, D> {
    fn consume<R, F>(self, len: usize, f: F) -> R
    where
        F: FnOnce(&mut [u8]) -> R,
    {
        let mut buffer = vec![0u8; len];
        let result = f(&mut buffer);

        // smoltcp has no way to take the error back; the driver counted it
        if let Err(e) = self.driver.send(&buffer) {
            log::debug!("stack: tx of {} bytes failed: {}", len, e);
        }

        result
    }
}

impl<D: NetworkDriver> Device for VnicDevice<D> {
    type RxToken<'a> = RxTokenWrapper where Self: 'a;
    type TxToken<'a> = TxTokenWrapper<'a, D> where Self: 'a;

    fn receive(&mut self, _timestamp: Instant) -> Option<(Self::RxToken<'_>, Self::TxToken<'_>)> {
        match self.driver.receive() {
            Ok(Some(packet)) => Some((
                RxTokenWrapper { buffer: packet },
                TxTokenWrapper {
                    driver: &mut self.driver,
                },
            )),
            Ok(None) => None,
            Err(e) => {
                log::debug!("stack: receive failed: {}", e);
                None
            }
        }
    }

    fn transmit(&mut self, _timestamp: Instant) -> Option<Self::TxToken<'_>> {
        if !self.driver.is_link_up() {
            return None;
        }
        Some(TxTokenWrapper {
            driver: &mut self.driver,
        })
    }

    fn capabilities(&self) -> DeviceCapabilities {
        let mut caps = DeviceCapabilities::default();
        caps.max_transmission_unit = MAX_FRAME_LEN;
        caps.max_burst_size = Some(1);
        caps.medium = Medium::Ethernet;
        caps
    }
}

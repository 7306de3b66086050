// Readiness state and interrupt emulation for the simulated NIC

use alloc::boxed::Box;
use core::fmt;
use core::sync::atomic::{AtomicBool, AtomicU8, Ordering};

/// Hardware lifecycle of the simulated NIC
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReadyState {
    /// Rings not live; only setup and teardown are permitted
    Uninitialized = 0,
    /// Both rings live, every hardware operation permitted
    Ready = 1,
    /// Queued buffers may still be drained, nothing new is accepted
    ShuttingDown = 2,
}

impl ReadyState {
    fn from_u8(raw: u8) -> Self {
        match raw {
            1 => ReadyState::Ready,
            2 => ReadyState::ShuttingDown,
            _ => ReadyState::Uninitialized,
        }
    }

    /// Whether queued buffers may be taken off the rings
    pub fn can_drain(self) -> bool {
        self != ReadyState::Uninitialized
    }
}

impl fmt::Display for ReadyState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ReadyState::Uninitialized => write!(f, "Uninitialized"),
            ReadyState::Ready => write!(f, "Ready"),
            ReadyState::ShuttingDown => write!(f, "ShuttingDown"),
        }
    }
}

/// NIC-level interrupt enable
///
/// Handed to the interrupt handler so it can mask further interrupts from
/// inside the firing path, where the engine lock is already held.
#[derive(Debug, Default)]
pub struct IrqLine {
    enabled: AtomicBool,
}

impl IrqLine {
    pub const fn new() -> Self {
        Self {
            enabled: AtomicBool::new(false),
        }
    }

    pub fn enable(&self) {
        self.enabled.store(true, Ordering::Release);
    }

    pub fn disable(&self) {
        self.enabled.store(false, Ordering::Release);
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled.load(Ordering::Acquire)
    }
}

/// Receiver of simulated receive interrupts
///
/// `notify` runs synchronously inside the engine's critical section. It is
/// expected to mask interrupts through `irq` and schedule a poll; it must
/// not call back into the engine or drain the rings itself.
pub trait InterruptHandler: Send + Sync {
    fn notify(&self, irq: &IrqLine);
}

impl<F> InterruptHandler for F
where
    F: Fn(&IrqLine) + Send + Sync,
{
    fn notify(&self, irq: &IrqLine) {
        self(irq)
    }
}

/// Ready state plus interrupt enable, readable without the engine lock
#[derive(Debug)]
pub struct Gate {
    state: AtomicU8,
    irq: IrqLine,
}

impl Gate {
    pub const fn new() -> Self {
        Self {
            state: AtomicU8::new(ReadyState::Uninitialized as u8),
            irq: IrqLine::new(),
        }
    }

    pub fn state(&self) -> ReadyState {
        ReadyState::from_u8(self.state.load(Ordering::Acquire))
    }

    pub(crate) fn set_state(&self, state: ReadyState) {
        self.state.store(state as u8, Ordering::Release);
    }

    pub fn is_ready(&self) -> bool {
        self.state() == ReadyState::Ready
    }

    pub fn irq(&self) -> &IrqLine {
        &self.irq
    }
}

impl Default for Gate {
    fn default() -> Self {
        Self::new()
    }
}

/// Registered interrupt handler, kept inside the engine's locked state
#[derive(Default)]
pub(crate) struct HandlerSlot {
    handler: Option<Box<dyn InterruptHandler>>,
}

impl HandlerSlot {
    /// Install `handler`, returning the one it replaces
    pub(crate) fn replace(
        &mut self,
        handler: Box<dyn InterruptHandler>,
    ) -> Option<Box<dyn InterruptHandler>> {
        self.handler.replace(handler)
    }

    pub(crate) fn clear(&mut self) -> Option<Box<dyn InterruptHandler>> {
        self.handler.take()
    }

    pub(crate) fn is_registered(&self) -> bool {
        self.handler.is_some()
    }

    /// Invoke the handler if interrupts are enabled and one is registered
    ///
    /// Returns whether the handler ran. Callers hold the engine lock, so the
    /// enable check and the handler lookup form one step with respect to
    /// `replace`, `clear` and other firings.
    pub(crate) fn fire(&self, irq: &IrqLine) -> bool {
        if !irq.is_enabled() {
            return false;
        }
        match &self.handler {
            Some(handler) => {
                handler.notify(irq);
                true
            }
            None => false,
        }
    }
}

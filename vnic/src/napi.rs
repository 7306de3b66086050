// NAPI-style budgeted receive polling
//
// The interrupt handler masks the NIC interrupt and schedules a poll. Each
// poll pass drains at most `budget` buffers. A pass that empties the ring
// before exhausting its budget completes and re-arms the interrupt; a pass
// that uses the whole budget stays scheduled and asks for another pass.

use crate::buffer::PacketBuffer;
use crate::engine::Vnic;
use alloc::collections::VecDeque;
use alloc::sync::Arc;
use alloc::vec::Vec;
use core::fmt;
use core::sync::atomic::{AtomicBool, AtomicU8, Ordering};

/// "Run my poll routine, possibly later, possibly on another context"
///
/// May be called with the engine lock held (from the interrupt handler), so
/// implementations must only record the request, never poll inline.
pub trait PollScheduler: Send + Sync {
    fn schedule(&self);
}

impl<F> PollScheduler for F
where
    F: Fn() + Send + Sync,
{
    fn schedule(&self) {
        self()
    }
}

/// Scheduler that records a pending request for a run loop to pick up
#[derive(Debug, Default)]
pub struct PendingFlag {
    pending: AtomicBool,
}

impl PendingFlag {
    pub const fn new() -> Self {
        Self {
            pending: AtomicBool::new(false),
        }
    }

    /// Consume the pending request, if any
    pub fn take(&self) -> bool {
        self.pending.swap(false, Ordering::AcqRel)
    }

    pub fn is_pending(&self) -> bool {
        self.pending.load(Ordering::Acquire)
    }
}

impl PollScheduler for PendingFlag {
    fn schedule(&self) {
        self.pending.store(true, Ordering::Release);
    }
}

/// Where received buffers go: the network stack
pub trait PacketSink<B> {
    fn receive(&mut self, buffer: B);
}

impl<B> PacketSink<B> for Vec<B> {
    fn receive(&mut self, buffer: B) {
        self.push(buffer);
    }
}

impl<B> PacketSink<B> for VecDeque<B> {
    fn receive(&mut self, buffer: B) {
        self.push_back(buffer);
    }
}

impl<B, S: PacketSink<B> + ?Sized> PacketSink<B> for &mut S {
    fn receive(&mut self, buffer: B) {
        (**self).receive(buffer)
    }
}

#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NapiState {
    /// Not accepting schedules (before enable / after disable)
    Disabled = 0,
    /// Waiting for an interrupt
    Idle = 1,
    /// A poll pass has been requested
    Scheduled = 2,
    /// A poll pass is running
    Draining = 3,
}

impl NapiState {
    fn from_u8(raw: u8) -> Self {
        match raw {
            1 => NapiState::Idle,
            2 => NapiState::Scheduled,
            3 => NapiState::Draining,
            _ => NapiState::Disabled,
        }
    }
}

impl fmt::Display for NapiState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NapiState::Disabled => write!(f, "Disabled"),
            NapiState::Idle => write!(f, "Idle"),
            NapiState::Scheduled => write!(f, "Scheduled"),
            NapiState::Draining => write!(f, "Draining"),
        }
    }
}

/// Result of one poll pass
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollOutcome {
    /// Buffers handed to the sink
    pub work_done: usize,
    /// The ring was seen empty within budget; interrupts are re-armed
    pub complete: bool,
}

/// Poll context for one NIC
pub struct Napi {
    state: AtomicU8,
    scheduler: Arc<dyn PollScheduler>,
}

impl Napi {
    /// New context, initially disabled
    pub fn new(scheduler: Arc<dyn PollScheduler>) -> Self {
        Self {
            state: AtomicU8::new(NapiState::Disabled as u8),
            scheduler,
        }
    }

    pub fn state(&self) -> NapiState {
        NapiState::from_u8(self.state.load(Ordering::Acquire))
    }

    pub fn is_scheduled(&self) -> bool {
        self.state() == NapiState::Scheduled
    }

    fn transition(&self, from: NapiState, to: NapiState) -> bool {
        self.state
            .compare_exchange(from as u8, to as u8, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
    }

    /// Disabled -> Idle
    pub fn enable(&self) {
        if !self.transition(NapiState::Disabled, NapiState::Idle) {
            log::debug!("napi: enable in state {}", self.state());
        }
    }

    /// Stop accepting schedules, waiting out a pass in progress
    ///
    /// Spins while a pass is draining, so it must not be called from the
    /// polling context itself (for example from a `PacketSink`); that pass
    /// would never finish.
    pub fn disable(&self) {
        loop {
            let current = self.state();
            if current == NapiState::Draining {
                core::hint::spin_loop();
                continue;
            }
            if self.transition(current, NapiState::Disabled) {
                return;
            }
        }
    }

    /// Idle -> Scheduled, then ask the scheduler for a pass
    ///
    /// Returns false if a pass is already pending or running, or the
    /// context is disabled.
    pub fn schedule(&self) -> bool {
        if self.transition(NapiState::Idle, NapiState::Scheduled) {
            self.scheduler.schedule();
            true
        } else {
            false
        }
    }

    /// Run one budgeted poll pass
    ///
    /// Takes buffers from `nic` with `hw_rx_pkt` and hands each to `sink`,
    /// stopping at `budget` or when the ring is empty. Only the empty case
    /// completes the pass and re-enables interrupts; otherwise the context
    /// stays scheduled and the scheduler is asked for another pass.
    ///
    /// A request still pending when the context was disabled is served as
    /// an empty, complete pass.
    pub fn poll<B, S>(&self, nic: &Vnic<B>, sink: &mut S, budget: usize) -> PollOutcome
    where
        B: PacketBuffer,
        S: PacketSink<B> + ?Sized,
    {
        if !self.transition(NapiState::Scheduled, NapiState::Draining) {
            let state = self.state();
            if state == NapiState::Disabled {
                log::debug!("napi: poll after disable ignored");
                return PollOutcome {
                    work_done: 0,
                    complete: true,
                };
            }
            log::error!("napi: poll without a pending schedule (state {})", state);
            debug_assert!(false, "napi poll in state {}", state);
            return PollOutcome {
                work_done: 0,
                complete: false,
            };
        }

        let mut work_done = 0;
        while work_done < budget {
            match nic.hw_rx_pkt() {
                Some(buffer) => {
                    sink.receive(buffer);
                    work_done += 1;
                }
                None => break,
            }
        }

        let complete = work_done < budget;
        if complete {
            // Idle before re-arming, so an interrupt raised by enable_intr
            // can schedule the next pass
            self.state.store(NapiState::Idle as u8, Ordering::Release);
            nic.enable_intr();
        } else {
            self.state.store(NapiState::Scheduled as u8, Ordering::Release);
            self.scheduler.schedule();
        }

        log::trace!("napi: poll done {} of {}, complete={}", work_done, budget, complete);
        PollOutcome {
            work_done,
            complete,
        }
    }
}

impl fmt::Debug for Napi {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Napi").field("state", &self.state()).finish()
    }
}

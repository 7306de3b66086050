#![no_std]

// Software-simulated network interface card
// Descriptor rings, an interrupt gate and NAPI-style budgeted polling, plus a
// driver upper half, a wire-side peer and smoltcp integration on top

#[macro_use]
extern crate alloc;

pub mod buffer;
pub mod driver;
pub mod engine;
pub mod error;
pub mod frame;
pub mod gate;
pub mod napi;
pub mod peer;
pub mod ring;
pub mod stack;
pub mod stats;

// Re-export commonly used types
pub use buffer::{Frame, PacketBuffer};
pub use driver::{NetDevice, NetworkDriver, MAX_FRAME_LEN};
pub use engine::{Leftovers, Vnic, WireSink};
pub use error::{Rejected, VnicError};
pub use frame::{log_frame, FrameSummary};
pub use gate::{InterruptHandler, IrqLine, ReadyState};
pub use napi::{Napi, NapiState, PacketSink, PendingFlag, PollOutcome, PollScheduler};
pub use peer::{Loopback, Peer};
pub use ring::DescRing;
pub use stack::{StackPort, VnicDevice};
pub use stats::NetStats;
pub use vnic_config::{ConfigError, VnicConfig};

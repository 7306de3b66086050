// Error types for the simulated NIC

use core::fmt;
use thiserror::Error;

/// Why the NIC refused a buffer
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum VnicError {
    /// The target ring was full; the buffer was not queued
    #[error("ring full, packet dropped")]
    Dropped,

    /// The NIC is not in the Ready state
    #[error("device not ready")]
    NotReady,

    /// Larger than the interface's maximum frame length
    #[error("frame too long: {0} bytes")]
    FrameTooLong(usize),

    /// Address is multicast or all-zero
    #[error("address not available")]
    AddressNotAvailable,
}

/// A buffer the NIC refused, handed back to its owner
///
/// The caller decides whether to retry or release it. Dropping the
/// rejection releases the buffer.
pub struct Rejected<B> {
    pub error: VnicError,
    pub buffer: B,
}

impl<B> Rejected<B> {
    pub fn new(error: VnicError, buffer: B) -> Self {
        Self { error, buffer }
    }

    pub fn into_buffer(self) -> B {
        self.buffer
    }
}

impl<B> fmt::Debug for Rejected<B> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Rejected")
            .field("error", &self.error)
            .finish_non_exhaustive()
    }
}

impl<B> fmt::Display for Rejected<B> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.error, f)
    }
}

impl<B> core::error::Error for Rejected<B> {
    fn source(&self) -> Option<&(dyn core::error::Error + 'static)> {
        Some(&self.error)
    }
}

/// Releases the buffer and keeps the reason
impl<B> From<Rejected<B>> for VnicError {
    fn from(rejected: Rejected<B>) -> Self {
        rejected.error
    }
}

// Packet buffers handed between the driver, the engine and the wire

use alloc::boxed::Box;
use alloc::vec::Vec;

/// Opaque handle to a packet's bytes
///
/// Ownership of a buffer moves between the driver, the rings and the wire;
/// it is never copied to transfer ownership. Releasing a buffer is dropping
/// it, so a buffer can be released exactly once.
pub trait PacketBuffer {
    /// The packet bytes, starting at the Ethernet header
    fn as_bytes(&self) -> &[u8];

    fn len(&self) -> usize {
        self.as_bytes().len()
    }

    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Heap-allocated Ethernet frame
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Frame {
    data: Vec<u8>,
}

impl Frame {
    pub fn new(data: Vec<u8>) -> Self {
        Self { data }
    }

    /// Zero-filled frame of `len` bytes, for callers that fill it in place
    pub fn zeroed(len: usize) -> Self {
        Self { data: vec![0; len] }
    }

    pub fn as_mut_slice(&mut self) -> &mut [u8] {
        &mut self.data
    }

    pub fn into_vec(self) -> Vec<u8> {
        self.data
    }
}

impl From<Vec<u8>> for Frame {
    fn from(data: Vec<u8>) -> Self {
        Self::new(data)
    }
}

impl From<&[u8]> for Frame {
    fn from(data: &[u8]) -> Self {
        Self::new(data.to_vec())
    }
}

impl PacketBuffer for Frame {
    fn as_bytes(&self) -> &[u8] {
        &self.data
    }
}

impl PacketBuffer for Vec<u8> {
    fn as_bytes(&self) -> &[u8] {
        self
    }
}

impl PacketBuffer for Box<[u8]> {
    fn as_bytes(&self) -> &[u8] {
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_frame_len() {
        let frame = Frame::from(&[1u8, 2, 3][..]);
        assert_eq!(frame.len(), 3);
        assert!(!frame.is_empty());
        assert!(Frame::default().is_empty());
    }

    #[test]
    fn test_frame_fill_in_place() {
        let mut frame = Frame::zeroed(4);
        frame.as_mut_slice()[0] = 0xff;
        assert_eq!(frame.into_vec(), vec![0xff, 0, 0, 0]);
    }
}

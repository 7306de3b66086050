// Descriptor ring shared by the transmit and receive paths

use alloc::boxed::Box;
use alloc::vec::Vec;
use core::iter;

/// Fixed-capacity circular ring of buffer slots
///
/// The producer fills the slot at `producer` and advances it; the consumer
/// empties the slot at `consumer` and advances it. One slot always stays
/// free, so:
///
/// * empty: `producer == consumer`
/// * full: `(consumer - (producer + 1) + N) % N == 0`
/// * count: `(producer - consumer + N) % N`, at most `N - 1`
///
/// Slots in `[consumer, producer)` (mod N) hold a buffer, every other slot
/// is `None`.
///
/// The ring has no lock of its own. The engine keeps both of its rings
/// behind a single mutex and only touches them with that lock held.
pub struct DescRing<B> {
    slots: Box<[Option<B>]>,
    producer: usize,
    consumer: usize,
}

impl<B> DescRing<B> {
    /// Create an empty ring with `capacity` slots
    ///
    /// # Panics
    /// If `capacity < 2`: with the reserved slot such a ring could never
    /// hold a buffer.
    pub fn new(capacity: usize) -> Self {
        assert!(capacity >= 2, "descriptor ring needs at least 2 slots, got {}", capacity);
        Self {
            slots: iter::repeat_with(|| None).take(capacity).collect(),
            producer: 0,
            consumer: 0,
        }
    }

    /// Total number of slots, including the reserved one
    pub fn capacity(&self) -> usize {
        self.slots.len()
    }

    fn advance(&self, index: usize) -> usize {
        (index + 1) % self.capacity()
    }

    pub fn is_empty(&self) -> bool {
        self.producer == self.consumer
    }

    pub fn is_full(&self) -> bool {
        // (consumer - (producer + 1) + N) % N == 0
        self.advance(self.producer) == self.consumer
    }

    /// Number of buffers currently held
    ///
    /// For diagnostics. Callers deciding whether to enqueue or dequeue must
    /// use the result of `try_enqueue` / `try_dequeue` instead.
    pub fn count(&self) -> usize {
        let n = self.capacity();
        (self.producer + n - self.consumer) % n
    }

    /// Store `buffer` at the producer index
    ///
    /// A full ring refuses the buffer and hands it back; nothing already
    /// queued is ever evicted.
    pub fn try_enqueue(&mut self, buffer: B) -> Result<(), B> {
        if self.is_full() {
            return Err(buffer);
        }

        let slot = &mut self.slots[self.producer];
        debug_assert!(slot.is_none(), "free slot {} still holds a buffer", self.producer);
        *slot = Some(buffer);
        self.producer = self.advance(self.producer);
        Ok(())
    }

    /// Take the buffer at the consumer index, leaving the slot empty
    pub fn try_dequeue(&mut self) -> Option<B> {
        if self.is_empty() {
            return None;
        }

        let buffer = self.slots[self.consumer].take();
        debug_assert!(buffer.is_some(), "live slot {} is empty", self.consumer);
        self.consumer = self.advance(self.consumer);
        buffer
    }

    /// Dequeue every held buffer, oldest first
    ///
    /// The caller owns the returned buffers and is responsible for
    /// releasing them.
    pub fn drain_all(&mut self) -> Vec<B> {
        iter::from_fn(|| self.try_dequeue()).collect()
    }

    /// Release every held buffer and rewind both indices to 0
    ///
    /// Returns how many buffers were released.
    pub fn reset(&mut self) -> usize {
        let released = self.drain_all().len();
        self.producer = 0;
        self.consumer = 0;
        released
    }
}

impl<B> core::fmt::Debug for DescRing<B> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("DescRing")
            .field("capacity", &self.capacity())
            .field("producer", &self.producer)
            .field("consumer", &self.consumer)
            .field("count", &self.count())
            .finish()
    }
}

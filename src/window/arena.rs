//! Fixed-stride storage for outstanding frame payloads.
//!
//! One contiguous allocation of `window × mtu` bytes. Slots are addressed by
//! their offset from the oldest unacknowledged frame, so the sequence space
//! (modulo 8) and the slot ring (modulo window) never have to line up.

use super::timer::RetryTimer;

#[derive(Debug, Clone, Copy, Default)]
struct Slot {
    len: usize,
    timer: RetryTimer,
}

/// Ring of payload slots owned by the send window.
#[derive(Debug)]
pub struct FrameArena {
    data: Box<[u8]>,
    slots: Box<[Slot]>,
    mtu: usize,
    /// Slot holding the oldest unacknowledged frame.
    head: usize,
}

impl FrameArena {
    /// Allocate `slots × mtu` bytes.
    pub fn new(slots: usize, mtu: usize) -> Self {
        Self {
            data: vec![0u8; slots * mtu].into_boxed_slice(),
            slots: vec![Slot::default(); slots].into_boxed_slice(),
            mtu,
            head: 0,
        }
    }

    /// Number of slots.
    pub fn slots(&self) -> usize {
        self.slots.len()
    }

    /// Bytes per slot.
    pub fn mtu(&self) -> usize {
        self.mtu
    }

    /// Total payload bytes held by the arena.
    pub fn capacity(&self) -> usize {
        self.data.len()
    }

    fn index(&self, offset: usize) -> usize {
        debug_assert!(offset < self.slots.len());
        (self.head + offset) % self.slots.len()
    }

    /// Copy `payload` into the slot `offset` frames past the head.
    ///
    /// The caller guarantees `payload.len() <= mtu`.
    pub fn store(&mut self, offset: usize, payload: &[u8]) {
        let index = self.index(offset);
        let start = index * self.mtu;
        self.data[start..start + payload.len()].copy_from_slice(payload);
        self.slots[index] = Slot {
            len: payload.len(),
            timer: RetryTimer::default(),
        };
    }

    /// Payload stored at `offset`.
    pub fn payload(&self, offset: usize) -> &[u8] {
        let index = self.index(offset);
        let start = index * self.mtu;
        &self.data[start..start + self.slots[index].len]
    }

    /// Retry timer of the frame at `offset`.
    pub fn timer(&self, offset: usize) -> &RetryTimer {
        &self.slots[self.index(offset)].timer
    }

    /// Mutable retry timer of the frame at `offset`.
    pub fn timer_mut(&mut self, offset: usize) -> &mut RetryTimer {
        let index = self.index(offset);
        &mut self.slots[index].timer
    }

    /// Release `count` slots at the head.
    pub fn advance(&mut self, count: usize) {
        for offset in 0..count {
            let index = self.index(offset);
            self.slots[index] = Slot::default();
        }
        self.head = (self.head + count) % self.slots.len();
    }

    /// Forget every stored frame.
    pub fn clear(&mut self) {
        self.slots.fill(Slot::default());
        self.head = 0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_store_and_read_back() {
        let mut arena = FrameArena::new(3, 4);
        arena.store(0, b"ab");
        arena.store(1, b"wxyz");
        assert_eq!(arena.payload(0), b"ab");
        assert_eq!(arena.payload(1), b"wxyz");
        assert_eq!(arena.capacity(), 12);
    }

    #[test]
    fn test_advance_rotates_head() {
        let mut arena = FrameArena::new(3, 2);
        arena.store(0, b"a");
        arena.store(1, b"b");
        arena.store(2, b"c");
        arena.advance(2);
        assert_eq!(arena.payload(0), b"c");

        // Offsets past the old tail wrap onto the freed slots
        arena.store(1, b"d");
        arena.store(2, b"e");
        assert_eq!(arena.payload(1), b"d");
        assert_eq!(arena.payload(2), b"e");
        assert_eq!(arena.payload(0), b"c");
    }

    #[test]
    fn test_clear() {
        let mut arena = FrameArena::new(2, 2);
        arena.store(0, b"x");
        arena.advance(1);
        arena.clear();
        assert_eq!(arena.payload(0), b"");
        assert_eq!(arena.slots(), 2);
        assert_eq!(arena.mtu(), 2);
    }
}

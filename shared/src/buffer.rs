//! # Receive Ring Buffer
//!
//! Fixed-capacity circular byte store sitting between the transport's
//! producer path and the framing state machine.
//!
//! ## Claim / Finish
//!
//! Reads are zero-copy and happen in two steps: [`RingBuffer::claim`] borrows
//! a contiguous view of unread bytes, and [`RingBuffer::finish`] commits how
//! many of them were consumed. Because storage is circular, a claim can come
//! back **shorter than requested** even when enough bytes are buffered:
//!
//! ```text
//! ┌──────────────┬──────────────────────────┬─────────────────────┐
//! │ tail of msg  │        free space        │    head of msg      │
//! └──────────────┴──────────────────────────┴─────────────────────┘
//!                                           ▲                     ▲
//!                                          head          end of storage
//!
//! claim(len) returns only [head..end]; the remainder sits at index 0.
//! ```
//!
//! Callers that need the whole region either use [`RingBuffer::claim_split`]
//! or copy it out with [`RingBuffer::read`].

/// A view of buffered bytes that may straddle the end of the storage
#[derive(Debug)]
pub struct BufferSlice<'a> {
    /// First contiguous chunk (before wrap-around)
    pub first: &'a [u8],
    /// Second contiguous chunk (after wrap-around, may be empty)
    pub second: &'a [u8],
}

impl<'a> BufferSlice<'a> {
    /// Total length across both chunks
    pub fn len(&self) -> usize {
        self.first.len() + self.second.len()
    }

    /// Check if the slice is empty
    pub fn is_empty(&self) -> bool {
        self.first.is_empty() && self.second.is_empty()
    }

    /// True when the view needed no wrap-around
    pub fn is_contiguous(&self) -> bool {
        self.second.is_empty()
    }
}

/// Errors specific to buffer operations
///
/// Writes never fail; [`RingBuffer::push`] reports a short count instead.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum BufferError {
    /// Attempted to consume more data than is buffered
    Underflow,
}

/// Circular FIFO of bytes with a fixed capacity of `N`
///
/// All `N` bytes are usable; occupancy is tracked with an explicit length
/// rather than by sacrificing a slot. The buffer never overwrites bytes that
/// have not been finished.
///
/// # Example
///
/// ```rust
/// use ampoule_shared::buffer::RingBuffer;
///
/// let mut rb = RingBuffer::<8>::new();
/// assert_eq!(rb.push(b"hello"), 5);
///
/// let view = rb.claim(5);
/// assert_eq!(view, b"hello");
/// rb.finish(5).unwrap();
/// assert!(rb.is_empty());
/// ```
pub struct RingBuffer<const N: usize> {
    data: [u8; N],
    /// Index of the oldest unread byte
    head: usize,
    /// Number of unread bytes
    len: usize,
}

impl<const N: usize> RingBuffer<N> {
    const NON_EMPTY: () = assert!(N > 0, "ring buffer capacity must be non-zero");

    /// Create an empty buffer
    pub const fn new() -> Self {
        let () = Self::NON_EMPTY;
        Self {
            data: [0u8; N],
            head: 0,
            len: 0,
        }
    }

    /// Total capacity in bytes
    #[inline]
    pub const fn capacity(&self) -> usize {
        N
    }

    /// Number of bytes available to read
    #[inline]
    pub fn size(&self) -> usize {
        self.len
    }

    /// Number of bytes that can be pushed before the buffer is full
    #[inline]
    pub fn space(&self) -> usize {
        N - self.len
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    #[inline]
    pub fn is_full(&self) -> bool {
        self.len == N
    }

    /// Append as many bytes of `data` as fit
    ///
    /// Returns how many were written. A count smaller than `data.len()`
    /// means the buffer ran out of space; the caller decides what to do with
    /// the rest.
    pub fn push(&mut self, data: &[u8]) -> usize {
        let len = data.len().min(self.space());
        if len == 0 {
            return 0;
        }

        let tail = (self.head + self.len) % N;
        let first_len = len.min(N - tail);
        self.data[tail..tail + first_len].copy_from_slice(&data[..first_len]);
        self.data[..len - first_len].copy_from_slice(&data[first_len..len]);

        self.len += len;
        len
    }

    /// Remove and return the oldest byte
    pub fn pop(&mut self) -> Option<u8> {
        if self.len == 0 {
            return None;
        }

        let byte = self.data[self.head];
        self.head = (self.head + 1) % N;
        self.len -= 1;
        Some(byte)
    }

    /// Borrow up to `max_len` unread bytes without copying
    ///
    /// The view stops at the end of the backing storage, so it can be
    /// shorter than both `max_len` and [`size`](Self::size). Nothing is
    /// consumed until [`finish`](Self::finish) is called.
    pub fn claim(&self, max_len: usize) -> &[u8] {
        let len = max_len.min(self.len);
        let end = (self.head + len).min(N);
        &self.data[self.head..end]
    }

    /// Borrow up to `max_len` unread bytes as two chunks
    pub fn claim_split(&self, max_len: usize) -> BufferSlice<'_> {
        let len = max_len.min(self.len);
        let first_len = len.min(N - self.head);

        BufferSlice {
            first: &self.data[self.head..self.head + first_len],
            second: &self.data[..len - first_len],
        }
    }

    /// Commit consumption of the first `len` unread bytes
    pub fn finish(&mut self, len: usize) -> Result<(), BufferError> {
        if len > self.len {
            return Err(BufferError::Underflow);
        }

        self.head = (self.head + len) % N;
        self.len -= len;
        Ok(())
    }

    /// Copy unread bytes into `buf` and consume them
    ///
    /// Handles wrap-around, so this always yields `min(buf.len(), size())`
    /// bytes.
    pub fn read(&mut self, buf: &mut [u8]) -> usize {
        let view = self.claim_split(buf.len());
        let len = view.len();
        let first_len = view.first.len();

        buf[..first_len].copy_from_slice(view.first);
        buf[first_len..len].copy_from_slice(view.second);

        self.head = (self.head + len) % N;
        self.len -= len;
        len
    }

    /// Drop all buffered content
    pub fn reset(&mut self) {
        self.head = 0;
        self.len = 0;
    }
}

impl<const N: usize> Default for RingBuffer<N> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Leave the read cursor at `offset` with an empty buffer
    fn advanced<const N: usize>(offset: usize) -> RingBuffer<N> {
        let mut rb = RingBuffer::<N>::new();
        let filler = [0u8; N];
        rb.push(&filler[..offset]);
        rb.finish(offset).unwrap();
        rb
    }

    #[test]
    fn test_new_buffer_is_empty() {
        let rb = RingBuffer::<16>::new();
        assert!(rb.is_empty());
        assert!(!rb.is_full());
        assert_eq!(rb.size(), 0);
        assert_eq!(rb.space(), 16);
        assert_eq!(rb.capacity(), 16);
        assert!(rb.claim(4).is_empty());
    }

    #[test]
    fn test_push_and_pop_fifo() {
        let mut rb = RingBuffer::<16>::new();
        assert_eq!(rb.push(&[1, 2, 3]), 3);

        assert_eq!(rb.pop(), Some(1));
        assert_eq!(rb.pop(), Some(2));
        assert_eq!(rb.pop(), Some(3));
        assert_eq!(rb.pop(), None);
    }

    #[test]
    fn test_full_capacity_is_usable() {
        let mut rb = RingBuffer::<8>::new();
        assert_eq!(rb.push(&[0xAB; 8]), 8);
        assert!(rb.is_full());
        assert_eq!(rb.space(), 0);
    }

    #[test]
    fn test_short_push_on_overflow() {
        let mut rb = RingBuffer::<8>::new();
        rb.push(&[0u8; 5]);

        assert_eq!(rb.push(b"abcdef"), 3);
        assert_eq!(rb.size(), 8);
        assert_eq!(rb.push(b"z"), 0);
    }

    #[test]
    fn test_push_never_overwrites_unread() {
        let mut rb = RingBuffer::<4>::new();
        rb.push(&[1, 2, 3, 4]);
        rb.push(&[9, 9]);

        let mut out = [0u8; 4];
        assert_eq!(rb.read(&mut out), 4);
        assert_eq!(out, [1, 2, 3, 4]);
    }

    #[test]
    fn test_claim_finish() {
        let mut rb = RingBuffer::<16>::new();
        rb.push(b"hello world");

        assert_eq!(rb.claim(5), b"hello");
        // Claiming alone consumes nothing
        assert_eq!(rb.size(), 11);

        rb.finish(5).unwrap();
        assert_eq!(rb.claim(64), b" world");
    }

    #[test]
    fn test_claim_is_short_across_wrap() {
        let mut rb = advanced::<8>(6);
        rb.push(&[1, 2, 3, 4]);

        // Four bytes buffered but only two sit before the end of storage
        assert_eq!(rb.size(), 4);
        assert_eq!(rb.claim(4), &[1, 2]);

        rb.finish(2).unwrap();
        assert_eq!(rb.claim(4), &[3, 4]);
    }

    #[test]
    fn test_claim_split_across_wrap() {
        let mut rb = advanced::<8>(6);
        rb.push(&[1, 2, 3, 4, 5]);

        let view = rb.claim_split(5);
        assert!(!view.is_contiguous());
        assert_eq!(view.first, &[1, 2]);
        assert_eq!(view.second, &[3, 4, 5]);
        assert_eq!(view.len(), 5);
    }

    #[test]
    fn test_read_copies_across_wrap() {
        let mut rb = advanced::<8>(5);
        rb.push(&[1, 2, 3, 4, 5, 6]);

        let mut out = [0u8; 6];
        assert_eq!(rb.read(&mut out), 6);
        assert_eq!(out, [1, 2, 3, 4, 5, 6]);
        assert!(rb.is_empty());
    }

    #[test]
    fn test_finish_underflow() {
        let mut rb = RingBuffer::<8>::new();
        rb.push(&[1, 2]);
        assert_eq!(rb.finish(3), Err(BufferError::Underflow));
        assert_eq!(rb.size(), 2);
    }

    #[test]
    fn test_reset_drops_content() {
        let mut rb = advanced::<8>(3);
        rb.push(&[1, 2, 3]);
        rb.reset();

        assert!(rb.is_empty());
        assert_eq!(rb.space(), 8);
        rb.push(&[7]);
        assert_eq!(rb.claim(1), &[7]);
    }
}

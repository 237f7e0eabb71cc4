//! Splitting of cycle-counted microsecond waits into 8-bit loop counts.


/// Yields loop counts of at most 255 that add up to the requested microseconds.
///
/// The innermost microsecond loop counts down an 8-bit register; longer waits run it repeatedly.
#[derive(Clone, Copy, Debug, Default, Eq, Hash, Ord, PartialEq, PartialOrd)]
pub struct MicrosecondChunks {
    remaining: u16,
}
impl MicrosecondChunks {
    pub const fn new(microseconds: u16) -> Self {
        Self { remaining: microseconds }
    }
}
impl Iterator for MicrosecondChunks {
    type Item = u8;

    fn next(&mut self) -> Option<Self::Item> {
        if self.remaining == 0 {
            return None;
        }
        let chunk = if self.remaining > u8::MAX as u16 { u8::MAX } else { self.remaining as u8 };
        self.remaining -= chunk as u16;
        Some(chunk)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let count = (self.remaining as usize).div_ceil(u8::MAX as usize);
        (count, Some(count))
    }
}
impl ExactSizeIterator for MicrosecondChunks {
}

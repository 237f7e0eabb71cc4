//! Wraparound-safe elapsed-time arithmetic and the busy-wait loop built on it.


/// A free-running counter that wraps around at its width.
pub trait WrappingCounter: Copy + Ord {
    /// Half the counter's range; intervals at least this long cannot be told apart from negative
    /// ones.
    const HORIZON: Self;

    /// `(self - earlier) mod 2^BITS`: the true elapsed count whenever it is below [`HORIZON`].
    ///
    /// [`HORIZON`]: Self::HORIZON
    fn elapsed_since(self, earlier: Self) -> Self;
}
impl WrappingCounter for u32 {
    const HORIZON: Self = 1 << (u32::BITS - 1);

    fn elapsed_since(self, earlier: Self) -> Self {
        self.wrapping_sub(earlier)
    }
}


/// Spins until more than `duration` counts have elapsed on the clock read by `now`.
///
/// Waiting for strictly more than `duration` makes up for the start timestamp being taken
/// anywhere within its count, so the wait is never shorter than `duration` whole counts.
/// `feed` runs once per poll (a watchdog reload, typically). A zero duration returns without
/// reading the clock. `duration` must stay below the counter's [`HORIZON`].
///
/// [`HORIZON`]: WrappingCounter::HORIZON
pub fn busy_wait<C, N, F>(duration: C, mut now: N, mut feed: F)
where
    C: WrappingCounter + Default,
    N: FnMut() -> C,
    F: FnMut(),
{
    if duration == C::default() {
        return;
    }
    debug_assert!(duration < C::HORIZON);

    let start = now();
    loop {
        feed();
        if now().elapsed_since(start) > duration {
            break;
        }
    }
}


#[cfg(test)]
mod tests {
    use core::cell::Cell;

    use super::{WrappingCounter, busy_wait};

    #[test]
    pub fn test_elapsed_across_wraparound() {
        assert_eq!(5u32.elapsed_since(u32::MAX - 2), 8);
        assert_eq!(0u32.elapsed_since(u32::MAX), 1);

        // numerically smaller, yet later
        let t1: u32 = 0xFFFF_FF00;
        let t2: u32 = 0x0000_0100;
        assert!(t2 < t1);
        assert_eq!(t2.elapsed_since(t1), 0x200);
    }

    #[test]
    pub fn test_elapsed_up_to_horizon() {
        let start: u32 = 0xC000_0000;
        for true_elapsed in [0u32, 1, 1000, 0x3FFF_FFFF, 0x4000_0000, 0x7FFF_FFFF] {
            let end = start.wrapping_add(true_elapsed);
            assert_eq!(end.elapsed_since(start), true_elapsed);
        }
        assert_eq!(u32::HORIZON, 0x8000_0000);
    }

    #[test]
    pub fn test_busy_wait_zero_never_reads() {
        let reads = Cell::new(0);
        busy_wait(0u32, || { reads.set(reads.get() + 1); 0 }, || {});
        assert_eq!(reads.get(), 0);
    }

    #[test]
    pub fn test_busy_wait_waits_strictly_longer() {
        let clock = Cell::new(100u32);
        let feeds = Cell::new(0);
        busy_wait(
            10u32,
            || { let value = clock.get(); clock.set(value + 1); value },
            || feeds.set(feeds.get() + 1),
        );
        // start read at 100, final read at 111
        assert_eq!(clock.get(), 112);
        assert_eq!(feeds.get(), 11);
    }

    #[test]
    pub fn test_busy_wait_across_wraparound() {
        let clock = Cell::new(u32::MAX - 3);
        busy_wait(
            20u32,
            || { let value = clock.get(); clock.set(value.wrapping_add(1)); value },
            || {},
        );
        assert_eq!(clock.get(), 18);
    }
}

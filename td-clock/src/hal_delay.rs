//! [`DelayNs`] on top of the timer-based delays.
//!
//! The clock's own delays count sub-tick units, which run slightly fast against real time. Callers
//! of the trait ask for real nanoseconds, so the amounts are converted here, rounding up.


use embedded_hal::delay::DelayNs;

use crate::clock::MonotonicClock;
use crate::tick::SUB_TICKS_PER_TICK;
use crate::timer::PeriodTimer;


const NANOS_PER_SECOND: u64 = 1_000_000_000;
const MICROS_PER_SECOND: u64 = 1_000_000;
const MILLIS_PER_SECOND: u64 = 1_000;

/// Longest single wait handed to the clock; well below the half-range of its 32-bit timestamps.
const MAX_WAIT_SUB_TICKS: u64 = 1 << 30;


/// Converts `amount` of a unit with `units_per_second` into sub-tick units, rounding up.
pub const fn to_sub_ticks(amount: u32, units_per_second: u64, ticks_per_second: u32) -> u64 {
    let scaled = (amount as u128) * (SUB_TICKS_PER_TICK as u128) * (ticks_per_second as u128);
    let units = scaled.div_ceil(units_per_second as u128);
    if units > u64::MAX as u128 { u64::MAX } else { units as u64 }
}


fn no_feed() {
}


/// A [`DelayNs`] provider busy-waiting on a [`MonotonicClock`].
///
/// Never shorter than requested; longer by up to one timer count plus the polling latency.
pub struct Delay<'a, T, F = fn()> {
    clock: &'a MonotonicClock<T>,
    feed: F,
}
impl<'a, T: PeriodTimer> Delay<'a, T, fn()> {
    pub fn new(clock: &'a MonotonicClock<T>) -> Self {
        Self {
            clock,
            feed: no_feed,
        }
    }
}
impl<'a, T: PeriodTimer, F: FnMut()> Delay<'a, T, F> {
    /// A delay that calls `feed` on every poll of the clock.
    pub fn with_feed(clock: &'a MonotonicClock<T>, feed: F) -> Self {
        Self {
            clock,
            feed,
        }
    }

    fn wait(&mut self, amount: u32, units_per_second: u64) {
        let ticks_per_second = self.clock.settings().ticks_per_second();
        let mut remaining = to_sub_ticks(amount, units_per_second, ticks_per_second);
        while remaining > 0 {
            let chunk = if remaining > MAX_WAIT_SUB_TICKS { MAX_WAIT_SUB_TICKS } else { remaining };
            self.clock.delay_sub_ticks_feeding(chunk as u32, &mut self.feed);
            remaining -= chunk;
        }
    }
}
impl<'a, T: PeriodTimer, F: FnMut()> DelayNs for Delay<'a, T, F> {
    fn delay_ns(&mut self, ns: u32) {
        self.wait(ns, NANOS_PER_SECOND);
    }

    fn delay_us(&mut self, us: u32) {
        self.wait(us, MICROS_PER_SECOND);
    }

    fn delay_ms(&mut self, ms: u32) {
        self.wait(ms, MILLIS_PER_SECOND);
    }
}

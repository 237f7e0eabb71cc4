//! The monotonic clock: tick counting in the interrupt handler and race-free reads outside of it.


use crate::settings::TimerSettings;
use crate::tick::{SUB_TICK_BITS, Tick, TickStore};
use crate::timer::{MaskedInterrupt, PeriodTimer, with_interrupt_masked};
use crate::wait::busy_wait;


/// A tick counter advanced by a periodic timer interrupt.
///
/// Reads mask the timer's interrupt (and nothing else) for their duration and correct for a period
/// that has elapsed but not been serviced yet, so every full read is consistent with a single
/// point in time and never goes backwards.
pub struct MonotonicClock<T> {
    timer: T,
    settings: TimerSettings,
    ticks: TickStore,
}
impl<T: PeriodTimer> MonotonicClock<T> {
    pub const fn new(timer: T, settings: TimerSettings) -> Self {
        Self {
            timer,
            settings,
            ticks: TickStore::new(),
        }
    }

    pub fn timer(&self) -> &T { &self.timer }
    pub const fn settings(&self) -> TimerSettings { self.settings }

    /// Starts counting from zero again. Called while configuring the timer, before it runs.
    pub fn reset(&self, _masked: &MaskedInterrupt<'_, T>) {
        self.ticks.set(Tick::ZERO);
    }

    /// Advances the tick by one and acknowledges the period.
    ///
    /// # Safety
    ///
    /// Only the timer's interrupt handler may call this, and the handler must not nest. It is the
    /// only writer of the tick; everything else reads with the interrupt masked.
    pub unsafe fn on_period_elapsed(&self) {
        self.ticks.set(self.ticks.get().next());
        self.timer.clear_period_elapsed();
    }

    /// Low 16 bits of the tick, read without masking and without checking for a pending period.
    ///
    /// May be one tick behind. Cheap enough for tight loops that tolerate that.
    pub fn millis16(&self) -> u16 {
        self.ticks.get().low_half()
    }

    /// The current tick.
    pub fn now(&self) -> Tick {
        with_interrupt_masked(&self.timer, |masked| self.now_masked(masked))
    }

    /// The current tick, for callers that already masked the interrupt.
    pub fn now_masked(&self, _masked: &MaskedInterrupt<'_, T>) -> Tick {
        let tick = self.ticks.get();
        if self.timer.period_elapsed() {
            // the period ended but the handler has not run yet
            tick.next()
        } else {
            tick
        }
    }

    /// Full-precision tick count.
    pub fn millis(&self) -> u32 {
        self.now().as_u32()
    }

    /// The tick extended by the live counter, in sub-tick units (1024 per tick).
    ///
    /// Wraps every 2^22 ticks.
    pub fn micros32(&self) -> u32 {
        with_interrupt_masked(&self.timer, |_masked| {
            let mut tick = self.ticks.get();
            let mut counter = self.timer.counter();
            if self.timer.period_elapsed() {
                tick = tick.next();
                // the counter may have been read before it wrapped
                counter = self.timer.counter();
            }
            tick.to_sub_ticks() | self.settings.sub_ticks(counter)
        })
    }

    /// Low 16 bits of [`micros32`](Self::micros32); wraps every 64 ticks.
    ///
    /// A unit is 1/1024 of a tick, so with a 1 ms tick this runs ~2.4% fast against true
    /// microseconds.
    pub fn micros(&self) -> u16 {
        (self.micros32() & 0xFFFF) as u16
    }

    /// Busy-waits until at least `ticks` whole ticks have elapsed.
    pub fn delay_ms(&self, ticks: u16) {
        self.delay_ms_feeding(ticks, || {});
    }

    /// Like [`delay_ms`](Self::delay_ms), calling `feed` on every poll.
    pub fn delay_ms_feeding<F: FnMut()>(&self, ticks: u16, feed: F) {
        self.delay_sub_ticks_feeding((ticks as u32) << SUB_TICK_BITS, feed);
    }

    /// Busy-waits until at least `sub_ticks` sub-tick units have elapsed.
    pub fn delay_us(&self, sub_ticks: u16) {
        self.delay_us_feeding(sub_ticks, || {});
    }

    /// Like [`delay_us`](Self::delay_us), calling `feed` on every poll.
    pub fn delay_us_feeding<F: FnMut()>(&self, sub_ticks: u16, feed: F) {
        self.delay_sub_ticks_feeding(sub_ticks as u32, feed);
    }

    pub(crate) fn delay_sub_ticks_feeding<F: FnMut()>(&self, sub_ticks: u32, feed: F) {
        busy_wait(sub_ticks, || self.micros32(), feed);
    }
}

//! A simulated period timer for host-side tests.


use core::cell::Cell;

use crate::clock::MonotonicClock;
use crate::timer::PeriodTimer;


pub struct SimTimer {
    reload: u32,
    counter: Cell<u32>,
    pending: Cell<bool>,
    masked: Cell<bool>,
    counts_per_read: Cell<u32>,
    wrap_before_flag_read: Cell<bool>,
    elapsed_counts: Cell<u64>,
    counter_reads: Cell<u64>,
    missed_periods: Cell<u32>,
}
impl SimTimer {
    pub fn new(reload: u32) -> Self {
        Self {
            reload,
            counter: Cell::new(0),
            pending: Cell::new(false),
            masked: Cell::new(false),
            counts_per_read: Cell::new(0),
            wrap_before_flag_read: Cell::new(false),
            elapsed_counts: Cell::new(0),
            counter_reads: Cell::new(0),
            missed_periods: Cell::new(0),
        }
    }

    /// Lets the hardware run on by `counts` timer counts.
    pub fn advance(&self, counts: u32) {
        let mut counter = self.counter.get() + counts;
        while counter >= self.reload {
            counter -= self.reload;
            if self.pending.get() {
                // the flag is still set from the previous period; this one is lost
                self.missed_periods.set(self.missed_periods.get() + 1);
            }
            self.pending.set(true);
        }
        self.counter.set(counter);
        self.elapsed_counts.set(self.elapsed_counts.get() + counts as u64);
    }

    /// Every counter read lets the hardware run on by this many counts afterwards.
    pub fn set_counts_per_read(&self, counts: u32) {
        self.counts_per_read.set(counts);
    }

    /// The next flag read first finds the counter wrapped, as if the period ended mid-read.
    pub fn wrap_before_next_flag_read(&self) {
        self.wrap_before_flag_read.set(true);
    }

    /// Forces the period-elapsed flag without moving the counter.
    pub fn force_pending(&self) {
        self.pending.set(true);
    }

    pub fn set_counter(&self, counter: u32) {
        assert!(counter < self.reload);
        self.counter.set(counter);
    }

    pub fn is_masked(&self) -> bool { self.masked.get() }
    pub fn is_pending(&self) -> bool { self.pending.get() }
    pub fn elapsed_counts(&self) -> u64 { self.elapsed_counts.get() }
    pub fn counter_reads(&self) -> u64 { self.counter_reads.get() }
    pub fn missed_periods(&self) -> u32 { self.missed_periods.get() }
}
impl PeriodTimer for SimTimer {
    fn counter(&self) -> u32 {
        self.counter_reads.set(self.counter_reads.get() + 1);
        let value = self.counter.get();
        self.advance(self.counts_per_read.get());
        value
    }

    fn period_elapsed(&self) -> bool {
        if self.wrap_before_flag_read.replace(false) {
            let remaining = self.reload - self.counter.get();
            self.advance(remaining);
        }
        self.pending.get()
    }

    fn clear_period_elapsed(&self) {
        self.pending.set(false);
    }

    fn mask_interrupt(&self) -> bool {
        !self.masked.replace(true)
    }

    unsafe fn unmask_interrupt(&self) {
        self.masked.set(false);
    }
}


/// Runs the interrupt handler if the simulated interrupt is pending and not masked, the way the
/// hardware would between two foreground instructions.
pub fn service(clock: &MonotonicClock<SimTimer>) -> bool {
    let timer = clock.timer();
    if timer.is_pending() && !timer.is_masked() {
        unsafe { clock.on_period_elapsed() };
        true
    } else {
        false
    }
}


//! The hardware interface of the tick timer.


use core::sync::atomic::{Ordering, compiler_fence};


/// A timer that counts from zero up to its reload value, raises a "period elapsed" flag and
/// an interrupt when it wraps, and starts over.
pub trait PeriodTimer {
    /// The live counter value, `0..reload`.
    fn counter(&self) -> u32;

    /// Whether a period has elapsed that the interrupt handler has not serviced yet.
    fn period_elapsed(&self) -> bool;

    /// Clears the period-elapsed flag. Only the interrupt handler calls this.
    fn clear_period_elapsed(&self);

    /// Masks this timer's interrupt (and only this one). Returns whether it was unmasked before.
    ///
    /// Once this returns, the interrupt handler must not start until it is unmasked again.
    fn mask_interrupt(&self) -> bool;

    /// Unmasks this timer's interrupt.
    ///
    /// # Safety
    ///
    /// The handler may run immediately afterwards; the caller must not hold any state the handler
    /// would invalidate.
    unsafe fn unmask_interrupt(&self);
}


/// Proof that the timer's interrupt is masked for as long as this value lives.
///
/// The previous mask state is restored on drop, so nested guards behave.
pub struct MaskedInterrupt<'a, T: PeriodTimer> {
    timer: &'a T,
    was_unmasked: bool,
}
impl<'a, T: PeriodTimer> MaskedInterrupt<'a, T> {
    pub fn new(timer: &'a T) -> Self {
        let was_unmasked = timer.mask_interrupt();
        compiler_fence(Ordering::SeqCst);
        Self {
            timer,
            was_unmasked,
        }
    }

    pub fn timer(&self) -> &'a T {
        self.timer
    }
}
impl<'a, T: PeriodTimer> Drop for MaskedInterrupt<'a, T> {
    fn drop(&mut self) {
        compiler_fence(Ordering::SeqCst);
        if self.was_unmasked {
            unsafe { self.timer.unmask_interrupt() };
        }
    }
}


/// Runs `f` with the timer's interrupt masked.
pub fn with_interrupt_masked<T: PeriodTimer, R, F: FnOnce(&MaskedInterrupt<'_, T>) -> R>(timer: &T, f: F) -> R {
    let masked = MaskedInterrupt::new(timer);
    f(&masked)
}

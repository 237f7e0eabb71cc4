//! Interrupt-driven monotonic clock and busy-wait delays for a single periodic timer.
//!
//! The hardware side is abstracted by [`PeriodTimer`]; everything in this crate is plain
//! arithmetic on top of it, so it runs unchanged in the interrupt handler of the firmware and in
//! host-side tests against a simulated timer.
#![cfg_attr(not(test), no_std)]


pub mod chunks;
pub mod clock;
pub mod cycles;
pub mod hal_delay;
pub mod settings;
pub mod tick;
pub mod timer;
pub mod wait;

#[cfg(test)]
mod sim;


pub use crate::clock::MonotonicClock;
pub use crate::hal_delay::Delay;
pub use crate::settings::{PrescalerSteps, TimerSettings};
pub use crate::tick::{SUB_TICK_BITS, SUB_TICKS_PER_TICK, Tick};
pub use crate::timer::{MaskedInterrupt, PeriodTimer, with_interrupt_masked};

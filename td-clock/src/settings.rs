//! Prescaler and reload derivation for the tick timer.


use crate::tick::SUB_TICK_BITS;


/// The prescaler divisors a timer supports.
#[derive(Clone, Copy, Debug, Eq, Hash, Ord, PartialEq, PartialOrd)]
pub enum PrescalerSteps {
    /// Any divisor from 1 up to and including `max`.
    Linear { max: u32 },

    /// Divisors `2^0` up to and including `2^max_exponent` (the 8-bit basic timers work like this).
    PowerOfTwo { max_exponent: u32 },
}
impl PrescalerSteps {
    const fn nth(&self, index: u32) -> Option<u32> {
        match self {
            Self::Linear { max } => {
                if index < *max {
                    Some(index + 1)
                } else {
                    None
                }
            },
            Self::PowerOfTwo { max_exponent } => {
                if index <= *max_exponent && index < 32 {
                    Some(1 << index)
                } else {
                    None
                }
            },
        }
    }
}


/// Prescaler and reload of a periodic timer producing an exact tick rate.
///
/// Both values are the actual divisors; a register that stores "divisor minus one" must be
/// programmed with [`prescaler_register`](Self::prescaler_register) and
/// [`reload_register`](Self::reload_register).
#[derive(Clone, Copy, Debug, Eq, Hash, Ord, PartialEq, PartialOrd)]
pub struct TimerSettings {
    prescaler: u32,
    reload: u32,
    ticks_per_second: u32,
}
impl TimerSettings {
    /// Fewer than two counts per tick leave nothing to interpolate between ticks.
    pub const MIN_RELOAD: u32 = 2;

    pub const fn new(prescaler: u32, reload: u32, ticks_per_second: u32) -> Option<Self> {
        if prescaler == 0 || reload < Self::MIN_RELOAD || ticks_per_second == 0 {
            None
        } else {
            Some(Self { prescaler, reload, ticks_per_second })
        }
    }

    /// Finds the smallest prescaler (and thereby the largest reload, which gives the finest sub-tick
    /// resolution) such that `input_clock_hz == prescaler * reload * ticks_per_second` exactly.
    ///
    /// Returns `None` if no exact pair fits; evaluate this in a `const` item and panic on `None` so
    /// that a clock the timer cannot divide exactly fails the build instead of drifting.
    pub const fn derive(
        input_clock_hz: u32,
        ticks_per_second: u32,
        prescaler_steps: PrescalerSteps,
        max_reload: u32,
    ) -> Option<Self> {
        if ticks_per_second == 0 || input_clock_hz % ticks_per_second != 0 {
            return None;
        }
        let counts_per_tick = input_clock_hz / ticks_per_second;

        let mut index = 0;
        while let Some(prescaler) = prescaler_steps.nth(index) {
            if prescaler > counts_per_tick {
                break;
            }
            if counts_per_tick % prescaler == 0 {
                let reload = counts_per_tick / prescaler;
                if reload <= max_reload {
                    // larger prescalers only shrink the reload further
                    return Self::new(prescaler, reload, ticks_per_second);
                }
            }
            index += 1;
        }
        None
    }

    pub const fn prescaler(&self) -> u32 { self.prescaler }
    pub const fn reload(&self) -> u32 { self.reload }
    pub const fn ticks_per_second(&self) -> u32 { self.ticks_per_second }

    /// Prescaler as stored by timers that count from zero up to the stored value.
    pub const fn prescaler_register(&self) -> u32 { self.prescaler - 1 }

    /// Reload as stored by timers that count from zero up to the stored value.
    pub const fn reload_register(&self) -> u32 { self.reload - 1 }

    /// Input clock frequency these settings were derived for.
    pub const fn input_clock_hz(&self) -> u32 {
        self.prescaler
            .saturating_mul(self.reload)
            .saturating_mul(self.ticks_per_second)
    }

    /// Scales a live counter value (`0..reload`) onto the `0..1024` sub-tick units of a tick.
    pub const fn sub_ticks(&self, counter: u32) -> u32 {
        let counter = if counter >= self.reload { self.reload - 1 } else { counter };
        (((counter as u64) << SUB_TICK_BITS) / (self.reload as u64)) as u32
    }
}

//! The wide tick counter shared between the timer interrupt and foreground code.


use vcell::VolatileCell;


/// Each tick is subdivided into `2^SUB_TICK_BITS` sub-tick units by the high-resolution read.
///
/// With a 1 ms tick, one unit is 1/1024 ms, so sub-tick timestamps run ~2.4% fast against true
/// microseconds. Whole ticks are recovered by shifting (`units >> SUB_TICK_BITS`), never by
/// dividing by 1000.
pub const SUB_TICK_BITS: u32 = 10;
pub const SUB_TICKS_PER_TICK: u32 = 1 << SUB_TICK_BITS;


/// Number of hardware periods elapsed since the timer was configured.
///
/// Wraps around after 2^32 periods; compare two ticks with [`Tick::ticks_since`], not with `<`.
#[derive(Clone, Copy, Debug, Default, Eq, Hash, Ord, PartialEq, PartialOrd)]
pub struct Tick(u32);
impl Tick {
    pub const ZERO: Self = Self(0);

    pub const fn new(value: u32) -> Self { Self(value) }

    pub const fn as_u32(&self) -> u32 { self.0 }

    /// The tick after this one; `u32::MAX` is followed by zero.
    pub const fn next(&self) -> Self {
        Self(self.0.wrapping_add(1))
    }

    /// The low 16 bits, i.e. the coarse millisecond count that wraps every 65536 ticks.
    pub const fn low_half(&self) -> u16 {
        (self.0 & 0xFFFF) as u16
    }

    /// Ticks elapsed from `earlier` to `self`.
    ///
    /// Correct across a wraparound as long as fewer than 2^31 ticks actually elapsed.
    pub const fn ticks_since(&self, earlier: Tick) -> u32 {
        self.0.wrapping_sub(earlier.0)
    }

    /// The tick in sub-tick units; the top `SUB_TICK_BITS` bits are shifted out.
    pub const fn to_sub_ticks(&self) -> u32 {
        self.0 << SUB_TICK_BITS
    }

    /// Whole ticks contained in a span of sub-tick units.
    pub const fn whole_ticks_in(sub_ticks: u32) -> u32 {
        sub_ticks >> SUB_TICK_BITS
    }
}
impl From<u32> for Tick {
    fn from(value: u32) -> Self { Self::new(value) }
}
impl From<Tick> for u32 {
    fn from(value: Tick) -> Self { value.as_u32() }
}


/// Storage cell for the tick counter.
///
/// The timer interrupt handler is the only writer. Readers mask that interrupt while they read,
/// which is what makes the unsynchronized cell sound; the discipline is enforced by
/// [`MonotonicClock`](crate::MonotonicClock), the only user of this type.
pub(crate) struct TickStore {
    value: VolatileCell<u32>,
}
impl TickStore {
    pub const fn new() -> Self {
        Self {
            value: VolatileCell::new(0),
        }
    }

    pub fn get(&self) -> Tick {
        Tick(self.value.get())
    }

    pub fn set(&self, tick: Tick) {
        self.value.set(tick.0);
    }
}

// single writer (the handler, which does not nest); readers mask the writer out
unsafe impl Sync for TickStore {}


#[cfg(test)]
mod tests {
    use super::{SUB_TICK_BITS, SUB_TICKS_PER_TICK, Tick, TickStore};

    #[test]
    pub fn test_next_carries_across_bytes() {
        assert_eq!(Tick::new(0x0000_00FF).next().as_u32(), 0x0000_0100);
        assert_eq!(Tick::new(0x00FF_FFFF).next().as_u32(), 0x0100_0000);
        assert_eq!(Tick::new(0x1234_56FF).next(), Tick::new(0x1234_5700));
    }

    #[test]
    pub fn test_next_wraps_to_zero() {
        assert_eq!(Tick::new(u32::MAX).next(), Tick::ZERO);
    }

    #[test]
    pub fn test_low_half() {
        assert_eq!(Tick::new(0xABCD_1234).low_half(), 0x1234);
        assert_eq!(Tick::new(0x0001_0000).low_half(), 0);
    }

    #[test]
    pub fn test_ticks_since_across_wraparound() {
        let before = Tick::new(u32::MAX - 5);
        let after = Tick::new(10);
        assert!(after < before);
        assert_eq!(after.ticks_since(before), 16);

        // half the range is the horizon
        let far = Tick::new(before.as_u32().wrapping_add(0x7FFF_FFFF));
        assert_eq!(far.ticks_since(before), 0x7FFF_FFFF);
    }

    #[test]
    pub fn test_shift_not_multiply() {
        // 1024 sub-tick units are one whole tick, 1000 are not
        assert_eq!(SUB_TICKS_PER_TICK, 1024);
        assert_eq!(Tick::whole_ticks_in(1024), 1);
        assert_eq!(Tick::whole_ticks_in(1000), 0);
        assert_eq!(Tick::whole_ticks_in(1000 * 1024), 1000);
        assert_eq!(Tick::new(1).to_sub_ticks(), 1024);
        assert_ne!(Tick::new(1).to_sub_ticks(), 1000);

        // 1024 ticks shifted down by the same amount give exactly one unit of the next scale
        assert_eq!(1024u32 >> SUB_TICK_BITS, 1);
        assert_eq!(1000u32 >> SUB_TICK_BITS, 0);
    }

    #[test]
    pub fn test_store() {
        let store = TickStore::new();
        assert_eq!(store.get(), Tick::ZERO);
        store.set(Tick::new(42));
        assert_eq!(store.get(), Tick::new(42));
    }
}

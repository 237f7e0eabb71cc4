//! Decomposition of cycle-counted delays into fixed wait blocks.
//!
//! The firmware provides wait blocks of 8, 16, 32, 64, 128 and 256 processor cycles plus a single
//! no-op cycle. A variable delay is composed from them largest to smallest; since the block sizes
//! are powers of two, the greedy split is the binary representation of the cycle budget.
//!
//! Every block except the single cycle is a countdown loop (`subs`/`bne`), so its cost is
//! [`LOOP_SETUP_CYCLES`] plus [`LOOP_ITERATION_CYCLES`] per round. The figures are for the
//! Cortex-M7 running from zero-wait-state flash; the firmware measures them against the DWT cycle
//! counter at boot and reports anything outside [`CYCLE_TOLERANCE`].


use bitflags::bitflags;


/// Shortest delay [`CyclePlan::for_cycles`] can honor; requests below it are raised to it.
///
/// Use no-ops directly for anything shorter.
pub const MIN_DELAY_CYCLES: u16 = 24;

/// Cycles a variable delay spends on itself: the call, evaluating the plan, branching over the
/// blocks it skips, loading the long-block count, the return.
///
/// The boot calibration derives this figure from a measurement of the shortest delay and reports
/// it whenever it disagrees.
pub const DELAY_OVERHEAD_CYCLES: u16 = 16;

/// One round of a countdown loop: `subs` plus a predicted taken `bne`.
pub const LOOP_ITERATION_CYCLES: u32 = 2;

/// Loading a countdown loop's count plus the mispredicted fall-through out of it.
pub const LOOP_SETUP_CYCLES: u32 = 2;

/// How far a measured wait may stray from its plan and still count as calibrated.
pub const CYCLE_TOLERANCE: u32 = 4;

const LONG_BLOCK_CYCLES: u32 = 256;
const SINGLE_CYCLES_MASK: u16 = 0b0000_0111;


/// Rounds of a countdown loop that lasts exactly `cycles`, setup included.
///
/// `None` if no whole number of rounds fits (odd counts, or too short for a single round).
pub const fn loop_iterations(cycles: u32) -> Option<u32> {
    if cycles < LOOP_SETUP_CYCLES + LOOP_ITERATION_CYCLES {
        return None;
    }
    let rounds = cycles - LOOP_SETUP_CYCLES;
    if rounds % LOOP_ITERATION_CYCLES != 0 {
        None
    } else {
        Some(rounds / LOOP_ITERATION_CYCLES)
    }
}


bitflags! {
    /// Which of the short wait blocks a plan runs, at most once each.
    ///
    /// Each flag's bit value equals the block's cycle count.
    #[derive(Clone, Copy, Debug, Default, Eq, Hash, Ord, PartialEq, PartialOrd)]
    pub struct ShortBlocks : u8 {
        const CYCLES_128 = 0b1000_0000;
        const CYCLES_64 = 0b0100_0000;
        const CYCLES_32 = 0b0010_0000;
        const CYCLES_16 = 0b0001_0000;
        const CYCLES_8 = 0b0000_1000;
    }
}


/// One fixed wait block.
#[derive(Clone, Copy, Debug, Eq, Hash, Ord, PartialEq, PartialOrd)]
pub enum CycleBlock {
    Cycles256,
    Cycles128,
    Cycles64,
    Cycles32,
    Cycles16,
    Cycles8,
    Single,
}
impl CycleBlock {
    pub const fn cycles(&self) -> u32 {
        match self {
            Self::Cycles256 => 256,
            Self::Cycles128 => 128,
            Self::Cycles64 => 64,
            Self::Cycles32 => 32,
            Self::Cycles16 => 16,
            Self::Cycles8 => 8,
            Self::Single => 1,
        }
    }

    /// Countdown rounds of this block's loop; `None` for the single cycle, which is one `nop`.
    pub const fn loop_iterations(&self) -> Option<u32> {
        match self {
            Self::Single => None,
            other => loop_iterations(other.cycles()),
        }
    }
}

// largest to smallest
const SHORT_ORDER: [(ShortBlocks, CycleBlock); 5] = [
    (ShortBlocks::CYCLES_128, CycleBlock::Cycles128),
    (ShortBlocks::CYCLES_64, CycleBlock::Cycles64),
    (ShortBlocks::CYCLES_32, CycleBlock::Cycles32),
    (ShortBlocks::CYCLES_16, CycleBlock::Cycles16),
    (ShortBlocks::CYCLES_8, CycleBlock::Cycles8),
];


/// The blocks making up one delay.
#[derive(Clone, Copy, Debug, Default, Eq, Hash, Ord, PartialEq, PartialOrd)]
pub struct CyclePlan {
    overhead: u16,
    long_blocks: u8,
    short_blocks: ShortBlocks,
    single_cycles: u8,
}
impl CyclePlan {
    /// Plan for a called delay of `cycles`, including its own overhead.
    ///
    /// Requests below [`MIN_DELAY_CYCLES`] are raised to it.
    pub const fn for_cycles(cycles: u16) -> Self {
        let cycles = if cycles < MIN_DELAY_CYCLES { MIN_DELAY_CYCLES } else { cycles };
        Self::split(cycles - DELAY_OVERHEAD_CYCLES, DELAY_OVERHEAD_CYCLES)
    }

    /// Plan for an inlined delay of exactly `cycles`, with no call overhead and no minimum.
    pub const fn inline(cycles: u16) -> Self {
        Self::split(cycles, 0)
    }

    const fn split(budget: u16, overhead: u16) -> Self {
        Self {
            overhead,
            long_blocks: (budget >> 8) as u8,
            short_blocks: ShortBlocks::from_bits_truncate((budget & 0xFF) as u8),
            single_cycles: (budget & SINGLE_CYCLES_MASK) as u8,
        }
    }

    pub const fn long_blocks(&self) -> u8 { self.long_blocks }
    pub const fn short_blocks(&self) -> ShortBlocks { self.short_blocks }
    pub const fn single_cycles(&self) -> u8 { self.single_cycles }
    pub const fn overhead_cycles(&self) -> u16 { self.overhead }

    /// Countdown rounds that run all long blocks as a single loop, whose setup is charged to the
    /// first block; zero if there are none.
    pub const fn long_loop_iterations(&self) -> u32 {
        if self.long_blocks == 0 {
            0
        } else {
            ((self.long_blocks as u32) * LONG_BLOCK_CYCLES - LOOP_SETUP_CYCLES) / LOOP_ITERATION_CYCLES
        }
    }

    /// The cycles spent in blocks, overhead excluded.
    pub const fn wait_cycles(&self) -> u32 {
        (self.long_blocks as u32) * LONG_BLOCK_CYCLES
            + (self.short_blocks.bits() as u32)
            + (self.single_cycles as u32)
    }

    /// The cycles this plan takes if every block costs exactly its nominal count.
    pub const fn nominal_cycles(&self) -> u32 {
        self.overhead as u32 + self.wait_cycles()
    }

    /// The overhead a measurement of this plan implies, for comparison with
    /// [`overhead_cycles`](Self::overhead_cycles).
    pub const fn measured_overhead(&self, measured_cycles: u32) -> i64 {
        (measured_cycles as i64) - (self.wait_cycles() as i64)
    }

    /// The blocks to run, largest first.
    pub const fn blocks(&self) -> CycleBlocks {
        CycleBlocks {
            long_remaining: self.long_blocks,
            short_remaining: self.short_blocks,
            single_remaining: self.single_cycles,
        }
    }
}


pub struct CycleBlocks {
    long_remaining: u8,
    short_remaining: ShortBlocks,
    single_remaining: u8,
}
impl Iterator for CycleBlocks {
    type Item = CycleBlock;

    fn next(&mut self) -> Option<Self::Item> {
        if self.long_remaining > 0 {
            self.long_remaining -= 1;
            return Some(CycleBlock::Cycles256);
        }
        for (flag, block) in SHORT_ORDER {
            if self.short_remaining.contains(flag) {
                self.short_remaining.remove(flag);
                return Some(block);
            }
        }
        if self.single_remaining > 0 {
            self.single_remaining -= 1;
            return Some(CycleBlock::Single);
        }
        None
    }
}


/// How a measured wait compares with what it was planned to take.
#[derive(Clone, Copy, Debug, Eq, Hash, Ord, PartialEq, PartialOrd)]
pub enum Deviation {
    Exact,
    Within { off_by: i64 },
    Outside { off_by: i64 },
}
impl Deviation {
    pub const fn of(expected_cycles: u32, measured_cycles: u32) -> Self {
        let off_by = (measured_cycles as i64) - (expected_cycles as i64);
        if off_by == 0 {
            Self::Exact
        } else if off_by.unsigned_abs() <= CYCLE_TOLERANCE as u64 {
            Self::Within { off_by }
        } else {
            Self::Outside { off_by }
        }
    }

    pub const fn is_calibrated(&self) -> bool {
        !matches!(self, Self::Outside { .. })
    }
}


#[cfg(test)]
mod tests {
    use super::{
        CYCLE_TOLERANCE, CycleBlock, CyclePlan, DELAY_OVERHEAD_CYCLES, Deviation, LOOP_ITERATION_CYCLES,
        LOOP_SETUP_CYCLES, MIN_DELAY_CYCLES, ShortBlocks, loop_iterations,
    };

    fn block_sum(plan: &CyclePlan) -> u32 {
        plan.blocks().map(|b| b.cycles()).sum::<u32>() + plan.overhead_cycles() as u32
    }

    fn assert_largest_first(plan: &CyclePlan) {
        let mut previous = u32::MAX;
        for block in plan.blocks() {
            assert!(block.cycles() <= previous);
            previous = block.cycles();
        }
    }

    #[test]
    pub fn test_minimum() {
        let plan = CyclePlan::for_cycles(MIN_DELAY_CYCLES);
        assert_eq!(plan.nominal_cycles(), 24);
        assert_eq!(block_sum(&plan), 24);
        assert_eq!(plan.blocks().collect::<Vec<_>>(), [CycleBlock::Cycles8]);
    }

    #[test]
    pub fn test_below_minimum_is_raised() {
        for cycles in [0, 1, 8, 23] {
            let plan = CyclePlan::for_cycles(cycles);
            assert_eq!(plan, CyclePlan::for_cycles(MIN_DELAY_CYCLES));
            assert!(plan.nominal_cycles() >= MIN_DELAY_CYCLES as u32);
        }
    }

    #[test]
    pub fn test_hundred() {
        let plan = CyclePlan::for_cycles(100);
        // 100 - 16 = 84 = 64 + 16 + 4
        assert_eq!(plan.long_blocks(), 0);
        assert_eq!(plan.short_blocks(), ShortBlocks::CYCLES_64 | ShortBlocks::CYCLES_16);
        assert_eq!(plan.single_cycles(), 4);
        assert_eq!(
            plan.blocks().collect::<Vec<_>>(),
            [
                CycleBlock::Cycles64, CycleBlock::Cycles16,
                CycleBlock::Single, CycleBlock::Single, CycleBlock::Single, CycleBlock::Single,
            ],
        );
        assert_eq!(block_sum(&plan), 100);
    }

    #[test]
    pub fn test_maximum() {
        let plan = CyclePlan::for_cycles(u16::MAX);
        // 65535 - 16 = 65519 = 255 * 256 + 128 + 64 + 32 + 8 + 7
        assert_eq!(plan.long_blocks(), 255);
        assert_eq!(
            plan.short_blocks(),
            ShortBlocks::CYCLES_128 | ShortBlocks::CYCLES_64 | ShortBlocks::CYCLES_32 | ShortBlocks::CYCLES_8,
        );
        assert_eq!(plan.single_cycles(), 7);
        assert_eq!(plan.nominal_cycles(), 65_535);
        assert_eq!(block_sum(&plan), 65_535);
        assert_largest_first(&plan);
    }

    #[test]
    pub fn test_every_request_is_exact_above_minimum() {
        for cycles in MIN_DELAY_CYCLES..=2048 {
            let plan = CyclePlan::for_cycles(cycles);
            assert_eq!(plan.nominal_cycles(), cycles as u32);
            assert_eq!(block_sum(&plan), cycles as u32);
            assert_largest_first(&plan);
            // never more than one of each short block and fewer than eight single cycles
            assert!(plan.single_cycles() < 8);
        }
    }

    #[test]
    pub fn test_inline_has_no_floor() {
        assert_eq!(CyclePlan::inline(0).blocks().count(), 0);
        assert_eq!(CyclePlan::inline(3).blocks().collect::<Vec<_>>(), [CycleBlock::Single; 3]);
        let plan = CyclePlan::inline(300);
        assert_eq!(plan.overhead_cycles(), 0);
        assert_eq!(plan.nominal_cycles(), 300);
        assert_eq!(
            plan.blocks().collect::<Vec<_>>(),
            [
                CycleBlock::Cycles256, CycleBlock::Cycles32, CycleBlock::Cycles8,
                CycleBlock::Single, CycleBlock::Single, CycleBlock::Single, CycleBlock::Single,
            ],
        );
    }

    #[test]
    pub fn test_block_loops_are_exact() {
        let blocks = [
            CycleBlock::Cycles256, CycleBlock::Cycles128, CycleBlock::Cycles64,
            CycleBlock::Cycles32, CycleBlock::Cycles16, CycleBlock::Cycles8,
        ];
        for block in blocks {
            let rounds = block.loop_iterations().unwrap();
            assert!(rounds > 0);
            assert_eq!(LOOP_SETUP_CYCLES + rounds * LOOP_ITERATION_CYCLES, block.cycles());
        }
        assert_eq!(CycleBlock::Cycles8.loop_iterations(), Some(3));
        assert_eq!(CycleBlock::Cycles256.loop_iterations(), Some(127));
        assert_eq!(CycleBlock::Single.loop_iterations(), None);
    }

    #[test]
    pub fn test_loop_iterations() {
        assert_eq!(loop_iterations(14), Some(6));
        assert_eq!(loop_iterations(4), Some(1));
        assert_eq!(loop_iterations(3), None);
        assert_eq!(loop_iterations(2), None);
        assert_eq!(loop_iterations(15), None);
    }

    #[test]
    pub fn test_long_blocks_as_one_loop() {
        assert_eq!(CyclePlan::for_cycles(200).long_loop_iterations(), 0);
        for long_blocks in 1..=255u32 {
            let plan = CyclePlan::inline((long_blocks * 256) as u16);
            assert_eq!(plan.long_blocks() as u32, long_blocks);
            let rounds = plan.long_loop_iterations();
            assert_eq!(LOOP_SETUP_CYCLES + rounds * LOOP_ITERATION_CYCLES, long_blocks * 256);
        }
    }

    #[test]
    pub fn test_measured_overhead() {
        let plan = CyclePlan::for_cycles(MIN_DELAY_CYCLES);
        assert_eq!(plan.wait_cycles(), 8);
        assert_eq!(plan.measured_overhead(24), DELAY_OVERHEAD_CYCLES as i64);
        assert_eq!(plan.measured_overhead(31), 23);
        assert_eq!(plan.measured_overhead(5), -3);
    }

    #[test]
    pub fn test_deviation() {
        assert_eq!(Deviation::of(100, 100), Deviation::Exact);
        assert_eq!(Deviation::of(100, 103), Deviation::Within { off_by: 3 });
        assert_eq!(Deviation::of(100, 96), Deviation::Within { off_by: -4 });
        assert_eq!(Deviation::of(65_535, 65_535 + 255), Deviation::Outside { off_by: 255 });
        assert!(Deviation::of(24, 24 + CYCLE_TOLERANCE).is_calibrated());
        assert!(!Deviation::of(24, 25 + CYCLE_TOLERANCE).is_calibrated());
        assert!(!Deviation::of(24, 0).is_calibrated());
    }

    #[test]
    pub fn test_overhead_constant_fits_minimum() {
        assert!(DELAY_OVERHEAD_CYCLES < MIN_DELAY_CYCLES);
        assert_eq!(CyclePlan::for_cycles(MIN_DELAY_CYCLES).blocks().count(), 1);
    }
}

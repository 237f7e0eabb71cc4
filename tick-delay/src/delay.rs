//! Busy-wait delays: cycle-counted ones that need nothing but the core, and timer-based ones that
//! stay accurate however often interrupts steal the processor.


use core::arch::asm;

use td_clock::Delay;
use td_clock::chunks::MicrosecondChunks;
use td_clock::cycles::{CycleBlock, CyclePlan, LOOP_ITERATION_CYCLES, ShortBlocks, loop_iterations};

use crate::timer::{self, Tim6};


pub const CYCLES_PER_MICROSECOND: u16 = cycles_per_microsecond(crate::CLOCK_SPEED_HZ);

// the outer countdown around each microsecond is one more loop round
pub const MICROSECOND_LOOP_OVERHEAD_CYCLES: u16 = LOOP_ITERATION_CYCLES as u16;

// rounds of the inner countdown that fill the rest of a microsecond
const MICROSECOND_INNER_ITERATIONS: u32 = must_loop(
    loop_iterations((CYCLES_PER_MICROSECOND - MICROSECOND_LOOP_OVERHEAD_CYCLES) as u32),
);

const ITERATIONS_128: u32 = must_loop(CycleBlock::Cycles128.loop_iterations());
const ITERATIONS_64: u32 = must_loop(CycleBlock::Cycles64.loop_iterations());
const ITERATIONS_32: u32 = must_loop(CycleBlock::Cycles32.loop_iterations());
const ITERATIONS_16: u32 = must_loop(CycleBlock::Cycles16.loop_iterations());
const ITERATIONS_8: u32 = must_loop(CycleBlock::Cycles8.loop_iterations());


const fn cycles_per_microsecond(clock_speed_hz: u32) -> u16 {
    assert!(clock_speed_hz % 1_000_000 == 0);
    let cycles = clock_speed_hz / 1_000_000;
    assert!(cycles <= (u16::MAX as u32));
    cycles as u16
}

const fn must_loop(iterations: Option<u32>) -> u32 {
    match iterations {
        Some(iterations) => iterations,
        None => panic!("no countdown loop lasts exactly that many cycles"),
    }
}


/// Counts `iterations` (at least 1) down to zero, one `subs`/`bne` round each.
#[inline(always)]
fn count_down(iterations: u32) {
    unsafe {
        asm!(
            "2:",
            "subs {n}, #1",
            "bne 2b",
            n = inout(reg) iterations => _,
            options(nomem, nostack),
        );
    }
}

#[inline(always)]
fn single_cycle() {
    unsafe {
        asm!("nop", options(nomem, nostack, preserves_flags));
    }
}

#[inline(always)]
fn single_cycles(count: u8) {
    match count {
        0 => {},
        1 => single_cycle(),
        2 => { single_cycle(); single_cycle(); },
        3 => { single_cycle(); single_cycle(); single_cycle(); },
        4 => { single_cycle(); single_cycle(); single_cycle(); single_cycle(); },
        5 => { single_cycles(4); single_cycle(); },
        6 => { single_cycles(4); single_cycles(2); },
        _ => { single_cycles(4); single_cycles(3); },
    }
}

/// Runs a plan block by block without iterating over it; with a constant plan every branch folds
/// away and only the loops remain.
#[inline(always)]
fn run_plan(plan: CyclePlan) {
    let long_iterations = plan.long_loop_iterations();
    if long_iterations > 0 {
        count_down(long_iterations);
    }

    let short = plan.short_blocks();
    if short.contains(ShortBlocks::CYCLES_128) {
        count_down(ITERATIONS_128);
    }
    if short.contains(ShortBlocks::CYCLES_64) {
        count_down(ITERATIONS_64);
    }
    if short.contains(ShortBlocks::CYCLES_32) {
        count_down(ITERATIONS_32);
    }
    if short.contains(ShortBlocks::CYCLES_16) {
        count_down(ITERATIONS_16);
    }
    if short.contains(ShortBlocks::CYCLES_8) {
        count_down(ITERATIONS_8);
    }

    single_cycles(plan.single_cycles());
}


/// Waits `cycles` processor cycles, call included. Anything below
/// [`MIN_DELAY_CYCLES`](td_clock::cycles::MIN_DELAY_CYCLES) waits that long instead.
#[inline(never)]
pub fn delay_cycles(cycles: u16) {
    run_plan(CyclePlan::for_cycles(cycles));
}

/// Waits `N` cycles, inlined at the call site.
#[inline(always)]
pub fn nops<const N: u16>() {
    run_plan(const { CyclePlan::inline(N) });
}

/// Waits `microseconds` by counting cycles; usable before the timer runs and in interrupt
/// handlers, but stretched by every interrupt that lands in the middle.
#[inline(never)]
pub fn delay_us_cycles8(microseconds: u8) {
    if microseconds == 0 {
        return;
    }
    unsafe {
        asm!(
            "2:",
            "mov {inner}, #{inner_iterations}",
            "3:",
            "subs {inner}, #1",
            "bne 3b",
            "subs {outer}, #1",
            "bne 2b",
            outer = inout(reg) microseconds as u32 => _,
            inner = out(reg) _,
            inner_iterations = const MICROSECOND_INNER_ITERATIONS,
            options(nomem, nostack),
        );
    }
}

/// [`delay_us_cycles8`] for longer waits.
pub fn delay_us_cycles(microseconds: u16) {
    for chunk in MicrosecondChunks::new(microseconds) {
        delay_us_cycles8(chunk);
    }
}


fn feed() {
    #[cfg(feature = "watchdog")]
    crate::watchdog::feed();
}

/// Waits at least `ms` milliseconds (whole ticks) on the tick timer.
pub fn delay_ms(ms: u16) {
    timer::clock().delay_ms_feeding(ms, feed);
}

/// Waits at least `sub_ticks` sub-tick units (1/1024 tick, not real microseconds) on the tick
/// timer. For real microseconds use [`hal_delay`].
pub fn delay_sub_ticks(sub_ticks: u16) {
    timer::clock().delay_us_feeding(sub_ticks, feed);
}

/// A [`DelayNs`](embedded_hal::delay::DelayNs) provider for drivers, waiting real nanoseconds,
/// microseconds or milliseconds on the tick timer.
pub fn hal_delay() -> Delay<'static, Tim6> {
    Delay::with_feed(timer::clock(), feed as fn())
}

//! Measures the cycle-counted delays against the core's cycle counter, derives the overhead
//! figures from the measurements and flags every wait that strays from its plan.


use core::fmt::{self, Write};

use cortex_m::peripheral::DWT;
use td_clock::cycles::{CyclePlan, DELAY_OVERHEAD_CYCLES, Deviation, MIN_DELAY_CYCLES};

use crate::delay::{
    CYCLES_PER_MICROSECOND, MICROSECOND_LOOP_OVERHEAD_CYCLES, delay_cycles, delay_us_cycles,
    delay_us_cycles8, nops,
};
use crate::uart::{DebugUart, Uart};


const REQUESTS: [u16; 5] = [24, 100, 1000, 4096, 65535];


fn measure<F: FnOnce()>(baseline: u32, f: F) -> u32 {
    let start = DWT::cycle_count();
    f();
    DWT::cycle_count().wrapping_sub(start).wrapping_sub(baseline)
}

/// Writes one measurement and its verdict; returns whether it is within tolerance.
fn check<U: Uart>(debug: &mut DebugUart<U>, what: fmt::Arguments, expected: u32, measured: u32) -> bool {
    let deviation = Deviation::of(expected, measured);
    let _ = match deviation {
        Deviation::Exact
            => writeln!(debug, "{}: {} cycles, exact", what, measured),
        Deviation::Within { off_by }
            => writeln!(debug, "{}: {} cycles, expected {} ({:+})", what, measured, expected, off_by),
        Deviation::Outside { off_by }
            => writeln!(debug, "{}: {} cycles, expected {} ({:+}) OUT OF TOLERANCE", what, measured, expected, off_by),
    };
    deviation.is_calibrated()
}

fn write_blocks<U: Uart>(debug: &mut DebugUart<U>, plan: &CyclePlan) {
    let _ = write!(debug, "  blocks:");
    for block in plan.blocks() {
        let _ = write!(debug, " {}", block.cycles());
    }
    let _ = writeln!(debug, " + {} overhead", plan.overhead_cycles());
}


/// Runs every measurement and reports it over `debug`. Returns `true` if all of them were within
/// tolerance.
pub fn report<U: Uart>(core_peripherals: &mut cortex_m::Peripherals, debug: &mut DebugUart<U>) -> bool {
    core_peripherals.DCB.enable_trace();
    // the Cortex-M7 keeps the DWT write-locked until told otherwise
    DWT::unlock();
    core_peripherals.DWT.enable_cycle_counter();

    // the measurement itself
    let baseline = measure(0, || {});
    let _ = writeln!(debug, "cycle counter baseline: {}", baseline);

    let mut calibrated = true;

    // the shortest delay is all overhead and a handful of blocks
    let shortest = CyclePlan::for_cycles(MIN_DELAY_CYCLES);
    let measured = measure(baseline, || delay_cycles(MIN_DELAY_CYCLES));
    let derived_overhead = shortest.measured_overhead(measured);
    let _ = writeln!(
        debug, "delay_cycles overhead: {} measured, {} assumed",
        derived_overhead, DELAY_OVERHEAD_CYCLES,
    );
    calibrated &= derived_overhead >= 0 && check(
        debug, format_args!("delay_cycles overhead"),
        DELAY_OVERHEAD_CYCLES as u32, derived_overhead as u32,
    );

    for cycles in REQUESTS {
        let plan = CyclePlan::for_cycles(cycles);
        let measured = measure(baseline, || delay_cycles(cycles));
        calibrated &= check(debug, format_args!("delay_cycles({})", cycles), plan.nominal_cycles(), measured);
        write_blocks(debug, &plan);
    }

    let measured = measure(baseline, || nops::<64>());
    calibrated &= check(debug, format_args!("nops::<64>()"), CyclePlan::inline(64).nominal_cycles(), measured);

    // the difference between one and two microseconds is one round of the outer loop
    let one = measure(baseline, || delay_us_cycles8(1));
    let two = measure(baseline, || delay_us_cycles8(2));
    let per_microsecond = two.wrapping_sub(one);
    calibrated &= check(
        debug, format_args!("one microsecond"),
        CYCLES_PER_MICROSECOND as u32, per_microsecond,
    );
    let _ = writeln!(
        debug, "delay_us_cycles8 call overhead: {} cycles ({} of them in the outer loop)",
        one.wrapping_sub(per_microsecond), MICROSECOND_LOOP_OVERHEAD_CYCLES,
    );

    // chunked, so a few calls' overhead on top
    let measured = measure(baseline, || delay_us_cycles(1000));
    let _ = writeln!(
        debug, "delay_us_cycles(1000): {} cycles, {} over the nominal {}",
        measured, measured.wrapping_sub(1000 * CYCLES_PER_MICROSECOND as u32), 1000 * CYCLES_PER_MICROSECOND as u32,
    );

    if !calibrated {
        let _ = writeln!(debug, "cycle delays are OUT OF TOLERANCE");
    }
    calibrated
}

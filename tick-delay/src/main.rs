#![no_main]
#![no_std]


mod calibration;
mod delay;
mod gpio_output;
mod timer;
mod uart;
#[cfg(feature = "watchdog")]
mod watchdog;


use core::fmt::Write;
use core::panic::PanicInfo;

use cortex_m_rt::entry;
use embedded_hal::delay::DelayNs;
use stm32f7::stm32f745::Peripherals;
use td_clock::Tick;

use crate::gpio_output::{BlinkyLedA8, GpioOutput, PulsePin};
#[cfg(feature = "tick-debug-pin")]
use crate::gpio_output::TickDebugPin;
use crate::uart::{DebugUart, Uart, Usart3};


pub const CLOCK_SPEED_HZ: u32 = 16_000_000;
pub const TICKS_PER_SECOND: u32 = 1000;

const DEBUG_BAUD_RATE: u32 = 9_600;
const BLINK_HALF_PERIOD_MS: u16 = 500;


#[panic_handler]
fn handle_panic(_info: &PanicInfo) -> ! {
    loop {
    }
}


/// Reconfigures the clocks of the microcontroller.
///
/// The board has a 16 MHz crystal, which we run everything from directly:
///
/// ```plain
/// ╭────────╮ ╒══════╕
/// │ HSE    ├─┤ HPRE ├───┬─────────┬─────────┐ AHB (max. 216 MHz)
/// │ 16 MHz │ │   /1 ├┐  │         │         │
/// ╰────────╯ └──────┘│ ┌┴───────┐┌┴───────┐┌┴───────┐
///                    │ │ SYSCLK ││ GPIOA  ││ GPIOC  │ ...
///                    │ │ 16 MHz ││ 16 MHz ││ 16 MHz │
///                    │ └────────┘└────────┘└────────┘
///                    │╒═══════╕
///                    ├┤ PPRE1 ├──┬─────────┐ APB1 (max. 54 MHz)
///                    ││    /1 │  │         │
///                    │└───────┘ ┌┴───────┐┌┴───────┐
///                    │          │ USART3 ││ TIM6   │
///                    │          │ 16 MHz ││ 16 MHz │
///                    │          └────────┘└────────┘
///                    │╒═══════╕
///                    └┤ PPRE2 ├── APB2 (max. 108 MHz), unused
///                     │    /1 │
///                     └───────┘
/// ```
///
/// With PPRE1 at /1, the APB1 timers get the bus clock unmultiplied, so TIM6 counts at
/// `CLOCK_SPEED_HZ` and divides it into ticks with prescaler 1 and reload 16000.
///
/// The debug USART wants 9600 b/s, which gives a USARTDIV of 1666.67; 1667 (0x683) fits.
fn setup_clocks(peripherals: &mut Peripherals) {
    // start up the external high-speed oscillator (HSE)

    // HSEBYP=0: crystal between OSCIN and OSCOUT
    // HSEBYP=1: clock on OSCIN while OSCOUT is floating
    // we have a crystal, not a clock
    peripherals.RCC.cr().modify(|_, w| w
        .hsebyp().clear_bit()
    );

    // turn on HSE
    peripherals.RCC.cr().modify(|_, w| w
        .hseon().set_bit()
    );

    // wait for HSE to become ready
    while peripherals.RCC.cr().read().hserdy().is_not_ready() {
    }

    // set flash wait states
    // we run on 3.3V, which means steps of 30 MHz
    // 0 MHz < 16 MHz < 30 MHz => 0 wait states
    peripherals.FLASH.acr().modify(|_, w| w
        .latency().ws0()
    );

    // set prescalers to /1
    peripherals.RCC.cfgr().modify(|_, w| w
        .hpre().div1() // warning: max. 216 MHz
        .ppre2().div1() // warning: max. 108 MHz
        .ppre1().div1() // warning: max. 54 MHz
    );

    // switch clock input over to HSE
    peripherals.RCC.cfgr().modify(|_, w| w
        .sw().hse()
    );

    // wait until clock input switches over
    while !peripherals.RCC.cfgr().read().sws().is_hse() {
    }

    // feed the clock to the GPIO banks we use; the peripherals enable their own
    peripherals.RCC.ahb1enr().modify(|_, w| w
        .gpioaen().enabled()
        .gpiocen().enabled()
        .gpioden().enabled()
    );
}

fn setup_pins(peripherals: &mut Peripherals) {
    // choose alternate functions
    peripherals.GPIOD.afrh().modify(|_, w| w
        .afrh8().af7() // PD8 to USART3 Tx
        .afrh9().af7() // PD9 to USART3 Rx
    );

    peripherals.GPIOD.otyper().modify(|_, w| w
        .ot8().push_pull()
    );

    // Rx is wired up but never read
    peripherals.GPIOD.pupdr().modify(|_, w| w
        .pupdr9().pull_up()
    );

    peripherals.GPIOD.moder().modify(|_, w| w
        .moder8().alternate() // USART3
        .moder9().alternate() // USART3
    );

    // plain outputs: LED, pulse pin and (maybe) tick debug pin
    BlinkyLedA8::set_up(peripherals);
    PulsePin::set_up(peripherals);
    #[cfg(feature = "tick-debug-pin")]
    TickDebugPin::set_up(peripherals);
}


const fn divide_u32_to_u16_round(dividend: u32, divisor: u32) -> u16 {
    let quotient = (dividend + (divisor / 2)) / divisor;
    assert!(quotient <= (u16::MAX as u32));
    quotient as u16
}


/// One burst of pulses on the pulse pin, one per delay flavor, for measuring on a scope.
fn pulse_burst(peripherals: &Peripherals) {
    // 8 cycles, inlined
    PulsePin::set_high(peripherals);
    delay::nops::<8>();
    PulsePin::set_low(peripherals);

    // 100 cycles, called
    PulsePin::set_high(peripherals);
    delay::delay_cycles(100);
    PulsePin::set_low(peripherals);

    // 10 µs, cycle-counted
    PulsePin::set_high(peripherals);
    delay::delay_us_cycles(10);
    PulsePin::set_low(peripherals);

    // 250 µs, timed by TIM6 in real microseconds
    let mut hal_delay = delay::hal_delay();
    PulsePin::set_high(peripherals);
    hal_delay.delay_us(250);
    PulsePin::set_low(peripherals);
}


#[entry]
fn main() -> ! {
    let mut peripherals = unsafe { Peripherals::steal() };
    let mut core_peripherals = unsafe { cortex_m::Peripherals::steal() };

    setup_clocks(&mut peripherals);
    setup_pins(&mut peripherals);

    Usart3::set_up(
        &peripherals,
        divide_u32_to_u16_round(CLOCK_SPEED_HZ, DEBUG_BAUD_RATE),
    );
    let mut debug = DebugUart::<Usart3>::new(&peripherals);
    let _ = writeln!(debug, "tick-delay starting");

    // cycle-counted delays do not need the timer, so check them first
    if !calibration::report(&mut core_peripherals, &mut debug) {
        let _ = writeln!(debug, "cycle-counted delays will be off by more than their tolerance");
    }

    #[cfg(feature = "watchdog")]
    crate::watchdog::set_up(&peripherals);

    timer::configure_timer(&peripherals);
    let _ = writeln!(
        debug,
        "TIM6: prescaler {}, reload {}, {} ticks/s",
        timer::SETTINGS.prescaler(), timer::SETTINGS.reload(), timer::SETTINGS.ticks_per_second(),
    );

    let mut last_report = timer::clock().now();
    loop {
        BlinkyLedA8::toggle(&peripherals);
        pulse_burst(&peripherals);
        delay::delay_ms(BLINK_HALF_PERIOD_MS);

        let now = timer::clock().now();
        if now.ticks_since(last_report) >= TICKS_PER_SECOND {
            let micros32 = timer::micros32();
            let _ = writeln!(
                debug,
                "millis {} millis16 {} micros {} micros32 {} ({} whole ticks)",
                timer::millis(), timer::millis16(), timer::micros(), micros32, Tick::whole_ticks_in(micros32),
            );
            last_report = now;
        }

        // the 16-bit sub-tick timestamp is good for intervals up to 64 ticks
        let before = timer::micros();
        delay::delay_sub_ticks(100);
        let elapsed = timer::micros().wrapping_sub(before);
        if elapsed <= 100 {
            let _ = writeln!(debug, "delay_sub_ticks(100) returned early, after {} units", elapsed);
        }
    }
}

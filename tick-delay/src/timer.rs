use cortex_m::peripheral::NVIC;
use stm32f7::stm32f745::{Interrupt, Peripherals, TIM6, interrupt, tim6};
use td_clock::{MonotonicClock, PeriodTimer, PrescalerSteps, TimerSettings, with_interrupt_masked};

#[cfg(feature = "tick-debug-pin")]
use crate::gpio_output::{GpioOutput, TickDebugPin};


// TIM6 is a basic timer: 16-bit prescaler, 16-bit auto-reload, update interrupt on overflow
const MAX_PRESCALER: u32 = 1 << 16;
const MAX_RELOAD: u32 = 1 << 16;


pub const SETTINGS: TimerSettings = match TimerSettings::derive(
    crate::CLOCK_SPEED_HZ,
    crate::TICKS_PER_SECOND,
    PrescalerSteps::Linear { max: MAX_PRESCALER },
    MAX_RELOAD,
) {
    Some(settings) => settings,
    None => panic!("TIM6 cannot divide the clock into whole ticks"),
};

const PRESCALER_REGISTER: u16 = register_u16(SETTINGS.prescaler_register());
const RELOAD_REGISTER: u16 = register_u16(SETTINGS.reload_register());


static CLOCK: MonotonicClock<Tim6> = MonotonicClock::new(Tim6, SETTINGS);


const fn register_u16(value: u32) -> u16 {
    assert!(value <= (u16::MAX as u32));
    value as u16
}


/// TIM6 as the tick source. Masking goes through the NVIC so only the tick interrupt is held off.
pub struct Tim6;
impl Tim6 {
    fn registers(&self) -> &'static tim6::RegisterBlock {
        unsafe { &*TIM6::ptr() }
    }
}
impl PeriodTimer for Tim6 {
    fn counter(&self) -> u32 {
        self.registers().cnt().read().cnt().bits() as u32
    }

    fn period_elapsed(&self) -> bool {
        self.registers().sr().read().uif().bit_is_set()
    }

    fn clear_period_elapsed(&self) {
        self.registers().sr().write(|w| w
            .uif().clear_bit()
        );

        // the write must reach the peripheral before the handler returns or it fires again
        cortex_m::asm::dsb();
    }

    fn mask_interrupt(&self) -> bool {
        let was_unmasked = NVIC::is_enabled(Interrupt::TIM6_DAC);
        NVIC::mask(Interrupt::TIM6_DAC);

        // no handler entry past this point
        cortex_m::asm::dsb();
        cortex_m::asm::isb();

        was_unmasked
    }

    unsafe fn unmask_interrupt(&self) {
        unsafe { NVIC::unmask(Interrupt::TIM6_DAC) };
    }
}


/// Programs TIM6 for the tick rate, resets the tick to zero and starts counting.
pub fn configure_timer(peripherals: &Peripherals) {
    critical_section::with(|_cs| {
        with_interrupt_masked(CLOCK.timer(), |masked| {
            // gimme clock
            peripherals.RCC.apb1enr().modify(|_, w| w
                .tim6en().set_bit()
            );

            let tim6 = &peripherals.TIM6;

            // stop while reprogramming
            tim6.cr1().modify(|_, w| w
                .cen().clear_bit()
            );

            tim6.psc().write(|w| unsafe { w
                .psc().bits(PRESCALER_REGISTER)
            });
            tim6.arr().write(|w| unsafe { w
                .arr().bits(RELOAD_REGISTER)
            });

            // only an overflow raises the update flag, not the update we force next
            tim6.cr1().modify(|_, w| w
                .urs().set_bit()
            );

            // latch the prescaler (it is buffered) and restart the counter at zero
            tim6.egr().write(|w| w
                .ug().set_bit()
            );
            tim6.sr().write(|w| w
                .uif().clear_bit()
            );

            CLOCK.reset(masked);

            tim6.dier().modify(|_, w| w
                .uie().set_bit()
            );
            tim6.cr1().modify(|_, w| w
                .cen().set_bit()
            );
        });

        // unmasked at boot or not, the tick interrupt has to run from now on
        unsafe { CLOCK.timer().unmask_interrupt() };
    });
}


pub fn clock() -> &'static MonotonicClock<Tim6> {
    &CLOCK
}

pub fn millis() -> u32 {
    CLOCK.millis()
}

pub fn millis16() -> u16 {
    CLOCK.millis16()
}

pub fn micros() -> u16 {
    CLOCK.micros()
}

pub fn micros32() -> u32 {
    CLOCK.micros32()
}


#[interrupt]
fn TIM6_DAC() {
    #[cfg(feature = "tick-debug-pin")]
    {
        let peripherals = unsafe { Peripherals::steal() };
        TickDebugPin::toggle(&peripherals);
    }

    // TIM6 shares the vector with the DAC, which is never enabled
    unsafe { CLOCK.on_period_elapsed() };
}

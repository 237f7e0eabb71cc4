use stm32f7::stm32f745::Peripherals;


macro_rules! make_gpio_output {
    (
        $name:ident,
        $pin_bank:ident,
        $pin:expr $(,)?
    ) => {
        pub struct $name;
        impl GpioOutput for $name {
            fn set_up(peripherals: &Peripherals) {
                // clock to GPIO peripheral
                peripherals.RCC.ahb1enr().modify(|_, w|
                    make_gpio_output!(@clock_field, $pin_bank, w).enabled()
                );

                // start low so the first edge is one we made
                make_gpio_output!(@gpio_peripheral, $pin_bank, peripherals).odr().modify(|_, w| w
                    .odr($pin).low()
                );

                // output to push-pull
                make_gpio_output!(@gpio_peripheral, $pin_bank, peripherals).otyper().modify(|_, w| w
                    .ot($pin).push_pull()
                );

                // steep edges, so pulse widths on the scope are what the delays made them
                make_gpio_output!(@gpio_peripheral, $pin_bank, peripherals).ospeedr().modify(|_, w| w
                    .ospeedr($pin).very_high_speed()
                );

                // pin to output
                make_gpio_output!(@gpio_peripheral, $pin_bank, peripherals).moder().modify(|_, w| w
                    .moder($pin).output()
                );
            }

            fn turn_on(peripherals: &Peripherals) {
                make_gpio_output!(@gpio_peripheral, $pin_bank, peripherals).odr().modify(|_, w| w
                    .odr($pin).high()
                );
            }

            fn turn_off(peripherals: &Peripherals) {
                make_gpio_output!(@gpio_peripheral, $pin_bank, peripherals).odr().modify(|_, w| w
                    .odr($pin).low()
                );
            }

            fn toggle(peripherals: &Peripherals) {
                make_gpio_output!(@gpio_peripheral, $pin_bank, peripherals).odr().modify(|r, w| w
                    .odr($pin).bit(r.odr($pin).bit_is_clear())
                );
            }
        }
    };
    (@clock_field, A, $register:expr) => {$register.gpioaen()};
    (@clock_field, C, $register:expr) => {$register.gpiocen()};
    (@clock_field, D, $register:expr) => {$register.gpioden()};
    (@gpio_peripheral, A, $peripherals:expr) => {$peripherals.GPIOA};
    (@gpio_peripheral, C, $peripherals:expr) => {$peripherals.GPIOC};
    (@gpio_peripheral, D, $peripherals:expr) => {$peripherals.GPIOD};
}


pub trait GpioOutput {
    fn set_up(peripherals: &Peripherals);
    fn turn_on(peripherals: &Peripherals);
    fn turn_off(peripherals: &Peripherals);
    fn toggle(peripherals: &Peripherals);

    fn set_high(peripherals: &Peripherals) { Self::turn_on(peripherals) }
    fn set_low(peripherals: &Peripherals) { Self::turn_off(peripherals) }
}


make_gpio_output!(BlinkyLedA8, A, 8);
make_gpio_output!(TickDebugPin, C, 8);
make_gpio_output!(PulsePin, D, 13);

use core::fmt;
use core::marker::PhantomData;

use stm32f7::stm32f745::Peripherals;
use stm32f7::stm32f745::usart1;


pub trait Uart {
    fn get_peripheral(peripherals: &Peripherals) -> &usart1::RegisterBlock;
    fn enable_peripheral_clock(peripherals: &Peripherals);

    /// Sets up the UART for transmission only; the debug channel never listens.
    fn set_up(peripherals: &Peripherals, speed_divisor: u16) {
        let uart = Self::get_peripheral(peripherals);

        // assumes pins are already set up

        // gimme clock
        Self::enable_peripheral_clock(peripherals);

        // set up
        uart.cr1().modify(|_, w| w
            .m0().bit8() // 8 bits per byte
            .m1().m0() // yes, 8 bits per byte
            .over8().oversampling16() // sample 16 bits, not 8
            .pce().disabled() // no hardware parity calculation
        );
        uart.brr().modify(|_, w| w
            .brr().set(speed_divisor)
        );
        uart.cr2().modify(|_, w| w
            .stop().stop1() // 1 stop bit
            .txinv().standard() // transmission pin not inverted
            .datainv().positive() // data polarity not inverted
            .msbfirst().clear_bit() // RS232 says least significant byte first
        );

        uart.cr1().modify(|_, w| w
            .ue().enabled() // turn on UART
        );

        uart.cr1().modify(|_, w| w
            .te().enabled() // turn on transmission
        );
    }

    /// Writes via UART, polling until every byte has left the transmit buffer.
    fn write(peripherals: &Peripherals, data: &[u8]) {
        let uart = Self::get_peripheral(peripherals);

        for b in data {
            // wait until transmit buffer is empty
            while uart.isr().read().txe().is_full() {
            }

            // write the byte
            uart.tdr().modify(|_, w| w
                .tdr().set(*b as u16)
            );
        }

        // wait until transmit buffer is empty one last time
        while uart.isr().read().txe().is_full() {
        }
    }
}


pub struct Usart3;
impl Uart for Usart3 {
    fn get_peripheral(peripherals: &Peripherals) -> &usart1::RegisterBlock {
        &*peripherals.USART3
    }

    fn enable_peripheral_clock(peripherals: &Peripherals) {
        peripherals.RCC.apb1enr().modify(|_, w| w
            .usart3en().set_bit()
        );
    }
}


/// Formatted output on a UART, for `write!`.
///
/// Line endings go out as `\r\n`, which is what terminal programs expect.
pub struct DebugUart<'a, U: Uart> {
    peripherals: &'a Peripherals,
    uart: PhantomData<U>,
}
impl<'a, U: Uart> DebugUart<'a, U> {
    pub fn new(peripherals: &'a Peripherals) -> Self {
        Self {
            peripherals,
            uart: PhantomData,
        }
    }
}
impl<'a, U: Uart> fmt::Write for DebugUart<'a, U> {
    fn write_str(&mut self, s: &str) -> fmt::Result {
        let mut lines = s.split('\n');
        if let Some(first) = lines.next() {
            U::write(self.peripherals, first.as_bytes());
        }
        for line in lines {
            U::write(self.peripherals, b"\r\n");
            U::write(self.peripherals, line.as_bytes());
        }
        Ok(())
    }
}

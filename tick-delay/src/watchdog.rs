use stm32f7::stm32f745::{IWDG, Peripherals, iwdg};


// RM0385 § 23.4: magic values for the key register
const KEY_RELOAD: u16 = 0xAAAA;
const KEY_START: u16 = 0xCCCC;
const KEY_UNLOCK: u16 = 0x5555;

// LSI runs at ~32 kHz; /32 gives ~1 kHz
const PRESCALER_DIV_32: u8 = 0b011;

// ~2 s at ~1 kHz, long enough for the 500 ms blink and a report line
const RELOAD_VALUE: u16 = 2000;


fn registers() -> &'static iwdg::RegisterBlock {
    unsafe { &*IWDG::ptr() }
}


/// Starts the independent watchdog. It cannot be stopped again short of a reset.
pub fn set_up(peripherals: &Peripherals) {
    let iwdg = &peripherals.IWDG;

    // starting it also starts the LSI
    iwdg.kr().write(|w| unsafe { w
        .key().bits(KEY_START)
    });

    iwdg.kr().write(|w| unsafe { w
        .key().bits(KEY_UNLOCK)
    });
    iwdg.pr().write(|w| unsafe { w
        .pr().bits(PRESCALER_DIV_32)
    });
    iwdg.rlr().write(|w| unsafe { w
        .rl().bits(RELOAD_VALUE)
    });

    // wait for both values to cross into the LSI domain
    while iwdg.sr().read().pvu().bit_is_set() || iwdg.sr().read().rvu().bit_is_set() {
    }

    feed();
}

/// Reloads the watchdog counter.
pub fn feed() {
    registers().kr().write(|w| unsafe { w
        .key().bits(KEY_RELOAD)
    });
}

//! Fatal error handling
//!
//! There is no recovery from a fault that corrupts the shared input state.
//! The firmware stops doing anything else and blinks the status LED until
//! it is reset.

use embedded_hal::blocking::delay::DelayMs;
use embedded_hal::digital::v2::OutputPin;

/// Half period of the fault blink
pub const BLINK_HALF_PERIOD_MS: u16 = 100;

/// One on/off cycle of the fault blink
pub fn blink_once<L, D>(led: &mut L, delay: &mut D)
where
    L: OutputPin,
    D: DelayMs<u16>,
{
    // nothing left to report a pin error to
    let _ = led.set_high();
    delay.delay_ms(BLINK_HALF_PERIOD_MS);
    let _ = led.set_low();
    delay.delay_ms(BLINK_HALF_PERIOD_MS);
}

/// Blink the status LED forever
pub fn halt<L, D>(mut led: L, mut delay: D) -> !
where
    L: OutputPin,
    D: DelayMs<u16>,
{
    let _ = led.set_low();
    loop {
        blink_once(&mut led, &mut delay);
    }
}

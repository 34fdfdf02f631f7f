#![no_std]

#[cfg(test)]
extern crate std;

pub mod cm;
pub mod gpio;
pub mod i2c;
pub mod mmio;
pub mod pwm;
pub mod timer;
pub mod uart;

use core::sync::atomic::{AtomicBool, Ordering};

use thiserror_no_std::Error;

pub use cm::PwmClock;
pub use gpio::Gpio;
pub use i2c::{I2c, UninitializedI2c};
pub use mmio::{Mmio, RegisterBus};
pub use pwm::Pwm;
pub use timer::SystemTimer;
pub use uart::MiniUart;

/// Base of the memory-mapped peripheral window.
pub const PERIPHERAL_BASE: u32 = 0x3f00_0000;

// frequency of various clocks on the board
pub const OSCILLATOR_FREQUENCY: u32 = 19_200_000;
pub const SYSTEM_TIMER_FREQUENCY: u32 = 1_000_000;

// NOTE: nominal value, the firmware can reconfigure it; the i2c divider is
// derived from this clock
pub const CORE_CLOCK_FREQUENCY: u32 = 150_000_000;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum HalError {
    #[error("gpio pin {0} is out of range")]
    InvalidPin(u8),
}

/// Contains the peripherals of the bcm2837.
///
/// Owning a driver struct is what entitles code to touch that peripheral's
/// registers; nothing below this layer arbitrates concurrent access.
pub struct Peripherals {
    pub gpio: Gpio,
    pub pwm_clock: PwmClock,
    pub pwm: Pwm,
    pub i2c: UninitializedI2c,
    pub uart: MiniUart,
    pub timer: SystemTimer,
}

static PERIPHERALS_TAKEN: AtomicBool = AtomicBool::new(false);

impl Peripherals {
    /// Hands out the peripherals, exactly once.
    pub fn take() -> Option<Peripherals> {
        critical_section::with(|_| {
            if PERIPHERALS_TAKEN.load(Ordering::Relaxed) {
                return None;
            }

            PERIPHERALS_TAKEN.store(true, Ordering::Relaxed);

            // safety: the taken flag guarantees a single owner of the
            // register window
            let bus = unsafe { Mmio::new() };

            Some(Peripherals {
                gpio: Gpio::new(bus),
                pwm_clock: PwmClock::new(bus),
                pwm: Pwm::new(bus),
                i2c: UninitializedI2c::new(bus),
                uart: MiniUart::new(bus),
                timer: SystemTimer::new(bus),
            })
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn peripherals_can_only_be_taken_once() {
        let first = Peripherals::take();
        assert!(first.is_some());

        assert!(Peripherals::take().is_none());
    }
}

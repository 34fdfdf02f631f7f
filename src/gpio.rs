use crate::mmio::{Mmio, RegisterBus};
use crate::HalError;

const GPIO_BASE: u32 = crate::PERIPHERAL_BASE + 0x0020_0000;

// function select registers, 10 pins of 3 bits each
const GPFSEL0: u32 = GPIO_BASE;

// output set / output clear / level registers, 32 pins each
const GPSET0: u32 = GPIO_BASE + 0x1c;
const GPCLR0: u32 = GPIO_BASE + 0x28;
const GPLEV0: u32 = GPIO_BASE + 0x34;

/// Highest valid gpio pin number.
pub const GPIO_PIN_MAX: u8 = 53;

const PINS_PER_SELECT_REG: u8 = 10;
const MODE_FIELD_WIDTH: u32 = 3;
const MODE_FIELD_MASK: u32 = 0b111;

/// Specifies the function of a gpio pin.
///
/// The discriminants are the hardware encodings of the 3-bit function select
/// field. Anything beyond plain input/output multiplexes the pin to one of
/// the peripheral alternate functions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PinMode {
    /// Pin is a plain input.
    Input = 0b000,
    /// Pin is a plain output.
    Output = 0b001,
    Alt0 = 0b100,
    Alt1 = 0b101,
    Alt2 = 0b110,
    Alt3 = 0b111,
    Alt4 = 0b011,
    /// Alternate function 5, used by the mini uart among others.
    Alt5 = 0b010,
}

/// The gpio pin multiplexer and pin level primitives.
///
/// A pin's function belongs to whichever peripheral configured it last; this
/// layer does not arbitrate between them.
#[derive(Debug, Clone, Copy)]
pub struct Gpio<B: RegisterBus = Mmio> {
    bus: B,
}

impl<B: RegisterBus> Gpio<B> {
    pub fn new(bus: B) -> Self {
        Gpio { bus }
    }

    /// Sets the function of one pin.
    ///
    /// Only the pin's own 3-bit field in its select register is altered;
    /// adjacent pins in the same register keep their configuration.
    pub fn set_pin_mode(&self, pin: u8, mode: PinMode) -> Result<(), HalError> {
        if pin > GPIO_PIN_MAX {
            return Err(HalError::InvalidPin(pin));
        }

        let select_reg = GPFSEL0 + u32::from(pin / PINS_PER_SELECT_REG) * 4;
        let shift = u32::from(pin % PINS_PER_SELECT_REG) * MODE_FIELD_WIDTH;

        self.bus.modify(select_reg, |value| {
            (value & !(MODE_FIELD_MASK << shift)) | ((mode as u32) << shift)
        });

        Ok(())
    }

    /// Drives an output pin high.
    ///
    /// The set registers are write-1-to-set, so no read-modify-write is
    /// needed and other pins are unaffected.
    pub fn set_high(&self, pin: u8) -> Result<(), HalError> {
        let (reg, bit) = Self::pin_bit(GPSET0, pin)?;
        self.bus.write(reg, 1 << bit);
        Ok(())
    }

    /// Drives an output pin low.
    pub fn set_low(&self, pin: u8) -> Result<(), HalError> {
        let (reg, bit) = Self::pin_bit(GPCLR0, pin)?;
        self.bus.write(reg, 1 << bit);
        Ok(())
    }

    /// Reads the level of a pin.
    pub fn read_level(&self, pin: u8) -> Result<bool, HalError> {
        let (reg, bit) = Self::pin_bit(GPLEV0, pin)?;
        Ok(self.bus.read(reg) & (1 << bit) != 0)
    }

    fn pin_bit(bank_base: u32, pin: u8) -> Result<(u32, u32), HalError> {
        if pin > GPIO_PIN_MAX {
            return Err(HalError::InvalidPin(pin));
        }

        Ok((bank_base + u32::from(pin / 32) * 4, u32::from(pin % 32)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mmio::sim::SimBus;

    #[test]
    fn pin_mode_alters_only_its_own_field() {
        for pin in 0..=GPIO_PIN_MAX {
            let bus = SimBus::new();
            let select_reg = GPFSEL0 + u32::from(pin / 10) * 4;
            let shift = u32::from(pin % 10) * 3;

            // every field starts non-zero so clobbering a neighbor is visible
            let pattern = 0o1111111111;
            bus.preset(select_reg, pattern);

            let gpio = Gpio::new(&bus);
            gpio.set_pin_mode(pin, PinMode::Alt5).unwrap();

            let expected = (pattern & !(0b111 << shift)) | ((PinMode::Alt5 as u32) << shift);
            assert_eq!(bus.cell(select_reg), expected, "pin {pin}");
        }
    }

    #[test]
    fn pin_mode_rejects_out_of_range_pin() {
        let bus = SimBus::new();
        let gpio = Gpio::new(&bus);

        assert!(matches!(
            gpio.set_pin_mode(54, PinMode::Output),
            Err(HalError::InvalidPin(54))
        ));
        assert!(bus.writes().is_empty());
    }

    #[test]
    fn set_and_clear_use_write_one_semantics() {
        let bus = SimBus::new();
        let gpio = Gpio::new(&bus);

        gpio.set_high(17).unwrap();
        gpio.set_low(47).unwrap();

        assert_eq!(bus.writes_to(GPSET0), [1 << 17]);
        assert_eq!(bus.writes_to(GPCLR0 + 4), [1 << (47 - 32)]);
    }

    #[test]
    fn read_level_picks_the_right_bank_and_bit() {
        let bus = SimBus::new();
        bus.preset(GPLEV0 + 4, 1 << (42 - 32));

        let gpio = Gpio::new(&bus);
        assert!(gpio.read_level(42).unwrap());
        assert!(!gpio.read_level(43).unwrap());
    }
}

use crate::gpio::{Gpio, PinMode};
use crate::mmio::{Mmio, RegisterBus};
use crate::CORE_CLOCK_FREQUENCY;

const I2C_BASE: u32 = crate::PERIPHERAL_BASE + 0x0080_4000;

const I2C_C: u32 = I2C_BASE; // control
const I2C_S: u32 = I2C_BASE + 0x4; // status
const I2C_DLEN: u32 = I2C_BASE + 0x8; // data length
const I2C_A: u32 = I2C_BASE + 0xc; // slave address
const I2C_FIFO: u32 = I2C_BASE + 0x10;
const I2C_DIV: u32 = I2C_BASE + 0x14; // clock divider

// control register bits
const C_I2CEN: u32 = 1 << 15;
const C_ST: u32 = 1 << 7; // start transfer
const C_CLEAR: u32 = 1 << 4; // clear fifo

// status register bits, write 1 to clear the latched ones
const S_CLKT: u32 = 1 << 9;
const S_ERR: u32 = 1 << 8;
const S_DONE: u32 = 1 << 1;

const SDA_PIN: u8 = 2;
const SCL_PIN: u8 = 3;

const ADDRESS_MASK: u8 = 0x7f;

/// The divisor the hardware actually applies for a divider register value.
///
/// A value of 0 means 32768, and odd values are rounded down to even. Only
/// the low 16 bits are significant.
pub fn effective_divisor(divider: u32) -> u32 {
    let divider = (divider & 0xffff) & !1;
    if divider == 0 {
        32768
    } else {
        divider
    }
}

/// The scl frequency a divider register value produces, from the nominal
/// 150 MHz core clock.
pub fn scl_frequency(divider: u32) -> u32 {
    CORE_CLOCK_FREQUENCY / effective_divisor(divider)
}

/// The i2c master before its pins have been claimed.
#[derive(Debug)]
pub struct UninitializedI2c<B: RegisterBus = Mmio> {
    bus: B,
}

impl<B: RegisterBus> UninitializedI2c<B> {
    pub fn new(bus: B) -> Self {
        UninitializedI2c { bus }
    }

    /// Claims gpio 2 (sda) and gpio 3 (scl) for the i2c alternate function.
    ///
    /// No clock or address register is touched; set those on the returned
    /// master before the first transaction.
    pub fn start(self) -> I2c<B> {
        let gpio = Gpio::new(self.bus);
        gpio.set_pin_mode(SDA_PIN, PinMode::Alt0)
            .expect("sda pin is a valid gpio pin");
        gpio.set_pin_mode(SCL_PIN, PinMode::Alt0)
            .expect("scl pin is a valid gpio pin");

        I2c { bus: self.bus }
    }
}

/// The i2c master with its pins claimed.
///
/// The slave address may be changed between transactions without restarting.
// TODO: add multi-byte transfers
#[derive(Debug)]
pub struct I2c<B: RegisterBus = Mmio> {
    bus: B,
}

impl<B: RegisterBus> I2c<B> {
    /// Writes the clock divider register verbatim.
    ///
    /// scl = core clock (nominally 150 MHz) / divider, with the hardware
    /// rounding described on [`effective_divisor`]. The value is passed
    /// through unvalidated.
    pub fn set_clock_divider(&self, divider: u32) {
        self.bus.write(I2C_DIV, divider);
    }

    /// Sets the 7-bit address of the device to talk to.
    ///
    /// Bits above the hardware field width are silently discarded.
    pub fn set_slave_address(&self, address: u8) {
        self.bus.write(I2C_A, u32::from(address & ADDRESS_MASK));
    }

    /// Writes a single byte to the device at the current slave address.
    ///
    /// Latched status flags and the fifo are cleared, the transfer length is
    /// set to one, the byte loaded and the transfer started. The function
    /// returns immediately: completion is not polled and an ack is never
    /// observed, so whether the transfer succeeded is unobservable to the
    /// caller.
    pub fn write_byte(&self, value: u8) {
        self.bus.write(I2C_S, S_CLKT | S_ERR | S_DONE);
        self.bus.write(I2C_C, C_I2CEN | C_CLEAR);
        self.bus.write(I2C_DLEN, 1);
        self.bus.write(I2C_FIFO, u32::from(value));
        self.bus.write(I2C_C, C_I2CEN | C_ST);
    }

    /// Reads a single byte from the device at the current slave address.
    ///
    /// The read path has never been verified against a real device; it
    /// stays unimplemented rather than pretending to work.
    pub fn read_byte(&self) -> u8 {
        unimplemented!("i2c reads are untested and not implemented");
    }

    /// Releases the i2c pins back to plain inputs.
    pub fn end(self) -> UninitializedI2c<B> {
        let gpio = Gpio::new(self.bus);
        gpio.set_pin_mode(SDA_PIN, PinMode::Input)
            .expect("sda pin is a valid gpio pin");
        gpio.set_pin_mode(SCL_PIN, PinMode::Input)
            .expect("scl pin is a valid gpio pin");

        UninitializedI2c { bus: self.bus }
    }
}

use core::fmt::{self, Write};

use bitflags::bitflags;
use once_cell::sync::OnceCell;

use crate::gpio::{Gpio, PinMode};
use crate::mmio::{spin_until, Mmio, RegisterBus};

const AUX_BASE: u32 = crate::PERIPHERAL_BASE + 0x0021_5000;

const AUX_ENABLES: u32 = AUX_BASE + 0x04;

const AUX_MU_IO: u32 = AUX_BASE + 0x40; // data
const AUX_MU_IER: u32 = AUX_BASE + 0x44; // interrupt enable
const AUX_MU_LCR: u32 = AUX_BASE + 0x4c; // line control
const AUX_MU_MCR: u32 = AUX_BASE + 0x50; // modem control
const AUX_MU_LSR: u32 = AUX_BASE + 0x54; // line status
const AUX_MU_CNTL: u32 = AUX_BASE + 0x60; // extra control
const AUX_MU_BAUD: u32 = AUX_BASE + 0x68; // baud rate

bitflags! {
    /// Peripheral enables in the shared auxiliary block. The two spi
    /// enables belong to other peripherals, so updates are read-modify-write.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct AuxEnables: u32 {
        const MINI_UART = 1 << 0;
        const SPI1 = 1 << 1;
        const SPI2 = 1 << 2;
    }
}

bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    struct MiniUartControl: u32 {
        const RECEIVER_ENABLE = 1 << 0;
        const TRANSMITTER_ENABLE = 1 << 1;
    }
}

// line status bits
const LSR_TRANSMITTER_EMPTY: u32 = 1 << 5; // can accept at least one byte
const LSR_DATA_READY: u32 = 1 << 0; // receive fifo holds at least one byte

// 8-bit line mode; both low bits must be set on this part
const LCR_8_BIT_MODE: u32 = 0x3;

const TX_PIN: u8 = 14;
const RX_PIN: u8 = 15;

/// Baud rate selector.
///
/// The discriminants are the baud register values for the 250 MHz core
/// clock: `register = 250 MHz / (8 * baud) - 1`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BaudRate {
    Baud9600 = 3254,
    Baud19200 = 1626,
    Baud38400 = 812,
    Baud57600 = 541,
    Baud115200 = 270,
}

/// The auxiliary mini uart.
///
/// Transmit and receive are polled with no buffering; nothing here enables
/// an interrupt.
#[derive(Debug, Clone, Copy)]
pub struct MiniUart<B: RegisterBus = Mmio> {
    bus: B,
}

impl<B: RegisterBus> MiniUart<B> {
    pub fn new(bus: B) -> Self {
        MiniUart { bus }
    }

    /// Brings up the mini uart on gpio 14/15 at the given baud rate.
    ///
    /// The sequence is order-significant: the transmitter and receiver stay
    /// disabled, with interrupts off, until the line mode and baud divisor
    /// are programmed, and only then are they switched on.
    pub fn init(&self, baud_rate: BaudRate) {
        let gpio = Gpio::new(self.bus);
        gpio.set_pin_mode(TX_PIN, PinMode::Alt5)
            .expect("uart tx pin is a valid gpio pin");
        gpio.set_pin_mode(RX_PIN, PinMode::Alt5)
            .expect("uart rx pin is a valid gpio pin");

        // hand the mini uart its clock, keeping the spi enables intact
        self.bus
            .modify(AUX_ENABLES, |value| value | AuxEnables::MINI_UART.bits());

        // interrupts off, transmitter and receiver off while configuring
        self.bus.write(AUX_MU_IER, 0);
        self.bus.write(AUX_MU_CNTL, 0);

        self.bus.write(AUX_MU_LCR, LCR_8_BIT_MODE);

        // deassert rts
        self.bus.write(AUX_MU_MCR, 0);

        self.set_baud_rate(baud_rate);

        // enable transmit and receive strictly last
        self.bus.modify(AUX_MU_CNTL, |value| {
            value | (MiniUartControl::TRANSMITTER_ENABLE | MiniUartControl::RECEIVER_ENABLE).bits()
        });
    }

    /// Programs the baud divisor.
    pub fn set_baud_rate(&self, baud_rate: BaudRate) {
        self.bus.write(AUX_MU_BAUD, baud_rate as u32);
    }

    fn can_transmit(&self) -> bool {
        self.bus.read(AUX_MU_LSR) & LSR_TRANSMITTER_EMPTY != 0
    }

    fn has_data(&self) -> bool {
        self.bus.read(AUX_MU_LSR) & LSR_DATA_READY != 0
    }

    /// Sends one byte, spinning until the transmitter can accept it.
    pub fn send_byte(&self, value: u8) {
        spin_until(|| self.can_transmit());

        self.bus.write(AUX_MU_IO, u32::from(value));
    }

    /// Sends a string one byte at a time, stopping at the first nul byte
    /// without sending it.
    pub fn send_string(&self, text: &str) {
        for &byte in text.as_bytes() {
            if byte == b'\0' {
                break;
            }

            self.send_byte(byte);
        }
    }

    /// Sends a whole byte slice, nul bytes included.
    pub fn send_bytes(&self, bytes: &[u8]) {
        for &byte in bytes {
            self.send_byte(byte);
        }
    }

    /// Receives one byte, spinning until one is available.
    pub fn receive_byte(&self) -> u8 {
        spin_until(|| self.has_data());

        self.bus.read(AUX_MU_IO) as u8
    }
}

static CONSOLE: OnceCell<MiniUart> = OnceCell::new();

/// Gets a reference to the console uart.
///
/// # Panics
///
/// Panics if no uart has been promoted with [`MiniUart::into_console`].
pub fn console() -> &'static MiniUart {
    CONSOLE.get().expect("console not yet initialized")
}

impl MiniUart {
    /// Promotes this uart to the global console used by [`uprint!`] and
    /// [`uprintln!`].
    pub fn into_console(self) {
        CONSOLE.set(self).expect("could not set console global");
    }
}

// new type required because write_fmt wants a mutable reference
struct ConsoleWriter;

impl Write for ConsoleWriter {
    fn write_str(&mut self, s: &str) -> fmt::Result {
        console().send_bytes(s.as_bytes());

        Ok(())
    }
}

#[doc(hidden)]
pub fn _uprint(args: fmt::Arguments) {
    ConsoleWriter.write_fmt(args).unwrap();
}

/// Prints to the console uart
#[macro_export]
macro_rules! uprint {
    ($($arg:tt)*) => ($crate::uart::_uprint(format_args!($($arg)*)));
}

/// Prints to the console uart, with a newline
#[macro_export]
macro_rules! uprintln {
    () => ($crate::uprint!("\n"));
    ($($arg:tt)*) => ($crate::uprint!("{}\n", format_args!($($arg)*)));
}

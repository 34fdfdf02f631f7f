use bitflags::bitflags;

use crate::gpio::{Gpio, PinMode};
use crate::mmio::{Mmio, RegisterBus};

const PWM_BASE: u32 = crate::PERIPHERAL_BASE + 0x0020_c000;

const PWM_CTL: u32 = PWM_BASE;
const PWM_RNG1: u32 = PWM_BASE + 0x10;
const PWM_DAT1: u32 = PWM_BASE + 0x14;
const PWM_RNG2: u32 = PWM_BASE + 0x20;
const PWM_DAT2: u32 = PWM_BASE + 0x24;

bitflags! {
    /// Control register bits for both channels. The register is shared, so
    /// every update goes through a read-modify-write.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct PwmControl: u32 {
        /// Channel 1 enable.
        const PWEN1 = 1 << 0;
        /// Channel 1 serializer mode (left clear, pwm mode).
        const MODE1 = 1 << 1;
        /// Channel 1 mark/space enable.
        const MSEN1 = 1 << 7;
        /// Channel 2 enable.
        const PWEN2 = 1 << 8;
        /// Channel 2 serializer mode (left clear, pwm mode).
        const MODE2 = 1 << 9;
        /// Channel 2 mark/space enable.
        const MSEN2 = 1 << 15;
    }
}

/// The two independent pwm channels.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Channel {
    One,
    Two,
}

/// Output waveform mode of a channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputMode {
    /// The N/M pwm algorithm, pulses spread across the period.
    Algorithm,
    /// Mark/space output, a single pulse per period.
    MarkSpace,
}

/// Channel resolution. The discriminant is the range register value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Range {
    /// Duty values in [0, 255].
    Bits8 = 0x100,
    /// Duty values in [0, 1023].
    Bits10 = 0x400,
    /// Duty values in [0, 4095].
    Bits12 = 0x1000,
    /// Duty values in [0, 65535].
    Bits16 = 0x10000,
}

/// Pins routable to a pwm channel on the 40-pin header.
///
/// Gpio 12 and 18 carry channel 1, gpio 13 and 19 carry channel 2. Routing a
/// pin to the other channel's function silently produces no output, it is
/// not detectable as an error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PwmPin {
    Gpio12,
    Gpio18,
    Gpio13,
    Gpio19,
}

impl PwmPin {
    /// The channel this pin carries.
    pub fn channel(self) -> Channel {
        match self {
            PwmPin::Gpio12 | PwmPin::Gpio18 => Channel::One,
            PwmPin::Gpio13 | PwmPin::Gpio19 => Channel::Two,
        }
    }

    fn pin_number(self) -> u8 {
        match self {
            PwmPin::Gpio12 => 12,
            PwmPin::Gpio18 => 18,
            PwmPin::Gpio13 => 13,
            PwmPin::Gpio19 => 19,
        }
    }

    // pwm is alt0 on the low pins and alt5 on the high ones
    fn pin_mode(self) -> PinMode {
        match self {
            PwmPin::Gpio12 | PwmPin::Gpio13 => PinMode::Alt0,
            PwmPin::Gpio18 | PwmPin::Gpio19 => PinMode::Alt5,
        }
    }
}

/// The two-channel pwm waveform generator.
///
/// The pwm clock domain ([`crate::cm::PwmClock`]) must be running before any
/// channel is started; the hardware gives no indication otherwise, the
/// output is simply dead.
#[derive(Debug, Clone, Copy)]
pub struct Pwm<B: RegisterBus = Mmio> {
    bus: B,
}

impl<B: RegisterBus> Pwm<B> {
    pub fn new(bus: B) -> Self {
        Pwm { bus }
    }

    /// Configures and enables one channel.
    ///
    /// Sets the channel's output mode, writes its range register and then
    /// sets its enable bit. The other channel's bits in the shared control
    /// register are preserved.
    pub fn channel_start(&self, channel: Channel, mode: OutputMode, range: Range) {
        let (msen, pwen, range_reg) = match channel {
            Channel::One => (PwmControl::MSEN1, PwmControl::PWEN1, PWM_RNG1),
            Channel::Two => (PwmControl::MSEN2, PwmControl::PWEN2, PWM_RNG2),
        };

        self.bus.modify(PWM_CTL, |value| {
            let mut ctl = PwmControl::from_bits_retain(value);
            match mode {
                OutputMode::MarkSpace => ctl.insert(msen),
                OutputMode::Algorithm => ctl.remove(msen),
            }
            ctl.bits()
        });

        self.bus.write(range_reg, range as u32);

        self.bus
            .modify(PWM_CTL, |value| value | pwen.bits());
    }

    /// Writes a duty value to a channel's data register.
    ///
    /// The value is not clamped to the configured range; the hardware
    /// truncates per the range width, so staying in bounds is the caller's
    /// job.
    pub fn write(&self, channel: Channel, value: u32) {
        let data_reg = match channel {
            Channel::One => PWM_DAT1,
            Channel::Two => PWM_DAT2,
        };

        self.bus.write(data_reg, value);
    }

    /// Routes a header pin to its pwm channel via the pin multiplexer.
    pub fn use_pin(&self, pin: PwmPin) {
        Gpio::new(self.bus)
            .set_pin_mode(pin.pin_number(), pin.pin_mode())
            .expect("pwm pins are valid gpio pins");
    }
}

use crate::mmio::{spin_until, Mmio, RegisterBus};

// The pwm clock generator lives in the clock manager block, outside the main
// peripheral window. Both registers only accept writes carrying the password
// in their upper byte.
const CM_PWMCTL: u32 = 0x3f10_10a0;
const CM_PWMDIV: u32 = CM_PWMCTL + 0x4;

const CM_PASSWD: u32 = 0x5a00_0000;
const CM_ENAB: u32 = 1 << 4;
const CM_BUSY: u32 = 1 << 7;

// integer divider field of CM_PWMDIV
const DIVI_SHIFT: u32 = 12;
const DIVI_MASK: u32 = 0xfff;

/// Default clock configuration: 19.2 MHz oscillator divided by 4, 4.8 MHz.
pub const DEFAULT_CLOCK_SOURCE: ClockSource = ClockSource::Oscillator;
pub const DEFAULT_CLOCK_DIVIDER: u32 = 4;

/// Clock sources selectable for the pwm clock generator.
///
/// The discriminants are the hardware source codes. Only the internal
/// oscillator has a guaranteed frequency (19.2 MHz); the pll sources depend
/// on firmware configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClockSource {
    /// Ground, clock off.
    Gnd = 0,
    /// Internal oscillator, 19.2 MHz.
    Oscillator = 1,
    PllA = 4,
    PllC = 5,
    PllD = 6,
    HdmiAux = 7,
}

/// The pwm clock domain controller.
///
/// One of the init functions must be called before starting either pwm
/// channel, setting any pin to pwm mode or writing duty values.
#[derive(Debug, Clone, Copy)]
pub struct PwmClock<B: RegisterBus = Mmio> {
    bus: B,
}

impl<B: RegisterBus> PwmClock<B> {
    pub fn new(bus: B) -> Self {
        PwmClock { bus }
    }

    /// Brings up the pwm clock domain from the given source and divider.
    ///
    /// The generator is stopped first and the busy flag polled until it
    /// clears; the hardware leaves the divider and source undefined if they
    /// are written while the generator is busy. The divider is masked to the
    /// 12-bit integer field. The busy-wait has no timeout, so a stuck busy
    /// flag hangs the caller.
    pub fn init(&self, source: ClockSource, divider: u32) {
        // stop the generator before touching source or divider
        self.bus.write(CM_PWMCTL, CM_PASSWD);

        spin_until(|| self.bus.read(CM_PWMCTL) & CM_BUSY == 0);

        self.bus
            .write(CM_PWMDIV, CM_PASSWD | ((divider & DIVI_MASK) << DIVI_SHIFT));
        self.bus.write(CM_PWMCTL, CM_PASSWD | source as u32);
        self.bus
            .write(CM_PWMCTL, CM_PASSWD | source as u32 | CM_ENAB);
    }

    /// Brings up the pwm clock domain with the defaults, 19.2 MHz oscillator
    /// divided down to 4.8 MHz.
    pub fn init_default(&self) {
        self.init(DEFAULT_CLOCK_SOURCE, DEFAULT_CLOCK_DIVIDER);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mmio::sim::SimBus;

    #[test]
    fn init_stops_the_generator_before_reprogramming() {
        let bus = SimBus::new();
        // busy for two polls after the disable write, then idle
        bus.script_reads(CM_PWMCTL, &[CM_BUSY, CM_BUSY, 0]);

        let clock = PwmClock::new(&bus);
        clock.init(ClockSource::Oscillator, 4);

        let writes = bus.writes();

        // first write kills the enable bit, password only
        assert_eq!(writes[0], (CM_PWMCTL, CM_PASSWD));

        // divider is untouched until the busy flag reads clear, then carries
        // the password and the field-shifted divider
        assert_eq!(writes[1], (CM_PWMDIV, CM_PASSWD | (4 << DIVI_SHIFT)));

        // source is selected before the enable bit is set
        assert_eq!(writes[2], (CM_PWMCTL, CM_PASSWD | 1));
        assert_eq!(writes[3], (CM_PWMCTL, CM_PASSWD | 1 | CM_ENAB));
        assert_eq!(writes.len(), 4);
    }

    #[test]
    fn every_write_carries_the_password() {
        let bus = SimBus::new();
        bus.script_reads(CM_PWMCTL, &[0]);

        let clock = PwmClock::new(&bus);
        clock.init(ClockSource::PllD, 0xfff);

        for (_, value) in bus.writes() {
            assert_eq!(value & 0xff00_0000, CM_PASSWD);
        }
    }

    #[test]
    fn divider_is_masked_to_the_integer_field() {
        let bus = SimBus::new();
        bus.script_reads(CM_PWMCTL, &[0]);

        let clock = PwmClock::new(&bus);
        clock.init(ClockSource::Oscillator, 0x1002);

        assert_eq!(
            bus.writes_to(CM_PWMDIV),
            [CM_PASSWD | (0x002 << DIVI_SHIFT)]
        );
    }

    #[test]
    fn default_init_selects_the_oscillator_divided_by_four() {
        let bus = SimBus::new();
        bus.script_reads(CM_PWMCTL, &[0]);

        let clock = PwmClock::new(&bus);
        clock.init_default();

        assert_eq!(
            bus.writes_to(CM_PWMDIV),
            [CM_PASSWD | (DEFAULT_CLOCK_DIVIDER << DIVI_SHIFT)]
        );
        assert_eq!(
            bus.writes_to(CM_PWMCTL).last().copied(),
            Some(CM_PASSWD | ClockSource::Oscillator as u32 | CM_ENAB)
        );
    }
}

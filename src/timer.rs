use core::ops::Add;
use core::time::Duration;

use crate::mmio::{spin_until, Mmio, RegisterBus};

const ST_BASE: u32 = crate::PERIPHERAL_BASE + 0x0000_3000;

// free-running 1 MHz counter, low and high words
const ST_CLO: u32 = ST_BASE + 0x4;
const ST_CHI: u32 = ST_BASE + 0x8;

/// Represents an instant in time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct Instant {
    time_since_boot: Duration,
}

impl Add<Duration> for Instant {
    type Output = Instant;

    fn add(self, rhs: Duration) -> Instant {
        Instant {
            time_since_boot: self.time_since_boot + rhs,
        }
    }
}

/// The free-running system timer.
///
/// The counter ticks at 1 MHz and is 64 bits wide, split across two
/// registers; it never wraps in practice.
#[derive(Debug, Clone, Copy)]
pub struct SystemTimer<B: RegisterBus = Mmio> {
    bus: B,
}

impl<B: RegisterBus> SystemTimer<B> {
    pub fn new(bus: B) -> Self {
        SystemTimer { bus }
    }

    /// Get an instant for the current time.
    ///
    /// The high word is read on both sides of the low word and the read
    /// retried if it rolled over in between, so the two halves always
    /// belong together.
    pub fn now(&self) -> Instant {
        loop {
            let high = self.bus.read(ST_CHI);
            let low = self.bus.read(ST_CLO);

            if self.bus.read(ST_CHI) == high {
                let ticks = (u64::from(high) << 32) | u64::from(low);

                return Instant {
                    time_since_boot: Duration::from_micros(ticks),
                };
            }
        }
    }

    /// Spins until the given duration has fully ellapsed.
    pub fn sleep(&self, duration: Duration) {
        let end = self.now() + duration;

        spin_until(|| self.now() >= end);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mmio::sim::SimBus;

    #[test]
    fn now_composes_both_counter_words() {
        let bus = SimBus::new();
        bus.preset(ST_CHI, 2);
        bus.preset(ST_CLO, 5);

        let instant = SystemTimer::new(&bus).now();

        assert_eq!(
            instant,
            Instant {
                time_since_boot: Duration::from_micros((2 << 32) | 5)
            }
        );
    }

    #[test]
    fn now_retries_when_the_high_word_rolls_mid_read() {
        let bus = SimBus::new();
        // first pass straddles the rollover, second pass is consistent
        bus.script_reads(ST_CHI, &[1, 2, 2, 2]);
        bus.script_reads(ST_CLO, &[0xffff_ffff, 5]);

        let instant = SystemTimer::new(&bus).now();

        assert_eq!(
            instant,
            Instant {
                time_since_boot: Duration::from_micros((2 << 32) | 5)
            }
        );
    }

    #[test]
    fn sleep_polls_until_the_deadline_passes() {
        let bus = SimBus::new();
        // three samples: entry read, one short poll, one past the deadline
        bus.script_reads(ST_CLO, &[100, 101, 250]);

        // returns once a sample reaches the deadline instead of spinning
        SystemTimer::new(&bus).sleep(Duration::from_micros(50));
    }
}

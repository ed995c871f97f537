//! Watchdog period selection.
//!
//! The watchdog runs from its own 128 kHz oscillator and supports ten
//! discrete timeout periods between 16 ms and 8 s, selected through the
//! prescaler bits. [`Timeout::quantize`] maps an arbitrary request in whole
//! seconds onto that table; arbitrary durations beyond 8 s are covered by
//! chaining periods (see [`Watchdog::sleep`] and [`Watchdog::wait`]).
//!
//! [`Watchdog::sleep`]: crate::Watchdog::sleep
//! [`Watchdog::wait`]: crate::Watchdog::wait

use fugit::MillisDurationU32;

/// A hardware watchdog timeout period.
///
/// One step of the watchdog prescaler. The discriminant is the raw prescaler
/// index as it ends up in the control register.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[repr(u8)]
pub enum Timeout {
    /// 16 ms
    Ms16 = 0,
    /// 32 ms
    Ms32 = 1,
    /// 64 ms
    Ms64 = 2,
    /// 125 ms
    Ms125 = 3,
    /// 250 ms
    Ms250 = 4,
    /// 500 ms
    Ms500 = 5,
    /// 1 s
    S1 = 6,
    /// 2 s
    S2 = 7,
    /// 4 s
    S4 = 8,
    /// 8 s
    S8 = 9,
}

/// Quantization brackets, longest period first. A request at or above a
/// threshold selects that bracket; a request below every threshold gets the
/// shortest period the quantizer hands out.
const BRACKETS: [(u32, Timeout); 3] = [
    (8, Timeout::S8),
    (4, Timeout::S4),
    (2, Timeout::S2),
];

impl Timeout {
    /// Picks the hardware period for a requested duration in whole seconds.
    ///
    /// Requests between two supported periods round down, so 7 seconds maps
    /// to [`Timeout::S4`]. Zero selects the longest period. The sub-second
    /// periods are never chosen here; they exist for completeness of the
    /// hardware table.
    pub fn quantize(seconds: u32) -> Self {
        if seconds == 0 {
            return Timeout::S8;
        }
        for (threshold, timeout) in BRACKETS {
            if seconds >= threshold {
                return timeout;
            }
        }
        Timeout::S1
    }

    /// Nominal length of one hardware period.
    pub const fn duration(self) -> MillisDurationU32 {
        MillisDurationU32::millis(match self {
            Timeout::Ms16 => 16,
            Timeout::Ms32 => 32,
            Timeout::Ms64 => 64,
            Timeout::Ms125 => 125,
            Timeout::Ms250 => 250,
            Timeout::Ms500 => 500,
            Timeout::S1 => 1000,
            Timeout::S2 => 2000,
            Timeout::S4 => 4000,
            Timeout::S8 => 8000,
        })
    }

    /// Whole seconds in one hardware period. Zero for the sub-second
    /// periods.
    pub const fn seconds(self) -> u32 {
        match self {
            Timeout::S8 => 8,
            Timeout::S4 => 4,
            Timeout::S2 => 2,
            Timeout::S1 => 1,
            _ => 0,
        }
    }

    /// How many periods of this length cover a duration in whole seconds.
    ///
    /// Truncating: the covered time falls short of the request by up to one
    /// period rather than overshooting it. For the sub-second periods every
    /// fire counts as one requested second.
    pub const fn cycles_for(self, seconds: u32) -> u32 {
        match self.seconds() {
            0 | 1 => seconds,
            s => seconds / s,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn quantize_rounds_down_to_a_supported_period() {
        assert_eq!(Timeout::quantize(1), Timeout::S1);
        assert_eq!(Timeout::quantize(2), Timeout::S2);
        assert_eq!(Timeout::quantize(3), Timeout::S2);
        assert_eq!(Timeout::quantize(4), Timeout::S4);
        assert_eq!(Timeout::quantize(5), Timeout::S4);
        assert_eq!(Timeout::quantize(7), Timeout::S4);
        assert_eq!(Timeout::quantize(8), Timeout::S8);
        assert_eq!(Timeout::quantize(9), Timeout::S8);
        assert_eq!(Timeout::quantize(100), Timeout::S8);
        assert_eq!(Timeout::quantize(u32::MAX), Timeout::S8);
    }

    #[test]
    fn quantize_zero_selects_the_longest_period() {
        assert_eq!(Timeout::quantize(0), Timeout::S8);
    }

    #[test]
    fn quantize_never_returns_a_sub_second_period() {
        for seconds in 0..=20 {
            assert!(Timeout::quantize(seconds) >= Timeout::S1);
        }
    }

    #[test]
    fn durations_match_the_hardware_table() {
        assert_eq!(Timeout::Ms16.duration(), MillisDurationU32::millis(16));
        assert_eq!(Timeout::Ms32.duration(), MillisDurationU32::millis(32));
        assert_eq!(Timeout::Ms64.duration(), MillisDurationU32::millis(64));
        assert_eq!(Timeout::Ms125.duration(), MillisDurationU32::millis(125));
        assert_eq!(Timeout::Ms250.duration(), MillisDurationU32::millis(250));
        assert_eq!(Timeout::Ms500.duration(), MillisDurationU32::millis(500));
        assert_eq!(Timeout::S1.duration(), MillisDurationU32::secs(1));
        assert_eq!(Timeout::S2.duration(), MillisDurationU32::secs(2));
        assert_eq!(Timeout::S4.duration(), MillisDurationU32::secs(4));
        assert_eq!(Timeout::S8.duration(), MillisDurationU32::secs(8));
    }

    #[test]
    fn seconds_per_period() {
        assert_eq!(Timeout::S8.seconds(), 8);
        assert_eq!(Timeout::S4.seconds(), 4);
        assert_eq!(Timeout::S2.seconds(), 2);
        assert_eq!(Timeout::S1.seconds(), 1);
        assert_eq!(Timeout::Ms500.seconds(), 0);
        assert_eq!(Timeout::Ms16.seconds(), 0);
    }

    #[test]
    fn cycles_for_truncates() {
        assert_eq!(Timeout::S8.cycles_for(16), 2);
        assert_eq!(Timeout::S8.cycles_for(15), 1);
        assert_eq!(Timeout::S8.cycles_for(8), 1);
        assert_eq!(Timeout::S8.cycles_for(7), 0);
        assert_eq!(Timeout::S4.cycles_for(10), 2);
        assert_eq!(Timeout::S2.cycles_for(10), 5);
        assert_eq!(Timeout::S1.cycles_for(10), 10);
    }

    #[test]
    fn cycles_for_sub_second_periods_count_whole_seconds() {
        assert_eq!(Timeout::Ms500.cycles_for(10), 10);
        assert_eq!(Timeout::Ms16.cycles_for(3), 3);
    }

    #[test]
    fn cycles_for_zero_duration_is_zero() {
        assert_eq!(Timeout::S8.cycles_for(0), 0);
        assert_eq!(Timeout::S1.cycles_for(0), 0);
    }
}

//! Watchdog driver.
//!
//! ## Overview
//!
//! [`Watchdog`] owns the watchdog peripheral and drives it in two roles. As
//! a plain supervisor it resets the system when the firmware stops calling
//! [`Watchdog::reset`] within the configured period. As a virtual long timer
//! it chains hardware periods in interrupt mode: each expiry fires the
//! watchdog interrupt instead of resetting, the handler counts it and
//! re-arms, and after enough fires to cover the requested duration the
//! watchdog drops back to plain supervision. [`Watchdog::sleep`] spends such
//! a countdown in power-down with the ancillary peripherals power-gated;
//! [`Watchdog::wait`] lets it run in the background as a grace period.
//!
//! The reset path stays armed in every configuration this driver writes.
//! When the interrupt fires the hardware clears the interrupt enable by
//! itself, so a system too wedged to service interrupts is reset one period
//! later.
//!
//! This module claims the `WDT` interrupt vector; firmware using this crate
//! must not define its own handler for it.

use crate::{
    countdown::{self, Countdown, Progress},
    pac,
    power,
    timeout::Timeout,
};

/// What the hardware does when a timeout period expires.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum TimeoutAction {
    /// Reset the system. Plain liveness supervision.
    Reset,
    /// Fire the watchdog interrupt first. The hardware clears the interrupt
    /// enable when it fires, so a second unserviced expiry still resets.
    Interrupt,
}

// WDTCSR bits.
const WDIE: u8 = 1 << 6;
const WDCE: u8 = 1 << 4;
const WDE: u8 = 1 << 3;

/// Composes the WDTCSR value for a period and action. The prescaler index
/// splits across WDP3 (bit 5) and WDP2..0 (bits 2..0); WDE is set in every
/// armed configuration.
const fn control_bits(timeout: Timeout, action: TimeoutAction) -> u8 {
    let index = timeout as u8;
    let mut bits = (index & 0b0111) | ((index & 0b1000) << 2) | WDE;
    if matches!(action, TimeoutAction::Interrupt) {
        bits |= WDIE;
    }
    bits
}

/// Applies a configuration through the timed unlock sequence.
///
/// WDRF is cleared first since the hardware forces WDE on while it is set.
/// The configuration write must land within four cycles of the unlock
/// write, which is what the masked section guarantees. The watchdog is
/// petted afterwards so the new period starts from zero.
fn configure(timeout: Timeout, action: TimeoutAction) {
    let bits = control_bits(timeout, action);
    critical_section::with(|_| {
        let cpu = unsafe { &*pac::CPU::ptr() };
        let wdt = unsafe { &*pac::WDT::ptr() };
        cpu.mcusr.modify(|_, w| w.wdrf().clear_bit());
        wdt.wdtcsr.write(|w| unsafe { w.bits(WDCE | WDE) });
        wdt.wdtcsr.write(|w| unsafe { w.bits(bits) });
    });
    avr_device::asm::wdr();
}

/// Stops the watchdog entirely, via the same unlock sequence.
fn turn_off() {
    critical_section::with(|_| {
        let cpu = unsafe { &*pac::CPU::ptr() };
        let wdt = unsafe { &*pac::WDT::ptr() };
        avr_device::asm::wdr();
        cpu.mcusr.modify(|_, w| w.wdrf().clear_bit());
        wdt.wdtcsr.write(|w| unsafe { w.bits(WDCE | WDE) });
        wdt.wdtcsr.write(|w| unsafe { w.bits(0) });
    });
}

/// Stores a new period and arms plain reset-on-timeout supervision,
/// cancelling whatever countdown might be pending.
fn arm_supervision(timeout: Timeout) {
    countdown::modify(|state| {
        state.timeout = timeout;
        state.cancel();
    });
    configure(timeout, TimeoutAction::Reset);
    debug!("supervision armed, period {} s", timeout.seconds());
}

/// Watchdog driver.
///
/// Owns the `WDT` peripheral. Construction stops a possibly still running
/// watchdog and only stores the period; nothing is armed until
/// [`reset`](Watchdog::reset), [`sleep`](Watchdog::sleep) or
/// [`wait`](Watchdog::wait) is called.
///
/// There is no `Drop` implementation: dropping the driver leaves the
/// hardware in whatever state it was last armed in.
///
/// ## Examples
///
/// ```rust, no_run
/// use avr_wdt::Watchdog;
///
/// let dp = avr_wdt::pac::Peripherals::take().unwrap();
/// let mut wdt = Watchdog::new(dp.WDT, 8);
/// wdt.reset(8);
///
/// loop {
///     // ...sample, transmit...
///     wdt.sleep(60);
/// }
/// ```
pub struct Watchdog {
    _wdt: pac::WDT,
    expired: bool,
}

impl Watchdog {
    /// Takes the watchdog peripheral, stops any running watchdog and stores
    /// the quantized period for later arming.
    ///
    /// The hardware can come out of a watchdog reset still armed with the
    /// shortest period, so stopping it first gives startup code room to
    /// run. A period of `0` selects the longest supported period (8 s).
    pub fn new(wdt: pac::WDT, period_in_seconds: u32) -> Self {
        let expired = {
            let cpu = unsafe { &*pac::CPU::ptr() };
            cpu.mcusr.read().wdrf().bit_is_set()
        };
        turn_off();
        let timeout = Timeout::quantize(period_in_seconds);
        countdown::modify(|state| *state = Countdown::new(timeout));
        debug!(
            "watchdog stopped at init, period {} s, prior expiry {}",
            timeout.seconds(),
            expired
        );
        Self { _wdt: wdt, expired }
    }

    /// Whether the most recent system reset was caused by a watchdog
    /// expiry.
    ///
    /// Snapshot taken in [`new`](Watchdog::new) before the reset flag is
    /// cleared there.
    pub fn caused_last_reset(&self) -> bool {
        self.expired
    }

    /// Currently configured hardware period.
    pub fn timeout(&self) -> Timeout {
        countdown::read().timeout
    }

    /// Whether a countdown armed by [`wait`](Watchdog::wait) (or
    /// [`sleep`](Watchdog::sleep) on another execution path) is still
    /// outstanding.
    pub fn waiting(&self) -> bool {
        countdown::read().target != 0
    }

    /// Pets the watchdog without touching its configuration.
    pub fn feed(&mut self) {
        avr_device::asm::wdr();
    }

    /// Stops the watchdog entirely.
    pub fn disable(&mut self) {
        turn_off();
        debug!("watchdog disabled");
    }

    /// Proves liveness, and re-arms plain supervision where needed.
    ///
    /// Pets the hardware if it is armed or still carries a stale reset
    /// flag. A nonzero `period_in_seconds` quantizes and stores a new
    /// period and arms reset mode with it. A countdown armed by
    /// [`wait`](Watchdog::wait) is always cancelled, resuming plain
    /// supervision immediately.
    ///
    /// `reset(0)` with nothing outstanding is the cheap main-loop pet.
    pub fn reset(&mut self, period_in_seconds: u32) {
        let armed = {
            let cpu = unsafe { &*pac::CPU::ptr() };
            let wdt = unsafe { &*pac::WDT::ptr() };
            wdt.wdtcsr.read().wde().bit_is_set() || cpu.mcusr.read().wdrf().bit_is_set()
        };
        if armed {
            avr_device::asm::wdr();
        }

        if period_in_seconds != 0 {
            arm_supervision(Timeout::quantize(period_in_seconds));
        } else if countdown::modify(Countdown::cancel) {
            configure(self.timeout(), TimeoutAction::Reset);
            debug!("wait cancelled, supervision resumed");
        }
    }

    /// Sleeps in power-down for `seconds`, timed by the watchdog itself.
    ///
    /// The actual time asleep is `seconds` rounded down to a whole number
    /// of configured periods; a request shorter than one period returns
    /// without halting at all. Peripherals covered by the power reduction
    /// registers are stopped for the duration. On return the watchdog is
    /// armed in plain reset mode with the configured period.
    ///
    /// Waking requires servicing the watchdog interrupt, so interrupts are
    /// globally enabled during the halts and stay enabled when this
    /// returns.
    pub fn sleep(&mut self, seconds: u32) {
        let timeout = self.timeout();
        let cycles = timeout.cycles_for(seconds);
        debug!(
            "sleeping {} s as {} cycles of {} s",
            seconds,
            cycles,
            timeout.seconds()
        );

        countdown::modify(|state| state.arm(cycles));
        configure(timeout, TimeoutAction::Interrupt);
        power::all_disable();
        power::select_power_down();

        loop {
            // Check masked, then let `halt` re-enable interrupts with the
            // sleep instruction immediately behind: a fire landing between
            // the check and the halt wakes the CPU straight back up.
            avr_device::interrupt::disable();
            if !self.waiting() {
                unsafe { avr_device::interrupt::enable() };
                break;
            }
            power::halt();
        }

        power::all_enable();
        configure(timeout, TimeoutAction::Reset);
        debug!("sleep complete");
    }

    /// Arms a countdown of `seconds` in the background and returns
    /// immediately.
    ///
    /// Acts as a grace period for long operations: while the countdown
    /// runs, each expiry ticks it instead of resetting the system, and
    /// after the final cycle the interrupt handler restores plain reset
    /// mode by itself. Poll [`waiting`](Watchdog::waiting) to observe
    /// completion; call [`reset`](Watchdog::reset) to cancel early.
    ///
    /// Quantization is the same as for [`sleep`](Watchdog::sleep): the
    /// covered time is `seconds` rounded down to whole periods. A request
    /// shorter than one period arms no countdown, and the first expiry is
    /// treated as a plain liveness event.
    pub fn wait(&mut self, seconds: u32) {
        let timeout = self.timeout();
        let cycles = timeout.cycles_for(seconds);
        countdown::modify(|state| state.arm(cycles));
        configure(timeout, TimeoutAction::Interrupt);
        debug!(
            "waiting {} s as {} cycles of {} s",
            seconds,
            cycles,
            timeout.seconds()
        );
    }
}

/// One hardware period has expired in interrupt mode. Runs from the WDT
/// vector with further interrupts masked.
#[cfg_attr(not(target_arch = "avr"), allow(dead_code))]
pub(crate) fn on_fire() {
    countdown::modify(|state| {
        match state.advance() {
            // The hardware cleared WDIE when it fired; chaining means
            // setting it again for every period but the last.
            Progress::Pending => configure(state.timeout, TimeoutAction::Interrupt),
            Progress::Done => {
                configure(state.timeout, TimeoutAction::Reset);
                debug!("countdown complete, supervision restored");
            }
            Progress::Idle => {}
        }
    });
}

cfg_if::cfg_if! {
    if #[cfg(all(target_arch = "avr", feature = "atmega328p"))] {
        #[avr_device::interrupt(atmega328p)]
        fn WDT() {
            on_fire();
        }
    } else if #[cfg(all(target_arch = "avr", feature = "atmega32u4"))] {
        #[avr_device::interrupt(atmega32u4)]
        fn WDT() {
            on_fire();
        }
    } else if #[cfg(all(target_arch = "avr", feature = "atmega2560"))] {
        #[avr_device::interrupt(atmega2560)]
        fn WDT() {
            on_fire();
        }
    }
}

#[cfg(feature = "embedded-hal-02")]
impl embedded_hal_02::watchdog::Watchdog for Watchdog {
    fn feed(&mut self) {
        self.feed();
    }
}

#[cfg(feature = "embedded-hal-02")]
impl embedded_hal_02::watchdog::WatchdogEnable for Watchdog {
    type Time = fugit::SecsDurationU32;

    fn start<T>(&mut self, period: T)
    where
        T: Into<Self::Time>,
    {
        arm_supervision(Timeout::quantize(period.into().ticks()));
    }
}

#[cfg(feature = "embedded-hal-02")]
impl embedded_hal_02::watchdog::WatchdogDisable for Watchdog {
    fn disable(&mut self) {
        turn_off();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const ALL_TIMEOUTS: [Timeout; 10] = [
        Timeout::Ms16,
        Timeout::Ms32,
        Timeout::Ms64,
        Timeout::Ms125,
        Timeout::Ms250,
        Timeout::Ms500,
        Timeout::S1,
        Timeout::S2,
        Timeout::S4,
        Timeout::S8,
    ];

    #[test]
    fn control_bits_always_keep_the_reset_path_armed() {
        for timeout in ALL_TIMEOUTS {
            assert_ne!(control_bits(timeout, TimeoutAction::Reset) & WDE, 0);
            assert_ne!(control_bits(timeout, TimeoutAction::Interrupt) & WDE, 0);
        }
    }

    #[test]
    fn control_bits_request_an_interrupt_only_in_interrupt_mode() {
        for timeout in ALL_TIMEOUTS {
            assert_eq!(control_bits(timeout, TimeoutAction::Reset) & WDIE, 0);
            assert_ne!(control_bits(timeout, TimeoutAction::Interrupt) & WDIE, 0);
        }
    }

    #[test]
    fn control_bits_never_leave_the_change_enable_set() {
        for timeout in ALL_TIMEOUTS {
            assert_eq!(control_bits(timeout, TimeoutAction::Reset) & WDCE, 0);
            assert_eq!(control_bits(timeout, TimeoutAction::Interrupt) & WDCE, 0);
        }
    }

    #[test]
    fn control_bits_split_the_prescaler_index() {
        assert_eq!(control_bits(Timeout::Ms16, TimeoutAction::Reset), 0x08);
        assert_eq!(control_bits(Timeout::Ms500, TimeoutAction::Reset), 0x0d);
        assert_eq!(control_bits(Timeout::S1, TimeoutAction::Interrupt), 0x4e);
        assert_eq!(control_bits(Timeout::S2, TimeoutAction::Reset), 0x0f);
        assert_eq!(control_bits(Timeout::S4, TimeoutAction::Reset), 0x28);
        assert_eq!(control_bits(Timeout::S8, TimeoutAction::Reset), 0x29);
        assert_eq!(control_bits(Timeout::S8, TimeoutAction::Interrupt), 0x69);
    }
}

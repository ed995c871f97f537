//! Long-timer state shared between the driver and the watchdog interrupt.

use core::cell::Cell;

use critical_section::Mutex;

use crate::timeout::Timeout;

/// Progress of the countdown after one watchdog fire.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub(crate) enum Progress {
    /// No countdown is active. The fire was a plain liveness event.
    Idle,
    /// More hardware periods are needed to cover the request.
    Pending,
    /// The countdown just completed.
    Done,
}

/// Countdown over multiple hardware periods: one fire per period, `target`
/// fires per request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub(crate) struct Countdown {
    /// Currently configured hardware period.
    pub timeout: Timeout,
    /// Fires seen since the countdown was armed.
    pub elapsed: u32,
    /// Fires required to cover the request. Zero while no countdown is
    /// pending.
    pub target: u32,
}

impl Countdown {
    pub const fn new(timeout: Timeout) -> Self {
        Self {
            timeout,
            elapsed: 0,
            target: 0,
        }
    }

    /// Starts a countdown of `cycles` fires.
    pub fn arm(&mut self, cycles: u32) {
        self.elapsed = 0;
        self.target = cycles;
    }

    /// Cancels a pending countdown, reporting whether one was pending.
    pub fn cancel(&mut self) -> bool {
        let pending = self.target != 0;
        self.target = 0;
        pending
    }

    /// Records one watchdog fire.
    pub fn advance(&mut self) -> Progress {
        self.elapsed = self.elapsed.saturating_add(1);
        if self.target == 0 {
            Progress::Idle
        } else if self.elapsed >= self.target {
            self.target = 0;
            Progress::Done
        } else {
            Progress::Pending
        }
    }
}

/// The one shared record. The interrupt handler and the driver both go
/// through [`modify`]/[`read`], so every access is a short masked section.
static COUNTDOWN: Mutex<Cell<Countdown>> = Mutex::new(Cell::new(Countdown::new(Timeout::S8)));

/// Runs `f` on the shared record inside a single critical section.
pub(crate) fn modify<R>(f: impl FnOnce(&mut Countdown) -> R) -> R {
    critical_section::with(|cs| {
        let cell = COUNTDOWN.borrow(cs);
        let mut state = cell.get();
        let result = f(&mut state);
        cell.set(state);
        result
    })
}

/// Snapshot of the shared record.
pub(crate) fn read() -> Countdown {
    critical_section::with(|cs| COUNTDOWN.borrow(cs).get())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn n_fires_complete_a_countdown_of_n() {
        let mut state = Countdown::new(Timeout::S8);
        state.arm(3);
        assert_eq!(state.advance(), Progress::Pending);
        assert_eq!(state.advance(), Progress::Pending);
        assert_eq!(state.advance(), Progress::Done);
        assert_eq!(state.target, 0);
    }

    #[test]
    fn a_single_cycle_countdown_completes_on_the_first_fire() {
        let mut state = Countdown::new(Timeout::S8);
        state.arm(1);
        assert_eq!(state.advance(), Progress::Done);
    }

    #[test]
    fn completion_reports_done_exactly_once() {
        let mut state = Countdown::new(Timeout::S8);
        state.arm(2);
        assert_eq!(state.advance(), Progress::Pending);
        assert_eq!(state.advance(), Progress::Done);
        assert_eq!(state.advance(), Progress::Idle);
        assert_eq!(state.advance(), Progress::Idle);
    }

    #[test]
    fn fires_without_a_target_are_idle() {
        let mut state = Countdown::new(Timeout::S2);
        for _ in 0..10 {
            assert_eq!(state.advance(), Progress::Idle);
        }
    }

    #[test]
    fn arming_restarts_the_count() {
        let mut state = Countdown::new(Timeout::S8);
        state.arm(2);
        assert_eq!(state.advance(), Progress::Pending);
        state.arm(2);
        assert_eq!(state.advance(), Progress::Pending);
        assert_eq!(state.advance(), Progress::Done);
    }

    #[test]
    fn cancel_reports_whether_a_countdown_was_pending() {
        let mut state = Countdown::new(Timeout::S8);
        assert!(!state.cancel());
        state.arm(4);
        assert!(state.cancel());
        assert!(!state.cancel());
        assert_eq!(state.advance(), Progress::Idle);
    }

    #[test]
    fn shared_record_roundtrip() {
        let before = read();
        modify(|state| state.arm(5));
        assert_eq!(read().target, 5);
        assert_eq!(read().elapsed, 0);
        modify(|state| {
            state.cancel();
            state.elapsed = before.elapsed;
        });
        assert_eq!(read().target, 0);
    }
}

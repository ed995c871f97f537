//! Watchdog timer driver for classic AVR microcontrollers.
//!
//! ## Overview
//!
//! The AVR watchdog is a countdown clocked from a dedicated 128 kHz
//! oscillator: unless software pets it before the configured period expires,
//! the hardware resets the system. This crate drives it in two roles:
//!
//! - **Liveness supervision.** Arm a period once, then call
//!   [`Watchdog::reset`] from the main loop to prove the firmware is alive.
//! - **Virtual long timer.** The hardware tops out at 8 seconds, so
//!   [`Watchdog::sleep`] and [`Watchdog::wait`] chain hardware periods in
//!   interrupt mode, counting expirations until the requested duration has
//!   elapsed. `sleep` spends that time in power-down with the ancillary
//!   peripherals power-gated; `wait` returns immediately and leaves the
//!   countdown running as a background grace period.
//!
//! The reset path stays armed in every configuration: if the interrupt chain
//! stalls because interrupts are no longer serviced, the next expiry still
//! reboots the system.
//!
//! ## Configuration
//!
//! Select exactly one chip through the Cargo features; `atmega328p` is the
//! default. This crate claims the `WDT` interrupt vector for the selected
//! chip. For on-target builds, enable the `critical-section-impl` feature in
//! exactly one crate of the binary, or provide another `critical-section`
//! implementation.
//!
//! ## Examples
//!
//! ```rust, no_run
//! use avr_wdt::Watchdog;
//!
//! let dp = avr_wdt::pac::Peripherals::take().unwrap();
//!
//! // Ten seconds quantizes down to the 8 s hardware period.
//! let mut wdt = Watchdog::new(dp.WDT, 10);
//! if wdt.caused_last_reset() {
//!     // the previous run stalled
//! }
//! wdt.reset(10);
//!
//! loop {
//!     // ...do the work...
//!     wdt.reset(0);
//! }
//! ```
//!
//! ## Feature Flags
#![doc = document_features::document_features!()]
#![no_std]

// MUST be the first module
mod fmt;

mod countdown;
mod power;
mod timeout;
mod watchdog;

pub use self::{
    timeout::Timeout,
    watchdog::{TimeoutAction, Watchdog},
};

#[cfg(not(any(
    feature = "atmega328p",
    feature = "atmega32u4",
    feature = "atmega2560"
)))]
compile_error!("A chip feature must be enabled! `atmega328p`, `atmega32u4` or `atmega2560`");

#[cfg(any(
    all(feature = "atmega328p", feature = "atmega32u4"),
    all(feature = "atmega328p", feature = "atmega2560"),
    all(feature = "atmega32u4", feature = "atmega2560"),
))]
compile_error!("Exactly one chip feature must be enabled!");

cfg_if::cfg_if! {
    if #[cfg(feature = "atmega328p")] {
        /// Peripheral access crate for the selected chip.
        pub use avr_device::atmega328p as pac;
    } else if #[cfg(feature = "atmega32u4")] {
        /// Peripheral access crate for the selected chip.
        pub use avr_device::atmega32u4 as pac;
    } else if #[cfg(feature = "atmega2560")] {
        /// Peripheral access crate for the selected chip.
        pub use avr_device::atmega2560 as pac;
    }
}

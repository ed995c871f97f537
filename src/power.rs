//! Peripheral power gating and the power-down halt used while sleeping.

use crate::pac;

/// Stops the clocks of every peripheral covered by the power reduction
/// registers. On-chip state is preserved; the modules are unusable until
/// [`all_enable`] runs.
pub(crate) fn all_disable() {
    let cpu = unsafe { &*pac::CPU::ptr() };
    cfg_if::cfg_if! {
        if #[cfg(feature = "atmega328p")] {
            cpu.prr.write(|w| {
                w.pradc()
                    .set_bit()
                    .prusart0()
                    .set_bit()
                    .prspi()
                    .set_bit()
                    .prtim0()
                    .set_bit()
                    .prtim1()
                    .set_bit()
                    .prtim2()
                    .set_bit()
                    .prtwi()
                    .set_bit()
            });
        } else if #[cfg(feature = "atmega32u4")] {
            cpu.prr0.write(|w| {
                w.pradc()
                    .set_bit()
                    .prspi()
                    .set_bit()
                    .prtim0()
                    .set_bit()
                    .prtim1()
                    .set_bit()
                    .prtwi()
                    .set_bit()
            });
            cpu.prr1.write(|w| {
                w.prusart1()
                    .set_bit()
                    .prtim3()
                    .set_bit()
                    .prtim4()
                    .set_bit()
                    .prusb()
                    .set_bit()
            });
        } else if #[cfg(feature = "atmega2560")] {
            cpu.prr0.write(|w| {
                w.pradc()
                    .set_bit()
                    .prusart0()
                    .set_bit()
                    .prspi()
                    .set_bit()
                    .prtim0()
                    .set_bit()
                    .prtim1()
                    .set_bit()
                    .prtim2()
                    .set_bit()
                    .prtwi()
                    .set_bit()
            });
            cpu.prr1.write(|w| {
                w.prusart1()
                    .set_bit()
                    .prusart2()
                    .set_bit()
                    .prusart3()
                    .set_bit()
                    .prtim3()
                    .set_bit()
                    .prtim4()
                    .set_bit()
                    .prtim5()
                    .set_bit()
            });
        }
    }
}

/// Restores the clocks of everything [`all_disable`] stopped.
pub(crate) fn all_enable() {
    let cpu = unsafe { &*pac::CPU::ptr() };
    cfg_if::cfg_if! {
        if #[cfg(feature = "atmega328p")] {
            cpu.prr.write(|w| unsafe { w.bits(0) });
        } else {
            cpu.prr0.write(|w| unsafe { w.bits(0) });
            cpu.prr1.write(|w| unsafe { w.bits(0) });
        }
    }
}

/// Selects the power-down sleep mode. SE stays clear; [`halt`] sets it
/// around the actual sleep instruction.
pub(crate) fn select_power_down() {
    let cpu = unsafe { &*pac::CPU::ptr() };
    // SM2:0 = 0b010
    cpu.smcr.write(|w| unsafe { w.bits(0b0000_0100) });
}

/// Re-enables interrupts and halts the CPU until a wake-up source fires.
///
/// The caller decides whether to halt with interrupts masked. The sleep
/// instruction directly follows the re-enable, and that instruction is
/// guaranteed to execute before any pending interrupt is serviced, so a
/// fire landing between the caller's check and the halt wakes the CPU
/// straight back up instead of being lost.
pub(crate) fn halt() {
    let cpu = unsafe { &*pac::CPU::ptr() };
    cpu.smcr.modify(|_, w| w.se().set_bit());
    unsafe { avr_device::interrupt::enable() };
    avr_device::asm::sleep();
    cpu.smcr.modify(|_, w| w.se().clear_bit());
}

//! Timer constants and tick conversions.
//!
//! The tracker timestamps pulses with a 48 MHz counter. A lighthouse rotor
//! turns once per 800 000 ticks; the sweep crosses the optical axis a quarter
//! turn after the sync flash.

use lh_core::Real;
use std::f64::consts::PI;

/// Tracker timer frequency.
pub const TICKS_PER_SECOND: Real = 48_000_000.0;

/// Pulses longer than this are malformed.
pub const MAX_PULSE_LENGTH: u16 = 6750;
/// Pulses longer than this are sync flashes, shorter ones are sweeps.
pub const SYNC_THRESHOLD: u16 = 2750;
/// Width of one acode symbol in the sync pulse length.
pub const ACODE_STEP: u16 = 500;

/// Syncs closer than this belong to the same flash.
pub const SAME_FLASH_GAP: u32 = 2400;
/// Syncs closer than this (but not the same flash) come from the second lighthouse.
pub const SECOND_LIGHTHOUSE_GAP: u32 = 24_000;
/// A longer silence starts a new cycle from scratch.
pub const RESET_GAP: u32 = 370_000;

const SWEEP_CENTER_TICKS: Real = 200_000.0;
const TICKS_PER_HALF_TURN: Real = 400_000.0;

/// Convert a mid-pulse sweep offset into an angle (radians) from the optical axis.
pub fn sweep_angle(ticks: u32) -> Real {
    (ticks as Real - SWEEP_CENTER_TICKS) * PI / TICKS_PER_HALF_TURN
}

/// Sweep offset (ticks, rounded) at which a sensor at `angle` is hit.
pub fn sweep_ticks(angle: Real) -> u32 {
    (SWEEP_CENTER_TICKS + angle * TICKS_PER_HALF_TURN / PI).round() as u32
}

/// Convert a tick count into seconds.
pub fn ticks_to_seconds(ticks: u32) -> Real {
    ticks as Real / TICKS_PER_SECOND
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sweep_center_is_zero_angle() {
        assert_eq!(sweep_angle(200_000), 0.0);
        assert!((sweep_angle(400_000) - PI / 2.0).abs() < 1e-12);
        assert!((sweep_angle(0) + PI / 2.0).abs() < 1e-12);
    }

    #[test]
    fn sweep_ticks_inverts_angle() {
        for ticks in [50_000u32, 123_457, 200_000, 310_001] {
            assert_eq!(sweep_ticks(sweep_angle(ticks)), ticks);
        }
    }
}

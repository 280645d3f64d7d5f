//! Load switch protection state machine.
//!
//! Two layers are evaluated for every fresh supply reading:
//!
//! 1. Safety bounds. A reading above `max_voltage` or below `min_voltage`
//!    latches a terminal alarm. Nothing but a reset leaves it, and the switch
//!    keeps whatever state it had when the alarm fired.
//! 2. Hysteresis. Inside the bounds the switch engages at or above `engage`
//!    and releases at or below `release`. Readings in between change nothing.
//!
//! ```text
//!            v >= engage
//!   Idle ───────────────────▶ Engaged
//!     ▲                          │
//!     └──────────────────────────┘
//!            v <= release
//!
//!   any ── v > max ──▶ OverVoltageAlarm   (terminal)
//!   any ── v < min ──▶ UnderVoltageAlarm  (terminal)
//! ```
//!
//! A reading that is not a number is outside the bounds and latches the
//! under-voltage alarm.

use crate::config::{ConfigError, Hysteresis};
use crate::voltage::SafetyBounds;

/// Where the machine stands after the last reading.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
#[cfg_attr(target_os = "none", derive(defmt::Format))]
pub enum ProtectionState {
    /// Switch released, no fault
    #[default]
    Idle,
    /// Switch engaged, load dissipating
    Engaged,
    /// Supply went above `max_voltage`
    OverVoltageAlarm,
    /// Supply went below `min_voltage`
    UnderVoltageAlarm,
}

impl ProtectionState {
    /// Alarms are never left without a reset.
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            ProtectionState::OverVoltageAlarm | ProtectionState::UnderVoltageAlarm
        )
    }
}

/// Outcome of evaluating one reading.
#[derive(Clone, Copy, Debug, PartialEq)]
#[cfg_attr(target_os = "none", derive(defmt::Format))]
pub enum Transition {
    /// Reading accepted, state unchanged
    Hold,
    /// Switch must be driven on
    Engage,
    /// Switch must be driven off
    Release,
    /// Reading above the upper bound, now latched
    OverVoltage,
    /// Reading below the lower bound, now latched
    UnderVoltage,
    /// Already latched, reading ignored
    Latched,
}

/// Hysteresis switch with latched over/under-voltage alarms.
pub struct Protection {
    bounds: SafetyBounds,
    hysteresis: Hysteresis,
    state: ProtectionState,
}

impl Protection {
    /// Creates the machine in [`ProtectionState::Idle`].
    ///
    /// # Arguments
    ///
    /// * `bounds` - Readings outside these latch an alarm
    /// * `hysteresis` - Engage/release band, must sit inside `bounds`
    ///
    /// # Errors
    ///
    /// An inverted band would toggle the switch on every reading inside it,
    /// so it is rejected, as is a band reaching outside `bounds`.
    pub fn new(bounds: SafetyBounds, hysteresis: Hysteresis) -> Result<Self, ConfigError> {
        hysteresis.check(&bounds)?;
        Ok(Self {
            bounds,
            hysteresis,
            state: ProtectionState::default(),
        })
    }

    /// State after the last evaluated reading.
    pub fn state(&self) -> ProtectionState {
        self.state
    }

    /// Safety bounds the machine was built with.
    pub fn bounds(&self) -> SafetyBounds {
        self.bounds
    }

    /// Feeds one estimated supply voltage through the machine.
    pub fn evaluate(&mut self, voltage: f32) -> Transition {
        if self.state.is_terminal() {
            return Transition::Latched;
        }

        if !self.bounds.contains(voltage) {
            if voltage > self.bounds.max_voltage {
                self.state = ProtectionState::OverVoltageAlarm;
                return Transition::OverVoltage;
            }
            self.state = ProtectionState::UnderVoltageAlarm;
            return Transition::UnderVoltage;
        }

        match self.state {
            ProtectionState::Idle if voltage >= self.hysteresis.engage => {
                self.state = ProtectionState::Engaged;
                Transition::Engage
            }
            ProtectionState::Engaged if voltage <= self.hysteresis.release => {
                self.state = ProtectionState::Idle;
                Transition::Release
            }
            _ => Transition::Hold,
        }
    }
}

//! Supply voltage reconstruction from the divider reading.

use crate::config::{Config, ConfigError};

/// Outer limits outside of which a reading is treated as a fault.
#[derive(Clone, Copy, Debug, PartialEq)]
#[cfg_attr(target_os = "none", derive(defmt::Format))]
pub struct SafetyBounds {
    /// Lowest acceptable supply voltage [V]
    pub min_voltage: f32,
    /// Highest acceptable supply voltage [V]
    pub max_voltage: f32,
}

impl SafetyBounds {
    /// Whether `voltage` is inside the bounds, both ends included. NaN never is.
    pub fn contains(&self, voltage: f32) -> bool {
        voltage >= self.min_voltage && voltage <= self.max_voltage
    }
}

/// Lowest acceptable supply as a fraction of nominal.
pub const UNDER_VOLTAGE_RATIO: f32 = 0.8;

/// Highest acceptable divider output as a fraction of the ADC full scale.
pub const ADC_HEADROOM: f32 = 0.95;

/// Derives the safety bounds from the configuration.
///
/// The upper bound keeps the divider output below the ADC full scale so the
/// converter never saturates.
pub const fn compute_safety_bounds(config: &Config) -> SafetyBounds {
    let divider = &config.divider;
    SafetyBounds {
        min_voltage: UNDER_VOLTAGE_RATIO * config.nominal_voltage,
        max_voltage: ADC_HEADROOM * config.adc.full_scale_volts
            * (divider.r1_ohms + divider.r2_ohms)
            / divider.r2_ohms,
    }
}

/// Where the divisor voltage in use came from.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(target_os = "none", derive(defmt::Format))]
pub enum CalibrationSource {
    /// Taken from [`Config::divisor_voltage`]
    Configured,
    /// Config value was unset, computed from the resistor values
    Theoretical,
}

/// Divider-side voltage corresponding to nominal supply.
///
/// Only built by [`Calibration::resolve`], which rejects anything but a
/// finite positive value.
#[derive(Clone, Copy, Debug, PartialEq)]
#[cfg_attr(target_os = "none", derive(defmt::Format))]
pub struct Calibration {
    divisor_voltage: f32,
    source: CalibrationSource,
}

impl Calibration {
    /// Uses the configured divisor voltage, or the theoretical one when the
    /// configured value is zero.
    ///
    /// # Arguments
    ///
    /// * `config` - Configuration holding the divisor voltage and the divider
    ///
    /// # Errors
    ///
    /// [`ConfigError::InvalidDivisorVoltage`] if the resolved value is zero,
    /// negative or not finite, e.g. with a zero nominal voltage.
    pub fn resolve(config: &Config) -> Result<Self, ConfigError> {
        let (divisor_voltage, source) = if config.divisor_voltage == 0.0 {
            (config.theoretical_divisor_voltage(), CalibrationSource::Theoretical)
        } else {
            (config.divisor_voltage, CalibrationSource::Configured)
        };

        if !(divisor_voltage.is_finite() && divisor_voltage > 0.0) {
            return Err(ConfigError::InvalidDivisorVoltage);
        }

        Ok(Self {
            divisor_voltage,
            source,
        })
    }

    /// Divider-side voltage at nominal supply [V]
    pub fn divisor_voltage(&self) -> f32 {
        self.divisor_voltage
    }

    /// Whether the value was configured or computed from the resistors.
    pub fn source(&self) -> CalibrationSource {
        self.source
    }
}

/// Pure raw-code to supply-voltage conversion.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct VoltageModel {
    nominal_voltage: f32,
    volts_per_bit: f32,
    calibration: Calibration,
}

impl VoltageModel {
    /// Creates the model for one configuration.
    ///
    /// # Arguments
    ///
    /// * `config` - Nominal voltage and ADC scale
    /// * `calibration` - Resolved divisor voltage, see [`Calibration::resolve`]
    pub fn new(config: &Config, calibration: Calibration) -> Self {
        Self {
            nominal_voltage: config.nominal_voltage,
            volts_per_bit: config.adc.volts_per_bit(),
            calibration,
        }
    }

    /// Calibration point in use.
    pub fn calibration(&self) -> Calibration {
        self.calibration
    }

    /// Voltage at the ADC input for a raw conversion code.
    pub fn divider_voltage(&self, raw: i16) -> f32 {
        raw as f32 * self.volts_per_bit
    }

    /// Scales a divider-side voltage back to the supply side using the
    /// calibration point: `nominal × divider / divisor`.
    pub fn source_from_divider(&self, divider_voltage: f32) -> f32 {
        self.nominal_voltage * (divider_voltage / self.calibration.divisor_voltage)
    }

    /// Estimated supply voltage for a raw conversion code.
    pub fn estimate_source_voltage(&self, raw: i16) -> f32 {
        self.source_from_divider(self.divider_voltage(raw))
    }
}

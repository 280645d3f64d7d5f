//! Compiled-in configuration.
//!
//! The firmware has no persistent settings: every value below is fixed at
//! build time and checked by [`Config::validate`] in a `const` context, so an
//! inconsistent set of constants fails the build instead of the board.

use crate::voltage::{SafetyBounds, compute_safety_bounds};

/// Resistive divider between the supply and the ADC input.
///
/// ```text
/// V_supply ── R1 ──┬── R2 ── GND
///                  └── ADC (AIN0/AIN1)
/// ```
#[derive(Clone, Copy, Debug, PartialEq)]
#[cfg_attr(target_os = "none", derive(defmt::Format))]
pub struct Divider {
    /// High side resistor [Ω]
    pub r1_ohms: f32,
    /// Low side resistor [Ω]
    pub r2_ohms: f32,
}

impl Divider {
    /// Fraction of the supply voltage seen by the ADC, `R2 / (R1 + R2)`.
    pub const fn ratio(&self) -> f32 {
        self.r2_ohms / (self.r1_ohms + self.r2_ohms)
    }
}

/// ADC input range and resolution.
#[derive(Clone, Copy, Debug, PartialEq)]
#[cfg_attr(target_os = "none", derive(defmt::Format))]
pub struct AdcScale {
    /// Positive full scale of the programmable gain amplifier [V]
    pub full_scale_volts: f32,
    /// Width of the signed conversion result
    pub resolution_bits: u8,
}

impl AdcScale {
    /// Volts represented by one LSB of a signed differential code.
    pub const fn volts_per_bit(&self) -> f32 {
        self.full_scale_volts / (1u32 << (self.resolution_bits - 1)) as f32
    }
}

/// Load switch hysteresis band.
#[derive(Clone, Copy, Debug, PartialEq)]
#[cfg_attr(target_os = "none", derive(defmt::Format))]
pub struct Hysteresis {
    /// Switch engages at or above this supply voltage [V]
    pub engage: f32,
    /// Switch releases at or below this supply voltage [V]
    pub release: f32,
}

impl Hysteresis {
    /// Checks that the band is ordered and sits inside `bounds`.
    ///
    /// # Arguments
    ///
    /// * `bounds` - Safety bounds the band has to fit in
    pub const fn check(&self, bounds: &SafetyBounds) -> Result<(), ConfigError> {
        if !self.release.is_finite()
            || !self.engage.is_finite()
            || self.release >= self.engage
        {
            return Err(ConfigError::InvertedHysteresis);
        }
        if self.release < bounds.min_voltage || self.engage > bounds.max_voltage {
            return Err(ConfigError::ThresholdsOutsideBounds);
        }
        Ok(())
    }
}

/// Reasons a configuration is rejected.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(target_os = "none", derive(defmt::Format))]
pub enum ConfigError {
    /// R2 must be positive or the divider ratio is zero
    ZeroLowSideResistor,
    /// Nominal supply voltage must be positive
    NonPositiveNominalVoltage,
    /// ADC full scale must be positive
    NonPositiveFullScale,
    /// Resolution must be between 2 and 32 bits
    UnsupportedResolution,
    /// `release` must be strictly below `engage`
    InvertedHysteresis,
    /// Hysteresis band must sit inside the safety bounds
    ThresholdsOutsideBounds,
    /// Divisor voltage must be unset (`0.0`) or positive, and resolve to a
    /// positive value
    InvalidDivisorVoltage,
}

/// Complete firmware configuration.
#[derive(Clone, Copy, Debug, PartialEq)]
#[cfg_attr(target_os = "none", derive(defmt::Format))]
pub struct Config {
    /// Supply voltage the divider and calibration are designed around [V]
    pub nominal_voltage: f32,
    pub divider: Divider,
    pub adc: AdcScale,
    pub hysteresis: Hysteresis,
    /// Measured divider-side voltage at nominal supply and no load [V].
    ///
    /// `0.0` means "not calibrated"; the theoretical value is substituted at
    /// startup (see [`crate::voltage::Calibration`]).
    pub divisor_voltage: f32,
}

impl Config {
    /// Values for the 36 V bench supply with a 100k/10k divider into an
    /// ADS1115 at gain 1.
    pub const DEFAULT: Config = Config {
        nominal_voltage: 36.0,
        divider: Divider {
            r1_ohms: 100_000.0,
            r2_ohms: 10_000.0,
        },
        adc: AdcScale {
            full_scale_volts: 4.096,
            resolution_bits: 16,
        },
        hysteresis: Hysteresis {
            engage: 36.2,
            release: 36.1,
        },
        divisor_voltage: 0.0,
    };

    /// `R2 / (R1 + R2)`
    pub const fn divisor_ratio(&self) -> f32 {
        self.divider.ratio()
    }

    /// Divider-side voltage expected at nominal supply with ideal resistors.
    pub const fn theoretical_divisor_voltage(&self) -> f32 {
        self.nominal_voltage * self.divisor_ratio()
    }

    /// Checks the invariants the rest of the firmware relies on.
    ///
    /// Every comparison fails on NaN, so a non-finite value is rejected by
    /// the check it appears in.
    pub const fn validate(&self) -> Result<(), ConfigError> {
        if !is_positive(self.divider.r2_ohms)
            || !self.divider.r1_ohms.is_finite()
            || self.divider.r1_ohms < 0.0
        {
            return Err(ConfigError::ZeroLowSideResistor);
        }
        if !is_positive(self.nominal_voltage) {
            return Err(ConfigError::NonPositiveNominalVoltage);
        }
        if !is_positive(self.adc.full_scale_volts) {
            return Err(ConfigError::NonPositiveFullScale);
        }
        if self.adc.resolution_bits < 2 || self.adc.resolution_bits > 32 {
            return Err(ConfigError::UnsupportedResolution);
        }
        if self.divisor_voltage != 0.0 && !is_positive(self.divisor_voltage) {
            return Err(ConfigError::InvalidDivisorVoltage);
        }

        self.hysteresis.check(&compute_safety_bounds(self))
    }
}

const fn is_positive(value: f32) -> bool {
    value.is_finite() && value > 0.0
}

const _: () = assert!(Config::DEFAULT.validate().is_ok());

//! Over-voltage protection for a dump resistor on a regenerating supply.
//!
//! # Overview
//!
//! An ADS1115 samples the supply through a 100k/10k divider in continuous
//! differential mode. Every finished conversion pulls its ALERT/RDY line low;
//! the edge sets a flag that the main loop turns into a reading. The reading
//! is scaled back to the supply side and run through a protection state
//! machine that switches a MOSFET across the resistor with hysteresis, and
//! latches a terminal alarm if the supply leaves its safe range.
//!
//! A single status LED reports everything:
//! - 5 quick blinks at startup
//! - steady on / off while the load is engaged / released
//! - distinct repeating patterns for ADC failure, over-voltage, under-voltage
//!
//! # Module Organization
//!
//! - [`config`] - Compiled-in constants and their validation
//! - [`voltage`] - Divider reconstruction, calibration, safety bounds
//! - [`sample`] - Data-ready flag and latest-sample hand-off
//! - [`ads1115`] - I2C driver for the converter
//! - [`protection`] - Hysteresis and fault latching state machine
//! - [`load_switch`] - MOSFET gate output
//! - [`indicator`] - Time based LED pattern engine
//! - [`status`] - Pattern for each system state
//! - [`controller`] - One iteration of the main loop

#![cfg_attr(not(test), no_std)]

#[macro_use]
mod fmt;

pub mod ads1115;
pub mod config;
pub mod controller;
pub mod indicator;
pub mod load_switch;
pub mod protection;
pub mod sample;
pub mod status;
pub mod voltage;

/// Firmware release, reported in the startup banner.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

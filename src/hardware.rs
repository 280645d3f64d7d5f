//! Hardware abstraction and peripheral initialization.
//!
//! This module defines the pin mappings and peripheral initialization
//! for the protection board.
//!
//! # Pin Assignments
//!
//! ## ADC (ADS1115, address 0x48)
//! - **PB6**: I2C1_SCL
//! - **PB7**: I2C1_SDA
//! - **PA1**: ALERT/RDY - Open-drain conversion-ready strobe, falling edge (EXTI1)
//!
//! ## Load
//! - **PA4**: MOSFET gate - High connects the dump resistor
//!
//! ## Status
//! - **PA5**: Status LED - Active high
//!
//! ## Debug (SWD)
//! - **PA13**: SWDIO
//! - **PA14**: SWCLK

use embassy_stm32::exti::ExtiInput;
use embassy_stm32::gpio::{Level, Output, Pull, Speed};
use embassy_stm32::i2c::I2c;
use embassy_stm32::mode::Blocking;
use embassy_time::Instant;

use vesc_opv::ads1115::{Ads1115, DEFAULT_ADDRESS, Gain};
use vesc_opv::indicator::Clock;

/// PGA setting, must match `Config::adc.full_scale_volts`.
pub const ADC_GAIN: Gain = Gain::One;

/// Top-level peripheral container for the protection board.
pub struct Peripherals {
    /// Supply voltage converter on I2C1
    pub adc: Ads1115<I2c<'static, Blocking>>,
    /// ALERT/RDY line from the converter
    pub data_ready: ExtiInput<'static>,
    /// MOSFET gate for the dump resistor
    pub mosfet: Output<'static>,
    /// Status LED
    pub led: Output<'static>,
}

impl Peripherals {
    /// Initializes all peripherals from STM32 peripheral singleton.
    ///
    /// # Initial GPIO States
    ///
    /// - PA4 (MOSFET): Low (load released)
    /// - PA5 (LED): Low
    /// - PA1 (ALERT/RDY): Input with pull-up, the ADS1115 output is open drain
    ///
    /// # Arguments
    ///
    /// * `p` - STM32 peripheral singleton from embassy_stm32::init()
    pub fn new(p: embassy_stm32::Peripherals) -> Self {
        Self {
            adc: Ads1115::new(
                I2c::new_blocking(p.I2C1, p.PB6, p.PB7, Default::default()),
                DEFAULT_ADDRESS,
                ADC_GAIN,
            ),
            data_ready: ExtiInput::new(p.PA1, p.EXTI1, Pull::Up),
            mosfet: Output::new(p.PA4, Level::Low, Speed::Low),
            led: Output::new(p.PA5, Level::Low, Speed::Low),
        }
    }
}

/// Milliseconds since boot from the embassy time driver.
pub struct UptimeClock;

impl Clock for UptimeClock {
    fn now_ms(&self) -> u64 {
        Instant::now().as_millis()
    }
}

//! Firmware for the dump resistor over-voltage protection board.
//!
//! # Overview
//!
//! The board sits on a supply that can be pushed up by regenerative braking.
//! It watches the supply through an ADS1115 and connects a resistor across
//! it whenever the voltage climbs past the engage threshold, disconnecting it
//! again once the voltage has dropped below the release threshold.
//!
//! # Hardware
//!
//! - **MCU**: STM32L031G6U6 (Cortex-M0+)
//! - **ADC**: ADS1115, AIN0/AIN1 differential across the low side of a
//!   100k/10k divider
//! - **Load switch**: logic-level N-MOSFET driving the dump resistor
//! - **Status**: one LED
//!
//! # Tasks
//!
//! - **data_ready_task**: waits for ALERT/RDY falling edges and raises the
//!   data-ready flag. It never touches the switch or the protection state.
//! - **main**: polls the controller every millisecond. Once the controller
//!   halts, only the LED animation is serviced until the board is reset.

#![cfg_attr(target_os = "none", no_std)]
#![cfg_attr(target_os = "none", no_main)]

#[cfg(target_os = "none")]
mod hardware;

#[cfg(target_os = "none")]
use {
    embassy_executor::Spawner,
    embassy_stm32::exti::ExtiInput,
    embassy_time::{Duration, Ticker},
    hardware::{ADC_GAIN, Peripherals, UptimeClock},
    vesc_opv::config::Config,
    vesc_opv::controller::{Controller, LoopStatus},
    vesc_opv::sample::DATA_READY,
};

#[cfg(target_os = "none")]
use {defmt_rtt as _, panic_probe as _};

/// Main loop period, also the LED animation resolution.
#[cfg(target_os = "none")]
const LOOP_PERIOD_MS: u64 = 1;

#[cfg(target_os = "none")]
const CONFIG: Config = Config::DEFAULT;

#[cfg(target_os = "none")]
const _: () = assert!(CONFIG.validate().is_ok());

#[cfg(target_os = "none")]
const _: () = assert!(ADC_GAIN.full_scale_volts() == CONFIG.adc.full_scale_volts);

/// Clock configuration: HSI16 as system clock.
///
/// The I2C timing and the 1 MHz time driver tick both divide evenly from
/// 16 MHz.
#[cfg(target_os = "none")]
fn create_clock_config() -> embassy_stm32::rcc::Config {
    let mut rcc = embassy_stm32::rcc::Config::default();
    rcc.hsi = true;
    rcc.sys = embassy_stm32::rcc::Sysclk::HSI;
    rcc
}

/// Forwards ALERT/RDY falling edges to the main loop.
#[cfg(target_os = "none")]
#[embassy_executor::task]
async fn data_ready_task(mut data_ready: ExtiInput<'static>) {
    loop {
        data_ready.wait_for_falling_edge().await;
        DATA_READY.mark_ready();
    }
}

/// Main entry point.
///
/// # Initialization Sequence
///
/// 1. Configure clocks and initialize STM32 peripherals
/// 2. Build the controller (load switch forced off)
/// 3. Spawn the data-ready edge task
/// 4. Probe the ADC and start continuous conversions
/// 5. Poll until the controller halts, then service the LED forever
#[cfg(target_os = "none")]
#[embassy_executor::main]
async fn main(spawner: Spawner) {
    let mut config = embassy_stm32::Config::default();
    config.rcc = create_clock_config();

    let p = embassy_stm32::init(config);

    #[cfg(feature = "debug-mode")]
    {
        defmt::info!("Waiting 3 seconds for debugger connection...");
        embassy_time::Timer::after_secs(3).await;
    }

    let peripherals = Peripherals::new(p);

    let mut controller = match Controller::new(
        CONFIG,
        peripherals.adc,
        &DATA_READY,
        peripherals.mosfet,
        peripherals.led,
        UptimeClock,
    ) {
        Ok(controller) => controller,
        Err(e) => defmt::panic!("invalid configuration: {}", e),
    };

    spawner
        .spawn(data_ready_task(peripherals.data_ready))
        .unwrap();
    defmt::debug!("data-ready edge attached");

    if let Err(reason) = controller.startup() {
        defmt::error!("startup failed: {}", reason);
    }

    let mut ticker = Ticker::every(Duration::from_millis(LOOP_PERIOD_MS));

    let reason = loop {
        if let LoopStatus::Halted(reason) = controller.poll() {
            break reason;
        }
        ticker.next().await;
    };

    defmt::error!(
        "halted: {}, state {}, switch engaged: {}, showing {}, reset required",
        reason,
        controller.state(),
        controller.switch_engaged(),
        controller.signal()
    );

    loop {
        controller.service_indicator();
        ticker.next().await;
    }
}

/// Host builds only exercise the library.
#[cfg(not(target_os = "none"))]
fn main() {}

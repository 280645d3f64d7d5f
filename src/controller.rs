//! Sampling and protection loop.
//!
//! The controller owns every piece of the protection path and is driven by
//! the firmware one iteration at a time through [`Controller::poll`]. It never
//! blocks: terminal conditions are reported as [`LoopStatus::Halted`] and the
//! caller decides how to wait for the reset (the firmware spins on
//! [`Controller::service_indicator`] forever).

use core::convert::Infallible;

use embedded_hal::digital::OutputPin;
use embedded_hal::i2c::I2c;

use crate::ads1115::{Ads1115, Mux};
use crate::config::{Config, ConfigError};
use crate::indicator::{Clock, Indicator};
use crate::load_switch::LoadSwitch;
use crate::protection::{Protection, ProtectionState, Transition};
use crate::sample::{ReadyFlag, SampleSource};
use crate::status::StatusSignal;
use crate::voltage::{
    ADC_HEADROOM, Calibration, CalibrationSource, VoltageModel, compute_safety_bounds,
};

/// Why the device stopped protecting the load.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(target_os = "none", derive(defmt::Format))]
pub enum HaltReason {
    /// The ADC did not answer during startup
    InitFailed,
    OverVoltage,
    UnderVoltage,
}

impl HaltReason {
    /// LED signal shown while halted for this reason.
    pub fn signal(self) -> StatusSignal {
        match self {
            HaltReason::InitFailed => StatusSignal::InitFailed,
            HaltReason::OverVoltage => StatusSignal::OverVoltageAlarm,
            HaltReason::UnderVoltage => StatusSignal::UnderVoltageAlarm,
        }
    }
}

/// Phase of the loop after a [`Controller::poll`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(target_os = "none", derive(defmt::Format))]
pub enum LoopStatus {
    /// Startup blink still playing, samples are left pending
    Starting,
    /// Samples are being evaluated
    Running,
    /// Terminal, only the indicator is serviced from here on
    Halted(HaltReason),
}

/// Owns the protection path from the data-ready flag to the switch and LED.
///
/// * `I` - I2C bus of the ADS1115
/// * `S` - MOSFET gate pin
/// * `L` - Status LED pin
/// * `C` - Millisecond clock for the LED animation
pub struct Controller<'a, I, S, L, C> {
    config: Config,
    model: VoltageModel,
    protection: Protection,
    switch: LoadSwitch<S>,
    indicator: Indicator<L, C>,
    samples: SampleSource<'a, Ads1115<I>>,
    signal: StatusSignal,
    status: LoopStatus,
}

impl<'a, I, S, L, C> Controller<'a, I, S, L, C>
where
    I: I2c,
    S: OutputPin<Error = Infallible>,
    L: OutputPin<Error = Infallible>,
    C: Clock,
{
    /// Builds the controller. The load switch is forced off here, before
    /// anything else touches the hardware.
    ///
    /// # Arguments
    ///
    /// * `config` - Configuration, validated before use
    /// * `adc` - Converter driver, not yet started
    /// * `flag` - Flag raised by the data-ready edge handler
    /// * `gate` - MOSFET gate pin
    /// * `led` - Status LED pin
    /// * `clock` - Time source for the LED animation
    ///
    /// # Errors
    ///
    /// Any [`ConfigError`] from [`Config::validate`], a calibration that does
    /// not resolve to a positive divisor voltage, or an unusable hysteresis
    /// band. The switch is already off when the error is returned.
    pub fn new(
        config: Config,
        adc: Ads1115<I>,
        flag: &'a ReadyFlag,
        gate: S,
        led: L,
        clock: C,
    ) -> Result<Self, ConfigError> {
        let Ok(switch) = LoadSwitch::new(gate);

        config.validate()?;
        let calibration = Calibration::resolve(&config)?;
        let protection = Protection::new(compute_safety_bounds(&config), config.hysteresis)?;

        Ok(Self {
            config,
            model: VoltageModel::new(&config, calibration),
            protection,
            switch,
            indicator: Indicator::new(led, clock),
            samples: SampleSource::new(flag, adc),
            signal: StatusSignal::NormalOff,
            status: LoopStatus::Starting,
        })
    }

    /// Brings up the ADC and starts the startup blink.
    ///
    /// On failure the init-failed pattern is already playing and every
    /// following [`poll`](Self::poll) reports the halt.
    pub fn startup(&mut self) -> Result<(), HaltReason> {
        info!("Vesc OPV v{}", crate::VERSION);
        info!("load switch initialised off");

        let gain = self.samples.adc().gain();
        info!("differential reading from AIN0 (P) and AIN1 (N)");
        info!(
            "ADC range +/- {}V, 1 bit = {}mV",
            gain.full_scale_volts(),
            self.config.adc.volts_per_bit() * 1000.0
        );
        if gain.full_scale_volts() != self.config.adc.full_scale_volts {
            warn!(
                "ADC gain full scale {}V does not match configured {}V",
                gain.full_scale_volts(),
                self.config.adc.full_scale_volts
            );
        }

        if self.samples.adc().begin().is_err() {
            error!("failed to initialize ADS1115");
            return Err(self.halt(HaltReason::InitFailed));
        }
        debug!("ADS1115 answered");

        if self.samples.adc().start_continuous(Mux::Differential01).is_err() {
            error!("failed to start continuous conversion");
            return Err(self.halt(HaltReason::InitFailed));
        }
        info!("ADS1115 continuous conversion started");

        let calibration = self.model.calibration();
        if calibration.source() == CalibrationSource::Theoretical {
            info!(
                "offset not set, using theoretical value {}",
                calibration.divisor_voltage()
            );
        }

        let bounds = self.protection.bounds();
        info!(
            "voltage security min/max: {}V-{}V",
            bounds.min_voltage, bounds.max_voltage
        );

        self.show(StatusSignal::StartupOk);
        Ok(())
    }

    /// Runs one loop iteration.
    pub fn poll(&mut self) -> LoopStatus {
        if self.status == LoopStatus::Running {
            self.check_sample();
        }

        self.service_indicator();

        if self.status == LoopStatus::Starting && !self.indicator.is_running() {
            self.show(StatusSignal::NormalOff);
            self.status = LoopStatus::Running;
            info!("startup complete, protection active");
        }

        self.status
    }

    /// Advances the LED animation. Safe to call in any state.
    pub fn service_indicator(&mut self) {
        let Ok(()) = self.indicator.update();
    }

    /// Current protection state.
    pub fn state(&self) -> ProtectionState {
        self.protection.state()
    }

    /// Signal currently shown on the LED.
    pub fn signal(&self) -> StatusSignal {
        self.signal
    }

    /// Last commanded state of the load switch.
    pub fn switch_engaged(&self) -> bool {
        self.switch.is_engaged()
    }

    fn check_sample(&mut self) {
        let sample = match self.samples.take_if_ready() {
            Ok(Some(sample)) => sample,
            Ok(None) => return,
            Err(_) => {
                error!("conversion read failed, sample dropped");
                return;
            }
        };

        let voltage = self.model.estimate_source_voltage(sample.raw);

        // The switch keeps its last commanded state once an alarm latches.
        match self.protection.evaluate(voltage) {
            Transition::OverVoltage => {
                error!(
                    "over voltage on adc {}V/{}V, STOP !",
                    sample.adc_volts,
                    ADC_HEADROOM * self.config.adc.full_scale_volts
                );
                self.halt(HaltReason::OverVoltage);
            }
            Transition::UnderVoltage => {
                error!(
                    "under voltage {}V/{}V, STOP !",
                    voltage,
                    self.protection.bounds().min_voltage
                );
                self.halt(HaltReason::UnderVoltage);
            }
            Transition::Engage => {
                let Ok(()) = self.switch.engage();
                self.show(StatusSignal::NormalOn);
                debug!("switch on {}/{}", voltage, self.config.hysteresis.engage);
            }
            Transition::Release => {
                let Ok(()) = self.switch.release();
                self.show(StatusSignal::NormalOff);
                debug!("switch off {}/{}", voltage, self.config.hysteresis.release);
            }
            Transition::Hold | Transition::Latched => {}
        }

        debug!("voltage checked {}", voltage);
    }

    fn halt(&mut self, reason: HaltReason) -> HaltReason {
        self.status = LoopStatus::Halted(reason);
        self.show(reason.signal());
        reason
    }

    fn show(&mut self, signal: StatusSignal) {
        self.signal = signal;
        let Ok(()) = self.indicator.play(signal.pattern());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ads1115::{DEFAULT_ADDRESS, Gain};
    use crate::indicator::tests::{ManualClock, RecordingPin};
    use embedded_hal::i2c::ErrorKind;
    use embedded_hal_mock::eh1::i2c::{Mock as I2cMock, Transaction};
    use std::boxed::Box;
    use std::vec;
    use std::vec::Vec;

    type TestController = Controller<'static, I2cMock, RecordingPin, RecordingPin, ManualClock>;

    struct Rig {
        controller: TestController,
        flag: &'static ReadyFlag,
        i2c: I2cMock,
        gate: RecordingPin,
        led: RecordingPin,
        clock: ManualClock,
    }

    impl Rig {
        fn new(traffic: Vec<Transaction>) -> Self {
            let flag: &'static ReadyFlag = Box::leak(Box::new(ReadyFlag::new()));
            let i2c = I2cMock::new(&traffic);
            let gate = RecordingPin::default();
            let led = RecordingPin::default();
            let clock = ManualClock::default();
            let controller = Controller::new(
                Config::DEFAULT,
                Ads1115::new(i2c.clone(), DEFAULT_ADDRESS, Gain::One),
                flag,
                gate.clone(),
                led.clone(),
                clock.clone(),
            )
            .unwrap();
            Self {
                controller,
                flag,
                i2c,
                gate,
                led,
                clock,
            }
        }

        /// Starts up and polls until the startup blink has finished.
        fn running(traffic: Vec<Transaction>) -> Self {
            let mut rig = Self::new(traffic);
            assert_eq!(rig.controller.startup(), Ok(()));
            while rig.controller.poll() == LoopStatus::Starting {
                rig.clock.advance(10);
            }
            rig
        }

        /// Simulates one data-ready edge followed by a loop iteration.
        fn feed(&mut self) -> LoopStatus {
            self.flag.mark_ready();
            self.clock.advance(1);
            self.controller.poll()
        }

        fn finish(mut self) {
            self.i2c.done();
        }
    }

    fn startup_traffic() -> Vec<Transaction> {
        vec![
            Transaction::write_read(DEFAULT_ADDRESS, vec![0x01], vec![0x85, 0x83]),
            Transaction::write(DEFAULT_ADDRESS, vec![0x01, 0x82, 0x80]),
            Transaction::write(DEFAULT_ADDRESS, vec![0x03, 0x80, 0x00]),
            Transaction::write(DEFAULT_ADDRESS, vec![0x02, 0x00, 0x00]),
        ]
    }

    /// Conversion register read returning the code for a supply voltage.
    fn conversion(supply_volts: f32) -> Transaction {
        let config = Config::DEFAULT;
        let divider = supply_volts * config.theoretical_divisor_voltage() / config.nominal_voltage;
        let code = (divider / config.adc.volts_per_bit()).round() as i16;
        Transaction::write_read(DEFAULT_ADDRESS, vec![0x00], code.to_be_bytes().to_vec())
    }

    fn traffic(readings: &[f32]) -> Vec<Transaction> {
        startup_traffic()
            .into_iter()
            .chain(readings.iter().map(|&v| conversion(v)))
            .collect()
    }

    #[test]
    fn startup_blinks_then_starts_protecting() {
        let mut rig = Rig::new(traffic(&[]));
        assert!(rig.gate.writes() == [false]);

        assert_eq!(rig.controller.startup(), Ok(()));
        assert_eq!(rig.controller.signal(), StatusSignal::StartupOk);
        assert!(rig.led.level());

        let mut polls = 0;
        while rig.controller.poll() == LoopStatus::Starting {
            rig.clock.advance(10);
            polls += 1;
        }
        assert_eq!(polls, 250);
        assert_eq!(rig.controller.signal(), StatusSignal::NormalOff);
        assert!(!rig.led.level());
        rig.finish();
    }

    #[test]
    fn edges_during_startup_are_kept_for_the_first_running_poll() {
        let mut rig = Rig::new(traffic(&[37.0]));
        rig.controller.startup().unwrap();
        rig.flag.mark_ready();

        while rig.controller.poll() == LoopStatus::Starting {
            rig.clock.advance(10);
        }
        assert!(!rig.controller.switch_engaged());

        assert_eq!(rig.controller.poll(), LoopStatus::Running);
        assert!(rig.controller.switch_engaged());
        rig.finish();
    }

    #[test]
    fn switch_follows_hysteresis() {
        let mut rig = Rig::running(traffic(&[36.0, 37.0, 36.15, 35.0]));

        rig.feed();
        assert!(!rig.controller.switch_engaged());
        assert_eq!(rig.controller.signal(), StatusSignal::NormalOff);

        rig.feed();
        assert!(rig.controller.switch_engaged());
        assert_eq!(rig.controller.state(), ProtectionState::Engaged);
        assert_eq!(rig.controller.signal(), StatusSignal::NormalOn);
        assert!(rig.gate.level());
        assert!(rig.led.level());

        rig.feed();
        assert!(rig.controller.switch_engaged());

        assert_eq!(rig.feed(), LoopStatus::Running);
        assert!(!rig.controller.switch_engaged());
        assert!(!rig.gate.level());
        assert!(!rig.led.level());
        rig.finish();
    }

    #[test]
    fn no_edge_means_no_bus_traffic() {
        let mut rig = Rig::running(traffic(&[]));
        for _ in 0..100 {
            rig.clock.advance(1);
            assert_eq!(rig.controller.poll(), LoopStatus::Running);
        }
        rig.finish();
    }

    #[test]
    fn over_voltage_latches_and_keeps_switch_state() {
        let mut rig = Rig::running(traffic(&[37.0, 50.0]));

        rig.feed();
        assert!(rig.controller.switch_engaged());

        assert_eq!(rig.feed(), LoopStatus::Halted(HaltReason::OverVoltage));
        assert_eq!(rig.controller.state(), ProtectionState::OverVoltageAlarm);
        assert_eq!(rig.controller.signal(), StatusSignal::OverVoltageAlarm);
        assert!(rig.controller.switch_engaged());
        assert!(rig.gate.level());

        // no further reads: the mock would reject an unexpected transaction
        for _ in 0..5 {
            assert_eq!(rig.feed(), LoopStatus::Halted(HaltReason::OverVoltage));
        }
        assert_eq!(rig.gate.writes(), [false, true]);
        rig.finish();
    }

    #[test]
    fn under_voltage_halts_with_its_own_signal() {
        let mut rig = Rig::running(traffic(&[20.0]));
        assert_eq!(rig.feed(), LoopStatus::Halted(HaltReason::UnderVoltage));
        assert_eq!(rig.controller.signal(), StatusSignal::UnderVoltageAlarm);
        assert!(!rig.controller.switch_engaged());
        rig.finish();
    }

    #[test]
    fn halted_device_keeps_blinking() {
        let mut rig = Rig::running(traffic(&[20.0]));
        rig.feed();

        let mut toggles = 0;
        let mut last = rig.led.level();
        for _ in 0..5000 {
            rig.clock.advance(1);
            rig.controller.service_indicator();
            if rig.led.level() != last {
                toggles += 1;
                last = rig.led.level();
            }
        }
        // three flashes per 5 s burst
        assert_eq!(toggles, 6);
        rig.finish();
    }

    #[test]
    fn adc_missing_at_startup_is_terminal() {
        let probe = Transaction::write_read(DEFAULT_ADDRESS, vec![0x01], vec![0, 0])
            .with_error(ErrorKind::Other);
        let mut rig = Rig::new(vec![probe]);

        assert_eq!(rig.controller.startup(), Err(HaltReason::InitFailed));
        assert_eq!(rig.controller.signal(), StatusSignal::InitFailed);

        for _ in 0..10 {
            assert_eq!(rig.feed(), LoopStatus::Halted(HaltReason::InitFailed));
        }
        assert!(!rig.controller.switch_engaged());
        rig.finish();
    }

    #[test]
    fn failed_conversion_start_is_terminal() {
        let traffic = vec![
            Transaction::write_read(DEFAULT_ADDRESS, vec![0x01], vec![0x85, 0x83]),
            Transaction::write(DEFAULT_ADDRESS, vec![0x01, 0x82, 0x80])
                .with_error(ErrorKind::Other),
        ];
        let mut rig = Rig::new(traffic);

        assert_eq!(rig.controller.startup(), Err(HaltReason::InitFailed));
        assert_eq!(rig.controller.signal(), StatusSignal::InitFailed);
        assert_eq!(rig.feed(), LoopStatus::Halted(HaltReason::InitFailed));
        assert!(!rig.controller.switch_engaged());
        rig.finish();
    }

    /// Builds a controller from `config` with no bus traffic expected.
    fn build(config: Config) -> (Result<TestController, ConfigError>, RecordingPin, I2cMock) {
        let flag: &'static ReadyFlag = Box::leak(Box::new(ReadyFlag::new()));
        let no_traffic: [Transaction; 0] = [];
        let i2c = I2cMock::new(&no_traffic);
        let gate = RecordingPin::default();
        let controller = Controller::new(
            config,
            Ads1115::new(i2c.clone(), DEFAULT_ADDRESS, Gain::One),
            flag,
            gate.clone(),
            RecordingPin::default(),
            ManualClock::default(),
        );
        (controller, gate, i2c)
    }

    #[test]
    fn invalid_configuration_is_rejected_with_switch_off() {
        let inverted = Config {
            hysteresis: crate::config::Hysteresis {
                engage: 36.0,
                release: 36.5,
            },
            ..Config::DEFAULT
        };
        let no_nominal = Config {
            nominal_voltage: 0.0,
            ..Config::DEFAULT
        };
        let negative_divisor = Config {
            divisor_voltage: -3.27,
            ..Config::DEFAULT
        };

        for (config, expected) in [
            (inverted, ConfigError::InvertedHysteresis),
            (no_nominal, ConfigError::NonPositiveNominalVoltage),
            (negative_divisor, ConfigError::InvalidDivisorVoltage),
        ] {
            let (controller, gate, mut i2c) = build(config);
            assert_eq!(controller.err(), Some(expected));
            assert_eq!(gate.writes(), [false]);
            i2c.done();
        }
    }

    #[test]
    fn failed_read_drops_sample_and_keeps_running() {
        let mut readings = traffic(&[]);
        readings.push(
            Transaction::write_read(DEFAULT_ADDRESS, vec![0x00], vec![0, 0])
                .with_error(ErrorKind::Other),
        );
        readings.push(conversion(37.0));
        let mut rig = Rig::running(readings);

        assert_eq!(rig.feed(), LoopStatus::Running);
        assert_eq!(rig.controller.state(), ProtectionState::Idle);

        rig.feed();
        assert_eq!(rig.controller.state(), ProtectionState::Engaged);
        rig.finish();
    }
}

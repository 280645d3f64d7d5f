//! Minimal blocking driver for the TI ADS1115 16-bit I2C ADC.
//!
//! Only what the protection loop needs: probe, continuous differential
//! conversion with the ALERT/RDY pin acting as a conversion-ready strobe, and
//! reading back the last result.

use embedded_hal::i2c::I2c;

use crate::sample::ConversionSource;

/// Address with the ADDR pin tied to GND.
pub const DEFAULT_ADDRESS: u8 = 0x48;

const REG_CONVERSION: u8 = 0x00;
const REG_CONFIG: u8 = 0x01;
const REG_LO_THRESH: u8 = 0x02;
const REG_HI_THRESH: u8 = 0x03;

/// Start a single conversion (write) / no conversion in progress (read)
const CONFIG_OS_SINGLE: u16 = 0x8000;
const CONFIG_MODE_CONTINUOUS: u16 = 0x0000;
const CONFIG_DR_128SPS: u16 = 0x0080;
/// Assert ALERT/RDY after one conversion, traditional comparator, active low
const CONFIG_COMP_QUE_1CONV: u16 = 0x0000;

/// Setting HI_THRESH MSB and clearing LO_THRESH MSB turns ALERT/RDY into a
/// conversion-ready output.
const CONVERSION_READY_HI: u16 = 0x8000;
const CONVERSION_READY_LO: u16 = 0x0000;

/// Programmable gain amplifier setting.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(target_os = "none", derive(defmt::Format))]
pub enum Gain {
    /// ±6.144 V, 187.5 µV/LSB
    TwoThirds,
    /// ±4.096 V, 125 µV/LSB
    One,
    /// ±2.048 V, 62.5 µV/LSB
    Two,
    /// ±1.024 V, 31.25 µV/LSB
    Four,
    /// ±0.512 V, 15.625 µV/LSB
    Eight,
    /// ±0.256 V, 7.8125 µV/LSB
    Sixteen,
}

impl Gain {
    /// Positive end of the input range [V]
    pub const fn full_scale_volts(self) -> f32 {
        match self {
            Gain::TwoThirds => 6.144,
            Gain::One => 4.096,
            Gain::Two => 2.048,
            Gain::Four => 1.024,
            Gain::Eight => 0.512,
            Gain::Sixteen => 0.256,
        }
    }

    const fn config_bits(self) -> u16 {
        match self {
            Gain::TwoThirds => 0x0000,
            Gain::One => 0x0200,
            Gain::Two => 0x0400,
            Gain::Four => 0x0600,
            Gain::Eight => 0x0800,
            Gain::Sixteen => 0x0A00,
        }
    }
}

/// Input multiplexer setting.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(target_os = "none", derive(defmt::Format))]
pub enum Mux {
    Differential01,
    Differential03,
    Differential13,
    Differential23,
    Single0,
    Single1,
    Single2,
    Single3,
}

impl Mux {
    const fn config_bits(self) -> u16 {
        match self {
            Mux::Differential01 => 0x0000,
            Mux::Differential03 => 0x1000,
            Mux::Differential13 => 0x2000,
            Mux::Differential23 => 0x3000,
            Mux::Single0 => 0x4000,
            Mux::Single1 => 0x5000,
            Mux::Single2 => 0x6000,
            Mux::Single3 => 0x7000,
        }
    }
}

/// Driver error, generic over the bus error type.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(target_os = "none", derive(defmt::Format))]
pub enum Ads1115Error<E> {
    /// Bus transaction failed
    Bus(E),
    /// Nothing acknowledged the probe at startup
    NotResponding,
}

/// ADS1115 on a blocking I2C bus.
pub struct Ads1115<I> {
    i2c: I,
    address: u8,
    gain: Gain,
}

impl<I: I2c> Ads1115<I> {
    /// Creates the driver. Nothing is sent until [`begin`](Self::begin).
    ///
    /// # Arguments
    ///
    /// * `i2c` - Bus the converter sits on
    /// * `address` - 7-bit address, [`DEFAULT_ADDRESS`] with ADDR tied to GND
    /// * `gain` - PGA setting used for every conversion
    pub fn new(i2c: I, address: u8, gain: Gain) -> Self {
        Self { i2c, address, gain }
    }

    /// PGA setting the driver was created with.
    pub fn gain(&self) -> Gain {
        self.gain
    }

    /// Checks that the converter answers on the bus.
    pub fn begin(&mut self) -> Result<(), Ads1115Error<I::Error>> {
        self.read_register(REG_CONFIG)
            .map(|_| ())
            .map_err(|_| Ads1115Error::NotResponding)
    }

    /// Starts free-running conversions on `mux` at 128 SPS.
    pub fn start_continuous(&mut self, mux: Mux) -> Result<(), Ads1115Error<I::Error>> {
        let config = CONFIG_OS_SINGLE
            | mux.config_bits()
            | self.gain.config_bits()
            | CONFIG_MODE_CONTINUOUS
            | CONFIG_DR_128SPS
            | CONFIG_COMP_QUE_1CONV;

        self.write_register(REG_CONFIG, config)?;
        self.write_register(REG_HI_THRESH, CONVERSION_READY_HI)?;
        self.write_register(REG_LO_THRESH, CONVERSION_READY_LO)?;
        Ok(())
    }

    /// Reads the conversion register, the most recent completed result.
    pub fn read_conversion(&mut self) -> Result<i16, Ads1115Error<I::Error>> {
        let value = self.read_register(REG_CONVERSION).map_err(Ads1115Error::Bus)?;
        Ok(value as i16)
    }

    /// `raw × full scale / 32768`
    pub fn volts(&self, raw: i16) -> f32 {
        raw as f32 * (self.gain.full_scale_volts() / 32768.0)
    }

    fn write_register(&mut self, reg: u8, value: u16) -> Result<(), Ads1115Error<I::Error>> {
        let [hi, lo] = value.to_be_bytes();
        self.i2c
            .write(self.address, &[reg, hi, lo])
            .map_err(Ads1115Error::Bus)
    }

    fn read_register(&mut self, reg: u8) -> Result<u16, I::Error> {
        let mut buf = [0u8; 2];
        self.i2c.write_read(self.address, &[reg], &mut buf)?;
        Ok(u16::from_be_bytes(buf))
    }
}

impl<I: I2c> ConversionSource for Ads1115<I> {
    type Error = Ads1115Error<I::Error>;

    fn last_conversion(&mut self) -> Result<i16, Self::Error> {
        self.read_conversion()
    }

    fn compute_volts(&self, raw: i16) -> f32 {
        self.volts(raw)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use embedded_hal::i2c::ErrorKind;
    use embedded_hal_mock::eh1::i2c::{Mock as I2cMock, Transaction};
    use std::vec;

    #[test]
    fn begin_probes_config_register() {
        let expectations = [Transaction::write_read(
            DEFAULT_ADDRESS,
            vec![REG_CONFIG],
            vec![0x85, 0x83],
        )];
        let mut i2c = I2cMock::new(&expectations);
        let mut adc = Ads1115::new(i2c.clone(), DEFAULT_ADDRESS, Gain::One);
        assert_eq!(adc.begin(), Ok(()));
        i2c.done();
    }

    #[test]
    fn begin_reports_missing_device() {
        let expectations = [
            Transaction::write_read(DEFAULT_ADDRESS, vec![REG_CONFIG], vec![0, 0])
                .with_error(ErrorKind::Other),
        ];
        let mut i2c = I2cMock::new(&expectations);
        let mut adc = Ads1115::new(i2c.clone(), DEFAULT_ADDRESS, Gain::One);
        assert_eq!(adc.begin(), Err(Ads1115Error::NotResponding));
        i2c.done();
    }

    #[test]
    fn continuous_differential_setup_enables_ready_pin() {
        // OS | AIN0-AIN1 | PGA 4.096 | continuous | 128 SPS | assert after one
        let expectations = [
            Transaction::write(DEFAULT_ADDRESS, vec![REG_CONFIG, 0x82, 0x80]),
            Transaction::write(DEFAULT_ADDRESS, vec![REG_HI_THRESH, 0x80, 0x00]),
            Transaction::write(DEFAULT_ADDRESS, vec![REG_LO_THRESH, 0x00, 0x00]),
        ];
        let mut i2c = I2cMock::new(&expectations);
        let mut adc = Ads1115::new(i2c.clone(), DEFAULT_ADDRESS, Gain::One);
        assert_eq!(adc.start_continuous(Mux::Differential01), Ok(()));
        i2c.done();
    }

    #[test]
    fn conversion_is_signed_big_endian() {
        let expectations = [
            Transaction::write_read(DEFAULT_ADDRESS, vec![REG_CONVERSION], vec![0x1F, 0x40]),
            Transaction::write_read(DEFAULT_ADDRESS, vec![REG_CONVERSION], vec![0xFF, 0xFE]),
        ];
        let mut i2c = I2cMock::new(&expectations);
        let mut adc = Ads1115::new(i2c.clone(), DEFAULT_ADDRESS, Gain::One);
        assert_eq!(adc.last_conversion(), Ok(8_000));
        assert_eq!(adc.last_conversion(), Ok(-2));
        i2c.done();
    }

    #[test]
    fn volts_follow_gain() {
        let no_traffic: [Transaction; 0] = [];
        let mut i2c = I2cMock::new(&no_traffic);
        let adc = Ads1115::new(i2c.clone(), DEFAULT_ADDRESS, Gain::One);
        assert!((adc.compute_volts(8_000) - 1.0).abs() < 1e-6);
        i2c.done();

        let mut i2c = I2cMock::new(&no_traffic);
        let adc = Ads1115::new(i2c.clone(), DEFAULT_ADDRESS, Gain::TwoThirds);
        assert!((adc.compute_volts(16_000) - 3.0).abs() < 1e-6);
        i2c.done();
    }
}

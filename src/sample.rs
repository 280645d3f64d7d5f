//! Hand-off of fresh conversions from the data-ready edge to the main loop.
//!
//! The ADC pulls its ALERT/RDY line low after every conversion. The edge
//! handler only sets a flag; the main loop tests-and-clears it and then pulls
//! the latest result over I2C. At most one sample is ever pending: several
//! edges before the loop drains the flag collapse into one read of the most
//! recent conversion.

use portable_atomic::{AtomicBool, Ordering};

/// Single-producer/single-consumer "new data" flag shared with interrupt context.
pub struct ReadyFlag {
    ready: AtomicBool,
}

impl ReadyFlag {
    /// Creates a cleared flag.
    pub const fn new() -> Self {
        Self {
            ready: AtomicBool::new(false),
        }
    }

    /// Called from the edge handler. Never blocks or allocates.
    pub fn mark_ready(&self) {
        self.ready.store(true, Ordering::Release);
    }

    /// Clears the flag and reports whether it was set.
    pub fn take(&self) -> bool {
        self.ready.swap(false, Ordering::AcqRel)
    }
}

impl Default for ReadyFlag {
    fn default() -> Self {
        Self::new()
    }
}

/// Flag written by the data-ready edge handler.
pub static DATA_READY: ReadyFlag = ReadyFlag::new();

/// Converter that keeps running on its own and can be asked for its latest result.
pub trait ConversionSource {
    type Error;

    /// Raw code of the most recent completed conversion.
    fn last_conversion(&mut self) -> Result<i16, Self::Error>;

    /// Voltage at the converter input for `raw` at the configured gain.
    fn compute_volts(&self, raw: i16) -> f32;
}

/// One conversion as fetched by the main loop.
#[derive(Clone, Copy, Debug, PartialEq)]
#[cfg_attr(target_os = "none", derive(defmt::Format))]
pub struct RawSample {
    pub raw: i16,
    /// Input voltage as reported by the converter driver [V]
    pub adc_volts: f32,
}

/// Main-loop side of the data-ready hand-off.
pub struct SampleSource<'a, A> {
    flag: &'a ReadyFlag,
    adc: A,
}

impl<'a, A: ConversionSource> SampleSource<'a, A> {
    /// Pairs the flag with the converter it announces.
    ///
    /// # Arguments
    ///
    /// * `flag` - Flag set by the data-ready edge handler
    /// * `adc` - Converter already running continuous conversions
    pub fn new(flag: &'a ReadyFlag, adc: A) -> Self {
        Self { flag, adc }
    }

    /// Fetches the latest conversion if an edge was seen since the last call.
    ///
    /// The flag is cleared before the bus read, so an edge that lands while
    /// the read is in flight is kept for the next call.
    pub fn take_if_ready(&mut self) -> Result<Option<RawSample>, A::Error> {
        if !self.flag.take() {
            return Ok(None);
        }

        let raw = self.adc.last_conversion()?;
        Ok(Some(RawSample {
            raw,
            adc_volts: self.adc.compute_volts(raw),
        }))
    }

    /// Direct access to the converter, for setup before sampling starts.
    pub fn adc(&mut self) -> &mut A {
        &mut self.adc
    }
}

//! Load switch output.
//!
//! The resistor is switched by a logic-level MOSFET whose gate is driven
//! directly from a GPIO: high engages the load, low releases it.

use embedded_hal::digital::OutputPin;

/// Controller for the MOSFET switching the dump resistor.
pub struct LoadSwitch<P> {
    /// Gate drive, active high
    gate: P,
    /// Last commanded state
    engaged: bool,
}

impl<P: OutputPin> LoadSwitch<P> {
    /// Takes the gate pin and forces the load off.
    ///
    /// # Arguments
    ///
    /// * `gate` - MOSFET gate output, high connects the resistor
    pub fn new(mut gate: P) -> Result<Self, P::Error> {
        gate.set_low()?;
        Ok(Self {
            gate,
            engaged: false,
        })
    }

    /// Connects the resistor across the supply.
    pub fn engage(&mut self) -> Result<(), P::Error> {
        self.gate.set_high()?;
        self.engaged = true;
        Ok(())
    }

    /// Disconnects the resistor.
    pub fn release(&mut self) -> Result<(), P::Error> {
        self.gate.set_low()?;
        self.engaged = false;
        Ok(())
    }

    /// Last commanded state, `true` while the resistor is connected.
    pub fn is_engaged(&self) -> bool {
        self.engaged
    }
}

//! Status LED animation engine.
//!
//! Patterns are declarative and time based: the indicator remembers when the
//! current pattern started and, on every [`Indicator::update`], derives the
//! LED level from the elapsed time. It has no thread or timer of its own, so
//! the host loop must call `update` on every iteration.

use embedded_hal::digital::{OutputPin, PinState};

/// Monotonic millisecond time source.
pub trait Clock {
    /// Milliseconds since an arbitrary fixed origin.
    fn now_ms(&self) -> u64;
}

/// How many times a blink burst plays.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(target_os = "none", derive(defmt::Format))]
pub enum Repeat {
    Times(u16),
    Forever,
}

/// `count` on/off cycles followed by `pause_ms` dark, played `repeat` times.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(target_os = "none", derive(defmt::Format))]
pub struct Blink {
    pub on_ms: u32,
    pub off_ms: u32,
    pub count: u16,
    pub pause_ms: u32,
    pub repeat: Repeat,
}

impl Blink {
    const fn cycle_ms(&self) -> u64 {
        self.on_ms as u64 + self.off_ms as u64
    }

    const fn burst_ms(&self) -> u64 {
        self.cycle_ms() * self.count as u64 + self.pause_ms as u64
    }

    /// LED level at `elapsed` ms, or `None` once a finite pattern is over.
    fn level_at(&self, elapsed: u64) -> Option<bool> {
        let burst = self.burst_ms();
        if burst == 0 {
            return None;
        }

        if let Repeat::Times(times) = self.repeat {
            if elapsed >= burst * times as u64 {
                return None;
            }
        }

        let position = elapsed % burst;
        let blinking = self.cycle_ms() * self.count as u64;
        if position >= blinking {
            return Some(false);
        }

        Some(position % self.cycle_ms() < self.on_ms as u64)
    }
}

/// What the LED should do.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(target_os = "none", derive(defmt::Format))]
pub enum Pattern {
    On,
    Off,
    Blink(Blink),
}

impl Pattern {
    /// `(level, still running)` at `elapsed` ms into the pattern.
    fn sample(&self, elapsed: u64) -> (bool, bool) {
        match self {
            Pattern::On => (true, false),
            Pattern::Off => (false, false),
            Pattern::Blink(blink) => match blink.level_at(elapsed) {
                Some(level) => (level, true),
                None => (false, false),
            },
        }
    }
}

/// Drives one LED through [`Pattern`]s.
pub struct Indicator<P, C> {
    pin: P,
    clock: C,
    pattern: Pattern,
    started_at: u64,
    /// Last level written, `None` before the first write
    lit: Option<bool>,
    running: bool,
}

impl<P: OutputPin, C: Clock> Indicator<P, C> {
    /// Creates an indicator showing [`Pattern::Off`]. The pin is first written
    /// by the next [`play`](Self::play) or [`update`](Self::update).
    ///
    /// # Arguments
    ///
    /// * `pin` - LED output, active high
    /// * `clock` - Time source for the animation
    pub fn new(pin: P, clock: C) -> Self {
        Self {
            pin,
            clock,
            pattern: Pattern::Off,
            started_at: 0,
            lit: None,
            running: false,
        }
    }

    /// Replaces the current pattern and restarts the animation from now.
    pub fn play(&mut self, pattern: Pattern) -> Result<(), P::Error> {
        self.pattern = pattern;
        self.started_at = self.clock.now_ms();
        self.update()
    }

    /// Advances the animation to the current time.
    pub fn update(&mut self) -> Result<(), P::Error> {
        let elapsed = self.clock.now_ms().saturating_sub(self.started_at);
        let (level, running) = self.pattern.sample(elapsed);
        self.running = running;

        if self.lit != Some(level) {
            self.pin.set_state(PinState::from(level))?;
            self.lit = Some(level);
        }
        Ok(())
    }

    /// Whether a blink pattern is still animating. Steady patterns never are.
    pub fn is_running(&self) -> bool {
        self.running
    }
}

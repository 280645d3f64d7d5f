//! What the status LED shows for each system state.
//!
//! | Signal              | Pattern                                  |
//! |---------------------|------------------------------------------|
//! | StartupOk           | 5 × (250 on / 250 off), once             |
//! | NormalOff           | off                                      |
//! | NormalOn            | on                                       |
//! | InitFailed          | 1 × (250 on / 250 off), 2 s dark, forever |
//! | OverVoltageAlarm    | 2 × (250 on / 750 off), 2 s dark, forever |
//! | UnderVoltageAlarm   | 3 × (250 on / 750 off), 2 s dark, forever |

use crate::indicator::{Blink, Pattern, Repeat};
use crate::protection::ProtectionState;

const SHORT_ON_MS: u32 = 250;
const SHORT_OFF_MS: u32 = 250;
const ALARM_OFF_MS: u32 = 750;
const ALARM_PAUSE_MS: u32 = 2000;
const STARTUP_BLINKS: u16 = 5;

/// System state as shown on the status LED.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(target_os = "none", derive(defmt::Format))]
pub enum StatusSignal {
    StartupOk,
    NormalOff,
    NormalOn,
    InitFailed,
    OverVoltageAlarm,
    UnderVoltageAlarm,
}

impl StatusSignal {
    /// LED pattern for this signal, see the table above.
    pub const fn pattern(self) -> Pattern {
        match self {
            StatusSignal::StartupOk => Pattern::Blink(Blink {
                on_ms: SHORT_ON_MS,
                off_ms: SHORT_OFF_MS,
                count: STARTUP_BLINKS,
                pause_ms: 0,
                repeat: Repeat::Times(1),
            }),
            StatusSignal::NormalOff => Pattern::Off,
            StatusSignal::NormalOn => Pattern::On,
            StatusSignal::InitFailed => Pattern::Blink(Blink {
                on_ms: SHORT_ON_MS,
                off_ms: SHORT_OFF_MS,
                count: 1,
                pause_ms: ALARM_PAUSE_MS,
                repeat: Repeat::Forever,
            }),
            StatusSignal::OverVoltageAlarm => Pattern::Blink(Blink {
                on_ms: SHORT_ON_MS,
                off_ms: ALARM_OFF_MS,
                count: 2,
                pause_ms: ALARM_PAUSE_MS,
                repeat: Repeat::Forever,
            }),
            StatusSignal::UnderVoltageAlarm => Pattern::Blink(Blink {
                on_ms: SHORT_ON_MS,
                off_ms: ALARM_OFF_MS,
                count: 3,
                pause_ms: ALARM_PAUSE_MS,
                repeat: Repeat::Forever,
            }),
        }
    }
}

impl From<ProtectionState> for StatusSignal {
    fn from(state: ProtectionState) -> Self {
        match state {
            ProtectionState::Idle => StatusSignal::NormalOff,
            ProtectionState::Engaged => StatusSignal::NormalOn,
            ProtectionState::OverVoltageAlarm => StatusSignal::OverVoltageAlarm,
            ProtectionState::UnderVoltageAlarm => StatusSignal::UnderVoltageAlarm,
        }
    }
}

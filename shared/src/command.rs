//! # Device Command Processor
//!
//! Answers the commands defined in [`crate::protocol`] on the device.

use crate::protocol::{Command, LedColor, Opcode, Response};
use crate::traits::CommandProcessor;

/// Output pin driving the status LED
pub trait Indicator {
    type Error;

    /// Turn the LED on (`true`) or off (`false`)
    fn set(&mut self, lit: bool) -> Result<(), Self::Error>;
}

/// Placeholder for boards without a status LED
#[derive(Debug, Default, Clone, Copy)]
pub struct NoIndicator;

impl Indicator for NoIndicator {
    type Error = core::convert::Infallible;

    fn set(&mut self, _lit: bool) -> Result<(), Self::Error> {
        Ok(())
    }
}

/// Command processor for the device's built-in commands
///
/// `SetLed` fails (responds with `success: false`) when the board has no
/// LED fitted or the pin reports an error.
pub struct DeviceCommands<L = NoIndicator> {
    led: Option<L>,
}

impl DeviceCommands<NoIndicator> {
    /// Processor for a board without a status LED
    pub fn without_led() -> Self {
        Self { led: None }
    }
}

impl<L: Indicator> DeviceCommands<L> {
    pub fn new(led: L) -> Self {
        Self { led: Some(led) }
    }

    /// Borrow the LED driver, if fitted
    pub fn led(&self) -> Option<&L> {
        self.led.as_ref()
    }

    fn set_led(&mut self, color: LedColor) -> bool {
        let Some(led) = self.led.as_mut() else {
            return false;
        };
        led.set(color == LedColor::White).is_ok()
    }
}

impl<L: Indicator> CommandProcessor for DeviceCommands<L> {
    type Command = Command;
    type Response = Response;

    fn on_command(&mut self, command: Command) -> Response {
        match command {
            Command::Ping => Response {
                opcode: Opcode::Pong,
                success: true,
            },
            Command::SetLed { color } => Response {
                opcode: Opcode::SetLed,
                success: self.set_led(color),
            },
        }
    }
}

//! Maintenance trigger button.
//!
//! ## Hardware
//!
//! Active-low momentary switch to GND with a pull-up (internal on the
//! device). The pin is polled from the main loop; the hold-time debounce
//! lives in the trigger FSM, so this driver only reports the level.
//!
//! Generic over [`embedded_hal::digital::InputPin`]: the firmware hands in
//! an `esp_idf_hal` `PinDriver`, tests hand in a scripted pin.

use embedded_hal::digital::InputPin;
use log::debug;

pub struct TriggerButton<P: InputPin> {
    pin: P,
    read_errors: u32,
}

impl<P: InputPin> TriggerButton<P> {
    pub fn new(pin: P) -> Self {
        Self {
            pin,
            read_errors: 0,
        }
    }

    /// `true` while the switch is closed. A failed read counts as released.
    pub fn is_pressed(&mut self) -> bool {
        match self.pin.is_low() {
            Ok(low) => low,
            Err(e) => {
                self.read_errors = self.read_errors.saturating_add(1);
                debug!("button: read failed: {:?}", e);
                false
            }
        }
    }

    pub fn read_errors(&self) -> u32 {
        self.read_errors
    }
}

//! Shared mutable context threaded through every FSM handler.
//!
//! The controller writes the trigger sample and the clock before each tick;
//! state handlers read them and leave requests behind for the controller to
//! act on.

/// Blackboard for the maintenance trigger state machine.
#[derive(Debug, Clone)]
pub struct FsmContext {
    // --- Inputs (written by the controller before each tick) ---
    /// Monotonic milliseconds; may wrap.
    pub now_ms: u32,
    /// Trigger sampled asserted this tick.
    pub trigger_asserted: bool,

    // --- Configuration ---
    /// Continuous hold needed to enter maintenance mode.
    pub hold_ms: u32,

    // --- Handler state ---
    /// `now_ms` when the current press started.
    pub press_start_ms: u32,

    // --- Requests (consumed by the controller) ---
    /// Set once when Active is entered; the controller clears it after
    /// running bring-up.
    pub bring_up_requested: bool,
}

impl FsmContext {
    pub fn new(hold_ms: u32) -> Self {
        Self {
            now_ms: 0,
            trigger_asserted: false,
            hold_ms,
            press_start_ms: 0,
            bring_up_requested: false,
        }
    }

    /// Milliseconds the trigger has been held, wrap-safe.
    pub fn held_for_ms(&self) -> u32 {
        self.now_ms.wrapping_sub(self.press_start_ms)
    }
}

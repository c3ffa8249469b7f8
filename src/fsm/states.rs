//! Concrete state handler functions and table builder.
//!
//! ```text
//!  DORMANT ──[trigger asserted]──▶ TRIGGERING ──[held ≥ hold_ms]──▶ ACTIVE
//!     ▲                                │
//!     └────────[released early]────────┘
//! ```
//!
//! Active is terminal: only a restart returns the station to Dormant.

use super::context::FsmContext;
use super::{StateDescriptor, StateId};
use log::info;

/// Build the static state table.  Called once at startup.
pub fn build_state_table() -> [StateDescriptor; StateId::COUNT] {
    [
        StateDescriptor {
            id: StateId::Dormant,
            name: "Dormant",
            on_enter: None,
            on_exit: None,
            on_update: dormant_update,
        },
        StateDescriptor {
            id: StateId::Triggering,
            name: "Triggering",
            on_enter: Some(triggering_enter),
            on_exit: None,
            on_update: triggering_update,
        },
        StateDescriptor {
            id: StateId::Active,
            name: "Active",
            on_enter: Some(active_enter),
            on_exit: None,
            on_update: active_update,
        },
    ]
}

// ── Dormant ──────────────────────────────────────────────────────

fn dormant_update(ctx: &mut FsmContext) -> Option<StateId> {
    ctx.trigger_asserted.then_some(StateId::Triggering)
}

// ── Triggering ───────────────────────────────────────────────────

fn triggering_enter(ctx: &mut FsmContext) {
    ctx.press_start_ms = ctx.now_ms;
}

fn triggering_update(ctx: &mut FsmContext) -> Option<StateId> {
    if !ctx.trigger_asserted {
        info!("Maint trigger released after {} ms", ctx.held_for_ms());
        return Some(StateId::Dormant);
    }
    (ctx.held_for_ms() >= ctx.hold_ms).then_some(StateId::Active)
}

// ── Active ───────────────────────────────────────────────────────

fn active_enter(ctx: &mut FsmContext) {
    ctx.bring_up_requested = true;
}

fn active_update(_ctx: &mut FsmContext) -> Option<StateId> {
    None
}

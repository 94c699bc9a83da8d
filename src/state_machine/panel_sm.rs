//! Panel visibility state machine.
//!
//! ```text
//! Closed ──Open/Toggle──▶ Open
//!   ▲                       │
//!   └──Close/Toggle/Escape──┘
//! ```
//!
//! `Close` and `Escape` while closed are no-ops, as is `Open` while open.

use statig::prelude::*;
use tracing::info;

// ---------------------------------------------------------------------------
// Events
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PanelEvent {
    /// Launcher activated, or programmatic open.
    Open,
    /// Close button activated, or programmatic close.
    Close,
    Toggle,
    /// Escape key pressed anywhere in the host window.
    Escape,
}

// ---------------------------------------------------------------------------
// Shared storage
// ---------------------------------------------------------------------------

/// The machine carries no data beyond its state.
#[derive(Debug, Default)]
pub struct PanelMachine;

// ---------------------------------------------------------------------------
// State machine implementation
// ---------------------------------------------------------------------------

#[state_machine(
    initial = "State::closed()",
    state(derive(Debug, Clone, PartialEq))
)]
impl PanelMachine {
    /// Only the launcher is visible.
    #[state]
    fn closed(&mut self, event: &PanelEvent) -> Outcome<State> {
        match event {
            PanelEvent::Open | PanelEvent::Toggle => Transition(State::open()),
            PanelEvent::Close | PanelEvent::Escape => Handled,
        }
    }

    /// Panel visible, launcher hidden.
    #[state(entry_action = "enter_open", exit_action = "exit_open")]
    fn open(&mut self, event: &PanelEvent) -> Outcome<State> {
        match event {
            PanelEvent::Open => Handled,
            PanelEvent::Close | PanelEvent::Toggle | PanelEvent::Escape => {
                Transition(State::closed())
            }
        }
    }

    #[action]
    fn enter_open(&mut self) {
        info!(target: "panel", "panel opened");
    }

    #[action]
    fn exit_open(&mut self) {
        info!(target: "panel", "panel closed");
    }
}

pub fn is_open(state: &State) -> bool {
    matches!(state, State::Open {})
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn starts_closed() {
        let sm = PanelMachine::default().state_machine();
        assert_eq!(sm.state(), &State::Closed {});
    }

    #[test]
    fn toggle_flips_between_states() {
        let mut sm = PanelMachine::default().state_machine();
        sm.handle(&PanelEvent::Toggle);
        assert!(is_open(sm.state()));
        sm.handle(&PanelEvent::Toggle);
        assert!(!is_open(sm.state()));
    }

    #[test]
    fn repeated_events_keep_the_state() {
        let mut sm = PanelMachine::default().state_machine();
        sm.handle(&PanelEvent::Close);
        sm.handle(&PanelEvent::Escape);
        assert!(!is_open(sm.state()));

        sm.handle(&PanelEvent::Open);
        sm.handle(&PanelEvent::Open);
        assert!(is_open(sm.state()));

        sm.handle(&PanelEvent::Escape);
        sm.handle(&PanelEvent::Close);
        assert!(!is_open(sm.state()));
    }
}

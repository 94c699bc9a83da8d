//! Composer controls: the draft text field, the send button and input focus.
//!
//! While a dispatch is in flight the controls are locked: the field and the
//! button are disabled and draft edits are ignored. The lock is an RAII guard;
//! dropping it re-enables the controls and moves focus back to the field, so
//! every exit path from a dispatch releases it.

use std::sync::{Arc, Mutex};

use tracing::debug;

#[derive(Debug, Default)]
struct ControlsState {
    draft: String,
    locked: bool,
    focused: bool,
    /// Bumped on every focus request; the host moves the caret when it changes.
    focus_epoch: u64,
}

/// Read-only view of the controls for rendering.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ControlsSnapshot {
    pub draft: String,
    pub locked: bool,
    pub focused: bool,
    pub focus_epoch: u64,
}

#[derive(Clone, Default)]
pub struct InputControls {
    inner: Arc<Mutex<ControlsState>>,
}

impl InputControls {
    pub fn new() -> Self {
        Self::default()
    }

    fn with_state<R>(&self, f: impl FnOnce(&mut ControlsState) -> R) -> R {
        let mut state = self.inner.lock().unwrap_or_else(|p| p.into_inner());
        f(&mut state)
    }

    /// Lock the controls. Returns `None` if they are already locked.
    pub fn try_lock(&self) -> Option<InputLockGuard> {
        self.with_state(|state| {
            if state.locked {
                return None;
            }
            state.locked = true;
            debug!(target: "dispatch", "input locked");
            Some(InputLockGuard {
                controls: self.clone(),
            })
        })
    }

    pub fn is_locked(&self) -> bool {
        self.with_state(|state| state.locked)
    }

    /// Request keyboard focus on the text field.
    pub fn focus(&self) {
        self.with_state(|state| {
            state.focused = true;
            state.focus_epoch += 1;
        });
    }

    pub fn blur(&self) {
        self.with_state(|state| state.focused = false);
    }

    pub fn is_focused(&self) -> bool {
        self.with_state(|state| state.focused)
    }

    pub fn focus_epoch(&self) -> u64 {
        self.with_state(|state| state.focus_epoch)
    }

    pub fn draft(&self) -> String {
        self.with_state(|state| state.draft.clone())
    }

    /// Append typed or pasted text. Ignored while locked.
    pub fn insert_str(&self, text: &str) -> bool {
        self.with_state(|state| {
            if state.locked {
                return false;
            }
            state.draft.push_str(text);
            true
        })
    }

    /// Delete the last character. Ignored while locked.
    pub fn backspace(&self) -> bool {
        self.with_state(|state| !state.locked && state.draft.pop().is_some())
    }

    /// Replace the draft wholesale. Ignored while locked.
    pub fn set_draft(&self, text: &str) -> bool {
        self.with_state(|state| {
            if state.locked {
                return false;
            }
            state.draft = text.to_string();
            true
        })
    }

    pub fn clear_draft(&self) {
        self.with_state(|state| state.draft.clear());
    }

    pub fn snapshot(&self) -> ControlsSnapshot {
        self.with_state(|state| ControlsSnapshot {
            draft: state.draft.clone(),
            locked: state.locked,
            focused: state.focused,
            focus_epoch: state.focus_epoch,
        })
    }
}

/// Held for the duration of one dispatch.
#[must_use = "dropping the guard unlocks the controls immediately"]
pub struct InputLockGuard {
    controls: InputControls,
}

impl std::fmt::Debug for InputLockGuard {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("InputLockGuard")
    }
}

impl Drop for InputLockGuard {
    fn drop(&mut self) {
        self.controls.with_state(|state| {
            state.locked = false;
            state.focused = true;
            state.focus_epoch += 1;
        });
        debug!(target: "dispatch", "input unlocked");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn second_lock_is_refused() {
        let controls = InputControls::new();
        let guard = controls.try_lock();
        assert!(guard.is_some());
        assert!(controls.try_lock().is_none());
        drop(guard);
        assert!(controls.try_lock().is_some());
    }

    #[test]
    fn dropping_the_guard_unlocks_and_focuses() {
        let controls = InputControls::new();
        controls.blur();
        let epoch = controls.focus_epoch();
        {
            let _guard = controls.try_lock().unwrap();
            assert!(controls.is_locked());
        }
        assert!(!controls.is_locked());
        assert!(controls.is_focused());
        assert!(controls.focus_epoch() > epoch);
    }

    #[test]
    fn edits_are_ignored_while_locked() {
        let controls = InputControls::new();
        controls.insert_str("سلام");
        let guard = controls.try_lock().unwrap();
        assert!(!controls.insert_str("!"));
        assert!(!controls.backspace());
        assert!(!controls.set_draft("x"));
        assert_eq!(controls.draft(), "سلام");
        drop(guard);

        assert!(controls.backspace());
        assert_eq!(controls.draft(), "سلا");
    }

    #[test]
    fn clear_draft_empties_the_field_even_while_locked() {
        let controls = InputControls::new();
        controls.set_draft("hello");
        let _guard = controls.try_lock().expect("unlocked");
        controls.clear_draft();
        assert_eq!(controls.draft(), "");
    }
}

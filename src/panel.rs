//! Panel lifecycle: visibility, the first-open greeting and focus handoff.
//!
//! Opening is split in two. [`PanelLifecycle::begin_open`] runs the state
//! transition and the greeting gate right away; the returned [`Opening`] is
//! then settled asynchronously (welcome reveal, focus delay, focus). The gate
//! therefore closes at the first transition, not when the welcome finishes.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use statig::blocking::StateMachine;
use statig::prelude::*;
use tracing::{debug, info};

use crate::controls::InputControls;
use crate::conversation::{BotTextOptions, ConversationLog};
use crate::state_machine::panel_sm::{self, PanelEvent, PanelMachine};

/// Pause between the open transition and focusing the text field.
pub const FOCUS_DELAY: Duration = Duration::from_millis(50);

/// One-shot welcome gate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Greeting {
    NeverOpened,
    Greeted,
}

impl Greeting {
    /// `NeverOpened -> Greeted`. Returns `true` only for that transition.
    pub fn first_open(&mut self) -> bool {
        match self {
            Greeting::NeverOpened => {
                *self = Greeting::Greeted;
                true
            }
            Greeting::Greeted => false,
        }
    }
}

struct PanelInner {
    machine: StateMachine<PanelMachine>,
    greeting: Greeting,
}

#[derive(Clone)]
pub struct PanelLifecycle {
    inner: Arc<Mutex<PanelInner>>,
    welcome: Option<Arc<str>>,
    log: ConversationLog,
    controls: InputControls,
}

/// Remaining work of an `open()` whose transition already happened.
#[must_use = "an opening does nothing until settled"]
pub struct Opening {
    welcome: Option<Arc<str>>,
    log: ConversationLog,
    controls: InputControls,
}

impl Opening {
    /// Whether this opening will reveal the welcome text.
    pub fn greets(&self) -> bool {
        self.welcome.is_some()
    }

    /// Reveal the welcome (first open only), then focus the text field.
    pub async fn settle(self) {
        if let Some(text) = &self.welcome {
            self.log
                .append_bot_text(text, BotTextOptions::welcome())
                .await;
        }
        tokio::time::sleep(FOCUS_DELAY).await;
        self.controls.focus();
    }
}

impl PanelLifecycle {
    /// `welcome` is the configured greeting; blank text disables it.
    pub fn new(welcome: Option<&str>, log: ConversationLog, controls: InputControls) -> Self {
        let welcome = welcome
            .map(str::trim)
            .filter(|w| !w.is_empty())
            .map(Arc::from);
        Self {
            inner: Arc::new(Mutex::new(PanelInner {
                machine: PanelMachine::default().state_machine(),
                greeting: Greeting::NeverOpened,
            })),
            welcome,
            log,
            controls,
        }
    }

    fn with_inner<R>(&self, f: impl FnOnce(&mut PanelInner) -> R) -> R {
        let mut inner = self.inner.lock().unwrap_or_else(|p| p.into_inner());
        f(&mut inner)
    }

    /// Feed an event, returning whether the panel went from closed to open.
    fn handle(inner: &mut PanelInner, event: PanelEvent) -> bool {
        let was_open = panel_sm::is_open(inner.machine.state());
        inner.machine.handle(&event);
        !was_open && panel_sm::is_open(inner.machine.state())
    }

    /// Feed an opening event; returns `(opened, greet)`.
    fn open_with(&self, event: PanelEvent) -> (bool, bool) {
        self.with_inner(|inner| {
            let opened = Self::handle(inner, event);
            (opened, opened && inner.greeting.first_open())
        })
    }

    /// Open the panel now; the returned [`Opening`] finishes the job.
    pub fn begin_open(&self) -> Opening {
        let (_, greet) = self.open_with(PanelEvent::Open);
        self.opening(greet)
    }

    fn opening(&self, greet: bool) -> Opening {
        let welcome = if greet { self.welcome.clone() } else { None };
        if greet {
            info!(target: "panel", welcome = welcome.is_some(), "first open");
        }
        Opening {
            welcome,
            log: self.log.clone(),
            controls: self.controls.clone(),
        }
    }

    pub async fn open(&self) {
        self.begin_open().settle().await;
    }

    pub fn close(&self) {
        self.with_inner(|inner| {
            Self::handle(inner, PanelEvent::Close);
        });
    }

    /// Open when closed, close when open. Returns the opening, if any.
    pub fn toggle(&self) -> Option<Opening> {
        let (opened, greet) = self.open_with(PanelEvent::Toggle);
        opened.then(|| self.opening(greet))
    }

    /// Keyboard escape: closes only an open panel.
    pub fn escape(&self) {
        let closed = self.with_inner(|inner| {
            if !panel_sm::is_open(inner.machine.state()) {
                return false;
            }
            Self::handle(inner, PanelEvent::Escape);
            true
        });
        if closed {
            debug!(target: "panel", "closed by escape");
        }
    }

    pub fn is_open(&self) -> bool {
        self.with_inner(|inner| panel_sm::is_open(inner.machine.state()))
    }

    pub fn greeting(&self) -> Greeting {
        self.with_inner(|inner| inner.greeting)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::conversation::EntryKind;

    fn lifecycle(welcome: Option<&str>) -> (PanelLifecycle, ConversationLog, InputControls) {
        let log = ConversationLog::new();
        let controls = InputControls::new();
        let panel = PanelLifecycle::new(welcome, log.clone(), controls.clone());
        (panel, log, controls)
    }

    #[test]
    fn greeting_gate_fires_once() {
        let mut gate = Greeting::NeverOpened;
        assert!(gate.first_open());
        assert!(!gate.first_open());
        assert_eq!(gate, Greeting::Greeted);
    }

    #[tokio::test(start_paused = true)]
    async fn first_open_reveals_welcome_then_focuses() {
        let (panel, log, controls) = lifecycle(Some("  أهلاً بك  "));
        assert!(!controls.is_focused());

        panel.open().await;

        assert!(panel.is_open());
        let entries = log.snapshot();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].kind, EntryKind::Welcome);
        assert_eq!(entries[0].text, "أهلاً بك");
        assert!(entries[0].rendered_fully);
        assert!(controls.is_focused());
    }

    #[tokio::test(start_paused = true)]
    async fn welcome_is_rendered_at_most_once() {
        let (panel, log, _) = lifecycle(Some("hi"));
        panel.open().await;
        panel.open().await;
        panel.close();
        panel.open().await;
        assert_eq!(log.len(), 1);
        assert_eq!(panel.greeting(), Greeting::Greeted);
    }

    #[tokio::test(start_paused = true)]
    async fn overlapping_opens_greet_once() {
        let (panel, log, _) = lifecycle(Some("hello there"));
        let first = panel.begin_open();
        let second = panel.begin_open();
        assert!(first.greets());
        assert!(!second.greets());
        tokio::join!(first.settle(), second.settle());
        assert_eq!(log.len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn no_welcome_configured_means_empty_log() {
        let (panel, log, controls) = lifecycle(Some("   "));
        panel.open().await;
        assert!(log.is_empty());
        assert!(controls.is_focused());
        assert_eq!(panel.greeting(), Greeting::Greeted);
    }

    #[tokio::test(start_paused = true)]
    async fn focus_waits_for_the_delay() {
        let (panel, _, controls) = lifecycle(None);
        let opening = panel.begin_open();
        let task = tokio::spawn(opening.settle());
        tokio::time::sleep(Duration::from_millis(10)).await;
        assert!(!controls.is_focused());
        task.await.unwrap();
        assert!(controls.is_focused());
    }

    #[test]
    fn close_and_escape_are_idempotent() {
        let (panel, _, _) = lifecycle(None);
        panel.close();
        panel.escape();
        assert!(!panel.is_open());

        let _opening = panel.toggle();
        assert!(panel.is_open());
        panel.escape();
        assert!(!panel.is_open());
        panel.close();
        assert!(!panel.is_open());
    }

    #[test]
    fn toggle_alternates() {
        let (panel, _, _) = lifecycle(None);
        assert!(panel.toggle().is_some());
        assert!(panel.is_open());
        assert!(panel.toggle().is_none());
        assert!(!panel.is_open());
    }

    #[tokio::test(start_paused = true)]
    async fn toggle_greets_only_on_the_first_open() {
        let (panel, log, _) = lifecycle(Some("hello"));
        let first = panel.toggle().expect("toggle from closed opens");
        assert!(first.greets());
        first.settle().await;

        assert!(panel.toggle().is_none());
        let again = panel.toggle().expect("toggle from closed opens");
        assert!(!again.greets());
        again.settle().await;

        assert_eq!(log.len(), 1);
        assert_eq!(panel.greeting(), Greeting::Greeted);
    }
}

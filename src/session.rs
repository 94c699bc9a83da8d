//! The widget session: configuration, log, controls, panel and dispatcher
//! wired together, plus the command loop the host talks to.
//!
//! The host never awaits anything. It sends [`WidgetCommand`]s through a
//! [`WidgetHandle`]; the loop applies each command's synchronous part in order
//! and spawns the asynchronous tail (welcome reveal, dispatch) as its own task.
//! Rendering reads [`Widget::snapshot`] every frame.

use std::sync::Arc;

use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::config::WidgetConfig;
use crate::controls::{ControlsSnapshot, InputControls};
use crate::conversation::{ConversationLog, Message};
use crate::dispatcher::{DispatchOutcome, MessageDispatcher, Submission};
use crate::panel::{Opening, PanelLifecycle};
use crate::protocol::PageMeta;
use crate::transport::ReplyTransport;
use crate::visitor::VisitorId;

/// Everything the host needs to draw one frame.
#[derive(Debug, Clone)]
pub struct WidgetSnapshot {
    pub open: bool,
    pub messages: Vec<Message>,
    pub controls: ControlsSnapshot,
    pub scroll_epoch: u64,
}

pub struct Widget {
    config: Arc<WidgetConfig>,
    log: ConversationLog,
    controls: InputControls,
    panel: PanelLifecycle,
    dispatcher: MessageDispatcher,
}

impl Widget {
    pub fn new(
        config: WidgetConfig,
        visitor_id: VisitorId,
        transport: Arc<dyn ReplyTransport>,
    ) -> Self {
        let log = ConversationLog::new();
        let controls = InputControls::new();
        let panel = PanelLifecycle::new(config.welcome(), log.clone(), controls.clone());
        let dispatcher = MessageDispatcher::new(
            log.clone(),
            controls.clone(),
            transport,
            visitor_id,
            PageMeta::new(config.page_url.clone()),
        );
        info!(target: "panel", endpoint = %config.endpoint, "widget mounted");
        Self {
            config: Arc::new(config),
            log,
            controls,
            panel,
            dispatcher,
        }
    }

    pub fn config(&self) -> &WidgetConfig {
        &self.config
    }

    pub fn log(&self) -> &ConversationLog {
        &self.log
    }

    pub fn controls(&self) -> &InputControls {
        &self.controls
    }

    pub fn is_open(&self) -> bool {
        self.panel.is_open()
    }

    pub fn begin_open(&self) -> Opening {
        self.panel.begin_open()
    }

    pub async fn open(&self) {
        self.panel.open().await;
    }

    pub fn close(&self) {
        self.panel.close();
    }

    pub fn toggle(&self) -> Option<Opening> {
        self.panel.toggle()
    }

    pub fn escape(&self) {
        self.panel.escape();
    }

    pub fn begin_submit(&self, raw: &str) -> Submission {
        self.dispatcher.begin(raw)
    }

    pub async fn submit(&self, raw: &str) -> DispatchOutcome {
        self.dispatcher.submit(raw).await
    }

    pub fn begin_submit_draft(&self) -> Submission {
        self.dispatcher.begin_draft()
    }

    pub fn snapshot(&self) -> WidgetSnapshot {
        WidgetSnapshot {
            open: self.panel.is_open(),
            messages: self.log.snapshot(),
            controls: self.controls.snapshot(),
            scroll_epoch: self.log.scroll_epoch(),
        }
    }
}

// ---------------------------------------------------------------------------
// Command loop
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WidgetCommand {
    Open,
    Close,
    Toggle,
    Escape,
    Submit(String),
    /// Submit the current contents of the text field.
    SubmitDraft,
}

/// Cloneable sender of host commands.
#[derive(Clone)]
pub struct WidgetHandle {
    tx: mpsc::UnboundedSender<WidgetCommand>,
}

impl WidgetHandle {
    pub fn send(&self, command: WidgetCommand) {
        if self.tx.send(command).is_err() {
            warn!(target: "host", "widget command loop has stopped");
        }
    }

    pub fn open(&self) {
        self.send(WidgetCommand::Open);
    }

    pub fn close(&self) {
        self.send(WidgetCommand::Close);
    }

    pub fn toggle(&self) {
        self.send(WidgetCommand::Toggle);
    }

    pub fn escape(&self) {
        self.send(WidgetCommand::Escape);
    }

    pub fn submit(&self, text: impl Into<String>) {
        self.send(WidgetCommand::Submit(text.into()));
    }

    pub fn submit_draft(&self) {
        self.send(WidgetCommand::SubmitDraft);
    }
}

/// Start the command loop for `widget` on `runtime`.
///
/// The loop ends once every [`WidgetHandle`] has been dropped.
pub fn spawn_widget(runtime: &tokio::runtime::Handle, widget: Arc<Widget>) -> WidgetHandle {
    let (tx, rx) = mpsc::unbounded_channel();
    runtime.spawn(command_loop(widget, rx));
    WidgetHandle { tx }
}

async fn command_loop(widget: Arc<Widget>, mut rx: mpsc::UnboundedReceiver<WidgetCommand>) {
    while let Some(command) = rx.recv().await {
        debug!(target: "host", ?command, "widget command");
        match command {
            WidgetCommand::Open => {
                tokio::spawn(widget.begin_open().settle());
            }
            WidgetCommand::Close => widget.close(),
            WidgetCommand::Toggle => {
                if let Some(opening) = widget.toggle() {
                    tokio::spawn(opening.settle());
                }
            }
            WidgetCommand::Escape => widget.escape(),
            WidgetCommand::Submit(text) => spawn_submission(widget.begin_submit(&text)),
            WidgetCommand::SubmitDraft => spawn_submission(widget.begin_submit_draft()),
        }
    }
    debug!(target: "host", "widget command loop finished");
}

fn spawn_submission(submission: Submission) {
    if let Submission::Started(pending) = submission {
        tokio::spawn(pending.run());
    }
}

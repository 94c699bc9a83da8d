//! The request/response cycle for one outgoing message.
//!
//! [`MessageDispatcher::begin`] runs everything up to the network call
//! synchronously: it appends the user message, takes the input lock and shows
//! the typing placeholder. A second submission issued right after is therefore
//! refused even before the first request has left. [`PendingDispatch::run`]
//! does the rest and always ends with the lock released.

use std::sync::Arc;

use tracing::{debug, error, info, warn};

use crate::controls::{InputControls, InputLockGuard};
use crate::conversation::{BotTextOptions, ConversationLog, PlaceholderHandle};
use crate::protocol::{ERROR_REPLY, IncomingReply, OutgoingPayload, PageMeta};
use crate::transport::ReplyTransport;
use crate::visitor::VisitorId;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DispatchOutcome {
    /// Input was empty after trimming; nothing happened.
    Empty,
    /// Another dispatch holds the input lock; nothing happened.
    Busy,
    /// Reply rendered as `messages` assistant messages.
    Replied { messages: usize },
    /// The canned error message was rendered instead of a reply.
    Failed,
}

/// Result of the synchronous part of a submission.
pub enum Submission {
    Started(PendingDispatch),
    Declined(DispatchOutcome),
}

#[derive(Clone)]
pub struct MessageDispatcher {
    log: ConversationLog,
    controls: InputControls,
    transport: Arc<dyn ReplyTransport>,
    visitor_id: VisitorId,
    page: PageMeta,
}

impl MessageDispatcher {
    pub fn new(
        log: ConversationLog,
        controls: InputControls,
        transport: Arc<dyn ReplyTransport>,
        visitor_id: VisitorId,
        page: PageMeta,
    ) -> Self {
        Self {
            log,
            controls,
            transport,
            visitor_id,
            page,
        }
    }

    /// Start a dispatch for `raw`, up to the network call.
    pub fn begin(&self, raw: &str) -> Submission {
        let text = raw.trim();
        if text.is_empty() {
            return Submission::Declined(DispatchOutcome::Empty);
        }
        let Some(guard) = self.controls.try_lock() else {
            warn!(target: "dispatch", "submit ignored while a dispatch is in flight");
            return Submission::Declined(DispatchOutcome::Busy);
        };

        self.log.append_user(text);
        self.controls.clear_draft();
        let placeholder = self.log.append_bot_placeholder();
        info!(target: "dispatch", chars = text.chars().count(), "dispatch started");

        Submission::Started(PendingDispatch {
            payload: OutgoingPayload {
                text: text.to_string(),
                visitor_id: self.visitor_id.to_string(),
                meta: self.page.clone(),
            },
            typing: TypingIndicator {
                log: self.log.clone(),
                handle: Some(placeholder),
            },
            log: self.log.clone(),
            transport: Arc::clone(&self.transport),
            guard,
        })
    }

    /// Run a whole dispatch for `raw`.
    pub async fn submit(&self, raw: &str) -> DispatchOutcome {
        match self.begin(raw) {
            Submission::Started(pending) => pending.run().await,
            Submission::Declined(outcome) => outcome,
        }
    }

    /// Submit whatever is in the text field.
    pub fn begin_draft(&self) -> Submission {
        self.begin(&self.controls.draft())
    }
}

/// Typing placeholder of one dispatch; removed on drop if still shown.
struct TypingIndicator {
    log: ConversationLog,
    handle: Option<PlaceholderHandle>,
}

impl TypingIndicator {
    fn remove(&mut self) {
        if let Some(handle) = self.handle.take() {
            self.log.remove_placeholder(handle);
        }
    }
}

impl Drop for TypingIndicator {
    fn drop(&mut self) {
        if self.handle.is_some() {
            debug!(target: "dispatch", "dispatch abandoned, removing typing placeholder");
            self.remove();
        }
    }
}

/// A dispatch whose request has not been sent yet.
///
/// Dropping it (or cancelling the task running it) removes the typing
/// placeholder and releases the input lock.
#[must_use = "the input stays locked until the dispatch is run or dropped"]
pub struct PendingDispatch {
    payload: OutgoingPayload,
    typing: TypingIndicator,
    log: ConversationLog,
    transport: Arc<dyn ReplyTransport>,
    guard: InputLockGuard,
}

impl PendingDispatch {
    pub fn payload(&self) -> &OutgoingPayload {
        &self.payload
    }

    /// Send the request and render its outcome.
    ///
    /// Never fails: every error becomes the canned error message.
    pub async fn run(self) -> DispatchOutcome {
        let PendingDispatch {
            payload,
            mut typing,
            log,
            transport,
            guard,
        } = self;

        let reply = match transport.deliver(&payload).await {
            Ok(body) => IncomingReply::from_value(&body),
            Err(e) => Err(e),
        };

        typing.remove();

        let outcome = match reply {
            Ok(reply) => {
                let texts = reply.into_texts();
                for text in &texts {
                    log.append_bot_text(text, BotTextOptions::default()).await;
                }
                info!(target: "dispatch", messages = texts.len(), "dispatch replied");
                DispatchOutcome::Replied {
                    messages: texts.len(),
                }
            }
            Err(e) => {
                error!(target: "dispatch", "dispatch failed: {e}");
                log.append_bot_text(ERROR_REPLY, BotTextOptions::default())
                    .await;
                DispatchOutcome::Failed
            }
        };

        drop(guard);
        outcome
    }
}

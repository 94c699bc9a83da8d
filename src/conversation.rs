//! Conversation log: the ordered, append-only list of rendered messages.
//!
//! The log is shared between the controller tasks and the host's render loop.
//! Every append bumps `scroll_epoch`; the host scrolls its message list to the
//! end whenever the epoch changes. The only entry ever removed is the typing
//! placeholder, and removal requires the [`PlaceholderHandle`] returned when it
//! was inserted.

use std::sync::{Arc, Mutex};

use chrono::{DateTime, Utc};

use crate::typewriter::{self, DEFAULT_PACE_MS, RevealSurface};

pub type EntryId = u64;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    User,
    Assistant,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryKind {
    Text,
    /// First-open greeting, drawn with the assistant badge beside it.
    Welcome,
    /// Transient typing indicator; carries no text.
    Typing,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Message {
    pub id: EntryId,
    pub role: Role,
    pub kind: EntryKind,
    /// What is currently displayed; grows during a reveal.
    pub text: String,
    pub rendered_fully: bool,
    pub created_at: DateTime<Utc>,
}

/// Proof that a placeholder was inserted; consumed by its removal.
#[derive(Debug)]
#[must_use = "a placeholder must be removed once the reply resolves"]
pub struct PlaceholderHandle {
    id: EntryId,
}

impl PlaceholderHandle {
    pub fn id(&self) -> EntryId {
        self.id
    }
}

#[derive(Debug, Clone, Copy)]
pub struct BotTextOptions {
    /// Base pace in ms per character, clamped to 6..=30.
    pub pace_ms: u64,
    pub welcome: bool,
}

impl Default for BotTextOptions {
    fn default() -> Self {
        Self {
            pace_ms: DEFAULT_PACE_MS,
            welcome: false,
        }
    }
}

impl BotTextOptions {
    pub fn welcome() -> Self {
        Self {
            welcome: true,
            ..Self::default()
        }
    }
}

#[derive(Default)]
struct LogState {
    entries: Vec<Message>,
    next_id: EntryId,
    scroll_epoch: u64,
}

impl LogState {
    fn entry_mut(&mut self, id: EntryId) -> Option<&mut Message> {
        self.entries.iter_mut().rev().find(|m| m.id == id)
    }
}

/// Cloneable handle to the shared log.
#[derive(Clone, Default)]
pub struct ConversationLog {
    inner: Arc<Mutex<LogState>>,
}

impl ConversationLog {
    pub fn new() -> Self {
        Self::default()
    }

    fn with_state<R>(&self, f: impl FnOnce(&mut LogState) -> R) -> R {
        let mut state = self.inner.lock().unwrap_or_else(|p| p.into_inner());
        f(&mut state)
    }

    fn push(&self, role: Role, kind: EntryKind, text: String, rendered_fully: bool) -> EntryId {
        self.with_state(|state| {
            let id = state.next_id;
            state.next_id += 1;
            state.entries.push(Message {
                id,
                role,
                kind,
                text,
                rendered_fully,
                created_at: Utc::now(),
            });
            state.scroll_epoch += 1;
            id
        })
    }

    /// Append the visitor's message, shown immediately and in full.
    pub fn append_user(&self, text: &str) -> EntryId {
        self.push(Role::User, EntryKind::Text, text.to_string(), true)
    }

    /// Append the typing indicator.
    pub fn append_bot_placeholder(&self) -> PlaceholderHandle {
        let id = self.push(Role::Assistant, EntryKind::Typing, String::new(), false);
        PlaceholderHandle { id }
    }

    /// Remove a typing indicator. Returns `false` if it was already gone.
    pub fn remove_placeholder(&self, handle: PlaceholderHandle) -> bool {
        self.with_state(|state| {
            let before = state.entries.len();
            state
                .entries
                .retain(|m| !(m.id == handle.id && m.kind == EntryKind::Typing));
            state.entries.len() != before
        })
    }

    /// Append an assistant message and reveal `text` into it.
    ///
    /// Completes when the whole text is displayed.
    pub async fn append_bot_text(&self, text: &str, options: BotTextOptions) -> EntryId {
        let kind = if options.welcome {
            EntryKind::Welcome
        } else {
            EntryKind::Text
        };
        let id = self.push(Role::Assistant, kind, String::new(), false);

        let mut surface = EntrySurface {
            log: self.clone(),
            id,
        };
        typewriter::reveal(&mut surface, text, typewriter::clamp_base_pace(options.pace_ms))
            .await;

        self.with_state(|state| {
            if let Some(entry) = state.entry_mut(id) {
                entry.rendered_fully = true;
            }
        });
        id
    }

    /// Ask the host to scroll to the newest entry.
    pub fn scroll_to_end(&self) {
        self.with_state(|state| state.scroll_epoch += 1);
    }

    pub fn scroll_epoch(&self) -> u64 {
        self.with_state(|state| state.scroll_epoch)
    }

    pub fn snapshot(&self) -> Vec<Message> {
        self.with_state(|state| state.entries.clone())
    }

    pub fn len(&self) -> usize {
        self.with_state(|state| state.entries.len())
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn has_placeholder(&self) -> bool {
        self.with_state(|state| state.entries.iter().any(|m| m.kind == EntryKind::Typing))
    }
}

/// One log entry viewed as a reveal target.
struct EntrySurface {
    log: ConversationLog,
    id: EntryId,
}

impl RevealSurface for EntrySurface {
    fn clear(&mut self) {
        self.log.with_state(|state| {
            if let Some(entry) = state.entry_mut(self.id) {
                entry.text.clear();
            }
        });
    }

    fn push_char(&mut self, ch: char) {
        self.log.with_state(|state| {
            if let Some(entry) = state.entry_mut(self.id) {
                entry.text.push(ch);
            }
        });
    }

    fn scroll_into_view(&mut self) {
        self.log.scroll_to_end();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn user_messages_appear_instantly() {
        let log = ConversationLog::new();
        let epoch = log.scroll_epoch();
        log.append_user("hello");

        let entries = log.snapshot();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].role, Role::User);
        assert_eq!(entries[0].text, "hello");
        assert!(entries[0].rendered_fully);
        assert!(log.scroll_epoch() > epoch);
    }

    #[test]
    fn placeholder_is_removed_exactly_once() {
        let log = ConversationLog::new();
        log.append_user("q");
        let handle = log.append_bot_placeholder();
        assert!(log.has_placeholder());
        assert_eq!(log.snapshot()[1].kind, EntryKind::Typing);

        assert!(log.remove_placeholder(handle));
        assert!(!log.has_placeholder());
        assert_eq!(log.len(), 1);
    }

    #[test]
    fn ids_stay_unique_after_removal() {
        let log = ConversationLog::new();
        let handle = log.append_bot_placeholder();
        let removed_id = handle.id();
        log.remove_placeholder(handle);
        let next = log.append_user("x");
        assert_ne!(next, removed_id);
    }

    #[tokio::test(start_paused = true)]
    async fn bot_text_is_revealed_then_marked_complete() {
        let log = ConversationLog::new();
        let epoch = log.scroll_epoch();

        let id = log.append_bot_text("مرحبا", BotTextOptions::default()).await;

        let entries = log.snapshot();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].id, id);
        assert_eq!(entries[0].role, Role::Assistant);
        assert_eq!(entries[0].kind, EntryKind::Text);
        assert_eq!(entries[0].text, "مرحبا");
        assert!(entries[0].rendered_fully);
        // append + periodic scrolls + final scroll
        assert!(log.scroll_epoch() >= epoch + 3);
    }

    #[tokio::test(start_paused = true)]
    async fn welcome_option_tags_the_entry() {
        let log = ConversationLog::new();
        log.append_bot_text("أهلاً", BotTextOptions::welcome()).await;
        assert_eq!(log.snapshot()[0].kind, EntryKind::Welcome);
    }

    #[tokio::test(start_paused = true)]
    async fn partially_revealed_text_is_visible_mid_reveal() {
        let log = ConversationLog::new();
        let reveal_log = log.clone();
        let task = tokio::spawn(async move {
            reveal_log
                .append_bot_text("abcdefghij", BotTextOptions::default())
                .await
        });

        tokio::time::sleep(std::time::Duration::from_millis(45)).await;
        let mid = log.snapshot();
        assert_eq!(mid.len(), 1);
        assert!(!mid[0].rendered_fully);
        assert!(!mid[0].text.is_empty() && mid[0].text.len() < 10);
        assert!("abcdefghij".starts_with(&mid[0].text));

        task.await.unwrap();
        assert_eq!(log.snapshot()[0].text, "abcdefghij");
    }
}

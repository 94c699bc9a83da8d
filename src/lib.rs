//! mokhatt: session controller for an embeddable chat widget.
//!
//! A floating launcher opens a chat panel; the visitor's messages are POSTed
//! to a webhook and replies are revealed character by character. The
//! controller owns the panel lifecycle, the conversation log, the typewriter
//! reveal and the dispatch cycle. Rendering is left to the host (see the
//! `mokhatt-widget` binary), which reads [`session::Widget::snapshot`].

pub mod config;
pub mod controls;
pub mod conversation;
pub mod dispatcher;
pub mod escape;
pub mod logging;
pub mod panel;
pub mod paths;
pub mod protocol;
pub mod session;
pub mod state_machine;
pub mod transport;
pub mod typewriter;
pub mod visitor;

pub use config::WidgetConfig;
pub use session::{Widget, WidgetCommand, WidgetHandle, spawn_widget};

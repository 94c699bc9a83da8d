//! State machines driving the widget's UI modes.

pub mod panel_sm;

//! rubricon-export — standalone attempt report rendering.
//!
//! Turns a generated `AttemptReport` and its score summary into a single
//! self-contained HTML file.

pub mod html;

pub use html::{render_html, write_html_report};

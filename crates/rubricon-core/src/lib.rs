//! rubricon-core — Data model, scoring evaluator, and report assembly.
//!
//! This crate defines the fundamental entities, the scoring rules, and
//! the report section machinery that the entire rubricon system builds on.

pub mod error;
pub mod feedback;
pub mod model;
pub mod prompts;
pub mod report;
pub mod roles;
pub mod scoring;
pub mod summary;

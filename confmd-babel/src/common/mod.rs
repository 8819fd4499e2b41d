//! Format-agnostic building blocks used by both pipelines
//!
//! - `codec`: the comment micro-format carrying foreign constructs through Markdown
//! - `text`: inline normal form (whitespace, text merging, demotion)

pub mod codec;
pub mod text;

//! Markdown format tests
//!
//! Markdown → Document (import) and Document → Markdown (export).

mod export;
mod import;

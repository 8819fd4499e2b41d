//! Storage format tests
//!
//! Storage markup → Document (import) and Document → storage markup (export).

mod export;
mod import;

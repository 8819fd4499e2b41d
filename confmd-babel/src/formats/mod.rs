//! Format implementations
//!
//! - `storage`: Confluence storage format (parse + serialize)
//! - `markdown`: GitHub-flavored Markdown with comment extensions (parse + serialize)

pub mod markdown;
pub mod storage;

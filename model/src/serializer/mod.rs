//! Serializers for trace documents.
//!
//! - **JSON** ([`json`]): the document format emitted by trace-recording
//!   runtimes and used by the test fixtures.

pub mod json;

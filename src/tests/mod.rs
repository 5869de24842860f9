//! tests/mod.rs
mod support;

mod document_tests;
mod handler_tests;
mod import_tests;
mod search_tests;
mod sync_tests;

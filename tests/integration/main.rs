//! API integration tests: the production router on an ephemeral port, backed by
//! in-memory storage

mod api_tests;
mod common;

//! End-to-end tests for the fourslash harness.
//!
//! Each test serves a small TypeScript-flavoured language server over a
//! framed in-memory pipe and drives it through `QueryDriver`, so fixture
//! parsing, the wire codec and the matcher all run together.
//!
//! Run with: `cargo test --test e2e`
//!
//! Set FOURSLASH_LOG=debug to see driver and transport logs.

mod harness;

mod error_test;
mod hover_test;
mod lifecycle_test;

//! End-to-end test suite for the Chroma wallet engine.
//!
//! Tests run the wallet against [`helpers::MockIndexer`], an in-memory
//! ledger that verifies every input signature, spends inputs and indexes new
//! outputs, so multi-transaction flows such as funded issuance behave as they
//! would against a live indexer.

pub mod helpers;

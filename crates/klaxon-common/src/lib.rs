//! Shared domain types for the klaxon alerting engine.
//!
//! Every other crate in the workspace builds on the types defined here:
//! the [`types::Alert`] record and its lifecycle vocabulary, inbound event
//! payloads, and the process-wide ID generator.

pub mod clock;
pub mod id;
pub mod types;

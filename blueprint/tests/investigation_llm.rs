//! Investigation tests against a live OpenAI-compatible endpoint.
//!
//! These tests call a real model and are excluded from regular CI runs because
//! they need network access and API credentials.
//!
//! Run with: `cargo test -p blueprint --test investigation_llm -- --ignored`

#[path = "investigation/endpoint.rs"]
mod endpoint;

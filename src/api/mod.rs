//! Provider wire payloads.
//!
//! Each submodule mirrors one provider's HTTP API closely enough to build
//! requests and decode the fields we consume; everything else is ignored.

pub mod anthropic;
pub mod google;
pub mod openai;

//! LLM Provider implementations for CarnaticGuru.
//!
//! All providers implement the `carnaticguru_core::Provider` trait.
//! The router selects the correct provider based on configuration.

pub mod openai_compat;
pub mod router;

pub use openai_compat::{OpenAiCompatProvider, classify_error};
pub use router::{ProviderRouter, build_from_config};

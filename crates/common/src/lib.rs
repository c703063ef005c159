//! Shared types, error context helpers, and lifecycle notifications used
//! across all parley crates.

pub mod error;
pub mod hooks;
pub mod types;

pub use {
    error::FromMessage,
    types::{ResponseMap, Validation, WizardContext},
};

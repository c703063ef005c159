//! Built-in response validators.
//!
//! Every factory returns a [`Validator`]: a shareable predicate over a
//! response value that either accepts it or rejects it with a user-facing
//! message. Values that are not of the expected JSON type are rejected.

pub mod compose;
pub mod numeric;
pub mod text;

use std::sync::Arc;

use {parley_common::Validation, serde_json::Value};

pub use {
    compose::{combine, one_of},
    numeric::{RangeOptions, range},
    text::{
        EmailOptions, LengthOptions, PhoneOptions, RegexOptions, UrlOptions, email, length, phone,
        regex, url,
    },
};

/// A response predicate.
pub type Validator = Arc<dyn Fn(&Value) -> Validation + Send + Sync>;

/// Wrap a closure as a [`Validator`].
pub fn validator<F>(f: F) -> Validator
where
    F: Fn(&Value) -> Validation + Send + Sync + 'static,
{
    Arc::new(f)
}

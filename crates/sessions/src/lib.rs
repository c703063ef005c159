//! Session snapshots for suspending and resuming wizard runs.
//!
//! A [`SessionSnapshot`] is the serializable projection of a run. Durability is
//! owned by a pluggable [`SessionStore`] ([`MemorySessionStore`] and
//! [`FileSessionStore`] ship here); [`SessionRepository`] layers an
//! in-process [`SessionCache`] in front of it.

pub mod cache;
pub mod error;
pub mod file;
pub mod snapshot;
pub mod store;

pub use {
    cache::{SessionCache, SessionRepository},
    error::{Error, Result},
    file::FileSessionStore,
    snapshot::{SessionSnapshot, generate_session_id, now_ms},
    store::{MemorySessionStore, SessionStore},
};

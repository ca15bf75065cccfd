// src/store/mod.rs
//! Durable state: resumption cursors and OAuth credentials.
//!
//! Both stores are single JSON files replaced atomically. A file that
//! exists but does not parse is reported as corrupt, never reset.

mod atomic;
pub mod credentials;
pub mod cursor;

pub use credentials::{CredentialSet, CredentialStore};
pub use cursor::{CursorState, CursorStore};

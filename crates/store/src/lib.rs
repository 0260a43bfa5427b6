//! Durable session storage for the agent runtime kernel.
//!
//! Owns on-disk durability exclusively: every event appended to a session is
//! persisted atomically alongside the state-delta it carries, and a session's
//! full ordered history is reconstructed on demand from here.

pub mod store;

pub use store::{LoadedSession, SessionStore};

//! Search state, its shareable address, and debounced query issuing.

pub mod generation;
pub mod synchronizer;
pub mod url_state;

pub use generation::RequestGeneration;
pub use synchronizer::{Change, Effect, SyncHandle, Synchronizer, spawn};
pub use url_state::SearchState;

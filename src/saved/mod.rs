//! Per-user saved countries, their persistence, and session mirroring.

pub mod session;
pub mod storage;
pub mod store;

pub use session::{SessionMirror, SessionSnapshot, SessionStore};
pub use storage::{FileKvStore, KvStore, MemoryKvStore};
pub use store::{Identity, MutationOutcome, SavedCountries, UserId};

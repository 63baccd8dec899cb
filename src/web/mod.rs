//! JSON API over the country directory, saved countries and sessions.

pub mod countries;
pub mod error;
pub mod identity;
pub mod middleware;
pub mod routes;
pub mod saved;
pub mod session;
pub mod status;

pub use routes::*;

//! Warehouse monitor service library.
//!
//! Exposes config, state, logging and routes so integration tests and the
//! binary entrypoint can both access them.

pub mod config;
pub mod logging;
pub mod router;
pub mod routes;
pub mod state;

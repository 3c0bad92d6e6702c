//! Pinmark API server library.
//!
//! Exposes the building blocks (config, state, error handling, the fetch
//! relay and proxy orchestrator, routes) so integration tests and the binary
//! entrypoint share them.

pub mod config;
pub mod error;
pub mod handlers;
pub mod orchestrator;
pub mod relay;
pub mod response;
pub mod router;
pub mod routes;
pub mod state;

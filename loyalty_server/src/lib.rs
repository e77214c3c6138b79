//! # Loyalty server
//! This crate hosts the process around the loyalty engine. It is responsible for:
//! * Reading the configuration from the environment.
//! * Opening (and migrating) the loyalty database.
//! * Resolving customer identities against the auth provider.
//! * Running the shadow balance expiration worker until the process is asked to stop.
//!
//! ## Configuration
//! The server is configured via environment variables. See [config](config/index.html) for more information.

pub mod cli;
pub mod config;
pub mod errors;
pub mod expiry_worker;
pub mod identity;
pub mod server;

//! Thin HTTP client for the remote API.
//!
//! One method per entity operation, no internal retries: retry policy
//! belongs to the sync engine, and no local state is touched here.

mod client;

pub use client::{check_server, RemoteClient, RemoteCollection, RemoteError};

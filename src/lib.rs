//! homevault - self-hosted per-user file storage
//!
//! Registers accounts with their own storage principal and bucket, issues
//! access/refresh tokens, and runs every file operation on a connection
//! scoped to the caller's bucket.

pub mod auth;
pub mod cli;
pub mod file_storage;
pub mod http_server;
pub mod migrations;
pub mod observability;
pub mod provisioning;

//! # Schema Migrations
//!
//! Versioned DDL for the account store. The migration list is an ordered,
//! immutable slice handed to [`MigrationRunner`]; the runner records applied
//! versions in a `migrations` ledger table on the target.

pub mod errors;
pub mod runner;

pub use errors::{MigrationError, MigrationResult};
pub use runner::{
    Direction, InMemorySchemaTarget, MigrationRunner, PlannedStep, SchemaTarget, SchemaVersioning,
};

/// One schema change and its inverse
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Migration {
    pub version: u32,
    pub description: &'static str,
    pub up: &'static str,
    pub down: &'static str,
}

/// Ledger of applied versions
pub const LEDGER_TABLE_DDL: &str = "CREATE TABLE IF NOT EXISTS migrations (
    id SERIAL PRIMARY KEY,
    version INT NOT NULL UNIQUE,
    applied_at TIMESTAMP DEFAULT (now() AT TIME ZONE 'UTC')
);";

/// Migrations for the `users` table, oldest first
pub static USERS_MIGRATIONS: &[Migration] = &[
    Migration {
        version: 1,
        description: "Create users table",
        up: "CREATE TABLE IF NOT EXISTS users (
    id SERIAL PRIMARY KEY,
    user_name VARCHAR(100) NOT NULL UNIQUE,
    password_hash VARCHAR(255) NOT NULL,
    email VARCHAR(255) NOT NULL UNIQUE,
    minio_bucket_name VARCHAR(255) NOT NULL UNIQUE,
    created_at TIMESTAMP DEFAULT (now() AT TIME ZONE 'UTC'),
    updated_at TIMESTAMP DEFAULT (now() AT TIME ZONE 'UTC')
);",
        down: "DROP TABLE IF EXISTS users;",
    },
    Migration {
        version: 2,
        description: "Add storage access and secret key columns",
        up: "ALTER TABLE users ADD COLUMN IF NOT EXISTS minio_access_key VARCHAR(255), \
             ADD COLUMN IF NOT EXISTS minio_secret_key VARCHAR(255);",
        down: "ALTER TABLE users DROP COLUMN IF EXISTS minio_access_key, \
               DROP COLUMN IF EXISTS minio_secret_key;",
    },
];

//! Observable events
//!
//! Every log line the service emits names one of these events.

use std::fmt;

use super::logger::{Logger, Severity};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Event {
    // Lifecycle
    ConfigLoaded,
    Serving,
    ServerFailed,

    // Provisioning
    AccountProvisioned,
    ProvisioningRejected,
    CompensationRan,
    CompensationFailed,
    CredentialsLeftLive,

    // Tokens
    TokenPairIssued,
    TokenRejected,
    LoginRejected,

    // Scoped file access
    ScopedConnectionOpened,
    ScopedConnectionFailed,
    CredentialsUnresolved,

    // Schema
    MigrationApplied,
    MigrationReverted,
}

impl Event {
    /// Returns the string representation of the event
    pub fn as_str(&self) -> &'static str {
        match self {
            Event::ConfigLoaded => "CONFIG_LOADED",
            Event::Serving => "HOMEVAULT_SERVING",
            Event::ServerFailed => "HOMEVAULT_SERVER_FAILED",

            Event::AccountProvisioned => "ACCOUNT_PROVISIONED",
            Event::ProvisioningRejected => "PROVISIONING_REJECTED",
            Event::CompensationRan => "COMPENSATION_RAN",
            Event::CompensationFailed => "COMPENSATION_FAILED",
            Event::CredentialsLeftLive => "STORAGE_CREDENTIALS_LEFT_LIVE",

            Event::TokenPairIssued => "TOKEN_PAIR_ISSUED",
            Event::TokenRejected => "TOKEN_REJECTED",
            Event::LoginRejected => "LOGIN_REJECTED",

            Event::ScopedConnectionOpened => "SCOPED_CONNECTION_OPENED",
            Event::ScopedConnectionFailed => "SCOPED_CONNECTION_FAILED",
            Event::CredentialsUnresolved => "CREDENTIALS_UNRESOLVED",

            Event::MigrationApplied => "MIGRATION_APPLIED",
            Event::MigrationReverted => "MIGRATION_REVERTED",
        }
    }

    /// Default severity for this event
    pub fn severity(&self) -> Severity {
        match self {
            Event::TokenPairIssued | Event::ScopedConnectionOpened => Severity::Trace,
            Event::ProvisioningRejected
            | Event::TokenRejected
            | Event::LoginRejected
            | Event::CredentialsUnresolved => Severity::Warn,
            Event::CompensationFailed
            | Event::CredentialsLeftLive
            | Event::ScopedConnectionFailed => Severity::Error,
            Event::ServerFailed => Severity::Fatal,
            _ => Severity::Info,
        }
    }

    /// Emit this event at its default severity
    pub fn emit(&self, fields: &[(&str, &str)]) {
        Logger::log(self.severity(), self.as_str(), fields);
    }
}

impl fmt::Display for Event {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

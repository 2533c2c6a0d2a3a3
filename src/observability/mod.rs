//! Observability for homevault
//!
//! Structured JSON logging with typed events. Logging is synchronous and has no
//! side effects on the operation being observed.
//!
//! ```ignore
//! use homevault::observability::{Event, ObservationScope};
//!
//! Event::AccountProvisioned.emit(&[("account_id", "42")]);
//!
//! let scope = ObservationScope::new("PROVISIONING");
//! // ... do work ...
//! scope.complete(&[]);
//! ```

mod events;
mod logger;
mod scope;

pub use events::Event;
pub use logger::{Logger, Severity};
pub use scope::ObservationScope;

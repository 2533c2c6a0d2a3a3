//! # Provisioning Module
//!
//! Account registration across the credential store and the storage backend.

pub mod errors;
pub mod saga;

pub use errors::{ProvisioningError, ProvisioningResult};
pub use saga::{tenant_identity, ProvisioningSaga, TENANT_PREFIX};

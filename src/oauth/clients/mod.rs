//! OAuth client management.
//!
//! Holds the bootstrap client registry built from configuration.

pub mod registry;

// Re-export main types
pub use registry::ClientRegistry;

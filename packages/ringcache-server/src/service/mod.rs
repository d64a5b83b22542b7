//! Process-wide singleton lifecycle.

pub mod registry;

pub use registry::{ManagedService, ServiceRegistry};

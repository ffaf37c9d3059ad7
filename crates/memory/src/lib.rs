//! Session store implementations for MedBridge.

pub mod in_memory;

pub use in_memory::InMemorySessionStore;

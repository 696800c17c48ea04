//! In-process adapters for the domain ports.

pub mod memory_store;

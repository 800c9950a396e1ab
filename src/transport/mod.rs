//! Transport implementations.
//!
//! This module provides concrete implementations of the domain-level
//! `Transport` trait, exposed only through constructor functions.
//!
//! Domain code must not depend on transport-specific types.

mod memory;

#[cfg(unix)]
mod fifo;

#[cfg(unix)]
pub use fifo::create_fifo_transport;

pub use memory::{create_memory_transport, create_memory_transport_with_hub, MemoryHub};

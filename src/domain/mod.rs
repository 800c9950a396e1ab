//! Domain layer public interface.
//!
//! The channel code talks to endpoints only through the types exported
//! here. Concrete transports live in `crate::transport` and are reached
//! through their constructor functions.

mod transport;

// --- Transport domain re-exports ---

pub use transport::{
    //
    Address,
    ClaimMode,
    Listener,
    Transport,
    TransportPtr,
};

//! Protocol types for request/response correlation and framing
//!
//! This module defines the wire format for request/response messages,
//! the terminator framing shared by every transport, and correlation ID
//! allocation.

mod correlation;
mod frame;
mod message;

pub use correlation::{CorrelationId, IdAllocator};
pub use frame::{encode_frame, FrameBuffer, TERMINATOR};
pub use message::{RequestMessage, ResponseMessage};

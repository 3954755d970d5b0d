//! Raw TCP transfer to the processing server.
//!
//! # Wire Format
//!
//! There is none beyond the byte stream itself:
//!
//! ```text
//! client -> server : payload bytes, then half-close (FIN)
//! server -> client : reply bytes,   then half-close (FIN)
//! ```
//!
//! No length prefix, no checksum. Both ends rely on the half-close to know the
//! message is complete, so a counterpart that never closes its write side
//! leaves the client waiting.
//!
//! - **Client**: `TransferClient`, one connection per call
//! - **Echo server**: `EchoServer`, the reference counterpart used in tests

pub mod client;
pub mod echo;

pub use client::{TransferClient, TransferReport, TransferSource};
pub use echo::EchoServer;

//! # Ports Module
//!
//! Hexagonal architecture ports: the typed contract API callers program
//! against (inbound) and the external collaborators the session depends on
//! (outbound).

pub mod inbound;
pub mod outbound;

pub use inbound::*;
pub use outbound::*;

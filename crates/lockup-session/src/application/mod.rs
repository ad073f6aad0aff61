//! # Application Module
//!
//! Contract handles and the session that owns them.

pub mod contract;
pub mod session;

pub use contract::{ContractHandle, LockupContract};
pub use session::{Session, SessionBackends};

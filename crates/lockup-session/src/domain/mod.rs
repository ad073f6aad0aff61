//! # Domain Module
//!
//! Core types of the session facade: the error taxonomy, identities and
//! account ids, the capability model, contract records, and key material.

pub mod capability;
pub mod entities;
pub mod errors;
pub mod keys;
pub mod value_objects;

pub use capability::*;
pub use entities::*;
pub use errors::*;
pub use keys::*;
pub use value_objects::*;

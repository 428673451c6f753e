//! STRATA Core Types
//!
//! This crate contains pure types and logic with no I/O.
//! Member identity, collection descriptors, the error taxonomy and
//! member configuration live here so every other crate agrees on them.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod config;
pub mod descriptor;
pub mod error;
pub mod id;

// Re-exports
pub use config::{Endpoint, MemberConfig};
pub use descriptor::{
    validate_name, CollectionDescriptor, CollectionKind, GridKey, GridValue, TypeDescriptor,
};
pub use error::{GridError, GridResult};
pub use id::MemberId;

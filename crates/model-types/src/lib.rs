//! Shared types for the model-builder workspace.
//!
//! This crate provides the opaque handles every other crate in the workspace
//! passes around:
//!
//! - [`Namespace`] - the logical category an id/value pair belongs to
//! - [`Key`] - a type-erased, hashable identifier
//! - [`Value`] - a type-erased, shared entity handle
//! - [`BuildError`] - engine-level failures (configuration, reentrancy, merge mismatch)
//!
//! The [`env_utils`] module holds the environment parsing helpers used by the
//! configuration structs.

pub mod env_utils;
pub mod error;
pub mod key;
pub mod namespace;
pub mod value;

pub use error::BuildError;
pub use key::{Key, KeyType};
pub use namespace::Namespace;
pub use value::Value;

//! Core types for Vastra.
//!
//! This module provides type-safe wrappers for common domain concepts.

pub mod email;
pub mod id;
pub mod lifecycle;
pub mod principal;
pub mod status;

pub use email::{Email, EmailError};
pub use id::*;
pub use lifecycle::Lifecycle;
pub use principal::PrincipalKind;
pub use status::*;

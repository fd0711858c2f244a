//! Vastra Core - Shared domain types and order rules.
//!
//! This crate provides the types and pure business rules used by every
//! Vastra component:
//! - `api` - REST API serving the storefront and the admin panel
//! - `cli` - Command-line tools for migrations, seeding and panel users
//!
//! # Architecture
//!
//! The core crate contains only types and rules - no I/O, no database access,
//! no HTTP clients. Database encodings are derived behind the `postgres`
//! feature so the rules can be used (and tested) anywhere.
//!
//! # Modules
//!
//! - [`types`] - Newtype IDs, emails, lifecycle and payment statuses
//! - [`pricing`] - Order totals (taxable amount, tax, round-off)
//! - [`inventory`] - SKU stock counters and the `sold <= quantity` rule
//! - [`checkout`] - Selecting which requested lines can be ordered
//! - [`permission`] - Back-office permission keys

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod checkout;
pub mod inventory;
pub mod permission;
pub mod pricing;
pub mod types;

pub use checkout::{CheckoutError, CheckoutLine, CheckoutSelection, LineCandidate};
pub use inventory::{StockError, StockLevel};
pub use permission::{Access, Module, PermissionKey};
pub use pricing::{OrderTotals, PricedLine};
pub use types::*;

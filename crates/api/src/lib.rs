//! Vastra API library.
//!
//! The storefront and admin REST API as a library, so the router, the
//! repositories and the order workflow can be tested and reused by the
//! CLI and the integration tests.

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod config;
pub mod db;
pub mod error;
pub mod middleware;
pub mod models;
pub mod routes;
pub mod services;
pub mod state;

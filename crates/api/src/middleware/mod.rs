//! HTTP middleware stack.
//!
//! # Middleware Order (bottom to top in Router)
//!
//! 1. Sentry layers (hub per request, transaction per route)
//! 2. `TraceLayer` (request tracing)
//! 3. Request ID (add unique ID to each request)
//! 4. CORS
//! 5. Rate limiting (governor), per route group
//!
//! Authentication is done by extractors rather than layers, so each
//! handler states which principal it needs.

pub mod auth;
pub mod rate_limit;
pub mod request_id;

pub use auth::{Principal, RequireCustomer, RequirePanelUser};
pub use rate_limit::{InvalidRateLimit, api_rate_limiter, auth_rate_limiter};
pub use request_id::request_id_middleware;

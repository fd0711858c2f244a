//! Business logic services.
//!
//! # Services
//!
//! - `auth` - Passwords, bearer tokens and password resets
//! - `email` - Transactional email (password reset links)
//! - `orders` - Order placement and payment settlement
//! - `payment` - Payment gateway client and signature checks
//! - `storage` - Product image files

pub mod auth;
pub mod email;
pub mod orders;
pub mod payment;
pub mod storage;

pub use auth::{AuthError, AuthService, TokenService};
pub use email::EmailService;
pub use orders::{OrderError, OrderService, OrderSource};
pub use payment::{PaymentError, PaymentGateway};
pub use storage::{ImageStorage, StorageError};

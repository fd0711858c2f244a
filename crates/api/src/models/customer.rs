//! Customer domain types.

use chrono::{DateTime, Utc};
use serde::Serialize;

use vastra_core::{CustomerId, Email, Lifecycle};

/// A storefront customer.
#[derive(Debug, Clone, Serialize)]
pub struct Customer {
    pub id: CustomerId,
    pub name: String,
    pub email: Email,
    pub phone: Option<String>,
    pub lifecycle: Lifecycle,
    pub created_at: DateTime<Utc>,
}

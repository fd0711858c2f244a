//! Customer address repository.

use chrono::{DateTime, Utc};
use sqlx::PgPool;

use vastra_core::{AddressId, CustomerId, Lifecycle};

use super::RepositoryError;
use crate::models::{Address, AddressInput};

/// Country stored when the client sends none.
const DEFAULT_COUNTRY: &str = "India";

const ADDRESS_COLUMNS: &str = "id, customer_id, name, phone, line1, line2, city, state,
    postal_code, country, lifecycle, created_at";

#[derive(Debug, sqlx::FromRow)]
struct AddressRow {
    id: i32,
    customer_id: i32,
    name: String,
    phone: String,
    line1: String,
    line2: Option<String>,
    city: String,
    state: String,
    postal_code: String,
    country: String,
    lifecycle: Lifecycle,
    created_at: DateTime<Utc>,
}

impl From<AddressRow> for Address {
    fn from(row: AddressRow) -> Self {
        Self {
            id: AddressId::new(row.id),
            customer_id: CustomerId::new(row.customer_id),
            name: row.name,
            phone: row.phone,
            line1: row.line1,
            line2: row.line2,
            city: row.city,
            state: row.state,
            postal_code: row.postal_code,
            country: row.country,
            lifecycle: row.lifecycle,
            created_at: row.created_at,
        }
    }
}

/// Repository for customer addresses. Every query is scoped to the owner.
pub struct AddressRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> AddressRepository<'a> {
    /// Create a new address repository.
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// The customer's active addresses, newest first.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn list(&self, customer_id: CustomerId) -> Result<Vec<Address>, RepositoryError> {
        let rows = sqlx::query_as::<_, AddressRow>(&format!(
            "SELECT {ADDRESS_COLUMNS} FROM shop.address
             WHERE customer_id = $1 AND lifecycle = 'active'
             ORDER BY created_at DESC, id DESC"
        ))
        .bind(customer_id)
        .fetch_all(self.pool)
        .await?;

        Ok(rows.into_iter().map(Address::from).collect())
    }

    /// An active address owned by the customer.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn get_active(
        &self,
        customer_id: CustomerId,
        id: AddressId,
    ) -> Result<Option<Address>, RepositoryError> {
        let row = sqlx::query_as::<_, AddressRow>(&format!(
            "SELECT {ADDRESS_COLUMNS} FROM shop.address
             WHERE id = $1 AND customer_id = $2 AND lifecycle = 'active'"
        ))
        .bind(id)
        .bind(customer_id)
        .fetch_optional(self.pool)
        .await?;

        Ok(row.map(Address::from))
    }

    /// Create an address.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the insert fails.
    pub async fn create(
        &self,
        customer_id: CustomerId,
        input: &AddressInput,
    ) -> Result<Address, RepositoryError> {
        let row = sqlx::query_as::<_, AddressRow>(&format!(
            "INSERT INTO shop.address
                 (customer_id, name, phone, line1, line2, city, state, postal_code, country)
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
             RETURNING {ADDRESS_COLUMNS}"
        ))
        .bind(customer_id)
        .bind(&input.name)
        .bind(&input.phone)
        .bind(&input.line1)
        .bind(input.line2.as_deref())
        .bind(&input.city)
        .bind(&input.state)
        .bind(&input.postal_code)
        .bind(input.country.as_deref().unwrap_or(DEFAULT_COUNTRY))
        .fetch_one(self.pool)
        .await?;

        Ok(row.into())
    }

    /// Replace an active address's fields.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the address isn't the
    /// customer's or is deleted.
    pub async fn update(
        &self,
        customer_id: CustomerId,
        id: AddressId,
        input: &AddressInput,
    ) -> Result<Address, RepositoryError> {
        sqlx::query_as::<_, AddressRow>(&format!(
            "UPDATE shop.address SET
                 name = $3, phone = $4, line1 = $5, line2 = $6, city = $7, state = $8,
                 postal_code = $9, country = $10, updated_at = now()
             WHERE id = $1 AND customer_id = $2 AND lifecycle = 'active'
             RETURNING {ADDRESS_COLUMNS}"
        ))
        .bind(id)
        .bind(customer_id)
        .bind(&input.name)
        .bind(&input.phone)
        .bind(&input.line1)
        .bind(input.line2.as_deref())
        .bind(&input.city)
        .bind(&input.state)
        .bind(&input.postal_code)
        .bind(input.country.as_deref().unwrap_or(DEFAULT_COUNTRY))
        .fetch_optional(self.pool)
        .await?
        .map(Address::from)
        .ok_or(RepositoryError::NotFound)
    }

    /// Soft-delete an address. Orders keep their own snapshot.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the address isn't the
    /// customer's or is already deleted.
    pub async fn soft_delete(
        &self,
        customer_id: CustomerId,
        id: AddressId,
    ) -> Result<(), RepositoryError> {
        let result = sqlx::query(
            "UPDATE shop.address SET lifecycle = 'deleted', updated_at = now()
             WHERE id = $1 AND customer_id = $2 AND lifecycle <> 'deleted'",
        )
        .bind(id)
        .bind(customer_id)
        .execute(self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound);
        }
        Ok(())
    }
}

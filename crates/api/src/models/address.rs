//! Customer address types.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use vastra_core::{AddressId, CustomerId, Lifecycle};

/// A stored shipping address.
#[derive(Debug, Clone, Serialize)]
pub struct Address {
    pub id: AddressId,
    pub customer_id: CustomerId,
    pub name: String,
    pub phone: String,
    pub line1: String,
    pub line2: Option<String>,
    pub city: String,
    pub state: String,
    pub postal_code: String,
    pub country: String,
    pub lifecycle: Lifecycle,
    pub created_at: DateTime<Utc>,
}

/// Body of address create/update requests.
#[derive(Debug, Clone, Deserialize)]
pub struct AddressInput {
    pub name: String,
    pub phone: String,
    pub line1: String,
    pub line2: Option<String>,
    pub city: String,
    pub state: String,
    pub postal_code: String,
    pub country: Option<String>,
}

impl AddressInput {
    /// Trim fields and check the required ones are present.
    ///
    /// # Errors
    ///
    /// Returns the name of the first missing field.
    pub fn normalized(self) -> Result<Self, &'static str> {
        fn required(value: String, field: &'static str) -> Result<String, &'static str> {
            let value = value.trim().to_string();
            if value.is_empty() {
                Err(field)
            } else {
                Ok(value)
            }
        }

        Ok(Self {
            name: required(self.name, "name")?,
            phone: required(self.phone, "phone")?,
            line1: required(self.line1, "line1")?,
            line2: self
                .line2
                .map(|l| l.trim().to_string())
                .filter(|l| !l.is_empty()),
            city: required(self.city, "city")?,
            state: required(self.state, "state")?,
            postal_code: required(self.postal_code, "postal_code")?,
            country: self
                .country
                .map(|c| c.trim().to_string())
                .filter(|c| !c.is_empty()),
        })
    }
}

/// Address copied onto an order at checkout.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AddressSnapshot {
    pub name: String,
    pub phone: String,
    pub line1: String,
    pub line2: Option<String>,
    pub city: String,
    pub state: String,
    pub postal_code: String,
    pub country: String,
}

impl From<&Address> for AddressSnapshot {
    fn from(a: &Address) -> Self {
        Self {
            name: a.name.clone(),
            phone: a.phone.clone(),
            line1: a.line1.clone(),
            line2: a.line2.clone(),
            city: a.city.clone(),
            state: a.state.clone(),
            postal_code: a.postal_code.clone(),
            country: a.country.clone(),
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn input() -> AddressInput {
        AddressInput {
            name: " Ravi Kumar ".to_string(),
            phone: "9876543210".to_string(),
            line1: "12 MG Road".to_string(),
            line2: Some("  ".to_string()),
            city: "Bengaluru".to_string(),
            state: "Karnataka".to_string(),
            postal_code: "560001".to_string(),
            country: None,
        }
    }

    #[test]
    fn test_normalized_trims_and_drops_blank_optionals() {
        let a = input().normalized().unwrap();
        assert_eq!(a.name, "Ravi Kumar");
        assert_eq!(a.line2, None);
        assert_eq!(a.country, None);
    }

    #[test]
    fn test_normalized_reports_missing_field() {
        let mut a = input();
        a.city = "   ".to_string();
        assert_eq!(a.normalized().unwrap_err(), "city");
    }
}

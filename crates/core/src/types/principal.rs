//! Principal kinds.
//!
//! Customers and panel users are separate entities with separate tables,
//! tokens and permission models. The kind travels in the token audience so
//! a customer token can never be replayed against the admin API.

use serde::{Deserialize, Serialize};

/// Which kind of principal a token was issued to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PrincipalKind {
    Customer,
    Panel,
}

impl PrincipalKind {
    /// Token audience string for this kind.
    #[must_use]
    pub const fn audience(self) -> &'static str {
        match self {
            Self::Customer => "vastra-customer",
            Self::Panel => "vastra-panel",
        }
    }
}

impl std::fmt::Display for PrincipalKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Customer => write!(f, "customer"),
            Self::Panel => write!(f, "panel"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_audiences_are_distinct() {
        assert_ne!(
            PrincipalKind::Customer.audience(),
            PrincipalKind::Panel.audience()
        );
    }
}

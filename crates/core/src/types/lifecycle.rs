//! Uniform lifecycle state for soft-deletable records.

use serde::{Deserialize, Serialize};

/// Lifecycle of a catalog record, address or principal.
///
/// `Deleted` is terminal: deleted rows stay in the database for order
/// history and audit, but no read path ever returns them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[cfg_attr(feature = "postgres", derive(sqlx::Type))]
#[cfg_attr(
    feature = "postgres",
    sqlx(type_name = "lifecycle", rename_all = "snake_case")
)]
#[serde(rename_all = "snake_case")]
pub enum Lifecycle {
    #[default]
    Active,
    Inactive,
    Deleted,
}

impl Lifecycle {
    /// Whether the record may be shown to customers.
    #[must_use]
    pub const fn is_visible(self) -> bool {
        matches!(self, Self::Active)
    }

    /// Apply an activation toggle requested by an admin.
    ///
    /// Returns `None` for deleted records, which can't be revived.
    #[must_use]
    pub const fn with_active(self, active: bool) -> Option<Self> {
        match (self, active) {
            (Self::Deleted, _) => None,
            (_, true) => Some(Self::Active),
            (_, false) => Some(Self::Inactive),
        }
    }

    /// Visibility of a record given the lifecycles of its whole ownership
    /// chain (e.g. size → colour → product): visible only if every link is.
    #[must_use]
    pub fn chain_visible(chain: &[Self]) -> bool {
        chain.iter().all(|l| l.is_visible())
    }
}

impl std::fmt::Display for Lifecycle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Active => write!(f, "active"),
            Self::Inactive => write!(f, "inactive"),
            Self::Deleted => write!(f, "deleted"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_only_active_is_visible() {
        assert!(Lifecycle::Active.is_visible());
        assert!(!Lifecycle::Inactive.is_visible());
        assert!(!Lifecycle::Deleted.is_visible());
    }

    #[test]
    fn test_deleted_cannot_be_reactivated() {
        assert_eq!(Lifecycle::Deleted.with_active(true), None);
        assert_eq!(
            Lifecycle::Inactive.with_active(true),
            Some(Lifecycle::Active)
        );
        assert_eq!(
            Lifecycle::Active.with_active(false),
            Some(Lifecycle::Inactive)
        );
    }

    #[test]
    fn test_chain_visibility() {
        use Lifecycle::{Active, Deleted, Inactive};
        assert!(Lifecycle::chain_visible(&[Active, Active, Active]));
        assert!(!Lifecycle::chain_visible(&[Active, Inactive, Active]));
        assert!(!Lifecycle::chain_visible(&[Active, Active, Deleted]));
    }

    #[test]
    fn test_serde_names() {
        let json = serde_json::to_string(&Lifecycle::Inactive).expect("serialize");
        assert_eq!(json, "\"inactive\"");
    }
}

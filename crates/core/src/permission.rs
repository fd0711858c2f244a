//! Back-office permission keys.
//!
//! Permissions are stored as rows so roles can be edited at runtime, but the
//! API only ever checks the fixed set of keys defined here, written as
//! `<module>:<access>` (e.g. `products:write`).

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Name of the protected role that implicitly holds every permission.
pub const ADMIN_ROLE: &str = "Admin";

/// Name of the protected role describing storefront customers.
pub const CUSTOMER_ROLE: &str = "Customer";

/// Roles that can't be renamed, re-permissioned or deleted.
pub const PROTECTED_ROLES: [&str; 2] = [ADMIN_ROLE, CUSTOMER_ROLE];

/// Error parsing a permission key.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid permission key: {0}")]
pub struct InvalidPermissionKey(pub String);

/// Back-office area a permission applies to (also the audit log's target module).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Module {
    Products,
    Categories,
    Orders,
    Roles,
    Permissions,
    PanelUsers,
    AuditLogs,
    Reports,
}

impl Module {
    pub const ALL: [Self; 8] = [
        Self::Products,
        Self::Categories,
        Self::Orders,
        Self::Roles,
        Self::Permissions,
        Self::PanelUsers,
        Self::AuditLogs,
        Self::Reports,
    ];

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Products => "products",
            Self::Categories => "categories",
            Self::Orders => "orders",
            Self::Roles => "roles",
            Self::Permissions => "permissions",
            Self::PanelUsers => "panel_users",
            Self::AuditLogs => "audit_logs",
            Self::Reports => "reports",
        }
    }
}

impl fmt::Display for Module {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Module {
    type Err = InvalidPermissionKey;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|m| m.as_str() == s)
            .ok_or_else(|| InvalidPermissionKey(s.to_string()))
    }
}

/// Kind of access within a module.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Access {
    Read,
    Write,
}

impl Access {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Read => "read",
            Self::Write => "write",
        }
    }
}

/// A `<module>:<access>` permission key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct PermissionKey {
    pub module: Module,
    pub access: Access,
}

impl PermissionKey {
    #[must_use]
    pub const fn new(module: Module, access: Access) -> Self {
        Self { module, access }
    }

    #[must_use]
    pub const fn read(module: Module) -> Self {
        Self::new(module, Access::Read)
    }

    #[must_use]
    pub const fn write(module: Module) -> Self {
        Self::new(module, Access::Write)
    }

    /// Every key the API checks, used for seeding.
    #[must_use]
    pub fn all() -> Vec<Self> {
        Module::ALL
            .into_iter()
            .flat_map(|m| [Self::read(m), Self::write(m)])
            .collect()
    }

    /// Whether holding `self` grants `required`. Write access implies read.
    #[must_use]
    pub fn grants(self, required: Self) -> bool {
        self.module == required.module
            && (self.access == required.access || self.access == Access::Write)
    }
}

impl fmt::Display for PermissionKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.module, self.access.as_str())
    }
}

impl FromStr for PermissionKey {
    type Err = InvalidPermissionKey;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (module, access) = s
            .split_once(':')
            .ok_or_else(|| InvalidPermissionKey(s.to_string()))?;
        let access = match access {
            "read" => Access::Read,
            "write" => Access::Write,
            _ => return Err(InvalidPermissionKey(s.to_string())),
        };
        let module = module
            .parse::<Module>()
            .map_err(|_| InvalidPermissionKey(s.to_string()))?;
        Ok(Self { module, access })
    }
}

impl TryFrom<String> for PermissionKey {
    type Error = InvalidPermissionKey;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<PermissionKey> for String {
    fn from(key: PermissionKey) -> Self {
        key.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_key_display_and_parse() {
        let key = PermissionKey::write(Module::PanelUsers);
        assert_eq!(key.to_string(), "panel_users:write");
        assert_eq!("panel_users:write".parse::<PermissionKey>(), Ok(key));
    }

    #[test]
    fn test_parse_rejects_unknown() {
        assert!("products".parse::<PermissionKey>().is_err());
        assert!("products:delete".parse::<PermissionKey>().is_err());
        assert!("widgets:read".parse::<PermissionKey>().is_err());
    }

    #[test]
    fn test_write_implies_read() {
        let write = PermissionKey::write(Module::Products);
        let read = PermissionKey::read(Module::Products);
        assert!(write.grants(read));
        assert!(write.grants(write));
        assert!(!read.grants(write));
        assert!(!write.grants(PermissionKey::read(Module::Orders)));
    }

    #[test]
    fn test_all_covers_every_module_twice() {
        let all = PermissionKey::all();
        assert_eq!(all.len(), Module::ALL.len() * 2);
        assert!(all.contains(&PermissionKey::read(Module::AuditLogs)));
    }
}

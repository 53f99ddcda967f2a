//! Account roles and their canonical destinations.

use serde::{Deserialize, Serialize};

/// Account role with different marketplace surfaces.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    /// Buys from vendors through the storefront.
    Customer,
    /// Sells through the vendor dashboard.
    Vendor,
    /// Operates the marketplace through the admin panel.
    Admin,
}

impl Role {
    /// The default landing destination for this role.
    ///
    /// Used as the redirect target when a session holding this role is denied
    /// access to a screen. These paths are unguarded, so redirecting here can
    /// never loop back into another denial.
    #[must_use]
    pub const fn canonical_home(self) -> &'static str {
        match self {
            Self::Customer => "/",
            Self::Vendor => "/vendor",
            Self::Admin => "/admin",
        }
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Customer => write!(f, "customer"),
            Self::Vendor => write!(f, "vendor"),
            Self::Admin => write!(f, "admin"),
        }
    }
}

impl std::str::FromStr for Role {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "customer" => Ok(Self::Customer),
            "vendor" => Ok(Self::Vendor),
            "admin" => Ok(Self::Admin),
            _ => Err(format!("invalid role: {s}")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_role_round_trip() {
        for role in [Role::Customer, Role::Vendor, Role::Admin] {
            let parsed: Role = role.to_string().parse().expect("parse role");
            assert_eq!(parsed, role);
        }
    }

    #[test]
    fn test_role_canonical_home() {
        assert_eq!(Role::Customer.canonical_home(), "/");
        assert_eq!(Role::Vendor.canonical_home(), "/vendor");
        assert_eq!(Role::Admin.canonical_home(), "/admin");
    }

    #[test]
    fn test_role_invalid() {
        assert!("superuser".parse::<Role>().is_err());
    }
}

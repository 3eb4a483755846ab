//! User roles and the permission matrix for the back-office.

use serde::{Deserialize, Serialize};

use super::status::UnknownVariant;

/// Account role. Variants are declared in ascending rank.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[cfg_attr(feature = "postgres", derive(sqlx::Type))]
#[cfg_attr(
    feature = "postgres",
    sqlx(type_name = "shop.user_role", rename_all = "snake_case")
)]
#[serde(rename_all = "snake_case")]
pub enum UserRole {
    /// Storefront shopper. No back-office access.
    Customer,
    /// Maintains the catalog and moderates reviews.
    InventoryStaff,
    /// Prices quotes, runs orders and answers chat.
    SalesManager,
    /// Everything except promoting other admins.
    Admin,
    /// Unrestricted.
    SuperAdmin,
}

/// A back-office capability.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Permission {
    ManageCatalog,
    ModerateReviews,
    ManageQuotes,
    ManageOrders,
    ManageChat,
    ViewStats,
    ManageUsers,
    ManageSettings,
}

impl UserRole {
    pub const ALL: [Self; 5] = [
        Self::Customer,
        Self::InventoryStaff,
        Self::SalesManager,
        Self::Admin,
        Self::SuperAdmin,
    ];

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Customer => "customer",
            Self::InventoryStaff => "inventory_staff",
            Self::SalesManager => "sales_manager",
            Self::Admin => "admin",
            Self::SuperAdmin => "super_admin",
        }
    }

    /// Any role above `customer`.
    #[must_use]
    pub fn is_staff(self) -> bool {
        self > Self::Customer
    }

    /// Whether this role grants `permission`.
    #[must_use]
    pub const fn has(self, permission: Permission) -> bool {
        use Permission::{
            ManageCatalog, ManageChat, ManageOrders, ManageQuotes, ModerateReviews, ViewStats,
        };

        match self {
            Self::Customer => false,
            Self::InventoryStaff => {
                matches!(permission, ManageCatalog | ModerateReviews | ViewStats)
            }
            Self::SalesManager => matches!(
                permission,
                ManageQuotes | ManageOrders | ManageChat | ViewStats
            ),
            Self::Admin | Self::SuperAdmin => true,
        }
    }

    /// Whether an actor with this role may move a user from `current` to `new`.
    ///
    /// A super admin may assign any role. Everyone else must strictly outrank
    /// both the target's current role and the role being granted.
    #[must_use]
    pub fn can_assign(self, current: Self, new: Self) -> bool {
        if self == Self::SuperAdmin {
            return true;
        }
        self.has(Permission::ManageUsers) && self > current && self > new
    }

    /// Whether an actor with this role may manage a user holding `target`.
    #[must_use]
    pub fn can_manage(self, target: Self) -> bool {
        self == Self::SuperAdmin || (self.has(Permission::ManageUsers) && self > target)
    }
}

impl std::fmt::Display for UserRole {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for UserRole {
    type Err = UnknownVariant;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|role| role.as_str() == s)
            .ok_or_else(|| UnknownVariant {
                kind: "user role",
                value: s.to_owned(),
            })
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_customer_has_no_permissions() {
        for permission in [
            Permission::ManageCatalog,
            Permission::ManageQuotes,
            Permission::ViewStats,
            Permission::ManageSettings,
        ] {
            assert!(!UserRole::Customer.has(permission));
        }
        assert!(!UserRole::Customer.is_staff());
    }

    #[test]
    fn test_staff_split() {
        assert!(UserRole::InventoryStaff.has(Permission::ManageCatalog));
        assert!(!UserRole::InventoryStaff.has(Permission::ManageQuotes));
        assert!(UserRole::SalesManager.has(Permission::ManageQuotes));
        assert!(UserRole::SalesManager.has(Permission::ManageChat));
        assert!(!UserRole::SalesManager.has(Permission::ManageCatalog));
        assert!(!UserRole::SalesManager.has(Permission::ManageUsers));
        assert!(UserRole::Admin.has(Permission::ManageSettings));
    }

    #[test]
    fn test_admin_cannot_mint_admins() {
        let admin = UserRole::Admin;
        assert!(admin.can_assign(UserRole::Customer, UserRole::SalesManager));
        assert!(!admin.can_assign(UserRole::Customer, UserRole::Admin));
        assert!(!admin.can_assign(UserRole::Admin, UserRole::Customer));
        assert!(!admin.can_assign(UserRole::SuperAdmin, UserRole::Customer));
    }

    #[test]
    fn test_super_admin_assigns_anything() {
        assert!(UserRole::SuperAdmin.can_assign(UserRole::Customer, UserRole::SuperAdmin));
        assert!(UserRole::SuperAdmin.can_manage(UserRole::SuperAdmin));
    }

    #[test]
    fn test_sales_manager_cannot_assign() {
        assert!(!UserRole::SalesManager.can_assign(UserRole::Customer, UserRole::Customer));
        assert!(!UserRole::SalesManager.can_manage(UserRole::Customer));
    }

    #[test]
    fn test_role_parse() {
        assert_eq!(
            "inventory_staff".parse::<UserRole>().unwrap(),
            UserRole::InventoryStaff
        );
        assert!("owner".parse::<UserRole>().is_err());
    }
}

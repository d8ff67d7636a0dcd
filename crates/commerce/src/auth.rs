//! Authorization context.
//!
//! Every operation takes an explicit [`Actor`] carrying an enumerated
//! permission set; services check capabilities with [`Actor::require`]
//! instead of consulting ambient auth state or role strings.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};

use clementine_core::{Email, UserId};

use crate::error::CommerceError;

/// A single capability an actor may hold.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Permission {
    /// Place orders and pay for them.
    PlaceOrders,
    /// View and manage the actor's own orders.
    ViewOwnOrders,
    /// Create, update and delete products.
    ManageProducts,
    /// Create, update and delete categories.
    ManageCategories,
    /// View and update any order.
    ManageOrders,
    /// View the admin dashboard aggregation.
    ViewDashboard,
}

/// The authenticated caller of an operation.
///
/// Construction happens at the transport boundary (which is outside this
/// crate); from there the actor is threaded through explicitly.
#[derive(Debug, Clone)]
pub struct Actor {
    user_id: UserId,
    email: Email,
    permissions: HashSet<Permission>,
}

impl Actor {
    /// Create an actor with an explicit permission set.
    #[must_use]
    pub fn new(user_id: UserId, email: Email, permissions: HashSet<Permission>) -> Self {
        Self {
            user_id,
            email,
            permissions,
        }
    }

    /// An actor with the customer permission set.
    #[must_use]
    pub fn customer(user_id: UserId, email: Email) -> Self {
        Self::new(
            user_id,
            email,
            HashSet::from([Permission::PlaceOrders, Permission::ViewOwnOrders]),
        )
    }

    /// An actor with the full admin permission set.
    #[must_use]
    pub fn admin(user_id: UserId, email: Email) -> Self {
        Self::new(
            user_id,
            email,
            HashSet::from([
                Permission::PlaceOrders,
                Permission::ViewOwnOrders,
                Permission::ManageProducts,
                Permission::ManageCategories,
                Permission::ManageOrders,
                Permission::ViewDashboard,
            ]),
        )
    }

    /// The actor's user id.
    #[must_use]
    pub const fn user_id(&self) -> UserId {
        self.user_id
    }

    /// The actor's email address (notification recipient).
    #[must_use]
    pub const fn email(&self) -> &Email {
        &self.email
    }

    /// Whether the actor holds a permission.
    #[must_use]
    pub fn has(&self, permission: Permission) -> bool {
        self.permissions.contains(&permission)
    }

    /// Require a permission, or fail with `Forbidden`.
    ///
    /// # Errors
    ///
    /// Returns `CommerceError::Forbidden` naming the missing permission.
    pub fn require(&self, permission: Permission) -> Result<(), CommerceError> {
        if self.has(permission) {
            Ok(())
        } else {
            Err(CommerceError::Forbidden(format!(
                "requires {permission:?}"
            )))
        }
    }

    /// Require that the actor owns the resource or holds `fallback`.
    ///
    /// # Errors
    ///
    /// Returns `CommerceError::Forbidden` when neither condition holds.
    pub fn require_owner_or(
        &self,
        owner: UserId,
        fallback: Permission,
    ) -> Result<(), CommerceError> {
        if self.user_id == owner || self.has(fallback) {
            Ok(())
        } else {
            Err(CommerceError::Forbidden(
                "not the resource owner".to_string(),
            ))
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn email() -> Email {
        Email::parse("user@example.com").unwrap()
    }

    #[test]
    fn test_customer_permissions() {
        let actor = Actor::customer(UserId::new(1), email());
        assert!(actor.has(Permission::PlaceOrders));
        assert!(actor.has(Permission::ViewOwnOrders));
        assert!(!actor.has(Permission::ManageProducts));
        assert!(!actor.has(Permission::ViewDashboard));
    }

    #[test]
    fn test_admin_permissions() {
        let actor = Actor::admin(UserId::new(1), email());
        assert!(actor.has(Permission::ManageProducts));
        assert!(actor.has(Permission::ManageOrders));
        assert!(actor.has(Permission::ViewDashboard));
    }

    #[test]
    fn test_require_forbidden() {
        let actor = Actor::customer(UserId::new(1), email());
        let err = actor.require(Permission::ManageOrders).unwrap_err();
        assert_eq!(err.status_code(), 403);
    }

    #[test]
    fn test_require_owner_or() {
        let owner = Actor::customer(UserId::new(1), email());
        let other = Actor::customer(UserId::new(2), email());
        let admin = Actor::admin(UserId::new(3), email());

        assert!(
            owner
                .require_owner_or(UserId::new(1), Permission::ManageOrders)
                .is_ok()
        );
        assert!(
            other
                .require_owner_or(UserId::new(1), Permission::ManageOrders)
                .is_err()
        );
        assert!(
            admin
                .require_owner_or(UserId::new(1), Permission::ManageOrders)
                .is_ok()
        );
    }
}

use sqlx::PgPool;
use uuid::Uuid;

use crate::auth::extractors::Principal;
use crate::auth::repo_types::Role;
use crate::error::ApiError;
use crate::restaurants::repo_types::Restaurant;

/// Roles allowed to create or mutate restaurants and their menu items.
pub const MANAGE_ROLES: &[Role] = &[Role::RestaurantOwner, Role::Admin];

impl Principal {
    /// Role check. Must run after authentication; run it before any
    /// ownership load so an unauthorized role costs no database read.
    pub fn require_role(&self, allowed: &[Role]) -> Result<(), ApiError> {
        if allowed.contains(&self.role) {
            Ok(())
        } else {
            Err(ApiError::Forbidden(format!(
                "role {} is not authorized to access this route",
                self.role
            )))
        }
    }

    pub fn can_manage(&self, owner_id: Uuid) -> bool {
        self.role == Role::Admin || self.id == owner_id
    }
}

/// Ownership check. Loads the restaurant (404 when absent) and verifies the
/// principal owns it or is an admin (403 otherwise). Returns the loaded row
/// so the caller does not fetch it a second time.
pub async fn restaurant_for_manage(
    db: &PgPool,
    principal: &Principal,
    restaurant_id: Uuid,
) -> Result<Restaurant, ApiError> {
    let restaurant = Restaurant::find_by_id(db, restaurant_id)
        .await?
        .ok_or_else(|| {
            ApiError::NotFound(format!("restaurant not found with id {restaurant_id}"))
        })?;

    if !principal.can_manage(restaurant.owner_id) {
        return Err(ApiError::Forbidden(format!(
            "user {} is not authorized to manage restaurant {restaurant_id}",
            principal.id
        )));
    }

    Ok(restaurant)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn principal(role: Role) -> Principal {
        Principal {
            id: Uuid::new_v4(),
            name: "Test".into(),
            email: "test@example.com".into(),
            role,
        }
    }

    #[test]
    fn require_role_accepts_listed_roles() {
        assert!(principal(Role::RestaurantOwner)
            .require_role(MANAGE_ROLES)
            .is_ok());
        assert!(principal(Role::Admin).require_role(MANAGE_ROLES).is_ok());
    }

    #[test]
    fn require_role_rejects_other_roles() {
        let err = principal(Role::User).require_role(MANAGE_ROLES).unwrap_err();
        assert!(matches!(err, ApiError::Forbidden(_)));
        let err = principal(Role::Editor)
            .require_role(MANAGE_ROLES)
            .unwrap_err();
        assert!(matches!(err, ApiError::Forbidden(_)));
    }

    #[test]
    fn owner_and_admin_can_manage_others_cannot() {
        let owner = principal(Role::RestaurantOwner);
        assert!(owner.can_manage(owner.id));

        let admin = principal(Role::Admin);
        assert!(admin.can_manage(Uuid::new_v4()));

        let other = principal(Role::RestaurantOwner);
        assert!(!other.can_manage(Uuid::new_v4()));
    }
}

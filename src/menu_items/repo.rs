use sqlx::{PgPool, Postgres, Transaction};
use uuid::Uuid;

use crate::menu_items::repo_types::{MenuCategory, MenuItem};

const ITEM_COLUMNS: &str = "id, restaurant_id, name, description, price, category, \
     available, image_key, created_at, updated_at";

#[derive(Debug)]
pub struct NewMenuItem {
    pub name: String,
    pub description: Option<String>,
    pub price: f64,
    pub category: MenuCategory,
    pub available: bool,
}

#[derive(Debug, Default)]
pub struct MenuItemPatch {
    pub name: Option<String>,
    pub description: Option<String>,
    pub price: Option<f64>,
    pub category: Option<MenuCategory>,
    pub available: Option<bool>,
}

impl MenuItem {
    pub async fn find_by_id(db: &PgPool, id: Uuid) -> sqlx::Result<Option<MenuItem>> {
        sqlx::query_as::<_, MenuItem>(&format!(
            "SELECT {ITEM_COLUMNS} FROM menu_items WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(db)
        .await
    }

    /// Explicit child query for a restaurant's menu; no implicit relation
    /// loading anywhere.
    pub async fn list_for_restaurant(
        db: &PgPool,
        restaurant_id: Uuid,
        category: Option<MenuCategory>,
        available: Option<bool>,
        order_by: &str,
    ) -> sqlx::Result<Vec<MenuItem>> {
        // order_by is a whitelisted literal, never caller input
        sqlx::query_as::<_, MenuItem>(&format!(
            "SELECT {ITEM_COLUMNS} FROM menu_items
             WHERE restaurant_id = $1
               AND ($2::menu_category IS NULL OR category = $2)
               AND ($3::boolean IS NULL OR available = $3)
             ORDER BY {order_by}"
        ))
        .bind(restaurant_id)
        .bind(category)
        .bind(available)
        .fetch_all(db)
        .await
    }

    pub async fn insert(
        db: &PgPool,
        restaurant_id: Uuid,
        new: &NewMenuItem,
    ) -> sqlx::Result<MenuItem> {
        sqlx::query_as::<_, MenuItem>(&format!(
            "INSERT INTO menu_items (restaurant_id, name, description, price, category, available)
             VALUES ($1, $2, $3, $4, $5, $6)
             RETURNING {ITEM_COLUMNS}"
        ))
        .bind(restaurant_id)
        .bind(&new.name)
        .bind(new.description.as_deref())
        .bind(new.price)
        .bind(new.category)
        .bind(new.available)
        .fetch_one(db)
        .await
    }

    pub async fn update(db: &PgPool, id: Uuid, patch: &MenuItemPatch) -> sqlx::Result<MenuItem> {
        sqlx::query_as::<_, MenuItem>(&format!(
            "UPDATE menu_items SET
                 name = COALESCE($2, name),
                 description = COALESCE($3, description),
                 price = COALESCE($4, price),
                 category = COALESCE($5, category),
                 available = COALESCE($6, available),
                 updated_at = now()
             WHERE id = $1
             RETURNING {ITEM_COLUMNS}"
        ))
        .bind(id)
        .bind(patch.name.as_deref())
        .bind(patch.description.as_deref())
        .bind(patch.price)
        .bind(patch.category)
        .bind(patch.available)
        .fetch_one(db)
        .await
    }

    pub async fn delete(db: &PgPool, id: Uuid) -> sqlx::Result<u64> {
        let result = sqlx::query("DELETE FROM menu_items WHERE id = $1")
            .bind(id)
            .execute(db)
            .await?;
        Ok(result.rows_affected())
    }

    pub async fn set_image(db: &PgPool, id: Uuid, image_key: &str) -> sqlx::Result<MenuItem> {
        sqlx::query_as::<_, MenuItem>(&format!(
            "UPDATE menu_items SET image_key = $2, updated_at = now()
             WHERE id = $1
             RETURNING {ITEM_COLUMNS}"
        ))
        .bind(id)
        .bind(image_key)
        .fetch_one(db)
        .await
    }
}

/// Cascade step of the restaurant delete; runs inside that transaction.
pub async fn delete_all_for_restaurant_tx(
    tx: &mut Transaction<'_, Postgres>,
    restaurant_id: Uuid,
) -> sqlx::Result<u64> {
    let result = sqlx::query("DELETE FROM menu_items WHERE restaurant_id = $1")
        .bind(restaurant_id)
        .execute(&mut **tx)
        .await?;
    Ok(result.rows_affected())
}

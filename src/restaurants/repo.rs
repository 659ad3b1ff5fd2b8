use sqlx::{PgPool, Postgres, Transaction};
use uuid::Uuid;

use crate::restaurants::repo_types::{Restaurant, RestaurantImage, RestaurantStatus};

const RESTAURANT_COLUMNS: &str = "id, name, description, address, cuisine, price_range, phone, \
     status, owner_id, created_at, updated_at";

const IMAGE_COLUMNS: &str = "id, restaurant_id, s3_key, caption, is_primary, created_at";

/// Validated insert payload; produced by the service validation step.
#[derive(Debug)]
pub struct NewRestaurant {
    pub name: String,
    pub description: String,
    pub address: String,
    pub cuisine: Vec<String>,
    pub price_range: String,
    pub phone: String,
    pub status: RestaurantStatus,
}

/// Partial update; `None` keeps the stored value.
#[derive(Debug, Default)]
pub struct RestaurantPatch {
    pub name: Option<String>,
    pub description: Option<String>,
    pub address: Option<String>,
    pub cuisine: Option<Vec<String>>,
    pub price_range: Option<String>,
    pub phone: Option<String>,
    pub status: Option<RestaurantStatus>,
}

#[derive(Debug, Default)]
pub struct RestaurantFilter {
    pub status: Option<RestaurantStatus>,
    pub cuisine: Option<String>,
    pub owner_id: Option<Uuid>,
}

impl Restaurant {
    pub async fn find_by_id(db: &PgPool, id: Uuid) -> sqlx::Result<Option<Restaurant>> {
        sqlx::query_as::<_, Restaurant>(&format!(
            "SELECT {RESTAURANT_COLUMNS} FROM restaurants WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(db)
        .await
    }

    pub async fn list(
        db: &PgPool,
        filter: &RestaurantFilter,
        order_by: &str,
        limit: i64,
        offset: i64,
    ) -> sqlx::Result<Vec<Restaurant>> {
        // order_by is a whitelisted literal, never caller input
        sqlx::query_as::<_, Restaurant>(&format!(
            "SELECT {RESTAURANT_COLUMNS} FROM restaurants
             WHERE ($1::restaurant_status IS NULL OR status = $1)
               AND ($2::text IS NULL OR $2 = ANY(cuisine))
               AND ($3::uuid IS NULL OR owner_id = $3)
             ORDER BY {order_by}
             LIMIT $4 OFFSET $5"
        ))
        .bind(filter.status)
        .bind(filter.cuisine.as_deref())
        .bind(filter.owner_id)
        .bind(limit)
        .bind(offset)
        .fetch_all(db)
        .await
    }

    pub async fn insert(db: &PgPool, owner_id: Uuid, new: &NewRestaurant) -> sqlx::Result<Restaurant> {
        sqlx::query_as::<_, Restaurant>(&format!(
            "INSERT INTO restaurants
                 (name, description, address, cuisine, price_range, phone, status, owner_id)
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
             RETURNING {RESTAURANT_COLUMNS}"
        ))
        .bind(&new.name)
        .bind(&new.description)
        .bind(&new.address)
        .bind(&new.cuisine)
        .bind(&new.price_range)
        .bind(&new.phone)
        .bind(new.status)
        .bind(owner_id)
        .fetch_one(db)
        .await
    }

    pub async fn update(db: &PgPool, id: Uuid, patch: &RestaurantPatch) -> sqlx::Result<Restaurant> {
        sqlx::query_as::<_, Restaurant>(&format!(
            "UPDATE restaurants SET
                 name = COALESCE($2, name),
                 description = COALESCE($3, description),
                 address = COALESCE($4, address),
                 cuisine = COALESCE($5, cuisine),
                 price_range = COALESCE($6, price_range),
                 phone = COALESCE($7, phone),
                 status = COALESCE($8, status),
                 updated_at = now()
             WHERE id = $1
             RETURNING {RESTAURANT_COLUMNS}"
        ))
        .bind(id)
        .bind(patch.name.as_deref())
        .bind(patch.description.as_deref())
        .bind(patch.address.as_deref())
        .bind(patch.cuisine.as_deref())
        .bind(patch.price_range.as_deref())
        .bind(patch.phone.as_deref())
        .bind(patch.status)
        .fetch_one(db)
        .await
    }

    pub async fn delete_tx(tx: &mut Transaction<'_, Postgres>, id: Uuid) -> sqlx::Result<u64> {
        let result = sqlx::query("DELETE FROM restaurants WHERE id = $1")
            .bind(id)
            .execute(&mut **tx)
            .await?;
        Ok(result.rows_affected())
    }
}

// ---- gallery ----

pub async fn list_images(db: &PgPool, restaurant_id: Uuid) -> sqlx::Result<Vec<RestaurantImage>> {
    sqlx::query_as::<_, RestaurantImage>(&format!(
        "SELECT {IMAGE_COLUMNS} FROM restaurant_images
         WHERE restaurant_id = $1
         ORDER BY created_at ASC"
    ))
    .bind(restaurant_id)
    .fetch_all(db)
    .await
}

pub async fn has_primary_image(db: &PgPool, restaurant_id: Uuid) -> sqlx::Result<bool> {
    let row: Option<(i32,)> =
        sqlx::query_as("SELECT 1 FROM restaurant_images WHERE restaurant_id = $1 AND is_primary")
            .bind(restaurant_id)
            .fetch_optional(db)
            .await?;
    Ok(row.is_some())
}

pub async fn demote_primary_tx(
    tx: &mut Transaction<'_, Postgres>,
    restaurant_id: Uuid,
) -> sqlx::Result<()> {
    sqlx::query("UPDATE restaurant_images SET is_primary = false WHERE restaurant_id = $1")
        .bind(restaurant_id)
        .execute(&mut **tx)
        .await?;
    Ok(())
}

pub async fn insert_image_tx(
    tx: &mut Transaction<'_, Postgres>,
    image_id: Uuid,
    restaurant_id: Uuid,
    s3_key: &str,
    caption: Option<&str>,
    is_primary: bool,
) -> sqlx::Result<()> {
    sqlx::query(
        "INSERT INTO restaurant_images (id, restaurant_id, s3_key, caption, is_primary)
         VALUES ($1, $2, $3, $4, $5)",
    )
    .bind(image_id)
    .bind(restaurant_id)
    .bind(s3_key)
    .bind(caption)
    .bind(is_primary)
    .execute(&mut **tx)
    .await?;
    Ok(())
}

pub async fn image_keys(db: &PgPool, restaurant_id: Uuid) -> sqlx::Result<Vec<String>> {
    let rows: Vec<(String,)> =
        sqlx::query_as("SELECT s3_key FROM restaurant_images WHERE restaurant_id = $1")
            .bind(restaurant_id)
            .fetch_all(db)
            .await?;
    Ok(rows.into_iter().map(|(k,)| k).collect())
}

pub async fn delete_images_tx(
    tx: &mut Transaction<'_, Postgres>,
    restaurant_id: Uuid,
) -> sqlx::Result<u64> {
    let result = sqlx::query("DELETE FROM restaurant_images WHERE restaurant_id = $1")
        .bind(restaurant_id)
        .execute(&mut **tx)
        .await?;
    Ok(result.rows_affected())
}

use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use time::OffsetDateTime;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "lowercase")]
#[sqlx(type_name = "restaurant_status", rename_all = "lowercase")]
pub enum RestaurantStatus {
    Active,
    Inactive,
    Pending,
    Maintenance,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Restaurant {
    pub id: Uuid,
    pub name: String,
    pub description: String,
    pub address: String,
    pub cuisine: Vec<String>,
    pub price_range: String,
    pub phone: String,
    pub status: RestaurantStatus,
    pub owner_id: Uuid,
    pub created_at: OffsetDateTime,
    pub updated_at: OffsetDateTime,
}

/// Gallery row. The raw object key stays server-side; clients get a
/// presigned URL instead.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct RestaurantImage {
    pub id: Uuid,
    pub restaurant_id: Uuid,
    #[serde(skip_serializing)]
    pub s3_key: String,
    pub caption: Option<String>,
    pub is_primary: bool,
    pub created_at: OffsetDateTime,
}

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::restaurants::repo_types::{Restaurant, RestaurantStatus};

#[derive(Debug, Deserialize)]
pub struct CreateRestaurantRequest {
    pub name: String,
    pub description: String,
    pub address: String,
    #[serde(default)]
    pub cuisine: Vec<String>,
    #[serde(alias = "priceRange")]
    pub price_range: String,
    pub phone: String,
    pub status: Option<RestaurantStatus>,
}

#[derive(Debug, Deserialize)]
pub struct UpdateRestaurantRequest {
    pub name: Option<String>,
    pub description: Option<String>,
    pub address: Option<String>,
    pub cuisine: Option<Vec<String>>,
    #[serde(alias = "priceRange")]
    pub price_range: Option<String>,
    pub phone: Option<String>,
    pub status: Option<RestaurantStatus>,
}

#[derive(Debug, Deserialize)]
pub struct ListRestaurantsQuery {
    pub status: Option<RestaurantStatus>,
    pub cuisine: Option<String>,
    pub owner_id: Option<Uuid>,
    pub sort: Option<String>,
    #[serde(default = "default_limit")]
    pub limit: i64,
    #[serde(default)]
    pub offset: i64,
}

fn default_limit() -> i64 {
    20
}

/// Gallery entry as served to clients: presigned URL, no raw key.
#[derive(Debug, Serialize)]
pub struct ImageView {
    pub id: Uuid,
    pub url: String,
    pub caption: Option<String>,
    pub is_primary: bool,
}

#[derive(Debug, Serialize)]
pub struct RestaurantDetails {
    #[serde(flatten)]
    pub restaurant: Restaurant,
    pub images: Vec<ImageView>,
}

#[derive(Debug, Serialize)]
pub struct DeleteSummary {
    pub menu_items_deleted: u64,
    pub images_deleted: u64,
}

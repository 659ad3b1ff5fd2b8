use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::menu_items::repo_types::{MenuCategory, MenuItem};

#[derive(Debug, Deserialize)]
pub struct CreateMenuItemRequest {
    pub name: String,
    pub description: Option<String>,
    pub price: f64,
    pub category: MenuCategory,
    #[serde(default = "default_available")]
    pub available: bool,
}

fn default_available() -> bool {
    true
}

#[derive(Debug, Deserialize)]
pub struct UpdateMenuItemRequest {
    pub name: Option<String>,
    pub description: Option<String>,
    pub price: Option<f64>,
    pub category: Option<MenuCategory>,
    pub available: Option<bool>,
}

#[derive(Debug, Deserialize)]
pub struct ListMenuItemsQuery {
    pub category: Option<MenuCategory>,
    pub available: Option<bool>,
    pub sort: Option<String>,
}

/// Menu item plus a presigned image URL when one is attached.
#[derive(Debug, Serialize)]
pub struct MenuItemView {
    #[serde(flatten)]
    pub item: MenuItem,
    pub image_url: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct MenuItemList {
    pub count: usize,
    pub items: Vec<MenuItemView>,
}

#[derive(Debug, Serialize)]
pub struct DeletedMenuItem {
    pub id: Uuid,
}

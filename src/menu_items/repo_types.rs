use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use time::OffsetDateTime;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "snake_case")]
#[sqlx(type_name = "menu_category", rename_all = "snake_case")]
pub enum MenuCategory {
    Appetizer,
    MainCourse,
    Dessert,
    Beverage,
    Side,
    Breakfast,
    Lunch,
    Dinner,
    Special,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct MenuItem {
    pub id: Uuid,
    pub restaurant_id: Uuid,
    pub name: String,
    pub description: Option<String>,
    pub price: f64,
    pub category: MenuCategory,
    pub available: bool,
    #[serde(skip_serializing)]
    pub image_key: Option<String>,
    pub created_at: OffsetDateTime,
    pub updated_at: OffsetDateTime,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn category_parses_snake_case() {
        let cat: MenuCategory = serde_json::from_str("\"main_course\"").unwrap();
        assert_eq!(cat, MenuCategory::MainCourse);
        assert!(serde_json::from_str::<MenuCategory>("\"main course\"").is_err());
    }

    #[test]
    fn menu_item_hides_raw_image_key() {
        let item = MenuItem {
            id: Uuid::new_v4(),
            restaurant_id: Uuid::new_v4(),
            name: "Soup".into(),
            description: None,
            price: 6.5,
            category: MenuCategory::Appetizer,
            available: true,
            image_key: Some("menu-items/abc.jpg".into()),
            created_at: OffsetDateTime::UNIX_EPOCH,
            updated_at: OffsetDateTime::UNIX_EPOCH,
        };
        let json = serde_json::to_string(&item).unwrap();
        assert!(json.contains("\"appetizer\""));
        assert!(!json.contains("menu-items/abc.jpg"));
    }
}

use anyhow::Context;
use tracing::info;
use uuid::Uuid;

use crate::error::ApiError;
use crate::menu_items::dto::{CreateMenuItemRequest, MenuItemView, UpdateMenuItemRequest};
use crate::menu_items::repo::{MenuItemPatch, NewMenuItem};
use crate::menu_items::repo_types::MenuItem;
use crate::restaurants::services::{discard_stored_object, validate_image, ImageUpload};
use crate::state::AppState;
use crate::storage::menu_item_image_key;

fn validate_name(name: &str) -> Result<String, ApiError> {
    let name = name.trim();
    if name.is_empty() {
        return Err(ApiError::Validation("please add a menu item name".into()));
    }
    if name.len() > 100 {
        return Err(ApiError::Validation(
            "name cannot be more than 100 characters".into(),
        ));
    }
    Ok(name.to_string())
}

fn validate_price(price: f64) -> Result<f64, ApiError> {
    if !price.is_finite() || price < 0.0 {
        return Err(ApiError::Validation("price cannot be negative".into()));
    }
    Ok(price)
}

fn validate_description(description: &str) -> Result<String, ApiError> {
    if description.len() > 1000 {
        return Err(ApiError::Validation(
            "description cannot be more than 1000 characters".into(),
        ));
    }
    Ok(description.to_string())
}

pub fn validate_new(req: CreateMenuItemRequest) -> Result<NewMenuItem, ApiError> {
    Ok(NewMenuItem {
        name: validate_name(&req.name)?,
        description: req
            .description
            .as_deref()
            .map(validate_description)
            .transpose()?,
        price: validate_price(req.price)?,
        category: req.category,
        available: req.available,
    })
}

pub fn validate_patch(req: UpdateMenuItemRequest) -> Result<MenuItemPatch, ApiError> {
    Ok(MenuItemPatch {
        name: req.name.as_deref().map(validate_name).transpose()?,
        description: req
            .description
            .as_deref()
            .map(validate_description)
            .transpose()?,
        price: req.price.map(validate_price).transpose()?,
        category: req.category,
        available: req.available,
    })
}

pub fn order_by_clause(sort: Option<&str>) -> &'static str {
    match sort {
        Some("price") => "price ASC",
        Some("price_desc") => "price DESC",
        Some("newest") | Some("created_at") => "created_at DESC",
        _ => "name ASC",
    }
}

pub async fn create(
    state: &AppState,
    restaurant_id: Uuid,
    req: CreateMenuItemRequest,
) -> Result<MenuItem, ApiError> {
    let new = validate_new(req)?;
    let item = MenuItem::insert(&state.db, restaurant_id, &new).await?;
    info!(item_id = %item.id, restaurant_id = %restaurant_id, "menu item created");
    Ok(item)
}

pub async fn update(
    state: &AppState,
    item_id: Uuid,
    req: UpdateMenuItemRequest,
) -> Result<MenuItem, ApiError> {
    let patch = validate_patch(req)?;
    Ok(MenuItem::update(&state.db, item_id, &patch).await?)
}

/// Replace the item's single image: validate, store, persist the new key.
pub async fn upload_image(
    state: &AppState,
    item: &MenuItem,
    upload: ImageUpload,
) -> Result<MenuItem, ApiError> {
    validate_image(
        &upload.content_type,
        upload.body.len(),
        state.config.max_upload_bytes,
    )?;

    let key = menu_item_image_key(item.restaurant_id, Uuid::new_v4(), &upload.content_type);
    state
        .storage
        .put_object(&key, upload.body, &upload.content_type)
        .await
        .with_context(|| format!("put_object {key}"))?;

    let updated = match MenuItem::set_image(&state.db, item.id, &key).await {
        Ok(updated) => updated,
        Err(err) => {
            // stored but never referenced; take the object back out
            discard_stored_object(state.storage.as_ref(), &key).await;
            return Err(err.into());
        }
    };

    if let Some(old_key) = &item.image_key {
        if let Err(e) = state.storage.delete_object(old_key).await {
            tracing::warn!(error = ?e, key = %old_key, "stale menu item image left behind");
        }
    }

    info!(item_id = %item.id, "menu item image uploaded");
    Ok(updated)
}

pub async fn into_view(state: &AppState, item: MenuItem) -> anyhow::Result<MenuItemView> {
    let image_url = match &item.image_key {
        Some(key) => Some(state.storage.presign(key).await?),
        None => None,
    };
    Ok(MenuItemView { item, image_url })
}

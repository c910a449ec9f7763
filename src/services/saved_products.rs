//! Per-user saved products and named product lists.
//!
//! Saves are flat rows, one per (user, product), with a duplicate save
//! rejected as a conflict. Lists keep their membership as a JSON array of
//! product ids on the row. The saved-products read is cached per user and
//! every save/unsave deletes the cached entry.

use crate::{
    cache::TtlCache,
    db::DbPool,
    entities::product::{self, Entity as Product},
    entities::product_list::{self, Entity as ProductList},
    entities::saved_product::{self, Entity as SavedProduct},
    errors::ServiceError,
    events::{Event, EventSender},
};
use chrono::{DateTime, Utc};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, EntityTrait, ModelTrait, NotSet, QueryFilter, QueryOrder, Set,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{info, instrument, warn};
use utoipa::ToSchema;
use uuid::Uuid;
use validator::Validate;

fn saved_cache_key(user_id: &str) -> String {
    format!("saved_{}", user_id)
}

/// A saved product joined with its catalog row.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct SavedProductView {
    pub id: Uuid,
    pub saved_at: DateTime<Utc>,
    pub product: product::Model,
}

#[derive(Debug, Clone, Deserialize, Validate, ToSchema)]
pub struct NewProductList {
    #[validate(length(min = 1, max = 255, message = "List name is required"))]
    pub name: String,
    pub description: Option<String>,
}

#[derive(Clone)]
pub struct SavedProductService {
    db: Arc<DbPool>,
    event_sender: Arc<EventSender>,
    cache: TtlCache,
}

impl SavedProductService {
    pub fn new(db: Arc<DbPool>, event_sender: Arc<EventSender>, cache: TtlCache) -> Self {
        Self {
            db,
            event_sender,
            cache,
        }
    }

    /// Saves a product for a user. Saving the same product twice is a
    /// conflict, backed by the unique (user, product) index.
    #[instrument(skip(self))]
    pub async fn save_product(
        &self,
        user_id: &str,
        product_id: Uuid,
    ) -> Result<saved_product::Model, ServiceError> {
        if user_id.is_empty() {
            return Err(ServiceError::ValidationError(
                "User id is required".to_string(),
            ));
        }

        Product::find_by_id(product_id)
            .one(&*self.db)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("Product {} not found", product_id)))?;

        let existing = SavedProduct::find()
            .filter(saved_product::Column::UserId.eq(user_id))
            .filter(saved_product::Column::ProductId.eq(product_id))
            .one(&*self.db)
            .await?;
        if existing.is_some() {
            return Err(ServiceError::Conflict(format!(
                "Product {} is already saved",
                product_id
            )));
        }

        let saved = saved_product::ActiveModel {
            id: Set(Uuid::new_v4()),
            user_id: Set(user_id.to_string()),
            product_id: Set(product_id),
            created_at: NotSet,
        }
        .insert(&*self.db)
        .await?;

        self.invalidate_saved(user_id).await;
        self.event_sender
            .send_or_log(Event::ProductSaved {
                user_id: user_id.to_string(),
                product_id,
            })
            .await;
        info!(user_id = %user_id, product_id = %product_id, "Product saved");
        Ok(saved)
    }

    /// Removes a save. Unsaving something never saved is a not-found.
    #[instrument(skip(self))]
    pub async fn unsave_product(
        &self,
        user_id: &str,
        product_id: Uuid,
    ) -> Result<(), ServiceError> {
        let existing = SavedProduct::find()
            .filter(saved_product::Column::UserId.eq(user_id))
            .filter(saved_product::Column::ProductId.eq(product_id))
            .one(&*self.db)
            .await?
            .ok_or_else(|| {
                ServiceError::NotFound(format!("Product {} is not saved", product_id))
            })?;

        existing.delete(&*self.db).await?;
        self.invalidate_saved(user_id).await;
        info!(user_id = %user_id, product_id = %product_id, "Product unsaved");
        Ok(())
    }

    /// A user's saved products with their catalog rows, newest save first.
    /// Cached per user.
    #[instrument(skip(self))]
    pub async fn get_saved_products(
        &self,
        user_id: &str,
    ) -> Result<Vec<SavedProductView>, ServiceError> {
        let key = saved_cache_key(user_id);
        if let Some(views) = self.cache.get_json::<Vec<SavedProductView>>(&key).await? {
            return Ok(views);
        }

        let rows = SavedProduct::find()
            .filter(saved_product::Column::UserId.eq(user_id))
            .find_also_related(Product)
            .order_by_desc(saved_product::Column::CreatedAt)
            .all(&*self.db)
            .await?;

        let views: Vec<SavedProductView> = rows
            .into_iter()
            .filter_map(|(saved, product)| match product {
                Some(product) => Some(SavedProductView {
                    id: saved.id,
                    saved_at: saved.created_at,
                    product,
                }),
                None => {
                    warn!(saved_id = %saved.id, "Saved row points at a missing product");
                    None
                }
            })
            .collect();

        self.cache.set_json(&key, &views, None).await?;
        Ok(views)
    }

    #[instrument(skip(self, input))]
    pub async fn create_list(
        &self,
        user_id: &str,
        input: NewProductList,
    ) -> Result<product_list::Model, ServiceError> {
        if user_id.is_empty() {
            return Err(ServiceError::ValidationError(
                "User id is required".to_string(),
            ));
        }
        input
            .validate()
            .map_err(|e| ServiceError::ValidationError(e.to_string()))?;

        let list = product_list::ActiveModel {
            id: Set(Uuid::new_v4()),
            user_id: Set(user_id.to_string()),
            name: Set(input.name),
            description: Set(input.description),
            product_ids: Set(serde_json::json!([])),
            created_at: NotSet,
            updated_at: NotSet,
        }
        .insert(&*self.db)
        .await?;

        info!(user_id = %user_id, list_id = %list.id, "Product list created");
        Ok(list)
    }

    pub async fn get_lists(
        &self,
        user_id: &str,
    ) -> Result<Vec<product_list::Model>, ServiceError> {
        let lists = ProductList::find()
            .filter(product_list::Column::UserId.eq(user_id))
            .order_by_asc(product_list::Column::CreatedAt)
            .all(&*self.db)
            .await?;
        Ok(lists)
    }

    /// Fetches a list, scoped to its owner. A list belonging to someone
    /// else reads as absent rather than forbidden.
    pub async fn get_list(
        &self,
        user_id: &str,
        list_id: Uuid,
    ) -> Result<product_list::Model, ServiceError> {
        ProductList::find_by_id(list_id)
            .one(&*self.db)
            .await?
            .filter(|list| list.user_id == user_id)
            .ok_or_else(|| ServiceError::NotFound(format!("List {} not found", list_id)))
    }

    /// Adds a product to a list. Membership is a set: adding an existing
    /// member is a no-op that still returns the list.
    #[instrument(skip(self))]
    pub async fn add_to_list(
        &self,
        user_id: &str,
        list_id: Uuid,
        product_id: Uuid,
    ) -> Result<product_list::Model, ServiceError> {
        Product::find_by_id(product_id)
            .one(&*self.db)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("Product {} not found", product_id)))?;

        let list = self.get_list(user_id, list_id).await?;
        let mut members = list.member_ids();
        if members.contains(&product_id) {
            return Ok(list);
        }
        members.push(product_id);

        let mut active: product_list::ActiveModel = list.into();
        active.product_ids = Set(serde_json::json!(members));
        let updated = active.update(&*self.db).await?;
        info!(list_id = %list_id, product_id = %product_id, "Product added to list");
        Ok(updated)
    }

    /// Removes a product from a list. Removing a non-member is a no-op.
    #[instrument(skip(self))]
    pub async fn remove_from_list(
        &self,
        user_id: &str,
        list_id: Uuid,
        product_id: Uuid,
    ) -> Result<product_list::Model, ServiceError> {
        let list = self.get_list(user_id, list_id).await?;
        let members = list.member_ids();
        let remaining: Vec<Uuid> = members
            .iter()
            .copied()
            .filter(|id| *id != product_id)
            .collect();
        if remaining.len() == members.len() {
            return Ok(list);
        }

        let mut active: product_list::ActiveModel = list.into();
        active.product_ids = Set(serde_json::json!(remaining));
        let updated = active.update(&*self.db).await?;
        info!(list_id = %list_id, product_id = %product_id, "Product removed from list");
        Ok(updated)
    }

    #[instrument(skip(self))]
    pub async fn delete_list(&self, user_id: &str, list_id: Uuid) -> Result<(), ServiceError> {
        let list = self.get_list(user_id, list_id).await?;
        list.delete(&*self.db).await?;
        info!(list_id = %list_id, "Product list deleted");
        Ok(())
    }

    async fn invalidate_saved(&self, user_id: &str) {
        if let Err(e) = self.cache.delete(&saved_cache_key(user_id)).await {
            warn!(user_id = %user_id, error = %e, "Failed to invalidate saved-products cache");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn saved_cache_key_is_per_user() {
        assert_eq!(saved_cache_key("user-9"), "saved_user-9");
    }

    #[test]
    fn list_membership_decodes_and_dedupes() {
        let a = Uuid::new_v4();
        let b = Uuid::new_v4();
        let list = product_list::Model {
            id: Uuid::new_v4(),
            user_id: "user-1".to_string(),
            name: "Reorder".to_string(),
            description: None,
            product_ids: serde_json::json!([a, b]),
            created_at: Utc::now(),
            updated_at: Utc::now(),
        };
        assert_eq!(list.member_ids(), vec![a, b]);
    }

    #[test]
    fn malformed_membership_decodes_empty() {
        let list = product_list::Model {
            id: Uuid::new_v4(),
            user_id: "user-1".to_string(),
            name: "Reorder".to_string(),
            description: None,
            product_ids: serde_json::json!({"not": "an array"}),
            created_at: Utc::now(),
            updated_at: Utc::now(),
        };
        assert!(list.member_ids().is_empty());
    }
}

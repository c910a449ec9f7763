//! Product catalog: products, their purchasable variants and the bridge to
//! stock-keeping. Adding a variant provisions its inventory item in the
//! same transaction so every SKU the catalog sells has a ledger to write to.

use crate::{
    cache::TtlCache,
    db::DbPool,
    entities::inventory_item::{self, Entity as InventoryItem},
    entities::product::{self, Entity as Product, ProductStatus},
    entities::product_variant::{self, Entity as ProductVariant},
    errors::ServiceError,
    events::{Event, EventSender},
    services::inventory::InventoryService,
};
use chrono::Utc;
use once_cell::sync::Lazy;
use regex::Regex;
use rust_decimal::Decimal;
use sea_orm::sea_query::{Condition, Expr};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, EntityTrait, PaginatorTrait, QueryFilter, QueryOrder, Set,
    TransactionTrait,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{info, instrument, warn};
use utoipa::ToSchema;
use uuid::Uuid;
use validator::Validate;

/// Catalog SKUs are a letter prefix and a numeric body, e.g. "PEP-1042".
static SKU_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[A-Z]{2,6}-[0-9]{2,6}$").expect("SKU pattern is valid"));

pub fn is_valid_sku(sku: &str) -> bool {
    SKU_PATTERN.is_match(sku)
}

fn product_cache_key(slug: &str) -> String {
    format!("catalog:product:{}", slug)
}

#[derive(Debug, Clone, Deserialize, Validate, ToSchema)]
pub struct NewProduct {
    #[validate(length(min = 1, max = 255, message = "Name is required"))]
    pub name: String,
    #[validate(length(min = 1, max = 255, message = "Slug is required"))]
    pub slug: String,
    #[validate(length(min = 1, max = 64, message = "Catalog number is required"))]
    pub catalog_number: String,
    #[validate(length(min = 1, message = "Description is required"))]
    pub description: String,
    pub research_use_statement: Option<String>,
    pub status: Option<ProductStatus>,
}

#[derive(Debug, Clone, Default, Deserialize, ToSchema)]
pub struct UpdateProduct {
    pub name: Option<String>,
    pub description: Option<String>,
    pub research_use_statement: Option<String>,
    pub status: Option<ProductStatus>,
}

#[derive(Debug, Clone, Deserialize, Validate, ToSchema)]
pub struct NewVariant {
    #[validate(length(min = 1, message = "SKU is required"))]
    pub sku: String,
    #[validate(length(min = 1, max = 64, message = "Size label is required"))]
    pub size_label: String,
    pub price: Decimal,
    pub purity: Option<String>,
    /// Units to receive immediately after provisioning, via a restock entry
    pub initial_stock: Option<i32>,
    pub reorder_point: Option<i32>,
}

#[derive(Debug, Clone, Default, Deserialize, ToSchema)]
pub struct UpdateVariant {
    pub size_label: Option<String>,
    pub price: Option<Decimal>,
    pub purity: Option<String>,
    pub active: Option<bool>,
}

/// Variant joined with its live availability for listing pages.
#[derive(Debug, Serialize, ToSchema)]
pub struct VariantWithAvailability {
    #[serde(flatten)]
    pub variant: product_variant::Model,
    pub available_stock: i32,
    pub in_stock: bool,
}

/// Product with its variants, the shape detail pages consume.
#[derive(Debug, Serialize, ToSchema)]
pub struct ProductDetail {
    #[serde(flatten)]
    pub product: product::Model,
    pub variants: Vec<VariantWithAvailability>,
}

#[derive(Debug, Clone, Default, Deserialize, ToSchema)]
pub struct ProductFilter {
    pub status: Option<ProductStatus>,
    /// Case-insensitive match against name and catalog number
    pub search: Option<String>,
}

#[derive(Clone)]
pub struct CatalogService {
    db: Arc<DbPool>,
    event_sender: Arc<EventSender>,
    cache: TtlCache,
    inventory: Arc<InventoryService>,
}

impl CatalogService {
    pub fn new(
        db: Arc<DbPool>,
        event_sender: Arc<EventSender>,
        cache: TtlCache,
        inventory: Arc<InventoryService>,
    ) -> Self {
        Self {
            db,
            event_sender,
            cache,
            inventory,
        }
    }

    #[instrument(skip(self, input), fields(slug = %input.slug))]
    pub async fn create_product(
        &self,
        input: NewProduct,
    ) -> Result<product::Model, ServiceError> {
        input
            .validate()
            .map_err(|e| ServiceError::ValidationError(e.to_string()))?;

        let existing = Product::find()
            .filter(product::Column::Slug.eq(input.slug.clone()))
            .one(&*self.db)
            .await?;
        if existing.is_some() {
            return Err(ServiceError::Conflict(format!(
                "A product with slug {} already exists",
                input.slug
            )));
        }

        let now = Utc::now();
        let model = product::ActiveModel {
            id: Set(Uuid::new_v4()),
            name: Set(input.name),
            slug: Set(input.slug),
            catalog_number: Set(input.catalog_number),
            description: Set(input.description),
            research_use_statement: Set(input.research_use_statement),
            status: Set(input.status.unwrap_or(ProductStatus::Draft)),
            created_at: Set(now),
            updated_at: Set(now),
        };
        let created = model.insert(&*self.db).await?;

        self.event_sender
            .send_or_log(Event::ProductCreated(created.id))
            .await;
        info!(product_id = %created.id, slug = %created.slug, "Product created");
        Ok(created)
    }

    #[instrument(skip(self, input))]
    pub async fn update_product(
        &self,
        product_id: Uuid,
        input: UpdateProduct,
    ) -> Result<product::Model, ServiceError> {
        let existing = self.get_product(product_id).await?;
        let slug = existing.slug.clone();

        let mut active: product::ActiveModel = existing.into();
        if let Some(name) = input.name {
            if name.trim().is_empty() {
                return Err(ServiceError::ValidationError(
                    "Name cannot be empty".to_string(),
                ));
            }
            active.name = Set(name);
        }
        if let Some(description) = input.description {
            active.description = Set(description);
        }
        if let Some(statement) = input.research_use_statement {
            active.research_use_statement = Set(Some(statement));
        }
        if let Some(status) = input.status {
            active.status = Set(status);
        }
        active.updated_at = Set(Utc::now());
        let updated = active.update(&*self.db).await?;

        self.invalidate_product_cache(&slug).await;
        self.event_sender
            .send_or_log(Event::ProductUpdated(updated.id))
            .await;
        Ok(updated)
    }

    /// Archives a product instead of deleting it. Its variants are
    /// deactivated so nothing in the cart flow can still sell them; orders
    /// and ledger history referencing them stay intact.
    #[instrument(skip(self))]
    pub async fn archive_product(&self, product_id: Uuid) -> Result<product::Model, ServiceError> {
        let existing = self.get_product(product_id).await?;
        if existing.status == ProductStatus::Archived {
            return Err(ServiceError::InvalidOperation(format!(
                "Product {} is already archived",
                product_id
            )));
        }
        let slug = existing.slug.clone();

        let txn = self.db.begin().await?;

        let mut active: product::ActiveModel = existing.into();
        active.status = Set(ProductStatus::Archived);
        active.updated_at = Set(Utc::now());
        let archived = active.update(&txn).await?;

        ProductVariant::update_many()
            .col_expr(product_variant::Column::Active, Expr::value(false))
            .col_expr(
                product_variant::Column::UpdatedAt,
                Expr::value(Utc::now()),
            )
            .filter(product_variant::Column::ProductId.eq(product_id))
            .exec(&txn)
            .await?;

        txn.commit().await?;

        self.invalidate_product_cache(&slug).await;
        self.event_sender
            .send_or_log(Event::ProductArchived(archived.id))
            .await;
        info!(product_id = %archived.id, "Product archived");
        Ok(archived)
    }

    pub async fn get_product(&self, product_id: Uuid) -> Result<product::Model, ServiceError> {
        Product::find_by_id(product_id)
            .one(&*self.db)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("Product {} not found", product_id)))
    }

    /// Product detail by slug, served from cache when fresh.
    #[instrument(skip(self))]
    pub async fn get_product_by_slug(&self, slug: &str) -> Result<ProductDetail, ServiceError> {
        let key = product_cache_key(slug);
        if let Some(detail) = self.cache.get_json::<CachedProductDetail>(&key).await? {
            return Ok(detail.into());
        }

        let product = Product::find()
            .filter(product::Column::Slug.eq(slug))
            .one(&*self.db)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("Product {} not found", slug)))?;

        let variants = self.list_variants(product.id).await?;
        let detail = ProductDetail { product, variants };

        self.cache
            .set_json(&key, &CachedProductDetail::from(&detail), None)
            .await?;
        Ok(detail)
    }

    /// Paginated product listing with optional status and text filters.
    #[instrument(skip(self))]
    pub async fn list_products(
        &self,
        filter: ProductFilter,
        page: u64,
        per_page: u64,
    ) -> Result<(Vec<product::Model>, u64), ServiceError> {
        let mut query = Product::find();
        if let Some(status) = filter.status {
            query = query.filter(product::Column::Status.eq(status));
        }
        if let Some(search) = filter.search.filter(|s| !s.trim().is_empty()) {
            let term = format!("%{}%", search.trim());
            query = query.filter(
                Condition::any()
                    .add(product::Column::Name.like(term.clone()))
                    .add(product::Column::CatalogNumber.like(term)),
            );
        }

        let paginator = query
            .order_by_asc(product::Column::Name)
            .paginate(&*self.db, per_page);

        let total = paginator.num_items().await?;
        let products = paginator.fetch_page(page.saturating_sub(1)).await?;
        Ok((products, total))
    }

    /// Adds a variant and provisions its inventory item atomically. The
    /// item starts at zero; any initial stock arrives as a restock ledger
    /// entry inside the same transaction.
    #[instrument(skip(self, input), fields(sku = %input.sku))]
    pub async fn add_variant(
        &self,
        product_id: Uuid,
        input: NewVariant,
    ) -> Result<product_variant::Model, ServiceError> {
        input
            .validate()
            .map_err(|e| ServiceError::ValidationError(e.to_string()))?;
        if !is_valid_sku(&input.sku) {
            return Err(ServiceError::ValidationError(format!(
                "SKU {} does not match the catalog format (e.g. PEP-1042)",
                input.sku
            )));
        }
        if input.price < Decimal::ZERO {
            return Err(ServiceError::ValidationError(
                "Price cannot be negative".to_string(),
            ));
        }
        if input.initial_stock.unwrap_or(0) < 0 {
            return Err(ServiceError::ValidationError(
                "Initial stock cannot be negative".to_string(),
            ));
        }

        let product = self.get_product(product_id).await?;
        if product.status == ProductStatus::Archived {
            return Err(ServiceError::InvalidOperation(format!(
                "Product {} is archived",
                product_id
            )));
        }

        let txn = self.db.begin().await?;

        let sku_taken = ProductVariant::find()
            .filter(product_variant::Column::Sku.eq(input.sku.clone()))
            .one(&txn)
            .await?
            .is_some();
        if sku_taken {
            return Err(ServiceError::Conflict(format!(
                "SKU {} is already in use",
                input.sku
            )));
        }

        let now = Utc::now();
        let variant = product_variant::ActiveModel {
            id: Set(Uuid::new_v4()),
            product_id: Set(product_id),
            sku: Set(input.sku.clone()),
            size_label: Set(input.size_label.clone()),
            price: Set(input.price),
            purity: Set(input.purity),
            active: Set(true),
            created_at: Set(now),
            updated_at: Set(now),
        };
        let variant = variant.insert(&txn).await?;

        let product_name = format!("{} {}", product.name, input.size_label);
        let item = inventory_item::ActiveModel {
            id: Set(Uuid::new_v4()),
            variant_id: Set(variant.id),
            sku: Set(variant.sku.clone()),
            product_name: Set(product_name),
            current_stock: Set(0),
            reserved_stock: Set(0),
            available_stock: Set(0),
            reorder_point: Set(input.reorder_point.unwrap_or(0)),
            max_stock: Set(None),
            cost_per_unit: Set(None),
            batch_number: Set(None),
            expiry_date: Set(None),
            location: Set(None),
            temperature_zone: Set(None),
            created_at: Set(now),
            updated_at: Set(now),
        };
        item.insert(&txn).await?;

        let restock = match input.initial_stock {
            Some(quantity) if quantity > 0 => Some(
                self.inventory
                    .apply_transaction(
                        &txn,
                        crate::services::inventory::NewTransaction {
                            sku: variant.sku.clone(),
                            transaction_type:
                                crate::entities::inventory_transaction::TransactionType::Restock,
                            quantity_change: quantity,
                            reference_id: None,
                            reference_type: None,
                            reason: Some("Initial stock".to_string()),
                            notes: None,
                            created_by: None,
                        },
                    )
                    .await?,
            ),
            _ => None,
        };

        txn.commit().await?;

        if let Some(outcome) = restock {
            self.inventory.finalize(&outcome).await;
        }

        self.invalidate_product_cache(&product.slug).await;
        self.event_sender
            .send_or_log(Event::VariantCreated {
                product_id,
                variant_id: variant.id,
            })
            .await;
        info!(variant_id = %variant.id, sku = %variant.sku, "Variant added");
        Ok(variant)
    }

    #[instrument(skip(self, input))]
    pub async fn update_variant(
        &self,
        variant_id: Uuid,
        input: UpdateVariant,
    ) -> Result<product_variant::Model, ServiceError> {
        if let Some(price) = input.price {
            if price < Decimal::ZERO {
                return Err(ServiceError::ValidationError(
                    "Price cannot be negative".to_string(),
                ));
            }
        }

        let variant = ProductVariant::find_by_id(variant_id)
            .one(&*self.db)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("Variant {} not found", variant_id)))?;
        let product = self.get_product(variant.product_id).await?;

        let mut active: product_variant::ActiveModel = variant.into();
        if let Some(size_label) = input.size_label {
            active.size_label = Set(size_label);
        }
        if let Some(price) = input.price {
            active.price = Set(price);
        }
        if let Some(purity) = input.purity {
            active.purity = Set(Some(purity));
        }
        if let Some(is_active) = input.active {
            active.active = Set(is_active);
        }
        active.updated_at = Set(Utc::now());
        let updated = active.update(&*self.db).await?;

        self.invalidate_product_cache(&product.slug).await;
        Ok(updated)
    }

    pub async fn get_variant(
        &self,
        variant_id: Uuid,
    ) -> Result<product_variant::Model, ServiceError> {
        ProductVariant::find_by_id(variant_id)
            .one(&*self.db)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("Variant {} not found", variant_id)))
    }

    pub async fn get_variant_by_sku(
        &self,
        sku: &str,
    ) -> Result<product_variant::Model, ServiceError> {
        ProductVariant::find()
            .filter(product_variant::Column::Sku.eq(sku))
            .one(&*self.db)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("Variant for SKU {} not found", sku)))
    }

    /// Variants of a product with availability joined from their inventory
    /// items. A variant whose item is missing lists as unavailable rather
    /// than erroring; provisioning normally guarantees the item exists.
    #[instrument(skip(self))]
    pub async fn list_variants(
        &self,
        product_id: Uuid,
    ) -> Result<Vec<VariantWithAvailability>, ServiceError> {
        let variants = ProductVariant::find()
            .filter(product_variant::Column::ProductId.eq(product_id))
            .order_by_asc(product_variant::Column::SizeLabel)
            .all(&*self.db)
            .await?;

        let skus: Vec<String> = variants.iter().map(|v| v.sku.clone()).collect();
        let items = InventoryItem::find()
            .filter(inventory_item::Column::Sku.is_in(skus))
            .all(&*self.db)
            .await?;

        let rows = variants
            .into_iter()
            .map(|variant| {
                let available = items
                    .iter()
                    .find(|item| item.sku == variant.sku)
                    .map(|item| item.available_stock)
                    .unwrap_or_else(|| {
                        warn!(sku = %variant.sku, "Variant has no inventory item");
                        0
                    });
                VariantWithAvailability {
                    in_stock: available > 0,
                    available_stock: available,
                    variant,
                }
            })
            .collect();
        Ok(rows)
    }

    async fn invalidate_product_cache(&self, slug: &str) {
        if let Err(e) = self.cache.delete(&product_cache_key(slug)).await {
            warn!(slug = %slug, error = %e, "Failed to invalidate product cache");
        }
    }
}

/// Cache image of [`ProductDetail`]. The response type flattens with serde,
/// which would collide on round-trip, so the cached form keeps the fields
/// separate.
#[derive(Debug, Serialize, Deserialize)]
struct CachedProductDetail {
    product: product::Model,
    variants: Vec<CachedVariant>,
}

#[derive(Debug, Serialize, Deserialize)]
struct CachedVariant {
    variant: product_variant::Model,
    available_stock: i32,
}

impl From<&ProductDetail> for CachedProductDetail {
    fn from(detail: &ProductDetail) -> Self {
        Self {
            product: detail.product.clone(),
            variants: detail
                .variants
                .iter()
                .map(|v| CachedVariant {
                    variant: v.variant.clone(),
                    available_stock: v.available_stock,
                })
                .collect(),
        }
    }
}

impl From<CachedProductDetail> for ProductDetail {
    fn from(cached: CachedProductDetail) -> Self {
        Self {
            product: cached.product,
            variants: cached
                .variants
                .into_iter()
                .map(|v| VariantWithAvailability {
                    in_stock: v.available_stock > 0,
                    available_stock: v.available_stock,
                    variant: v.variant,
                })
                .collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sku_format_accepts_catalog_style() {
        assert!(is_valid_sku("PEP-100"));
        assert!(is_valid_sku("PEP-1042"));
        assert!(is_valid_sku("BPC-157"));
        assert!(is_valid_sku("AOD-9604"));
    }

    #[test]
    fn sku_format_rejects_off_pattern_values() {
        assert!(!is_valid_sku("pep-100"));
        assert!(!is_valid_sku("PEP100"));
        assert!(!is_valid_sku("PEP-"));
        assert!(!is_valid_sku("P-100"));
        assert!(!is_valid_sku("PEP-100-5MG"));
        assert!(!is_valid_sku(" PEP-100"));
        assert!(!is_valid_sku(""));
    }
}

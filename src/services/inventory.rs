//! Stock-keeping around an append-only transaction ledger.
//!
//! Every stock movement, physical or reserved, is recorded as an
//! `inventory_transaction` row and the counters on `inventory_items` are
//! updated in the same database transaction. Nothing else writes those
//! counters, so the item row is always the running sum of its ledger.

use crate::{
    cache::TtlCache,
    config::AppConfig,
    db::DbPool,
    entities::inventory_item::{self, Entity as InventoryItem},
    entities::inventory_transaction::{self, Entity as InventoryTransaction, TransactionType},
    errors::ServiceError,
    events::{Event, EventSender},
    metrics::BUSINESS_METRICS,
    services::alerts::{AlertService, ReconcileOutcome},
};
use chrono::{DateTime, Duration as ChronoDuration, Utc};
use rust_decimal::Decimal;
use sea_orm::sea_query::Expr;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, EntityTrait, PaginatorTrait, QueryFilter,
    QueryOrder, Set, TransactionTrait,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{info, instrument, warn};
use utoipa::ToSchema;
use uuid::Uuid;
use validator::Validate;

/// Current stock position for one SKU. Cached per SKU and invalidated on
/// every ledger write for that item.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct StockLevel {
    pub sku: String,
    pub product_name: String,
    pub current_stock: i32,
    pub reserved_stock: i32,
    pub available_stock: i32,
    pub reorder_point: i32,
    pub is_low_stock: bool,
    pub is_out_of_stock: bool,
}

impl From<&inventory_item::Model> for StockLevel {
    fn from(item: &inventory_item::Model) -> Self {
        Self {
            sku: item.sku.clone(),
            product_name: item.product_name.clone(),
            current_stock: item.current_stock,
            reserved_stock: item.reserved_stock,
            available_stock: item.available_stock,
            reorder_point: item.reorder_point,
            is_low_stock: item.is_low_stock(),
            is_out_of_stock: item.is_out_of_stock(),
        }
    }
}

/// Input for a new ledger entry.
#[derive(Debug, Clone, Deserialize, Validate, ToSchema)]
pub struct NewTransaction {
    #[validate(length(min = 1, message = "SKU is required"))]
    pub sku: String,
    pub transaction_type: TransactionType,
    /// Signed: positive adds stock, negative removes it
    pub quantity_change: i32,
    pub reference_id: Option<Uuid>,
    pub reference_type: Option<String>,
    pub reason: Option<String>,
    pub notes: Option<String>,
    pub created_by: Option<String>,
}

/// Input for registering a new inventory item.
#[derive(Debug, Clone, Deserialize, Validate, ToSchema)]
pub struct NewInventoryItem {
    pub variant_id: Uuid,
    #[validate(length(min = 1, message = "SKU is required"))]
    pub sku: String,
    #[validate(length(min = 1, message = "Product name is required"))]
    pub product_name: String,
    #[validate(range(min = 0, message = "Reorder point cannot be negative"))]
    pub reorder_point: i32,
    pub max_stock: Option<i32>,
    pub cost_per_unit: Option<Decimal>,
    pub batch_number: Option<String>,
    pub expiry_date: Option<DateTime<Utc>>,
    pub location: Option<String>,
    pub temperature_zone: Option<String>,
    #[validate(range(min = 0, message = "Initial stock cannot be negative"))]
    pub initial_stock: i32,
}

/// Partial update of item metadata. Stock counters are not touched here;
/// they only move through the ledger.
#[derive(Debug, Clone, Default, Deserialize, ToSchema)]
pub struct UpdateInventoryItem {
    pub reorder_point: Option<i32>,
    pub max_stock: Option<Option<i32>>,
    pub cost_per_unit: Option<Decimal>,
    pub batch_number: Option<String>,
    pub expiry_date: Option<Option<DateTime<Utc>>>,
    pub location: Option<String>,
    pub temperature_zone: Option<String>,
}

/// Result of one ledger write: the new row, the item after the write and
/// any alert state changes that came out of reconciliation.
#[derive(Debug)]
pub struct TransactionOutcome {
    pub transaction: inventory_transaction::Model,
    pub item: inventory_item::Model,
    pub alerts: ReconcileOutcome,
}

#[derive(Clone)]
pub struct InventoryService {
    db: Arc<DbPool>,
    event_sender: Arc<EventSender>,
    cache: TtlCache,
    alerts: Arc<AlertService>,
    config: Arc<AppConfig>,
}

fn stock_cache_key(sku: &str) -> String {
    format!("inventory:stock:{}", sku)
}

impl InventoryService {
    pub fn new(
        db: Arc<DbPool>,
        event_sender: Arc<EventSender>,
        cache: TtlCache,
        alerts: Arc<AlertService>,
        config: Arc<AppConfig>,
    ) -> Self {
        Self {
            db,
            event_sender,
            cache,
            alerts,
            config,
        }
    }

    /// Registers an inventory item for a variant. Initial stock, when
    /// non-zero, arrives through a restock ledger entry like any other
    /// receipt.
    #[instrument(skip(self, input), fields(sku = %input.sku))]
    pub async fn create_item(
        &self,
        input: NewInventoryItem,
    ) -> Result<inventory_item::Model, ServiceError> {
        input
            .validate()
            .map_err(|e| ServiceError::ValidationError(e.to_string()))?;

        let txn = self.db.begin().await?;

        let existing = InventoryItem::find()
            .filter(inventory_item::Column::Sku.eq(input.sku.clone()))
            .one(&txn)
            .await?;
        if existing.is_some() {
            return Err(ServiceError::Conflict(format!(
                "Inventory item for SKU {} already exists",
                input.sku
            )));
        }

        let now = Utc::now();
        let item = inventory_item::ActiveModel {
            id: Set(Uuid::new_v4()),
            variant_id: Set(input.variant_id),
            sku: Set(input.sku.clone()),
            product_name: Set(input.product_name.clone()),
            current_stock: Set(0),
            reserved_stock: Set(0),
            available_stock: Set(0),
            reorder_point: Set(input.reorder_point),
            max_stock: Set(input.max_stock),
            cost_per_unit: Set(input.cost_per_unit),
            batch_number: Set(input.batch_number),
            expiry_date: Set(input.expiry_date),
            location: Set(input.location),
            temperature_zone: Set(input.temperature_zone),
            created_at: Set(now),
            updated_at: Set(now),
        };
        let mut item = item.insert(&txn).await?;

        let mut outcome = None;
        if input.initial_stock > 0 {
            let applied = self
                .apply_transaction(
                    &txn,
                    NewTransaction {
                        sku: input.sku.clone(),
                        transaction_type: TransactionType::Restock,
                        quantity_change: input.initial_stock,
                        reference_id: None,
                        reference_type: None,
                        reason: Some("Initial stock".to_string()),
                        notes: None,
                        created_by: None,
                    },
                )
                .await?;
            item = applied.item.clone();
            outcome = Some(applied);
        }

        txn.commit().await?;

        if let Some(outcome) = outcome {
            self.finalize(&outcome).await;
        }

        info!(sku = %item.sku, item_id = %item.id, "Inventory item created");
        Ok(item)
    }

    /// Updates item metadata. Expiry changes can raise or clear expiry
    /// alerts, so reconciliation runs in the same transaction.
    #[instrument(skip(self, input))]
    pub async fn update_item(
        &self,
        item_id: Uuid,
        input: UpdateInventoryItem,
    ) -> Result<inventory_item::Model, ServiceError> {
        if let Some(reorder_point) = input.reorder_point {
            if reorder_point < 0 {
                return Err(ServiceError::ValidationError(
                    "Reorder point cannot be negative".to_string(),
                ));
            }
        }

        let txn = self.db.begin().await?;

        let item = InventoryItem::find_by_id(item_id)
            .one(&txn)
            .await?
            .ok_or_else(|| {
                ServiceError::NotFound(format!("Inventory item {} not found", item_id))
            })?;
        let sku = item.sku.clone();

        let mut active: inventory_item::ActiveModel = item.into();
        if let Some(reorder_point) = input.reorder_point {
            active.reorder_point = Set(reorder_point);
        }
        if let Some(max_stock) = input.max_stock {
            active.max_stock = Set(max_stock);
        }
        if let Some(cost_per_unit) = input.cost_per_unit {
            active.cost_per_unit = Set(Some(cost_per_unit));
        }
        if let Some(batch_number) = input.batch_number {
            active.batch_number = Set(Some(batch_number));
        }
        if let Some(expiry_date) = input.expiry_date {
            active.expiry_date = Set(expiry_date);
        }
        if let Some(location) = input.location {
            active.location = Set(Some(location));
        }
        if let Some(temperature_zone) = input.temperature_zone {
            active.temperature_zone = Set(Some(temperature_zone));
        }
        active.updated_at = Set(Utc::now());
        let updated = active.update(&txn).await?;

        let alerts = self.alerts.reconcile_item(&txn, &updated).await?;

        txn.commit().await?;

        self.invalidate_stock_cache(&sku).await;
        self.alerts.publish_outcome(&alerts).await;

        Ok(updated)
    }

    pub async fn get_item(&self, item_id: Uuid) -> Result<inventory_item::Model, ServiceError> {
        InventoryItem::find_by_id(item_id)
            .one(&*self.db)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("Inventory item {} not found", item_id)))
    }

    pub async fn get_item_by_sku(&self, sku: &str) -> Result<inventory_item::Model, ServiceError> {
        InventoryItem::find()
            .filter(inventory_item::Column::Sku.eq(sku))
            .one(&*self.db)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("Inventory item for SKU {} not found", sku)))
    }

    /// Lists inventory items, newest first.
    #[instrument(skip(self))]
    pub async fn list_items(
        &self,
        page: u64,
        per_page: u64,
    ) -> Result<(Vec<inventory_item::Model>, u64), ServiceError> {
        let paginator = InventoryItem::find()
            .order_by_desc(inventory_item::Column::CreatedAt)
            .paginate(&*self.db, per_page);

        let total = paginator.num_items().await?;
        let items = paginator.fetch_page(page.saturating_sub(1)).await?;

        Ok((items, total))
    }

    /// Stock position for one SKU, served from cache when fresh.
    #[instrument(skip(self))]
    pub async fn get_stock_level(&self, sku: &str) -> Result<StockLevel, ServiceError> {
        let key = stock_cache_key(sku);
        if let Some(level) = self.cache.get_json::<StockLevel>(&key).await? {
            return Ok(level);
        }

        let item = self.get_item_by_sku(sku).await?;
        let level = StockLevel::from(&item);
        self.cache.set_json(&key, &level, None).await?;
        Ok(level)
    }

    /// Whether `quantity` units of a SKU could be reserved right now.
    /// Unknown SKUs are simply not in stock.
    pub async fn is_in_stock(&self, sku: &str, quantity: i32) -> Result<bool, ServiceError> {
        match self.get_stock_level(sku).await {
            Ok(level) => Ok(level.available_stock >= quantity),
            Err(ServiceError::NotFound(_)) => Ok(false),
            Err(e) => Err(e),
        }
    }

    /// Items at or below their reorder point, out-of-stock rows included.
    pub async fn get_low_stock_items(&self) -> Result<Vec<inventory_item::Model>, ServiceError> {
        let items = InventoryItem::find()
            .filter(
                Expr::col(inventory_item::Column::CurrentStock)
                    .lte(Expr::col(inventory_item::Column::ReorderPoint)),
            )
            .order_by_asc(inventory_item::Column::VariantId)
            .all(&*self.db)
            .await?;
        Ok(items)
    }

    pub async fn get_out_of_stock_items(&self) -> Result<Vec<inventory_item::Model>, ServiceError> {
        let items = InventoryItem::find()
            .filter(inventory_item::Column::CurrentStock.eq(0))
            .order_by_asc(inventory_item::Column::Sku)
            .all(&*self.db)
            .await?;
        Ok(items)
    }

    /// Items whose expiry date falls on or before now + `within_days`,
    /// already-expired batches included. Items with no expiry date never
    /// surface here.
    #[instrument(skip(self))]
    pub async fn get_expiring_items(
        &self,
        within_days: Option<i64>,
    ) -> Result<Vec<inventory_item::Model>, ServiceError> {
        let days = within_days.unwrap_or(self.config.expiry_window_days);
        if days < 0 {
            return Err(ServiceError::InvalidInput(
                "Expiry window cannot be negative".to_string(),
            ));
        }
        let cutoff = Utc::now() + ChronoDuration::days(days);

        let items = InventoryItem::find()
            .filter(inventory_item::Column::ExpiryDate.is_not_null())
            .filter(inventory_item::Column::ExpiryDate.lte(cutoff))
            .order_by_asc(inventory_item::Column::ExpiryDate)
            .all(&*self.db)
            .await?;
        Ok(items)
    }

    /// Records a ledger entry and updates the item counters atomically.
    /// This is the only write path for stock; restock, adjust, reserve and
    /// release all funnel through here.
    #[instrument(skip(self, input), fields(sku = %input.sku, transaction_type = ?input.transaction_type))]
    pub async fn create_transaction(
        &self,
        input: NewTransaction,
    ) -> Result<TransactionOutcome, ServiceError> {
        let txn = self.db.begin().await?;
        let outcome = self.apply_transaction(&txn, input).await?;
        txn.commit().await?;

        self.finalize(&outcome).await;
        Ok(outcome)
    }

    /// Ledger write against a caller-supplied connection, used when a
    /// larger transaction (checkout, fulfillment) needs stock moves inside
    /// its own atomic scope. The caller must invoke [`finalize`] for each
    /// outcome after its commit.
    ///
    /// [`finalize`]: InventoryService::finalize
    pub(crate) async fn apply_transaction<C: ConnectionTrait>(
        &self,
        conn: &C,
        input: NewTransaction,
    ) -> Result<TransactionOutcome, ServiceError> {
        input
            .validate()
            .map_err(|e| ServiceError::ValidationError(e.to_string()))?;
        if input.quantity_change == 0 {
            return Err(ServiceError::InvalidInput(
                "Quantity change must be non-zero".to_string(),
            ));
        }
        if input.transaction_type == TransactionType::Adjustment
            && input.reason.as_deref().map_or(true, |r| r.trim().is_empty())
        {
            return Err(ServiceError::ValidationError(
                "Adjustments require a reason".to_string(),
            ));
        }

        let item = InventoryItem::find()
            .filter(inventory_item::Column::Sku.eq(input.sku.clone()))
            .one(conn)
            .await?
            .ok_or_else(|| {
                ServiceError::NotFound(format!("Inventory item for SKU {} not found", input.sku))
            })?;

        let quantity_change = input.quantity_change;
        let (previous, new_value) = if input.transaction_type.is_physical() {
            let previous = item.current_stock;
            let new_value = previous + quantity_change;
            if new_value < 0 {
                return Err(ServiceError::InsufficientStock(format!(
                    "SKU {}: cannot remove {} units, only {} on hand",
                    item.sku,
                    quantity_change.abs(),
                    previous
                )));
            }
            if let Some(max) = item.max_stock {
                if new_value > max {
                    return Err(ServiceError::InvalidOperation(format!(
                        "SKU {}: stock of {} would exceed the maximum of {}",
                        item.sku, new_value, max
                    )));
                }
            }
            (previous, new_value)
        } else {
            let previous = item.reserved_stock;
            let new_value = previous + quantity_change;
            if quantity_change > 0 && quantity_change > item.available_stock {
                return Err(ServiceError::InsufficientStock(format!(
                    "SKU {}: cannot reserve {} units, only {} available",
                    item.sku, quantity_change, item.available_stock
                )));
            }
            if new_value < 0 {
                return Err(ServiceError::InvalidOperation(format!(
                    "SKU {}: cannot release {} units, only {} reserved",
                    item.sku,
                    quantity_change.abs(),
                    previous
                )));
            }
            (previous, new_value)
        };

        let transaction = inventory_transaction::ActiveModel {
            id: Set(Uuid::new_v4()),
            item_id: Set(item.id),
            sku: Set(item.sku.clone()),
            r#type: Set(input.transaction_type.to_string()),
            quantity_change: Set(quantity_change),
            previous_stock: Set(previous),
            new_stock: Set(new_value),
            reference_id: Set(input.reference_id),
            reference_type: Set(input.reference_type),
            reason: Set(input.reason),
            notes: Set(input.notes),
            created_by: Set(input.created_by),
            created_at: Set(Utc::now()),
        };
        let transaction = transaction.insert(conn).await?;

        let (current, reserved) = if input.transaction_type.is_physical() {
            (new_value, item.reserved_stock)
        } else {
            (item.current_stock, new_value)
        };
        let available = (current - reserved).max(0);

        let mut active: inventory_item::ActiveModel = item.into();
        active.current_stock = Set(current);
        active.reserved_stock = Set(reserved);
        active.available_stock = Set(available);
        active.updated_at = Set(Utc::now());
        let item = active.update(conn).await?;

        let alerts = self.alerts.reconcile_item(conn, &item).await?;

        info!(
            sku = %item.sku,
            transaction_type = %transaction.r#type,
            quantity_change = quantity_change,
            new_stock = new_value,
            "Inventory transaction recorded"
        );

        Ok(TransactionOutcome {
            transaction,
            item,
            alerts,
        })
    }

    /// Post-commit bookkeeping for a ledger write: cache invalidation,
    /// events and metrics.
    pub(crate) async fn finalize(&self, outcome: &TransactionOutcome) {
        self.invalidate_stock_cache(&outcome.item.sku).await;

        BUSINESS_METRICS.record_inventory_transaction();
        if outcome.transaction.r#type.parse() == Ok(TransactionType::Reservation) {
            BUSINESS_METRICS
                .reservations_active
                .add(outcome.transaction.quantity_change as f64);
        }
        self.event_sender
            .send_or_log(Event::InventoryTransactionRecorded {
                item_id: outcome.item.id,
                transaction_id: outcome.transaction.id,
                transaction_type: outcome.transaction.r#type.clone(),
                quantity_change: outcome.transaction.quantity_change,
            })
            .await;

        self.alerts.publish_outcome(&outcome.alerts).await;
    }

    async fn invalidate_stock_cache(&self, sku: &str) {
        if let Err(e) = self.cache.delete(&stock_cache_key(sku)).await {
            warn!(sku = %sku, error = %e, "Failed to invalidate stock cache");
        }
    }

    /// Receives stock, e.g. a supplier delivery.
    pub async fn restock(
        &self,
        sku: &str,
        quantity: i32,
        reason: Option<String>,
        created_by: Option<String>,
    ) -> Result<TransactionOutcome, ServiceError> {
        if quantity <= 0 {
            return Err(ServiceError::InvalidInput(
                "Restock quantity must be positive".to_string(),
            ));
        }
        self.create_transaction(NewTransaction {
            sku: sku.to_string(),
            transaction_type: TransactionType::Restock,
            quantity_change: quantity,
            reference_id: None,
            reference_type: None,
            reason,
            notes: None,
            created_by,
        })
        .await
    }

    /// Manual correction after a count. The reason is mandatory.
    pub async fn adjust_stock(
        &self,
        sku: &str,
        quantity_change: i32,
        reason: String,
        created_by: Option<String>,
    ) -> Result<TransactionOutcome, ServiceError> {
        self.create_transaction(NewTransaction {
            sku: sku.to_string(),
            transaction_type: TransactionType::Adjustment,
            quantity_change,
            reference_id: None,
            reference_type: None,
            reason: Some(reason),
            notes: None,
            created_by,
        })
        .await
    }

    /// Sets aside available stock for an order being placed.
    pub async fn reserve_stock(
        &self,
        sku: &str,
        quantity: i32,
        reference_id: Option<Uuid>,
    ) -> Result<TransactionOutcome, ServiceError> {
        if quantity <= 0 {
            return Err(ServiceError::InvalidInput(
                "Reservation quantity must be positive".to_string(),
            ));
        }
        let outcome = self
            .create_transaction(NewTransaction {
                sku: sku.to_string(),
                transaction_type: TransactionType::Reservation,
                quantity_change: quantity,
                reference_id,
                reference_type: reference_id.map(|_| "order".to_string()),
                reason: Some("Stock reserved".to_string()),
                notes: None,
                created_by: None,
            })
            .await?;

        self.event_sender
            .send_or_log(Event::InventoryReserved {
                item_id: outcome.item.id,
                quantity,
                reference_id,
            })
            .await;

        Ok(outcome)
    }

    /// Returns previously reserved units to the available pool. Releasing
    /// more than is currently reserved is rejected.
    pub async fn release_reservation(
        &self,
        sku: &str,
        quantity: i32,
        reference_id: Option<Uuid>,
    ) -> Result<TransactionOutcome, ServiceError> {
        if quantity <= 0 {
            return Err(ServiceError::InvalidInput(
                "Release quantity must be positive".to_string(),
            ));
        }
        let outcome = self
            .create_transaction(NewTransaction {
                sku: sku.to_string(),
                transaction_type: TransactionType::Reservation,
                quantity_change: -quantity,
                reference_id,
                reference_type: reference_id.map(|_| "order".to_string()),
                reason: Some("Reservation released".to_string()),
                notes: None,
                created_by: None,
            })
            .await?;

        self.event_sender
            .send_or_log(Event::ReservationReleased {
                item_id: outcome.item.id,
                quantity,
                reference_id,
            })
            .await;

        Ok(outcome)
    }

    /// Ships an order's lines: each line consumes its reservation and
    /// deducts physical stock in one atomic scope. Either every line moves
    /// or none do.
    #[instrument(skip(self, lines), fields(order_id = %order_id))]
    pub async fn process_order(
        &self,
        order_id: Uuid,
        lines: &[(String, i32)],
    ) -> Result<Vec<TransactionOutcome>, ServiceError> {
        if lines.is_empty() {
            return Err(ServiceError::InvalidInput(
                "Order has no lines to process".to_string(),
            ));
        }

        let txn = self.db.begin().await?;
        let mut outcomes = Vec::with_capacity(lines.len() * 2);
        for (sku, quantity) in lines {
            outcomes.extend(self.apply_order_line(&txn, order_id, sku, *quantity).await?);
        }
        txn.commit().await?;

        for outcome in &outcomes {
            self.finalize(outcome).await;
        }

        info!(order_id = %order_id, line_count = lines.len(), "Order stock processed");
        Ok(outcomes)
    }

    /// Sale plus reservation consumption for one order line, in the
    /// caller's transaction scope.
    pub(crate) async fn apply_order_line<C: ConnectionTrait>(
        &self,
        conn: &C,
        order_id: Uuid,
        sku: &str,
        quantity: i32,
    ) -> Result<Vec<TransactionOutcome>, ServiceError> {
        if quantity <= 0 {
            return Err(ServiceError::InvalidInput(
                "Order line quantity must be positive".to_string(),
            ));
        }

        let sale = self
            .apply_transaction(
                conn,
                NewTransaction {
                    sku: sku.to_string(),
                    transaction_type: TransactionType::Sale,
                    quantity_change: -quantity,
                    reference_id: Some(order_id),
                    reference_type: Some("order".to_string()),
                    reason: Some("Order fulfillment".to_string()),
                    notes: None,
                    created_by: None,
                },
            )
            .await?;

        let release = self
            .apply_transaction(
                conn,
                NewTransaction {
                    sku: sku.to_string(),
                    transaction_type: TransactionType::Reservation,
                    quantity_change: -quantity,
                    reference_id: Some(order_id),
                    reference_type: Some("order".to_string()),
                    reason: Some("Reservation consumed by fulfillment".to_string()),
                    notes: None,
                    created_by: None,
                },
            )
            .await?;

        Ok(vec![sale, release])
    }

    /// Ledger history for an item, newest first.
    #[instrument(skip(self))]
    pub async fn get_item_transactions(
        &self,
        item_id: Uuid,
        page: u64,
        per_page: u64,
    ) -> Result<(Vec<inventory_transaction::Model>, u64), ServiceError> {
        let paginator = InventoryTransaction::find()
            .filter(inventory_transaction::Column::ItemId.eq(item_id))
            .order_by_desc(inventory_transaction::Column::CreatedAt)
            .paginate(&*self.db, per_page);

        let total = paginator.num_items().await?;
        let rows = paginator.fetch_page(page.saturating_sub(1)).await?;
        Ok((rows, total))
    }

    /// All ledger rows written on behalf of one reference, e.g. an order.
    pub async fn get_transactions_by_reference(
        &self,
        reference_id: Uuid,
    ) -> Result<Vec<inventory_transaction::Model>, ServiceError> {
        let rows = InventoryTransaction::find()
            .filter(inventory_transaction::Column::ReferenceId.eq(reference_id))
            .order_by_asc(inventory_transaction::Column::CreatedAt)
            .all(&*self.db)
            .await?;
        Ok(rows)
    }
}

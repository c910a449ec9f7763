//! Order lifecycle after checkout: status transitions, cancellation,
//! fulfillment and the payment-status flip driven by the webhook.
//!
//! Transitions follow the state machine on [`OrderStatus`]. Cancelling
//! releases the order's reservations; fulfilling converts them into sales.
//! Both write the inventory ledger in the same database transaction as the
//! status change.

use crate::{
    cache::TtlCache,
    db::DbPool,
    entities::order::{self, Entity as Order, OrderStatus, PaymentStatus},
    entities::order_item::{self, Entity as OrderItem},
    errors::ServiceError,
    events::{Event, EventSender},
    metrics::BUSINESS_METRICS,
    services::inventory::InventoryService,
};
use chrono::Utc;
use rand::distributions::Alphanumeric;
use rand::Rng;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, EntityTrait, ModelTrait, PaginatorTrait, QueryFilter,
    QueryOrder, Set, TransactionTrait,
};
use serde::Serialize;
use std::sync::Arc;
use tracing::{info, instrument, warn};
use utoipa::ToSchema;
use uuid::Uuid;

const ORDER_NUMBER_SUFFIX_LEN: usize = 10;

/// Human-facing order number: catalog prefix plus a random alphanumeric
/// suffix, e.g. "PEP-8F2KQ0X4ZD". Uniqueness is enforced by the database.
pub fn generate_order_number() -> String {
    let suffix: String = rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(ORDER_NUMBER_SUFFIX_LEN)
        .map(|c| (c as char).to_ascii_uppercase())
        .collect();
    format!("PEP-{}", suffix)
}

fn user_orders_cache_key(user_id: &str) -> String {
    format!("orders_{}", user_id)
}

/// Order with its lines, the shape order endpoints return.
#[derive(Debug, Serialize, ToSchema)]
pub struct OrderWithItems {
    #[serde(flatten)]
    pub order: order::Model,
    pub items: Vec<order_item::Model>,
}

/// Result of a payment webhook applied to an order.
#[derive(Debug)]
pub enum PaymentTransition {
    /// The payment status moved to the target state.
    Applied(order::Model),
    /// The order was already in the target state; nothing changed.
    AlreadySettled(order::Model),
}

impl PaymentTransition {
    pub fn order(&self) -> &order::Model {
        match self {
            PaymentTransition::Applied(order) | PaymentTransition::AlreadySettled(order) => order,
        }
    }
}

#[derive(Clone)]
pub struct OrderService {
    db: Arc<DbPool>,
    event_sender: Arc<EventSender>,
    cache: TtlCache,
    inventory: Arc<InventoryService>,
}

impl OrderService {
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

    pub async fn get_order(&self, order_id: Uuid) -> Result<OrderWithItems, ServiceError> {
        let order = Order::find_by_id(order_id)
            .one(&*self.db)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("Order {} not found", order_id)))?;
        let items = order
            .find_related(OrderItem)
            .order_by_asc(order_item::Column::CreatedAt)
            .all(&*self.db)
            .await?;
        Ok(OrderWithItems { order, items })
    }

    pub async fn get_order_by_number(
        &self,
        order_number: &str,
    ) -> Result<OrderWithItems, ServiceError> {
        let order = Order::find()
            .filter(order::Column::OrderNumber.eq(order_number))
            .one(&*self.db)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("Order {} not found", order_number)))?;
        let items = order
            .find_related(OrderItem)
            .order_by_asc(order_item::Column::CreatedAt)
            .all(&*self.db)
            .await?;
        Ok(OrderWithItems { order, items })
    }

    /// A user's order history, newest first. Cached per user; every order
    /// mutation for that user deletes the cached list.
    #[instrument(skip(self))]
    pub async fn list_user_orders(
        &self,
        user_id: &str,
    ) -> Result<Vec<order::Model>, ServiceError> {
        let key = user_orders_cache_key(user_id);
        if let Some(orders) = self.cache.get_json::<Vec<order::Model>>(&key).await? {
            return Ok(orders);
        }

        let orders = Order::find()
            .filter(order::Column::UserId.eq(user_id))
            .order_by_desc(order::Column::OrderDate)
            .all(&*self.db)
            .await?;

        self.cache.set_json(&key, &orders, None).await?;
        Ok(orders)
    }

    /// Admin listing across users with an optional status filter.
    #[instrument(skip(self))]
    pub async fn list_orders(
        &self,
        status: Option<OrderStatus>,
        page: u64,
        per_page: u64,
    ) -> Result<(Vec<order::Model>, u64), ServiceError> {
        let mut query = Order::find();
        if let Some(status) = status {
            query = query.filter(order::Column::Status.eq(status));
        }

        let paginator = query
            .order_by_desc(order::Column::CreatedAt)
            .paginate(&*self.db, per_page);

        let total = paginator.num_items().await?;
        let orders = paginator.fetch_page(page.saturating_sub(1)).await?;
        Ok((orders, total))
    }

    /// Moves an order along its lifecycle. Transitions with stock side
    /// effects are routed to their dedicated operations so the ledger can
    /// never be skipped.
    #[instrument(skip(self))]
    pub async fn update_order_status(
        &self,
        order_id: Uuid,
        new_status: OrderStatus,
    ) -> Result<order::Model, ServiceError> {
        match new_status {
            OrderStatus::Cancelled => return self.cancel_order(order_id).await,
            OrderStatus::Shipped => return Ok(self.fulfill_order(order_id).await?.order),
            _ => {}
        }

        let order = Order::find_by_id(order_id)
            .one(&*self.db)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("Order {} not found", order_id)))?;

        let old_status = order.status;
        if !old_status.can_transition_to(new_status) {
            return Err(ServiceError::InvalidStatus(format!(
                "Order {} cannot move from {} to {}",
                order_id, old_status, new_status
            )));
        }

        let user_id = order.user_id.clone();
        let version = order.version;
        let mut active: order::ActiveModel = order.into();
        active.status = Set(new_status);
        active.version = Set(version + 1);
        active.updated_at = Set(Some(Utc::now()));
        let updated = active.update(&*self.db).await?;

        self.invalidate_user_orders(&user_id).await;
        self.event_sender
            .send_or_log(Event::OrderStatusChanged {
                order_id,
                old_status: old_status.to_string(),
                new_status: new_status.to_string(),
            })
            .await;
        info!(order_id = %order_id, from = %old_status, to = %new_status, "Order status updated");
        Ok(updated)
    }

    /// Cancels a pending or processing order and releases its outstanding
    /// reservations, all in one database transaction.
    #[instrument(skip(self))]
    pub async fn cancel_order(&self, order_id: Uuid) -> Result<order::Model, ServiceError> {
        let txn = self.db.begin().await?;

        let order = Order::find_by_id(order_id)
            .one(&txn)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("Order {} not found", order_id)))?;

        let old_status = order.status;
        if !old_status.can_transition_to(OrderStatus::Cancelled) {
            return Err(ServiceError::InvalidStatus(format!(
                "Order {} cannot be cancelled from {}",
                order_id, old_status
            )));
        }

        let lines = OrderItem::find()
            .filter(order_item::Column::OrderId.eq(order_id))
            .all(&txn)
            .await?;

        let mut outcomes = Vec::with_capacity(lines.len());
        for line in &lines {
            outcomes.push(
                self.inventory
                    .apply_transaction(
                        &txn,
                        crate::services::inventory::NewTransaction {
                            sku: line.sku.clone(),
                            transaction_type:
                                crate::entities::inventory_transaction::TransactionType::Reservation,
                            quantity_change: -line.quantity,
                            reference_id: Some(order_id),
                            reference_type: Some("order".to_string()),
                            reason: Some("Order cancelled".to_string()),
                            notes: None,
                            created_by: None,
                        },
                    )
                    .await?,
            );
        }

        let user_id = order.user_id.clone();
        let version = order.version;
        let mut active: order::ActiveModel = order.into();
        active.status = Set(OrderStatus::Cancelled);
        active.version = Set(version + 1);
        active.updated_at = Set(Some(Utc::now()));
        let updated = active.update(&txn).await?;

        txn.commit().await?;

        for outcome in &outcomes {
            self.inventory.finalize(outcome).await;
        }
        self.invalidate_user_orders(&user_id).await;

        BUSINESS_METRICS.record_order_cancelled();
        self.event_sender
            .send_or_log(Event::OrderStatusChanged {
                order_id,
                old_status: old_status.to_string(),
                new_status: OrderStatus::Cancelled.to_string(),
            })
            .await;
        self.event_sender
            .send_or_log(Event::OrderCancelled(order_id))
            .await;
        info!(order_id = %order_id, "Order cancelled, reservations released");
        Ok(updated)
    }

    /// Ships an order: marks it shipped and converts each line's
    /// reservation into a sale. The status change and every ledger write
    /// commit together or not at all.
    #[instrument(skip(self))]
    pub async fn fulfill_order(&self, order_id: Uuid) -> Result<OrderWithItems, ServiceError> {
        let txn = self.db.begin().await?;

        let order = Order::find_by_id(order_id)
            .one(&txn)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("Order {} not found", order_id)))?;

        let old_status = order.status;
        if !old_status.can_transition_to(OrderStatus::Shipped) {
            return Err(ServiceError::InvalidStatus(format!(
                "Order {} cannot be shipped from {}",
                order_id, old_status
            )));
        }

        let lines = OrderItem::find()
            .filter(order_item::Column::OrderId.eq(order_id))
            .all(&txn)
            .await?;
        if lines.is_empty() {
            return Err(ServiceError::InvalidOperation(format!(
                "Order {} has no lines to fulfill",
                order_id
            )));
        }

        let mut outcomes = Vec::with_capacity(lines.len() * 2);
        for line in &lines {
            outcomes.extend(
                self.inventory
                    .apply_order_line(&txn, order_id, &line.sku, line.quantity)
                    .await?,
            );
        }

        let user_id = order.user_id.clone();
        let version = order.version;
        let mut active: order::ActiveModel = order.into();
        active.status = Set(OrderStatus::Shipped);
        active.version = Set(version + 1);
        active.updated_at = Set(Some(Utc::now()));
        let updated = active.update(&txn).await?;

        txn.commit().await?;

        for outcome in &outcomes {
            self.inventory.finalize(outcome).await;
        }
        self.invalidate_user_orders(&user_id).await;

        BUSINESS_METRICS.record_order_fulfilled();
        self.event_sender
            .send_or_log(Event::OrderStatusChanged {
                order_id,
                old_status: old_status.to_string(),
                new_status: OrderStatus::Shipped.to_string(),
            })
            .await;
        self.event_sender
            .send_or_log(Event::OrderFulfilled(order_id))
            .await;
        info!(order_id = %order_id, lines = lines.len(), "Order fulfilled");
        Ok(OrderWithItems {
            order: updated,
            items: lines,
        })
    }

    /// Applies a payment outcome from the webhook: a single
    /// lookup-then-update that flips `pending` to `paid` or `failed`.
    /// Re-delivery of the same outcome is acknowledged without a write;
    /// conflicting outcomes are rejected.
    #[instrument(skip(self))]
    pub async fn apply_payment_event(
        &self,
        order_id: Uuid,
        succeeded: bool,
    ) -> Result<PaymentTransition, ServiceError> {
        let target = if succeeded {
            PaymentStatus::Paid
        } else {
            PaymentStatus::Failed
        };

        let order = Order::find_by_id(order_id)
            .one(&*self.db)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("Order {} not found", order_id)))?;

        if order.payment_status == target {
            return Ok(PaymentTransition::AlreadySettled(order));
        }
        if order.payment_status != PaymentStatus::Pending {
            return Err(ServiceError::InvalidStatus(format!(
                "Order {} payment is already {:?}",
                order_id, order.payment_status
            )));
        }

        let user_id = order.user_id.clone();
        let version = order.version;
        let mut active: order::ActiveModel = order.into();
        active.payment_status = Set(target);
        active.version = Set(version + 1);
        active.updated_at = Set(Some(Utc::now()));
        let updated = active.update(&*self.db).await?;

        self.invalidate_user_orders(&user_id).await;
        if succeeded {
            BUSINESS_METRICS.record_payment_processed();
            self.event_sender
                .send_or_log(Event::PaymentSucceeded(order_id))
                .await;
        } else {
            BUSINESS_METRICS.record_payment_failed();
            self.event_sender
                .send_or_log(Event::PaymentFailed(order_id))
                .await;
        }
        info!(order_id = %order_id, paid = succeeded, "Payment status applied");
        Ok(PaymentTransition::Applied(updated))
    }

    /// Marks an order refunded. Admin path, not reachable from the webhook.
    #[instrument(skip(self))]
    pub async fn mark_refunded(&self, order_id: Uuid) -> Result<order::Model, ServiceError> {
        let order = Order::find_by_id(order_id)
            .one(&*self.db)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("Order {} not found", order_id)))?;

        if order.payment_status != PaymentStatus::Paid {
            return Err(ServiceError::InvalidStatus(format!(
                "Order {} is not paid, cannot refund",
                order_id
            )));
        }

        let user_id = order.user_id.clone();
        let version = order.version;
        let mut active: order::ActiveModel = order.into();
        active.payment_status = Set(PaymentStatus::Refunded);
        active.version = Set(version + 1);
        active.updated_at = Set(Some(Utc::now()));
        let updated = active.update(&*self.db).await?;

        self.invalidate_user_orders(&user_id).await;
        info!(order_id = %order_id, "Order refunded");
        Ok(updated)
    }

    pub(crate) async fn invalidate_user_orders(&self, user_id: &str) {
        if let Err(e) = self.cache.delete(&user_orders_cache_key(user_id)).await {
            warn!(user_id = %user_id, error = %e, "Failed to invalidate order cache");
        }
    }
}

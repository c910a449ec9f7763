//! Cart-to-order conversion.
//!
//! Checkout is one database transaction: availability is checked per line,
//! reservation ledger rows are written against the new order id, the order
//! and its lines are inserted from the cart snapshot and the cart is marked
//! converted. If any line cannot be reserved the whole conversion rolls
//! back and the cart is untouched.

use crate::{
    config::AppConfig,
    db::DbPool,
    entities::cart::{self, CartStatus, Entity as Cart},
    entities::cart_item::{self, Entity as CartItem},
    entities::inventory_transaction::TransactionType,
    entities::order::{self, OrderStatus, PaymentStatus},
    entities::order_item,
    entities::research_profile::{self, Entity as ResearchProfile},
    errors::ServiceError,
    events::{Event, EventSender},
    metrics::BUSINESS_METRICS,
    services::inventory::{InventoryService, NewTransaction},
    services::orders::{generate_order_number, OrderService, OrderWithItems},
};
use chrono::Utc;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, EntityTrait, QueryFilter, QueryOrder, Set,
    TransactionTrait,
};
use serde::Deserialize;
use std::sync::Arc;
use tracing::{info, instrument};
use utoipa::ToSchema;
use uuid::Uuid;

#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct CheckoutRequest {
    pub cart_id: Uuid,
    /// Required when the cart is session-only; must match the cart's owner
    /// when it has one.
    pub user_id: Option<String>,
    pub shipping_address: Option<serde_json::Value>,
    pub billing_address: Option<serde_json::Value>,
    pub notes: Option<String>,
}

#[derive(Clone)]
pub struct CheckoutService {
    db: Arc<DbPool>,
    event_sender: Arc<EventSender>,
    inventory: Arc<InventoryService>,
    orders: Arc<OrderService>,
    config: Arc<AppConfig>,
}

impl CheckoutService {
    pub fn new(
        db: Arc<DbPool>,
        event_sender: Arc<EventSender>,
        inventory: Arc<InventoryService>,
        orders: Arc<OrderService>,
        config: Arc<AppConfig>,
    ) -> Self {
        Self {
            db,
            event_sender,
            inventory,
            orders,
            config,
        }
    }

    /// Converts an active, non-empty cart into an order. All-or-nothing:
    /// a failure on any line, insufficient stock included, leaves no
    /// order, no reservations and an unconverted cart.
    #[instrument(skip(self, request), fields(cart_id = %request.cart_id))]
    pub async fn checkout(&self, request: CheckoutRequest) -> Result<OrderWithItems, ServiceError> {
        let txn = self.db.begin().await?;

        let cart = Cart::find_by_id(request.cart_id)
            .one(&txn)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("Cart {} not found", request.cart_id)))?;

        if cart.status != CartStatus::Active {
            return Err(ServiceError::InvalidOperation(format!(
                "Cart {} is not active",
                cart.id
            )));
        }
        if cart.expires_at <= Utc::now() {
            return Err(ServiceError::InvalidOperation(format!(
                "Cart {} has expired",
                cart.id
            )));
        }

        let user_id = self.resolve_user(&cart, request.user_id.as_deref())?;
        self.require_attestation(&txn, &user_id).await?;

        let lines = CartItem::find()
            .filter(cart_item::Column::CartId.eq(cart.id))
            .order_by_asc(cart_item::Column::CreatedAt)
            .all(&txn)
            .await?;
        if lines.is_empty() {
            return Err(ServiceError::InvalidOperation(format!(
                "Cart {} is empty",
                cart.id
            )));
        }

        // Visible intermediate state only if a later step aborts the
        // transaction, in which case it rolls back with everything else.
        let cart_id = cart.id;
        let mut converting: cart::ActiveModel = cart.clone().into();
        converting.status = Set(CartStatus::Converting);
        converting.updated_at = Set(Utc::now());
        converting.update(&txn).await?;

        let order_id = Uuid::new_v4();
        let mut outcomes = Vec::with_capacity(lines.len());
        for line in &lines {
            outcomes.push(
                self.inventory
                    .apply_transaction(
                        &txn,
                        NewTransaction {
                            sku: line.sku.clone(),
                            transaction_type: TransactionType::Reservation,
                            quantity_change: line.quantity,
                            reference_id: Some(order_id),
                            reference_type: Some("order".to_string()),
                            reason: Some("Checkout reservation".to_string()),
                            notes: None,
                            created_by: Some(user_id.clone()),
                        },
                    )
                    .await?,
            );
        }

        let now = Utc::now();
        let order_model = order::ActiveModel {
            id: Set(order_id),
            order_number: Set(generate_order_number()),
            user_id: Set(user_id.clone()),
            status: Set(OrderStatus::Pending),
            payment_status: Set(PaymentStatus::Pending),
            order_date: Set(now),
            subtotal: Set(cart.subtotal),
            shipping_total: Set(cart.shipping_total),
            tax_total: Set(cart.tax_total),
            total_amount: Set(cart.total),
            currency: Set(cart.currency.clone()),
            shipping_address: Set(request.shipping_address.map(|v| v.to_string())),
            billing_address: Set(request.billing_address.map(|v| v.to_string())),
            notes: Set(request.notes),
            created_at: Set(now),
            updated_at: Set(None),
            version: Set(1),
        };
        let order = order_model.insert(&txn).await?;

        let mut order_items = Vec::with_capacity(lines.len());
        for line in &lines {
            let item = order_item::ActiveModel {
                id: Set(Uuid::new_v4()),
                order_id: Set(order_id),
                variant_id: Set(line.variant_id),
                sku: Set(line.sku.clone()),
                product_name: Set(line.product_name.clone()),
                quantity: Set(line.quantity),
                unit_price: Set(line.unit_price),
                line_total: Set(line.line_total),
                created_at: Set(now),
            };
            order_items.push(item.insert(&txn).await?);
        }

        let mut converted: cart::ActiveModel = cart.into();
        converted.status = Set(CartStatus::Converted);
        converted.updated_at = Set(now);
        converted.update(&txn).await?;

        txn.commit().await?;

        for outcome in &outcomes {
            self.inventory.finalize(outcome).await;
        }
        self.orders.invalidate_user_orders(&user_id).await;

        BUSINESS_METRICS.record_order_created();
        self.event_sender
            .send_or_log(Event::CheckoutCompleted { cart_id, order_id })
            .await;
        self.event_sender
            .send_or_log(Event::OrderCreated(order_id))
            .await;
        info!(
            cart_id = %cart_id,
            order_id = %order_id,
            order_number = %order.order_number,
            lines = order_items.len(),
            "Checkout completed"
        );

        Ok(OrderWithItems {
            order,
            items: order_items,
        })
    }

    fn resolve_user(
        &self,
        cart: &cart::Model,
        requested: Option<&str>,
    ) -> Result<String, ServiceError> {
        match (&cart.user_id, requested) {
            (Some(owner), Some(requested)) if owner != requested => {
                Err(ServiceError::ValidationError(
                    "Cart belongs to a different user".to_string(),
                ))
            }
            (Some(owner), _) => Ok(owner.clone()),
            (None, Some(requested)) if !requested.is_empty() => Ok(requested.to_string()),
            _ => Err(ServiceError::ValidationError(
                "Checkout requires a user id".to_string(),
            )),
        }
    }

    /// Checkout is gated on a research profile with the research-use
    /// attestation set.
    async fn require_attestation<C: ConnectionTrait>(
        &self,
        conn: &C,
        user_id: &str,
    ) -> Result<(), ServiceError> {
        let profile = ResearchProfile::find()
            .filter(research_profile::Column::UserId.eq(user_id))
            .one(conn)
            .await?;

        match profile {
            Some(profile) if profile.research_use_attested => Ok(()),
            _ => Err(ServiceError::InvalidOperation(
                "Research use attestation is required before checkout".to_string(),
            )),
        }
    }
}

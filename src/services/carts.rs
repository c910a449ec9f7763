//! Shopping carts with server-side totals.
//!
//! A cart belongs to a session or a signed-in user. Lines snapshot the
//! variant price at add time; subtotal, shipping and tax are recomputed
//! from the lines on every mutation so a client can never post its own
//! totals. Carts expire after thirty days of existence.

use crate::{
    config::AppConfig,
    db::DbPool,
    entities::cart::{self, CartStatus, Entity as Cart},
    entities::cart_item::{self, Entity as CartItem},
    entities::product::Entity as Product,
    entities::product_variant::{self, Entity as ProductVariant},
    errors::ServiceError,
    events::{Event, EventSender},
};
use chrono::{Duration as ChronoDuration, Utc};
use rust_decimal::prelude::FromPrimitive;
use rust_decimal::Decimal;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, EntityTrait, ModelTrait, QueryFilter,
    QueryOrder, Set, TransactionTrait,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{info, instrument};
use utoipa::ToSchema;
use uuid::Uuid;

const CART_TTL_DAYS: i64 = 30;

/// Lossy f64 config knobs become exact decimals once, at the edge.
fn money(value: f64) -> Decimal {
    Decimal::from_f64(value).unwrap_or(Decimal::ZERO)
}

#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct CreateCart {
    pub session_id: Option<String>,
    pub user_id: Option<String>,
    pub currency: Option<String>,
}

#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct AddCartItem {
    pub variant_id: Uuid,
    pub quantity: i32,
}

/// Cart with its lines, the shape every cart endpoint returns.
#[derive(Debug, Serialize, ToSchema)]
pub struct CartWithItems {
    #[serde(flatten)]
    pub cart: cart::Model,
    pub items: Vec<cart_item::Model>,
}

#[derive(Clone)]
pub struct CartService {
    db: Arc<DbPool>,
    event_sender: Arc<EventSender>,
    config: Arc<AppConfig>,
}

impl CartService {
    pub fn new(db: Arc<DbPool>, event_sender: Arc<EventSender>, config: Arc<AppConfig>) -> Self {
        Self {
            db,
            event_sender,
            config,
        }
    }

    #[instrument(skip(self, input))]
    pub async fn create_cart(&self, input: CreateCart) -> Result<cart::Model, ServiceError> {
        if input.session_id.as_deref().map_or(true, str::is_empty)
            && input.user_id.as_deref().map_or(true, str::is_empty)
        {
            return Err(ServiceError::ValidationError(
                "A cart needs a session id or a user id".to_string(),
            ));
        }

        let now = Utc::now();
        let model = cart::ActiveModel {
            id: Set(Uuid::new_v4()),
            session_id: Set(input.session_id),
            user_id: Set(input.user_id),
            currency: Set(input
                .currency
                .unwrap_or_else(|| self.config.default_currency.clone())),
            subtotal: Set(Decimal::ZERO),
            tax_total: Set(Decimal::ZERO),
            shipping_total: Set(Decimal::ZERO),
            total: Set(Decimal::ZERO),
            status: Set(CartStatus::Active),
            expires_at: Set(now + ChronoDuration::days(CART_TTL_DAYS)),
            created_at: Set(now),
            updated_at: Set(now),
        };
        let created = model.insert(&*self.db).await?;

        self.event_sender
            .send_or_log(Event::CartCreated(created.id))
            .await;
        info!(cart_id = %created.id, "Cart created");
        Ok(created)
    }

    pub async fn get_cart(&self, cart_id: Uuid) -> Result<CartWithItems, ServiceError> {
        let cart = Cart::find_by_id(cart_id)
            .one(&*self.db)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("Cart {} not found", cart_id)))?;
        let items = cart
            .find_related(CartItem)
            .order_by_asc(cart_item::Column::CreatedAt)
            .all(&*self.db)
            .await?;
        Ok(CartWithItems { cart, items })
    }

    /// Most recent active cart for a session, if one exists.
    pub async fn find_active_cart_for_session(
        &self,
        session_id: &str,
    ) -> Result<Option<cart::Model>, ServiceError> {
        let cart = Cart::find()
            .filter(cart::Column::SessionId.eq(session_id))
            .filter(cart::Column::Status.eq(CartStatus::Active))
            .order_by_desc(cart::Column::CreatedAt)
            .one(&*self.db)
            .await?;
        Ok(cart)
    }

    /// Most recent active cart for a user, if one exists.
    pub async fn find_active_cart_for_user(
        &self,
        user_id: &str,
    ) -> Result<Option<cart::Model>, ServiceError> {
        let cart = Cart::find()
            .filter(cart::Column::UserId.eq(user_id))
            .filter(cart::Column::Status.eq(CartStatus::Active))
            .order_by_desc(cart::Column::CreatedAt)
            .one(&*self.db)
            .await?;
        Ok(cart)
    }

    /// Adds a variant to the cart, merging quantity when the variant is
    /// already a line. The unit price is snapshotted from the variant at
    /// add time.
    #[instrument(skip(self, input), fields(cart_id = %cart_id, variant_id = %input.variant_id))]
    pub async fn add_item(
        &self,
        cart_id: Uuid,
        input: AddCartItem,
    ) -> Result<CartWithItems, ServiceError> {
        if input.quantity <= 0 {
            return Err(ServiceError::ValidationError(
                "Quantity must be positive".to_string(),
            ));
        }

        let txn = self.db.begin().await?;
        let cart = self.load_mutable_cart(&txn, cart_id).await?;

        let (variant, product) = ProductVariant::find_by_id(input.variant_id)
            .find_also_related(Product)
            .one(&txn)
            .await?
            .ok_or_else(|| {
                ServiceError::NotFound(format!("Variant {} not found", input.variant_id))
            })?;
        if !variant.active {
            return Err(ServiceError::InvalidOperation(format!(
                "Variant {} is no longer sold",
                variant.sku
            )));
        }
        let product_name = match product {
            Some(p) => format!("{} {}", p.name, variant.size_label),
            None => variant.sku.clone(),
        };

        let existing = CartItem::find()
            .filter(cart_item::Column::CartId.eq(cart_id))
            .filter(cart_item::Column::VariantId.eq(input.variant_id))
            .one(&txn)
            .await?;

        let now = Utc::now();
        match existing {
            Some(line) => {
                let quantity = line.quantity + input.quantity;
                let unit_price = line.unit_price;
                let mut active: cart_item::ActiveModel = line.into();
                active.quantity = Set(quantity);
                active.line_total = Set(unit_price * Decimal::from(quantity));
                active.updated_at = Set(now);
                active.update(&txn).await?;
            }
            None => {
                let line = cart_item::ActiveModel {
                    id: Set(Uuid::new_v4()),
                    cart_id: Set(cart_id),
                    variant_id: Set(variant.id),
                    sku: Set(variant.sku.clone()),
                    product_name: Set(product_name),
                    quantity: Set(input.quantity),
                    unit_price: Set(variant.price),
                    line_total: Set(variant.price * Decimal::from(input.quantity)),
                    created_at: Set(now),
                    updated_at: Set(now),
                };
                line.insert(&txn).await?;
            }
        }

        self.recalculate_totals(&txn, &cart).await?;
        txn.commit().await?;

        self.event_sender
            .send_or_log(Event::CartItemAdded {
                cart_id,
                variant_id: variant.id,
            })
            .await;
        self.get_cart(cart_id).await
    }

    /// Sets a line's quantity. Zero removes the line.
    #[instrument(skip(self))]
    pub async fn update_item_quantity(
        &self,
        cart_id: Uuid,
        item_id: Uuid,
        quantity: i32,
    ) -> Result<CartWithItems, ServiceError> {
        if quantity < 0 {
            return Err(ServiceError::ValidationError(
                "Quantity cannot be negative".to_string(),
            ));
        }

        let txn = self.db.begin().await?;
        let cart = self.load_mutable_cart(&txn, cart_id).await?;

        let line = CartItem::find_by_id(item_id)
            .one(&txn)
            .await?
            .filter(|line| line.cart_id == cart_id)
            .ok_or_else(|| {
                ServiceError::NotFound(format!("Cart item {} not found in cart {}", item_id, cart_id))
            })?;

        let removed = quantity == 0;
        if removed {
            line.delete(&txn).await?;
        } else {
            let unit_price = line.unit_price;
            let mut active: cart_item::ActiveModel = line.into();
            active.quantity = Set(quantity);
            active.line_total = Set(unit_price * Decimal::from(quantity));
            active.updated_at = Set(Utc::now());
            active.update(&txn).await?;
        }

        self.recalculate_totals(&txn, &cart).await?;
        txn.commit().await?;

        let event = if removed {
            Event::CartItemRemoved { cart_id, item_id }
        } else {
            Event::CartItemUpdated { cart_id, item_id }
        };
        self.event_sender.send_or_log(event).await;
        self.get_cart(cart_id).await
    }

    pub async fn remove_item(
        &self,
        cart_id: Uuid,
        item_id: Uuid,
    ) -> Result<CartWithItems, ServiceError> {
        self.update_item_quantity(cart_id, item_id, 0).await
    }

    /// Removes every line and zeroes the totals.
    #[instrument(skip(self))]
    pub async fn clear_cart(&self, cart_id: Uuid) -> Result<CartWithItems, ServiceError> {
        let txn = self.db.begin().await?;
        let cart = self.load_mutable_cart(&txn, cart_id).await?;

        CartItem::delete_many()
            .filter(cart_item::Column::CartId.eq(cart_id))
            .exec(&txn)
            .await?;
        self.recalculate_totals(&txn, &cart).await?;
        txn.commit().await?;

        self.event_sender
            .send_or_log(Event::CartCleared(cart_id))
            .await;
        self.get_cart(cart_id).await
    }

    /// Marks a cart abandoned. Only active carts can be abandoned.
    #[instrument(skip(self))]
    pub async fn abandon_cart(&self, cart_id: Uuid) -> Result<cart::Model, ServiceError> {
        let cart = Cart::find_by_id(cart_id)
            .one(&*self.db)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("Cart {} not found", cart_id)))?;
        if cart.status != CartStatus::Active {
            return Err(ServiceError::InvalidOperation(format!(
                "Cart {} is not active",
                cart_id
            )));
        }

        let mut active: cart::ActiveModel = cart.into();
        active.status = Set(CartStatus::Abandoned);
        active.updated_at = Set(Utc::now());
        let updated = active.update(&*self.db).await?;

        self.event_sender
            .send_or_log(Event::CartAbandoned(updated.id))
            .await;
        info!(cart_id = %updated.id, "Cart abandoned");
        Ok(updated)
    }

    /// Loads a cart for mutation: it must be active and unexpired. A cart
    /// found past its expiry is flipped to expired on the spot.
    async fn load_mutable_cart<C: ConnectionTrait>(
        &self,
        conn: &C,
        cart_id: Uuid,
    ) -> Result<cart::Model, ServiceError> {
        let cart = Cart::find_by_id(cart_id)
            .one(conn)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("Cart {} not found", cart_id)))?;

        if cart.status == CartStatus::Active && cart.expires_at <= Utc::now() {
            let mut active: cart::ActiveModel = cart.into();
            active.status = Set(CartStatus::Expired);
            active.updated_at = Set(Utc::now());
            active.update(conn).await?;
            return Err(ServiceError::InvalidOperation(format!(
                "Cart {} has expired",
                cart_id
            )));
        }
        if cart.status != CartStatus::Active {
            return Err(ServiceError::InvalidOperation(format!(
                "Cart {} is not active",
                cart_id
            )));
        }
        Ok(cart)
    }

    /// Recomputes subtotal, shipping, tax and total from the cart's lines.
    async fn recalculate_totals<C: ConnectionTrait>(
        &self,
        conn: &C,
        cart: &cart::Model,
    ) -> Result<cart::Model, ServiceError> {
        let lines = CartItem::find()
            .filter(cart_item::Column::CartId.eq(cart.id))
            .all(conn)
            .await?;

        let subtotal: Decimal = lines.iter().map(|line| line.line_total).sum();
        let totals = CartTotals::compute(
            subtotal,
            lines.is_empty(),
            money(self.config.free_shipping_threshold),
            money(self.config.flat_shipping_rate),
            money(self.config.default_tax_rate),
        );

        let mut active: cart::ActiveModel = cart.clone().into();
        active.subtotal = Set(totals.subtotal);
        active.shipping_total = Set(totals.shipping);
        active.tax_total = Set(totals.tax);
        active.total = Set(totals.total);
        active.updated_at = Set(Utc::now());
        Ok(active.update(conn).await?)
    }
}

/// Pure totals arithmetic, kept separate from persistence so it can be
/// checked without a database.
#[derive(Debug, PartialEq, Eq)]
pub struct CartTotals {
    pub subtotal: Decimal,
    pub shipping: Decimal,
    pub tax: Decimal,
    pub total: Decimal,
}

impl CartTotals {
    pub fn compute(
        subtotal: Decimal,
        empty: bool,
        free_shipping_threshold: Decimal,
        flat_shipping_rate: Decimal,
        tax_rate: Decimal,
    ) -> Self {
        let shipping = if empty || subtotal >= free_shipping_threshold {
            Decimal::ZERO
        } else {
            flat_shipping_rate
        };
        let tax = (subtotal * tax_rate).round_dp(2);
        Self {
            subtotal,
            shipping,
            tax,
            total: subtotal + shipping + tax,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn totals_charge_flat_shipping_under_threshold() {
        let totals = CartTotals::compute(dec!(120.00), false, dec!(200.00), dec!(9.95), dec!(0.07));
        assert_eq!(totals.shipping, dec!(9.95));
        assert_eq!(totals.tax, dec!(8.40));
        assert_eq!(totals.total, dec!(138.35));
    }

    #[test]
    fn totals_waive_shipping_at_threshold() {
        let totals = CartTotals::compute(dec!(200.00), false, dec!(200.00), dec!(9.95), dec!(0.07));
        assert_eq!(totals.shipping, Decimal::ZERO);
        assert_eq!(totals.total, dec!(214.00));
    }

    #[test]
    fn empty_cart_totals_are_all_zero() {
        let totals = CartTotals::compute(Decimal::ZERO, true, dec!(200.00), dec!(9.95), dec!(0.07));
        assert_eq!(totals.subtotal, Decimal::ZERO);
        assert_eq!(totals.shipping, Decimal::ZERO);
        assert_eq!(totals.tax, Decimal::ZERO);
        assert_eq!(totals.total, Decimal::ZERO);
    }

    #[test]
    fn tax_rounds_to_cents() {
        let totals = CartTotals::compute(dec!(33.33), false, dec!(200.00), dec!(9.95), dec!(0.0825));
        // 33.33 * 0.0825 = 2.749725
        assert_eq!(totals.tax, dec!(2.75));
    }

    #[test]
    fn money_conversion_survives_config_floats() {
        assert_eq!(money(9.95), dec!(9.95));
        assert_eq!(money(0.0), Decimal::ZERO);
    }
}

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// Stock record for one SKU. The three stock fields are a materialized view
/// of the transaction ledger: `current_stock` tracks physical units,
/// `reserved_stock` tracks open reservations, and `available_stock` is always
/// `current_stock - reserved_stock`, floored at zero. Rows are mutated only
/// through ledger appends and are never hard-deleted.
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize, ToSchema)]
#[schema(as = InventoryItem)]
#[sea_orm(table_name = "inventory_items")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    pub variant_id: Uuid,
    #[sea_orm(unique)]
    pub sku: String,
    /// Denormalized for alert and report rendering
    pub product_name: String,
    pub current_stock: i32,
    pub reserved_stock: i32,
    pub available_stock: i32,
    pub reorder_point: i32,
    #[sea_orm(nullable)]
    pub max_stock: Option<i32>,
    #[sea_orm(column_type = "Decimal(Some((19, 4)))", nullable)]
    pub cost_per_unit: Option<Decimal>,
    #[sea_orm(nullable)]
    pub batch_number: Option<String>,
    #[sea_orm(nullable)]
    pub expiry_date: Option<DateTime<Utc>>,
    #[sea_orm(nullable)]
    pub location: Option<String>,
    /// Storage requirement, e.g. "frozen" or "refrigerated"
    #[sea_orm(nullable)]
    pub temperature_zone: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_many = "super::inventory_transaction::Entity")]
    Transactions,
    #[sea_orm(has_many = "super::low_stock_alert::Entity")]
    Alerts,
}

impl Related<super::inventory_transaction::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Transactions.def()
    }
}

impl Related<super::low_stock_alert::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Alerts.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

impl Model {
    /// Whether the requested quantity could be fulfilled right now.
    pub fn can_fulfill(&self, quantity: i32) -> bool {
        quantity > 0 && self.available_stock >= quantity
    }

    /// Whether stock has fallen to or below the reorder point.
    pub fn is_low_stock(&self) -> bool {
        self.current_stock <= self.reorder_point
    }

    pub fn is_out_of_stock(&self) -> bool {
        self.current_stock == 0
    }
}

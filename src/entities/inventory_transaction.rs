use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sea_orm::entity::prelude::*;
use sea_orm::{ActiveValue, Set};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// Types of inventory transactions. Reservation rows move `reserved_stock`;
/// every other type moves physical `current_stock`.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Serialize,
    Deserialize,
    ToSchema,
    strum::Display,
    strum::EnumString,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum TransactionType {
    Restock,
    Sale,
    Adjustment,
    Reservation,
    Return,
    Expired,
    Damaged,
}

impl TransactionType {
    /// True for types that move physical stock on hand. Reservation rows
    /// affect only the reserved counter.
    pub fn is_physical(&self) -> bool {
        !matches!(self, TransactionType::Reservation)
    }
}

/// Append-only ledger row. Rows are never updated or deleted; stock on the
/// inventory item is derived from the running sum of `quantity_change`.
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize, ToSchema)]
#[schema(as = InventoryTransaction)]
#[sea_orm(table_name = "inventory_transactions")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    pub item_id: Uuid,
    pub sku: String,
    pub r#type: String, // Storing as string in DB, converted to/from TransactionType
    /// Signed quantity: positive restock, negative sale, either for adjustment
    pub quantity_change: i32,
    /// Snapshot of the affected stock field before this row applied
    pub previous_stock: i32,
    /// Snapshot of the affected stock field after this row applied
    pub new_stock: i32,
    pub reference_id: Option<Uuid>,
    pub reference_type: Option<String>,
    pub reason: Option<String>,
    pub notes: Option<String>,
    pub created_by: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::inventory_item::Entity",
        from = "Column::ItemId",
        to = "super::inventory_item::Column::Id"
    )]
    Item,
}

impl Related<super::inventory_item::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Item.def()
    }
}

#[async_trait]
impl ActiveModelBehavior for ActiveModel {
    async fn before_save<C: ConnectionTrait>(self, _db: &C, _insert: bool) -> Result<Self, DbErr>
    where
        C: ConnectionTrait,
    {
        let mut active_model = self;
        if let ActiveValue::NotSet = active_model.created_at {
            active_model.created_at = Set(Utc::now());
        }
        Ok(active_model)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn type_round_trips_through_strings() {
        for t in [
            TransactionType::Restock,
            TransactionType::Sale,
            TransactionType::Adjustment,
            TransactionType::Reservation,
            TransactionType::Return,
            TransactionType::Expired,
            TransactionType::Damaged,
        ] {
            assert_eq!(t.to_string().parse::<TransactionType>(), Ok(t));
        }
        assert!("teleport".parse::<TransactionType>().is_err());
    }

    #[test]
    fn only_reservations_skip_physical_stock() {
        assert!(!TransactionType::Reservation.is_physical());
        for t in [
            TransactionType::Restock,
            TransactionType::Sale,
            TransactionType::Adjustment,
            TransactionType::Return,
            TransactionType::Expired,
            TransactionType::Damaged,
        ] {
            assert!(t.is_physical(), "{} should move physical stock", t);
        }
    }
}

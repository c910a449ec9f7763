//! Stock alert lifecycle and reconciliation.
//!
//! Reconciliation derives the set of alert conditions an item is currently
//! in (out of stock, low stock, expiring soon, expired), resolves open
//! alerts whose condition has cleared and raises alerts for conditions that
//! have none open. It runs inside the same database transaction as the
//! ledger write that changed the item, so alert state never drifts from
//! stock state.

use crate::{
    config::AppConfig,
    db::DbPool,
    entities::inventory_item::{self, Entity as InventoryItem},
    entities::low_stock_alert::{self, AlertStatus, AlertType, Entity as LowStockAlert},
    errors::ServiceError,
    events::{Event, EventSender},
    metrics::BUSINESS_METRICS,
};
use chrono::{DateTime, Duration as ChronoDuration, Utc};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, EntityTrait, PaginatorTrait, QueryFilter,
    QueryOrder, Set, TransactionTrait,
};
use serde::Serialize;
use std::sync::Arc;
use tracing::{info, instrument};
use utoipa::ToSchema;
use uuid::Uuid;

/// Alert rows touched by one reconciliation pass.
#[derive(Debug, Default)]
pub struct ReconcileOutcome {
    pub raised: Vec<low_stock_alert::Model>,
    pub resolved: Vec<low_stock_alert::Model>,
}

impl ReconcileOutcome {
    pub fn is_empty(&self) -> bool {
        self.raised.is_empty() && self.resolved.is_empty()
    }

    fn merge(&mut self, other: ReconcileOutcome) {
        self.raised.extend(other.raised);
        self.resolved.extend(other.resolved);
    }
}

/// Totals from a full reconciliation sweep.
#[derive(Debug, Serialize, ToSchema)]
pub struct ReconcileSummary {
    pub items_checked: u64,
    pub alerts_raised: u64,
    pub alerts_resolved: u64,
}

#[derive(Clone)]
pub struct AlertService {
    db: Arc<DbPool>,
    event_sender: Arc<EventSender>,
    config: Arc<AppConfig>,
}

impl AlertService {
    pub fn new(db: Arc<DbPool>, event_sender: Arc<EventSender>, config: Arc<AppConfig>) -> Self {
        Self {
            db,
            event_sender,
            config,
        }
    }

    /// Conditions this item is in right now.
    fn conditions_for(&self, item: &inventory_item::Model, now: DateTime<Utc>) -> Vec<AlertType> {
        let mut conditions = Vec::new();
        if item.current_stock == 0 {
            conditions.push(AlertType::OutOfStock);
        } else if item.current_stock <= item.reorder_point {
            conditions.push(AlertType::LowStock);
        }
        if let Some(expiry) = item.expiry_date {
            if expiry <= now {
                conditions.push(AlertType::Expired);
            } else if expiry <= now + ChronoDuration::days(self.config.expiry_window_days) {
                conditions.push(AlertType::ExpiringSoon);
            }
        }
        conditions
    }

    fn alert_message(item: &inventory_item::Model, alert_type: AlertType) -> String {
        match alert_type {
            AlertType::OutOfStock => format!("{} ({}) is out of stock", item.product_name, item.sku),
            AlertType::LowStock => format!(
                "{} ({}) is down to {} units, at or below the reorder point of {}",
                item.product_name, item.sku, item.current_stock, item.reorder_point
            ),
            AlertType::ExpiringSoon => format!(
                "{} ({}) has a batch expiring soon",
                item.product_name, item.sku
            ),
            AlertType::Expired => format!(
                "{} ({}) has an expired batch on hand",
                item.product_name, item.sku
            ),
        }
    }

    fn threshold_for(&self, item: &inventory_item::Model, alert_type: AlertType) -> Option<i32> {
        match alert_type {
            AlertType::LowStock => Some(item.reorder_point),
            AlertType::ExpiringSoon => Some(self.config.expiry_window_days as i32),
            AlertType::OutOfStock | AlertType::Expired => None,
        }
    }

    /// Brings the open alerts for one item in line with its current state,
    /// inside the caller's transaction. Conditions that cleared resolve
    /// their open alerts; conditions without an open alert get a new one.
    /// The caller publishes the outcome after commit.
    pub(crate) async fn reconcile_item<C: ConnectionTrait>(
        &self,
        conn: &C,
        item: &inventory_item::Model,
    ) -> Result<ReconcileOutcome, ServiceError> {
        let now = Utc::now();
        let conditions = self.conditions_for(item, now);

        let open_alerts = LowStockAlert::find()
            .filter(low_stock_alert::Column::ItemId.eq(item.id))
            .filter(low_stock_alert::Column::Status.ne(AlertStatus::Resolved))
            .all(conn)
            .await?;

        let mut outcome = ReconcileOutcome::default();

        for alert in open_alerts.iter() {
            if !conditions.contains(&alert.alert_type) {
                let mut active: low_stock_alert::ActiveModel = alert.clone().into();
                active.status = Set(AlertStatus::Resolved);
                active.resolved_at = Set(Some(now));
                outcome.resolved.push(active.update(conn).await?);
            }
        }

        for alert_type in conditions {
            let already_open = open_alerts.iter().any(|a| a.alert_type == alert_type);
            if already_open {
                continue;
            }
            let alert = low_stock_alert::ActiveModel {
                id: Set(Uuid::new_v4()),
                item_id: Set(item.id),
                sku: Set(item.sku.clone()),
                product_name: Set(item.product_name.clone()),
                alert_type: Set(alert_type),
                status: Set(AlertStatus::Active),
                current_stock: Set(item.current_stock),
                threshold_value: Set(self.threshold_for(item, alert_type)),
                message: Set(Some(Self::alert_message(item, alert_type))),
                acknowledged_by: Set(None),
                acknowledged_at: Set(None),
                resolved_at: Set(None),
                created_at: Set(now),
            };
            outcome.raised.push(alert.insert(conn).await?);
        }

        Ok(outcome)
    }

    /// Post-commit side of reconciliation: gauge updates and events.
    pub(crate) async fn publish_outcome(&self, outcome: &ReconcileOutcome) {
        for alert in &outcome.raised {
            BUSINESS_METRICS.alerts_active.inc();
            self.event_sender
                .send_or_log(Event::StockAlertRaised {
                    alert_id: alert.id,
                    item_id: alert.item_id,
                    alert_type: alert.alert_type.to_string(),
                })
                .await;
        }
        for alert in &outcome.resolved {
            BUSINESS_METRICS.alerts_active.dec();
            self.event_sender
                .send_or_log(Event::StockAlertResolved(alert.id))
                .await;
        }
    }

    /// Sweeps every inventory item and reconciles its alerts. Covers
    /// time-driven conditions (expiry) that no ledger write would trigger.
    #[instrument(skip(self))]
    pub async fn reconcile_alerts(&self) -> Result<ReconcileSummary, ServiceError> {
        let txn = self.db.begin().await?;

        let items = InventoryItem::find().all(&txn).await?;
        let items_checked = items.len() as u64;

        let mut outcome = ReconcileOutcome::default();
        for item in &items {
            outcome.merge(self.reconcile_item(&txn, item).await?);
        }

        txn.commit().await?;

        let summary = ReconcileSummary {
            items_checked,
            alerts_raised: outcome.raised.len() as u64,
            alerts_resolved: outcome.resolved.len() as u64,
        };
        self.publish_outcome(&outcome).await;

        info!(
            items_checked = summary.items_checked,
            raised = summary.alerts_raised,
            resolved = summary.alerts_resolved,
            "Alert reconciliation sweep finished"
        );
        Ok(summary)
    }

    pub async fn get_alert(&self, alert_id: Uuid) -> Result<low_stock_alert::Model, ServiceError> {
        LowStockAlert::find_by_id(alert_id)
            .one(&*self.db)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("Alert {} not found", alert_id)))
    }

    /// Lists alerts, optionally narrowed by status and type, newest first.
    #[instrument(skip(self))]
    pub async fn list_alerts(
        &self,
        status: Option<AlertStatus>,
        alert_type: Option<AlertType>,
        page: u64,
        per_page: u64,
    ) -> Result<(Vec<low_stock_alert::Model>, u64), ServiceError> {
        let mut query = LowStockAlert::find();
        if let Some(status) = status {
            query = query.filter(low_stock_alert::Column::Status.eq(status));
        }
        if let Some(alert_type) = alert_type {
            query = query.filter(low_stock_alert::Column::AlertType.eq(alert_type));
        }

        let paginator = query
            .order_by_desc(low_stock_alert::Column::CreatedAt)
            .paginate(&*self.db, per_page);

        let total = paginator.num_items().await?;
        let alerts = paginator.fetch_page(page.saturating_sub(1)).await?;
        Ok((alerts, total))
    }

    pub async fn get_alerts_for_item(
        &self,
        item_id: Uuid,
    ) -> Result<Vec<low_stock_alert::Model>, ServiceError> {
        let alerts = LowStockAlert::find()
            .filter(low_stock_alert::Column::ItemId.eq(item_id))
            .order_by_desc(low_stock_alert::Column::CreatedAt)
            .all(&*self.db)
            .await?;
        Ok(alerts)
    }

    /// Marks an alert as seen. Acknowledging twice is a no-op; a resolved
    /// alert can no longer be acknowledged.
    #[instrument(skip(self))]
    pub async fn acknowledge_alert(
        &self,
        alert_id: Uuid,
        acknowledged_by: String,
    ) -> Result<low_stock_alert::Model, ServiceError> {
        let alert = self.get_alert(alert_id).await?;

        match alert.status {
            AlertStatus::Resolved => Err(ServiceError::InvalidOperation(format!(
                "Alert {} is already resolved",
                alert_id
            ))),
            AlertStatus::Acknowledged => Ok(alert),
            AlertStatus::Active => {
                let mut active: low_stock_alert::ActiveModel = alert.into();
                active.status = Set(AlertStatus::Acknowledged);
                active.acknowledged_by = Set(Some(acknowledged_by));
                active.acknowledged_at = Set(Some(Utc::now()));
                let updated = active.update(&*self.db).await?;

                self.event_sender
                    .send_or_log(Event::StockAlertAcknowledged(updated.id))
                    .await;
                info!(alert_id = %updated.id, "Alert acknowledged");
                Ok(updated)
            }
        }
    }

    /// Closes an alert by hand. Resolving a resolved alert is a no-op.
    /// Reconciliation will raise a fresh alert if the condition persists.
    #[instrument(skip(self))]
    pub async fn resolve_alert(
        &self,
        alert_id: Uuid,
    ) -> Result<low_stock_alert::Model, ServiceError> {
        let alert = self.get_alert(alert_id).await?;
        if alert.status == AlertStatus::Resolved {
            return Ok(alert);
        }

        let mut active: low_stock_alert::ActiveModel = alert.into();
        active.status = Set(AlertStatus::Resolved);
        active.resolved_at = Set(Some(Utc::now()));
        let updated = active.update(&*self.db).await?;

        BUSINESS_METRICS.alerts_active.dec();
        self.event_sender
            .send_or_log(Event::StockAlertResolved(updated.id))
            .await;
        info!(alert_id = %updated.id, "Alert resolved");
        Ok(updated)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::EventSender;
    use sea_orm::DatabaseConnection;
    use tokio::sync::mpsc;

    fn service() -> AlertService {
        let (tx, _rx) = mpsc::channel(16);
        AlertService::new(
            Arc::new(DatabaseConnection::Disconnected),
            Arc::new(EventSender::new(tx)),
            Arc::new(AppConfig::new(
                "sqlite::memory:".to_string(),
                "127.0.0.1".to_string(),
                8080,
                "test".to_string(),
            )),
        )
    }

    fn item(current: i32, reorder: i32, expiry: Option<DateTime<Utc>>) -> inventory_item::Model {
        inventory_item::Model {
            id: Uuid::new_v4(),
            variant_id: Uuid::new_v4(),
            sku: "PEP-2001".to_string(),
            product_name: "Test peptide 10 mg".to_string(),
            current_stock: current,
            reserved_stock: 0,
            available_stock: current,
            reorder_point: reorder,
            max_stock: None,
            cost_per_unit: None,
            batch_number: None,
            expiry_date: expiry,
            location: None,
            temperature_zone: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn empty_item_is_out_of_stock_not_low() {
        let svc = service();
        let conditions = svc.conditions_for(&item(0, 5, None), Utc::now());
        assert_eq!(conditions, vec![AlertType::OutOfStock]);
    }

    #[test]
    fn stock_at_reorder_point_is_low() {
        let svc = service();
        let conditions = svc.conditions_for(&item(5, 5, None), Utc::now());
        assert_eq!(conditions, vec![AlertType::LowStock]);
    }

    #[test]
    fn healthy_stock_has_no_conditions() {
        let svc = service();
        let conditions = svc.conditions_for(&item(50, 5, None), Utc::now());
        assert!(conditions.is_empty());
    }

    #[test]
    fn expiry_inside_window_flags_expiring_soon() {
        let svc = service();
        let now = Utc::now();
        let expiry = now + ChronoDuration::days(svc.config.expiry_window_days - 1);
        let conditions = svc.conditions_for(&item(50, 5, Some(expiry)), now);
        assert_eq!(conditions, vec![AlertType::ExpiringSoon]);
    }

    #[test]
    fn past_expiry_flags_expired_not_expiring() {
        let svc = service();
        let now = Utc::now();
        let conditions = svc.conditions_for(&item(50, 5, Some(now - ChronoDuration::days(1))), now);
        assert_eq!(conditions, vec![AlertType::Expired]);
    }

    #[test]
    fn low_stock_and_expiry_conditions_stack() {
        let svc = service();
        let now = Utc::now();
        let expiry = now + ChronoDuration::days(2);
        let conditions = svc.conditions_for(&item(3, 5, Some(expiry)), now);
        assert_eq!(conditions, vec![AlertType::LowStock, AlertType::ExpiringSoon]);
    }
}

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tracing::{info, warn};
use uuid::Uuid;

use crate::metrics::BUSINESS_METRICS;

#[derive(Debug, Clone)]
pub struct EventSender {
    sender: mpsc::Sender<Event>,
}

impl EventSender {
    /// Creates a new EventSender
    pub fn new(sender: mpsc::Sender<Event>) -> Self {
        Self { sender }
    }

    /// Sends an event asynchronously
    pub async fn send(&self, event: Event) -> Result<(), String> {
        self.sender
            .send(event)
            .await
            .map_err(|e| format!("Failed to send event: {}", e))
    }

    /// Sends an event, logging instead of failing when the consumer is gone.
    /// Domain writes never roll back because the event channel is full.
    pub async fn send_or_log(&self, event: Event) {
        if let Err(e) = self.send(event).await {
            warn!("Event dropped: {}", e);
        }
    }
}

// The events that can occur in the system.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Event {
    // Catalog events
    ProductCreated(Uuid),
    ProductUpdated(Uuid),
    ProductArchived(Uuid),
    VariantCreated {
        product_id: Uuid,
        variant_id: Uuid,
    },

    // Cart events
    CartCreated(Uuid),
    CartItemAdded {
        cart_id: Uuid,
        variant_id: Uuid,
    },
    CartItemUpdated {
        cart_id: Uuid,
        item_id: Uuid,
    },
    CartItemRemoved {
        cart_id: Uuid,
        item_id: Uuid,
    },
    CartCleared(Uuid),
    CartAbandoned(Uuid),

    // Checkout and order events
    CheckoutCompleted {
        cart_id: Uuid,
        order_id: Uuid,
    },
    OrderCreated(Uuid),
    OrderStatusChanged {
        order_id: Uuid,
        old_status: String,
        new_status: String,
    },
    OrderCancelled(Uuid),
    OrderFulfilled(Uuid),

    // Payment events
    PaymentSucceeded(Uuid),
    PaymentFailed(Uuid),

    // Inventory ledger events
    InventoryTransactionRecorded {
        item_id: Uuid,
        transaction_id: Uuid,
        transaction_type: String,
        quantity_change: i32,
    },
    InventoryReserved {
        item_id: Uuid,
        quantity: i32,
        reference_id: Option<Uuid>,
    },
    ReservationReleased {
        item_id: Uuid,
        quantity: i32,
        reference_id: Option<Uuid>,
    },

    // Stock alert events
    StockAlertRaised {
        alert_id: Uuid,
        item_id: Uuid,
        alert_type: String,
    },
    StockAlertAcknowledged(Uuid),
    StockAlertResolved(Uuid),

    // Account events
    ProfileUpdated {
        user_id: String,
    },
    ProductSaved {
        user_id: String,
        product_id: Uuid,
    },

    // Document events
    DocumentCreated {
        document_id: Uuid,
        category: String,
    },

    // Contact events
    ContactMessageReceived(Uuid),

    // Generic event for custom messages
    Generic {
        message: String,
        timestamp: DateTime<Utc>,
        metadata: serde_json::Value,
    },
}

impl Event {
    /// Create a generic event with string data
    pub fn with_data(data: String) -> Self {
        Event::Generic {
            message: data,
            timestamp: Utc::now(),
            metadata: serde_json::Value::Null,
        }
    }
}

// Consumes the event channel for the lifetime of the process. Side effects
// here are logging and metrics; domain state is already committed by the
// time an event is published.
pub async fn process_events(mut rx: mpsc::Receiver<Event>) {
    info!("Starting event processing loop");

    while let Some(event) = rx.recv().await {
        match &event {
            Event::OrderCreated(order_id) => {
                BUSINESS_METRICS.record_order_created();
                info!("Order created: {}", order_id);
            }
            Event::OrderCancelled(order_id) => {
                BUSINESS_METRICS.record_order_cancelled();
                info!("Order cancelled: {}", order_id);
            }
            Event::OrderFulfilled(order_id) => {
                BUSINESS_METRICS.record_order_fulfilled();
                info!("Order fulfilled: {}", order_id);
            }
            Event::OrderStatusChanged {
                order_id,
                old_status,
                new_status,
            } => {
                info!(
                    "Order {} status changed: {} -> {}",
                    order_id, old_status, new_status
                );
            }
            Event::PaymentSucceeded(order_id) => {
                BUSINESS_METRICS.record_payment_processed();
                info!("Payment succeeded for order: {}", order_id);
            }
            Event::PaymentFailed(order_id) => {
                BUSINESS_METRICS.record_payment_failed();
                warn!("Payment failed for order: {}", order_id);
            }
            Event::InventoryTransactionRecorded {
                item_id,
                transaction_type,
                quantity_change,
                ..
            } => {
                BUSINESS_METRICS.record_inventory_transaction();
                info!(
                    "Inventory transaction recorded: item={} type={} change={}",
                    item_id, transaction_type, quantity_change
                );
            }
            Event::InventoryReserved {
                item_id, quantity, ..
            } => {
                info!("Inventory reserved: item={} quantity={}", item_id, quantity);
            }
            Event::ReservationReleased {
                item_id, quantity, ..
            } => {
                info!(
                    "Reservation released: item={} quantity={}",
                    item_id, quantity
                );
            }
            Event::StockAlertRaised {
                alert_id,
                item_id,
                alert_type,
            } => {
                warn!(
                    "Stock alert raised: alert={} item={} type={}",
                    alert_id, item_id, alert_type
                );
            }
            Event::CheckoutCompleted { cart_id, order_id } => {
                info!(
                    "Checkout completed: cart={} order={}",
                    cart_id, order_id
                );
            }
            other => {
                info!("Event: {:?}", other);
            }
        }
    }

    info!("Event processing loop stopped");
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;

    #[tokio::test]
    async fn sender_delivers_events_in_order() {
        let (tx, mut rx) = mpsc::channel(8);
        let sender = EventSender::new(tx);

        let order_id = Uuid::new_v4();
        sender.send(Event::OrderCreated(order_id)).await.unwrap();
        sender.send(Event::OrderCancelled(order_id)).await.unwrap();

        assert_matches!(rx.recv().await, Some(Event::OrderCreated(id)) if id == order_id);
        assert_matches!(rx.recv().await, Some(Event::OrderCancelled(id)) if id == order_id);
    }

    #[tokio::test]
    async fn send_or_log_swallows_closed_channel() {
        let (tx, rx) = mpsc::channel(1);
        drop(rx);
        let sender = EventSender::new(tx);

        // Must not panic or return an error to the caller
        sender.send_or_log(Event::CartCreated(Uuid::new_v4())).await;
    }
}

//! HTML invoice rendering.
//!
//! The invoice is a self-contained HTML document the storefront opens in a
//! new tab and prints to PDF in the browser. Rendering is pure string
//! templating over the order snapshot; no third-party document toolkit.

use crate::{
    config::AppConfig,
    db::DbPool,
    entities::order::{self, Entity as Order},
    entities::order_item::{self, Entity as OrderItem},
    errors::ServiceError,
};
use rust_decimal::Decimal;
use sea_orm::{ColumnTrait, EntityTrait, ModelTrait, QueryFilter, QueryOrder};
use std::fmt::Write as _;
use std::sync::Arc;
use tracing::instrument;
use uuid::Uuid;

const INVOICE_ISSUER: &str = "Peptide Research Supply";

#[derive(Clone)]
pub struct InvoiceService {
    db: Arc<DbPool>,
    config: Arc<AppConfig>,
}

impl InvoiceService {
    pub fn new(db: Arc<DbPool>, config: Arc<AppConfig>) -> Self {
        Self { db, config }
    }

    /// Renders the invoice for an order as a printable HTML document.
    #[instrument(skip(self))]
    pub async fn render_invoice(&self, order_id: Uuid) -> Result<String, ServiceError> {
        let order = Order::find_by_id(order_id)
            .one(&*self.db)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("Order {} not found", order_id)))?;
        let items = order
            .find_related(OrderItem)
            .order_by_asc(order_item::Column::CreatedAt)
            .all(&*self.db)
            .await?;

        Ok(build_invoice_html(&order, &items, &self.config.default_currency))
    }
}

/// Minimal HTML escaping for values that came from user input.
fn escape(value: &str) -> String {
    value
        .replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}

fn amount(value: Decimal) -> String {
    // SQLite hands decimals back with minimal scale, so pad to cents here.
    format!("{:.2}", value.round_dp(2))
}

const ADDRESS_KEY_ORDER: &[&str] = &[
    "name",
    "line1",
    "line2",
    "city",
    "state",
    "postal_code",
    "country",
];

/// Renders an address stored as a JSON string into line-broken HTML,
/// known fields first in postal order. Non-JSON content falls back to one
/// escaped line.
fn render_address(raw: &str) -> String {
    match serde_json::from_str::<serde_json::Value>(raw) {
        Ok(serde_json::Value::Object(map)) => {
            let mut lines = Vec::new();
            for key in ADDRESS_KEY_ORDER {
                if let Some(serde_json::Value::String(s)) = map.get(*key) {
                    if !s.trim().is_empty() {
                        lines.push(escape(s));
                    }
                }
            }
            for (key, value) in &map {
                if ADDRESS_KEY_ORDER.contains(&key.as_str()) {
                    continue;
                }
                if let serde_json::Value::String(s) = value {
                    if !s.trim().is_empty() {
                        lines.push(escape(s));
                    }
                }
            }
            if lines.is_empty() {
                escape(raw)
            } else {
                lines.join("<br>")
            }
        }
        _ => escape(raw),
    }
}

pub fn build_invoice_html(
    order: &order::Model,
    items: &[order_item::Model],
    fallback_currency: &str,
) -> String {
    let currency = if order.currency.is_empty() {
        fallback_currency
    } else {
        &order.currency
    };

    let mut rows = String::new();
    for item in items {
        let _ = write!(
            rows,
            "<tr><td>{sku}</td><td>{name}</td><td class=\"num\">{qty}</td>\
             <td class=\"num\">{unit}</td><td class=\"num\">{total}</td></tr>",
            sku = escape(&item.sku),
            name = escape(&item.product_name),
            qty = item.quantity,
            unit = amount(item.unit_price),
            total = amount(item.line_total),
        );
    }

    let shipping_block = order
        .shipping_address
        .as_deref()
        .map(|addr| format!("<h3>Ship to</h3><p>{}</p>", render_address(addr)))
        .unwrap_or_default();
    let billing_block = order
        .billing_address
        .as_deref()
        .map(|addr| format!("<h3>Bill to</h3><p>{}</p>", render_address(addr)))
        .unwrap_or_default();

    format!(
        r#"<!DOCTYPE html>
<html lang="en">
<head>
<meta charset="utf-8">
<title>Invoice {number}</title>
<style>
body {{ font-family: Helvetica, Arial, sans-serif; margin: 2rem; color: #1a1a1a; }}
h1 {{ font-size: 1.4rem; }}
table {{ width: 100%; border-collapse: collapse; margin-top: 1rem; }}
th, td {{ text-align: left; padding: 0.4rem 0.6rem; border-bottom: 1px solid #ddd; }}
td.num, th.num {{ text-align: right; }}
tfoot td {{ border-bottom: none; font-weight: bold; }}
.meta {{ color: #555; }}
@media print {{ body {{ margin: 0.5rem; }} }}
</style>
</head>
<body>
<h1>{issuer}</h1>
<h2>Invoice {number}</h2>
<p class="meta">Order date: {date}<br>Payment: {payment:?}</p>
{shipping}
{billing}
<table>
<thead>
<tr><th>SKU</th><th>Item</th><th class="num">Qty</th><th class="num">Unit price</th><th class="num">Line total</th></tr>
</thead>
<tbody>
{rows}
</tbody>
<tfoot>
<tr><td colspan="4" class="num">Subtotal</td><td class="num">{subtotal}</td></tr>
<tr><td colspan="4" class="num">Shipping</td><td class="num">{shipping_total}</td></tr>
<tr><td colspan="4" class="num">Tax</td><td class="num">{tax}</td></tr>
<tr><td colspan="4" class="num">Total ({currency})</td><td class="num">{total}</td></tr>
</tfoot>
</table>
<p class="meta">All products are supplied for laboratory research use only.</p>
</body>
</html>"#,
        issuer = INVOICE_ISSUER,
        number = escape(&order.order_number),
        date = order.order_date.format("%Y-%m-%d"),
        payment = order.payment_status,
        shipping = shipping_block,
        billing = billing_block,
        rows = rows,
        subtotal = amount(order.subtotal),
        shipping_total = amount(order.shipping_total),
        tax = amount(order.tax_total),
        currency = escape(currency),
        total = amount(order.total_amount),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entities::order::{OrderStatus, PaymentStatus};
    use chrono::Utc;
    use rust_decimal_macros::dec;

    fn fixture_order() -> (order::Model, Vec<order_item::Model>) {
        let order_id = Uuid::new_v4();
        let order = order::Model {
            id: order_id,
            order_number: "PEP-8F2KQ0X4ZD".to_string(),
            user_id: "user-1".to_string(),
            status: OrderStatus::Pending,
            payment_status: PaymentStatus::Paid,
            order_date: Utc::now(),
            subtotal: dec!(178.00),
            shipping_total: dec!(9.95),
            tax_total: dec!(12.46),
            total_amount: dec!(200.41),
            currency: "USD".to_string(),
            shipping_address: Some(r#"{"line1":"12 Bench Rd","city":"Boston"}"#.to_string()),
            billing_address: None,
            notes: None,
            created_at: Utc::now(),
            updated_at: None,
            version: 1,
        };
        let items = vec![order_item::Model {
            id: Uuid::new_v4(),
            order_id,
            variant_id: Uuid::new_v4(),
            sku: "PEP-1042".to_string(),
            product_name: "Thymosin fragment 5 mg".to_string(),
            quantity: 2,
            unit_price: dec!(89.00),
            line_total: dec!(178.00),
            created_at: Utc::now(),
        }];
        (order, items)
    }

    #[test]
    fn invoice_carries_lines_and_totals() {
        let (order, items) = fixture_order();
        let html = build_invoice_html(&order, &items, "USD");

        assert!(html.contains("Invoice PEP-8F2KQ0X4ZD"));
        assert!(html.contains("PEP-1042"));
        assert!(html.contains("Thymosin fragment 5 mg"));
        assert!(html.contains("178.00"));
        assert!(html.contains("200.41"));
        assert!(html.contains("12 Bench Rd<br>Boston"));
    }

    #[test]
    fn user_content_is_escaped() {
        let (mut order, mut items) = fixture_order();
        order.order_number = "PEP-<script>".to_string();
        items[0].product_name = "5 mg <b>vial</b> & cap".to_string();

        let html = build_invoice_html(&order, &items, "USD");
        assert!(!html.contains("<script>"));
        assert!(html.contains("PEP-&lt;script&gt;"));
        assert!(html.contains("5 mg &lt;b&gt;vial&lt;/b&gt; &amp; cap"));
    }

    #[test]
    fn missing_addresses_render_nothing() {
        let (mut order, items) = fixture_order();
        order.shipping_address = None;
        let html = build_invoice_html(&order, &items, "USD");
        assert!(!html.contains("Ship to"));
        assert!(!html.contains("Bill to"));
    }
}

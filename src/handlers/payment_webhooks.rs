use crate::handlers::common::map_service_error;
use crate::services::orders::PaymentTransition;
use crate::{errors::ApiError, AppState};
use axum::{
    extract::State,
    http::{HeaderMap, StatusCode},
    response::IntoResponse,
    routing::post,
    Router,
};
use bytes::Bytes;
use hmac::{Hmac, Mac};
use serde::Deserialize;
use sha2::Sha256;
use tracing::{info, warn};
use uuid::Uuid;

type HmacSha256 = Hmac<Sha256>;

const DEFAULT_TOLERANCE_SECS: u64 = 300;

/// Creates the router for payment provider webhooks
pub fn payment_webhook_routes() -> Router<AppState> {
    Router::new().route("/webhook", post(payment_webhook))
}

#[derive(Debug, Deserialize)]
struct WebhookEnvelope {
    #[serde(rename = "type")]
    event_type: String,
    order_id: Uuid,
}

/// Payment provider callback. The body is read raw so the signature is
/// computed over exactly the bytes the provider signed.
#[utoipa::path(
    post,
    path = "/api/v1/payments/webhook",
    request_body = String,
    responses(
        (status = 200, description = "Webhook accepted"),
        (status = 400, description = "Invalid payload", body = crate::errors::ErrorResponse),
        (status = 401, description = "Invalid signature", body = crate::errors::ErrorResponse),
        (status = 404, description = "Unknown order", body = crate::errors::ErrorResponse)
    ),
    tag = "Payments"
)]
pub async fn payment_webhook(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<impl IntoResponse, ApiError> {
    if let Some(secret) = state.config.payment_webhook_secret.as_deref() {
        let tolerance = state
            .config
            .payment_webhook_tolerance_secs
            .unwrap_or(DEFAULT_TOLERANCE_SECS);
        if !verify_signature(&headers, &body, secret, tolerance) {
            warn!("Payment webhook signature verification failed");
            return Err(ApiError::Unauthorized);
        }
    }

    let envelope: WebhookEnvelope = serde_json::from_slice(&body).map_err(|e| {
        ApiError::BadRequest {
            message: format!("Invalid webhook payload: {}", e),
            error_code: Some("INVALID_WEBHOOK_PAYLOAD".to_string()),
        }
    })?;

    let succeeded = match envelope.event_type.as_str() {
        "payment.succeeded" | "charge.succeeded" => true,
        "payment.failed" | "charge.failed" => false,
        other => {
            info!(event_type = %other, "Unhandled payment webhook type");
            return Ok((StatusCode::OK, "ok"));
        }
    };

    // Providers retry webhooks, so a redelivery must not flip a settled
    // order. AlreadySettled acknowledges without touching the order.
    match state
        .services
        .orders
        .apply_payment_event(envelope.order_id, succeeded)
        .await
        .map_err(map_service_error)?
    {
        PaymentTransition::Applied(order) => {
            info!(
                order_id = %order.id,
                order_number = %order.order_number,
                succeeded,
                "Payment webhook applied"
            );
        }
        PaymentTransition::AlreadySettled(order) => {
            info!(
                order_id = %order.id,
                status = ?order.payment_status,
                "Payment webhook redelivered for settled order"
            );
        }
    }

    Ok((StatusCode::OK, "ok"))
}

/// HMAC check over "{timestamp}.{body}" with x-timestamp and x-signature
/// headers. Stale timestamps outside the tolerance window are rejected
/// before any MAC work.
fn verify_signature(headers: &HeaderMap, payload: &Bytes, secret: &str, tolerance_secs: u64) -> bool {
    let (ts, sig) = match (headers.get("x-timestamp"), headers.get("x-signature")) {
        (Some(ts), Some(sig)) => match (ts.to_str(), sig.to_str()) {
            (Ok(ts), Ok(sig)) => (ts, sig),
            _ => return false,
        },
        _ => return false,
    };

    match ts.parse::<i64>() {
        Ok(ts_i) => {
            let now = chrono::Utc::now().timestamp();
            if (now - ts_i).unsigned_abs() > tolerance_secs {
                return false;
            }
        }
        Err(_) => return false,
    }

    let mut mac = match HmacSha256::new_from_slice(secret.as_bytes()) {
        Ok(mac) => mac,
        Err(_) => return false,
    };
    mac.update(ts.as_bytes());
    mac.update(b".");
    mac.update(payload);
    let expected = hex::encode(mac.finalize().into_bytes());

    constant_time_eq(&expected, sig)
}

fn constant_time_eq(a: &str, b: &str) -> bool {
    if a.len() != b.len() {
        return false;
    }
    let mut res = 0u8;
    for (x, y) in a.as_bytes().iter().zip(b.as_bytes()) {
        res |= x ^ y;
    }
    res == 0
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    fn sign(secret: &str, ts: i64, body: &[u8]) -> String {
        let mut mac = HmacSha256::new_from_slice(secret.as_bytes()).unwrap();
        mac.update(format!("{}.", ts).as_bytes());
        mac.update(body);
        hex::encode(mac.finalize().into_bytes())
    }

    fn headers_for(ts: i64, sig: &str) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert("x-timestamp", HeaderValue::from_str(&ts.to_string()).unwrap());
        headers.insert("x-signature", HeaderValue::from_str(sig).unwrap());
        headers
    }

    #[test]
    fn accepts_a_fresh_correctly_signed_body() {
        let secret = "whsec_test";
        let body = Bytes::from_static(b"{\"type\":\"payment.succeeded\"}");
        let ts = chrono::Utc::now().timestamp();
        let sig = sign(secret, ts, &body);

        assert!(verify_signature(&headers_for(ts, &sig), &body, secret, 300));
    }

    #[test]
    fn rejects_a_tampered_body() {
        let secret = "whsec_test";
        let body = Bytes::from_static(b"{\"type\":\"payment.succeeded\"}");
        let ts = chrono::Utc::now().timestamp();
        let sig = sign(secret, ts, &body);

        let tampered = Bytes::from_static(b"{\"type\":\"payment.failed\"}");
        assert!(!verify_signature(&headers_for(ts, &sig), &tampered, secret, 300));
    }

    #[test]
    fn rejects_a_stale_timestamp() {
        let secret = "whsec_test";
        let body = Bytes::from_static(b"{}");
        let ts = chrono::Utc::now().timestamp() - 3600;
        let sig = sign(secret, ts, &body);

        assert!(!verify_signature(&headers_for(ts, &sig), &body, secret, 300));
    }

    #[test]
    fn rejects_missing_headers() {
        let body = Bytes::from_static(b"{}");
        assert!(!verify_signature(&HeaderMap::new(), &body, "whsec_test", 300));
    }

    #[test]
    fn rejects_wrong_secret() {
        let body = Bytes::from_static(b"{}");
        let ts = chrono::Utc::now().timestamp();
        let sig = sign("whsec_other", ts, &body);

        assert!(!verify_signature(&headers_for(ts, &sig), &body, "whsec_test", 300));
    }

    #[test]
    fn constant_time_eq_compares_exactly() {
        assert!(constant_time_eq("abc123", "abc123"));
        assert!(!constant_time_eq("abc123", "abc124"));
        assert!(!constant_time_eq("abc123", "abc12"));
    }
}

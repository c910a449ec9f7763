/*!
 * # Metrics Module
 *
 * Self-contained in-memory metrics for the Pepstore API. Counters, gauges and
 * histograms live in a process-wide registry and are exported in Prometheus
 * text format at `/metrics` and as JSON at `/metrics/json`.
 */

use dashmap::DashMap;
use once_cell::sync::Lazy;
use serde_json::json;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use thiserror::Error;
use tokio::time::Duration;

#[derive(Debug, Error)]
pub enum MetricsError {
    #[error("Failed to export metrics: {0}")]
    ExportError(String),
    #[error("Metric not found: {0}")]
    NotFound(String),
}

#[derive(Debug, Clone)]
pub struct Counter {
    value: Arc<AtomicU64>,
}

impl Counter {
    pub fn new() -> Self {
        Self {
            value: Arc::new(AtomicU64::new(0)),
        }
    }

    pub fn inc(&self) {
        self.value.fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_by(&self, value: u64) {
        self.value.fetch_add(value, Ordering::Relaxed);
    }

    pub fn get(&self) -> u64 {
        self.value.load(Ordering::Relaxed)
    }
}

impl Default for Counter {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Debug, Clone)]
pub struct Gauge {
    value: Arc<AtomicU64>,
}

impl Gauge {
    pub fn new() -> Self {
        Self {
            value: Arc::new(AtomicU64::new(0)),
        }
    }

    pub fn set(&self, value: f64) {
        self.value.store(value as u64, Ordering::Relaxed);
    }

    pub fn inc(&self) {
        self.value.fetch_add(1, Ordering::Relaxed);
    }

    pub fn dec(&self) {
        self.value.fetch_sub(1, Ordering::Relaxed);
    }

    /// Shift the gauge by a signed delta, clamping at zero.
    pub fn add(&self, delta: f64) {
        if delta >= 0.0 {
            self.value.fetch_add(delta as u64, Ordering::Relaxed);
        } else {
            let dec = (-delta) as u64;
            let mut current = self.value.load(Ordering::Relaxed);
            loop {
                let next = current.saturating_sub(dec);
                match self.value.compare_exchange_weak(
                    current,
                    next,
                    Ordering::Relaxed,
                    Ordering::Relaxed,
                ) {
                    Ok(_) => break,
                    Err(actual) => current = actual,
                }
            }
        }
    }

    pub fn get(&self) -> f64 {
        self.value.load(Ordering::Relaxed) as f64
    }
}

impl Default for Gauge {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Debug, Clone)]
pub struct Histogram {
    sum: Arc<AtomicU64>,
    count: Arc<AtomicU64>,
}

impl Histogram {
    pub fn new() -> Self {
        Self {
            sum: Arc::new(AtomicU64::new(0)),
            count: Arc::new(AtomicU64::new(0)),
        }
    }

    pub fn observe(&self, value: f64) {
        self.sum.fetch_add(value as u64, Ordering::Relaxed);
        self.count.fetch_add(1, Ordering::Relaxed);
    }

    pub fn get_count(&self) -> u64 {
        self.count.load(Ordering::Relaxed)
    }

    pub fn get_sum(&self) -> f64 {
        self.sum.load(Ordering::Relaxed) as f64
    }
}

impl Default for Histogram {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Debug)]
pub struct MetricsRegistry {
    counters: Arc<DashMap<String, Counter>>,
    gauges: Arc<DashMap<String, Gauge>>,
    histograms: Arc<DashMap<String, Histogram>>,
}

impl MetricsRegistry {
    pub fn new() -> Self {
        Self {
            counters: Arc::new(DashMap::new()),
            gauges: Arc::new(DashMap::new()),
            histograms: Arc::new(DashMap::new()),
        }
    }

    pub fn get_or_create_counter(&self, name: &str) -> Counter {
        self.counters
            .entry(name.to_string())
            .or_insert_with(Counter::new)
            .clone()
    }

    pub fn get_or_create_gauge(&self, name: &str) -> Gauge {
        self.gauges
            .entry(name.to_string())
            .or_insert_with(Gauge::new)
            .clone()
    }

    pub fn get_or_create_histogram(&self, name: &str) -> Histogram {
        self.histograms
            .entry(name.to_string())
            .or_insert_with(Histogram::new)
            .clone()
    }

    pub async fn export_metrics(&self) -> Result<String, MetricsError> {
        let mut output = String::new();

        for entry in self.counters.iter() {
            let (name, counter) = entry.pair();
            output.push_str(&format!("# TYPE {} counter\n", name));
            output.push_str(&format!("{} {}\n", name, counter.get()));
        }

        for entry in self.gauges.iter() {
            let (name, gauge) = entry.pair();
            output.push_str(&format!("# TYPE {} gauge\n", name));
            output.push_str(&format!("{} {}\n", name, gauge.get()));
        }

        for entry in self.histograms.iter() {
            let (name, histogram) = entry.pair();
            output.push_str(&format!("# TYPE {} histogram\n", name));
            output.push_str(&format!("{}_count {}\n", name, histogram.get_count()));
            output.push_str(&format!("{}_sum {}\n", name, histogram.get_sum()));
        }

        Ok(output)
    }

    pub async fn export_metrics_json(&self) -> Result<serde_json::Value, MetricsError> {
        let mut counters = serde_json::Map::new();
        for entry in self.counters.iter() {
            let (name, counter) = entry.pair();
            counters.insert(name.to_string(), json!(counter.get()));
        }

        let mut gauges = serde_json::Map::new();
        for entry in self.gauges.iter() {
            let (name, gauge) = entry.pair();
            gauges.insert(name.to_string(), json!(gauge.get()));
        }

        let mut histograms = serde_json::Map::new();
        for entry in self.histograms.iter() {
            let (name, histogram) = entry.pair();
            histograms.insert(
                name.to_string(),
                json!({
                    "count": histogram.get_count(),
                    "sum": histogram.get_sum(),
                }),
            );
        }

        Ok(json!({
            "counters": counters,
            "gauges": gauges,
            "histograms": histograms,
        }))
    }
}

impl Default for MetricsRegistry {
    fn default() -> Self {
        Self::new()
    }
}

// Global metrics registry
pub static METRICS: Lazy<MetricsRegistry> = Lazy::new(MetricsRegistry::new);

// Metrics collection functions
pub fn increment_counter(name: &str) {
    METRICS.get_or_create_counter(name).inc();
}

pub fn increment_counter_by(name: &str, value: u64) {
    METRICS.get_or_create_counter(name).inc_by(value);
}

pub fn set_gauge(name: &str, value: f64) {
    METRICS.get_or_create_gauge(name).set(value);
}

pub fn observe_histogram(name: &str, value: f64) {
    METRICS.get_or_create_histogram(name).observe(value);
}

/// Application-level metrics
pub struct AppMetrics {
    pub requests_total: Counter,
    pub requests_duration: Histogram,
    pub cache_hits: Counter,
    pub cache_misses: Counter,
    pub cache_evictions: Counter,
    pub errors_total: Counter,
}

impl AppMetrics {
    pub fn new() -> Self {
        Self {
            requests_total: METRICS.get_or_create_counter("http_requests_total"),
            requests_duration: METRICS.get_or_create_histogram("http_request_duration_seconds"),
            cache_hits: METRICS.get_or_create_counter("cache_hits_total"),
            cache_misses: METRICS.get_or_create_counter("cache_misses_total"),
            cache_evictions: METRICS.get_or_create_counter("cache_evictions_total"),
            errors_total: METRICS.get_or_create_counter("errors_total"),
        }
    }

    pub fn record_request(&self, duration: Duration) {
        self.requests_total.inc();
        self.requests_duration.observe(duration.as_secs_f64());
    }

    pub fn record_error(&self) {
        self.errors_total.inc();
    }

    pub fn record_cache_hit(&self) {
        self.cache_hits.inc();
    }

    pub fn record_cache_miss(&self) {
        self.cache_misses.inc();
    }

    pub fn record_cache_eviction(&self) {
        self.cache_evictions.inc();
    }
}

impl Default for AppMetrics {
    fn default() -> Self {
        Self::new()
    }
}

/// Commerce and inventory metrics
pub struct BusinessMetrics {
    pub orders_created: Counter,
    pub orders_cancelled: Counter,
    pub orders_fulfilled: Counter,
    pub inventory_transactions: Counter,
    pub reservations_active: Gauge,
    pub alerts_active: Gauge,
    pub payments_processed: Counter,
    pub payments_failed: Counter,
}

impl BusinessMetrics {
    pub fn new() -> Self {
        Self {
            orders_created: METRICS.get_or_create_counter("orders_created_total"),
            orders_cancelled: METRICS.get_or_create_counter("orders_cancelled_total"),
            orders_fulfilled: METRICS.get_or_create_counter("orders_fulfilled_total"),
            inventory_transactions: METRICS
                .get_or_create_counter("inventory_transactions_total"),
            reservations_active: METRICS.get_or_create_gauge("inventory_reservations_active"),
            alerts_active: METRICS.get_or_create_gauge("stock_alerts_active"),
            payments_processed: METRICS.get_or_create_counter("payments_processed_total"),
            payments_failed: METRICS.get_or_create_counter("payments_failed_total"),
        }
    }

    pub fn record_order_created(&self) {
        self.orders_created.inc();
    }

    pub fn record_order_cancelled(&self) {
        self.orders_cancelled.inc();
    }

    pub fn record_order_fulfilled(&self) {
        self.orders_fulfilled.inc();
    }

    pub fn record_inventory_transaction(&self) {
        self.inventory_transactions.inc();
    }

    pub fn record_payment_processed(&self) {
        self.payments_processed.inc();
    }

    pub fn record_payment_failed(&self) {
        self.payments_failed.inc();
    }
}

impl Default for BusinessMetrics {
    fn default() -> Self {
        Self::new()
    }
}

// Global instances
pub static APP_METRICS: Lazy<AppMetrics> = Lazy::new(AppMetrics::new);
pub static BUSINESS_METRICS: Lazy<BusinessMetrics> = Lazy::new(BusinessMetrics::new);

// HTTP endpoint handlers for metrics export
pub async fn metrics_handler() -> Result<String, MetricsError> {
    METRICS.export_metrics().await
}

pub async fn metrics_json_handler() -> Result<serde_json::Value, MetricsError> {
    METRICS.export_metrics_json().await
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counter_accumulates() {
        let registry = MetricsRegistry::new();
        let counter = registry.get_or_create_counter("test_counter");
        counter.inc();
        counter.inc_by(4);
        assert_eq!(registry.get_or_create_counter("test_counter").get(), 5);
    }

    #[tokio::test]
    async fn export_uses_prometheus_text_format() {
        let registry = MetricsRegistry::new();
        registry.get_or_create_counter("widgets_total").inc();
        registry.get_or_create_gauge("water_level").set(7.0);

        let text = registry.export_metrics().await.unwrap();
        assert!(text.contains("# TYPE widgets_total counter"));
        assert!(text.contains("widgets_total 1"));
        assert!(text.contains("# TYPE water_level gauge"));
    }
}

//! Prometheus bootstrap and the `/metrics` route.

use axum::{routing::get, Router};
use metrics::{describe_counter, describe_gauge, describe_histogram};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use once_cell::sync::OnceCell;

/// One-time metrics registration (so series show up on /metrics).
pub fn ensure_metrics_described() {
    static ONCE: OnceCell<()> = OnceCell::new();
    ONCE.get_or_init(|| {
        describe_counter!("chat_requests_total", "Chat messages accepted by the API.");
        describe_counter!(
            "chat_scripted_shortcircuit_total",
            "Requests answered by a high-confidence scripted reply."
        );
        describe_counter!(
            "chat_fallback_total",
            "Requests served the fixed fallback reply."
        );
        describe_counter!(
            "chat_source_wins_total",
            "Selected replies by winning source."
        );
        describe_counter!(
            "provider_failures_total",
            "Generative provider calls that produced no usable reply."
        );
        describe_histogram!(
            "chat_selection_ms",
            "Response selection time in milliseconds."
        );
        describe_gauge!("chat_active_chats", "Chats currently held in memory.");
    });
}

pub struct Metrics {
    pub handle: PrometheusHandle,
}

impl Metrics {
    /// Install the Prometheus recorder. Call once at startup, before the
    /// first counter is touched.
    pub fn init() -> Self {
        // Use default buckets to avoid API differences across crate versions.
        let builder = PrometheusBuilder::new();

        let handle = builder
            .install_recorder()
            .expect("prometheus: install recorder");

        ensure_metrics_described();

        Self { handle }
    }

    /// Returns a router exposing `/metrics` with the Prometheus exposition format.
    pub fn router(&self) -> Router {
        let handle = self.handle.clone();
        Router::new().route(
            "/metrics",
            get(move || {
                let h = handle.clone();
                async move { h.render() }
            }),
        )
    }
}

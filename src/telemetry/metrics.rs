//! Prometheus metrics

use metrics::{counter, gauge};
use metrics_exporter_prometheus::PrometheusBuilder;

/// Start the Prometheus exporter on the given port
pub fn init_exporter(port: u16) -> anyhow::Result<()> {
    PrometheusBuilder::new()
        .with_http_listener(([0, 0, 0, 0], port))
        .install()
        .map_err(|e| anyhow::anyhow!("Failed to start metrics exporter: {}", e))?;
    tracing::info!(port, "Metrics exporter listening");
    Ok(())
}

/// Count a synthesized tick
pub fn record_tick(crypto: &str) {
    counter!("updown_ticks_total", "crypto" => crypto.to_string()).increment(1);
}

/// Count an order submission
pub fn record_order_placed() {
    counter!("updown_orders_placed_total").increment(1);
}

/// Count an order outcome ("filled", "open", "rejected", "failed")
pub fn record_order_outcome(outcome: &'static str) {
    counter!("updown_order_outcomes_total", "outcome" => outcome).increment(1);
}

/// Count a signal blocked by the risk gate
pub fn record_risk_block() {
    counter!("updown_risk_blocks_total").increment(1);
}

/// Current engine lifecycle state as a numeric gauge
pub fn set_engine_state(state: f64) {
    gauge!("updown_engine_state").set(state);
}

/// Current open exposure
pub fn set_exposure(exposure: f64) {
    gauge!("updown_exposure").set(exposure);
}

/// Session net realized P&L
pub fn set_net_pnl(net_pnl: f64) {
    gauge!("updown_net_pnl").set(net_pnl);
}

/// Overall health check result
pub fn set_healthy(healthy: bool) {
    gauge!("updown_healthy").set(if healthy { 1.0 } else { 0.0 });
}

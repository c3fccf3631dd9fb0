//! Prometheus Metrics Registry - Ladder Observability
//!
//! Registers the bot's counters and gauges. All metrics follow the
//! naming convention `ladder_bot_*`. Exposed by the health server on
//! `/metrics`.

use prometheus::{
    Encoder, Gauge, Histogram, HistogramOpts, IntCounter, IntCounterVec, IntGauge, Opts,
    Registry, TextEncoder,
};
use rust_decimal::Decimal;
use rust_decimal::prelude::ToPrimitive;

/// Centralized Prometheus metrics for the ladder bot.
pub struct MetricsRegistry {
    /// Prometheus registry.
    registry: Registry,
    /// Ladder orders accepted by the venue.
    pub orders_placed: IntCounter,
    /// Ladder orders cancelled.
    pub orders_cancelled: IntCounter,
    /// Ladder orders rejected, by venue transaction code.
    pub orders_rejected: IntCounterVec,
    /// Replace cycles by result.
    pub replace_cycles: IntCounterVec,
    /// Replace cycle duration in milliseconds.
    pub replace_latency_ms: Histogram,
    /// Last observed spot price.
    pub spot_price: Gauge,
    /// Ledger sequence of the last price sample.
    pub ledger_sequence: IntGauge,
    /// Swaps by result.
    pub swaps: IntCounterVec,
    /// Output of the last successful swap, in whole tokens.
    pub last_swap_output: Gauge,
    /// Manager events by kind and outcome.
    pub manager_events: IntCounterVec,
    /// Current manager state (see `ManagerState::as_gauge`).
    pub manager_state: IntGauge,
    /// Aborted cycles by error kind.
    pub errors: IntCounterVec,
    /// Fill stream resubscriptions.
    pub stream_reconnects: IntCounter,
    /// Fill stream connection status (1 = connected).
    pub stream_connected: IntGauge,
}

impl MetricsRegistry {
    /// Create and register all Prometheus metrics.
    pub fn new() -> anyhow::Result<Self> {
        let registry = Registry::new();

        let orders_placed = IntCounter::new(
            "ladder_bot_orders_placed_total",
            "Ladder orders accepted by the venue",
        )?;

        let orders_cancelled = IntCounter::new(
            "ladder_bot_orders_cancelled_total",
            "Ladder orders cancelled",
        )?;

        let orders_rejected = IntCounterVec::new(
            Opts::new(
                "ladder_bot_orders_rejected_total",
                "Ladder orders rejected by the venue",
            ),
            &["code"],
        )?;

        let replace_cycles = IntCounterVec::new(
            Opts::new("ladder_bot_replace_cycles_total", "Ladder replace cycles"),
            &["result"],
        )?;

        let replace_latency_ms = Histogram::with_opts(
            HistogramOpts::new(
                "ladder_bot_replace_latency_ms",
                "Cancel + place cycle duration in milliseconds",
            )
            .buckets(vec![
                250.0, 500.0, 1000.0, 2500.0, 5000.0, 10000.0, 30000.0, 60000.0,
            ]),
        )?;

        let spot_price = Gauge::new("ladder_bot_spot_price", "Last observed pool spot price")?;

        let ledger_sequence = IntGauge::new(
            "ladder_bot_ledger_sequence",
            "Ledger sequence of the last price sample",
        )?;

        let swaps = IntCounterVec::new(
            Opts::new("ladder_bot_swaps_total", "Fill-triggered swaps"),
            &["result"],
        )?;

        let last_swap_output = Gauge::new(
            "ladder_bot_last_swap_output",
            "Output of the last successful swap",
        )?;

        let manager_events = IntCounterVec::new(
            Opts::new(
                "ladder_bot_manager_events_total",
                "Order manager events by kind and outcome",
            ),
            &["event", "outcome"],
        )?;

        let manager_state = IntGauge::new(
            "ladder_bot_manager_state",
            "Order manager state (0=idle 1=replacing 2=awaiting_fill 3=swapping 4=cooldown 5=shutting_down)",
        )?;

        let errors = IntCounterVec::new(
            Opts::new("ladder_bot_errors_total", "Aborted cycles by error kind"),
            &["kind"],
        )?;

        let stream_reconnects = IntCounter::new(
            "ladder_bot_stream_reconnects_total",
            "Operation stream resubscriptions",
        )?;

        let stream_connected = IntGauge::new(
            "ladder_bot_stream_connected",
            "Operation stream status (1=connected, 0=disconnected)",
        )?;

        // Register all metrics
        registry.register(Box::new(orders_placed.clone()))?;
        registry.register(Box::new(orders_cancelled.clone()))?;
        registry.register(Box::new(orders_rejected.clone()))?;
        registry.register(Box::new(replace_cycles.clone()))?;
        registry.register(Box::new(replace_latency_ms.clone()))?;
        registry.register(Box::new(spot_price.clone()))?;
        registry.register(Box::new(ledger_sequence.clone()))?;
        registry.register(Box::new(swaps.clone()))?;
        registry.register(Box::new(last_swap_output.clone()))?;
        registry.register(Box::new(manager_events.clone()))?;
        registry.register(Box::new(manager_state.clone()))?;
        registry.register(Box::new(errors.clone()))?;
        registry.register(Box::new(stream_reconnects.clone()))?;
        registry.register(Box::new(stream_connected.clone()))?;

        Ok(Self {
            registry,
            orders_placed,
            orders_cancelled,
            orders_rejected,
            replace_cycles,
            replace_latency_ms,
            spot_price,
            ledger_sequence,
            swaps,
            last_swap_output,
            manager_events,
            manager_state,
            errors,
            stream_reconnects,
            stream_connected,
        })
    }

    /// Record a decimal on a gauge (reporting boundary only).
    pub fn set_decimal(gauge: &Gauge, value: Decimal) {
        if let Some(v) = value.to_f64() {
            gauge.set(v);
        }
    }

    /// Count one manager event.
    pub fn record_event(&self, event: &str, outcome: &str) {
        self.manager_events.with_label_values(&[event, outcome]).inc();
    }

    /// Text exposition of all registered metrics.
    pub fn render(&self) -> String {
        let encoder = TextEncoder::new();
        let metric_families = self.registry.gather();
        let mut buffer = Vec::new();
        if encoder.encode(&metric_families, &mut buffer).is_err() {
            return String::new();
        }
        String::from_utf8(buffer).unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_render_contains_registered_metrics() {
        let metrics = MetricsRegistry::new().unwrap();
        metrics.orders_placed.inc();
        metrics.record_event("price_changed", "coalesced");
        MetricsRegistry::set_decimal(&metrics.spot_price, dec!(0.5015045));

        let text = metrics.render();
        assert!(text.contains("ladder_bot_orders_placed_total 1"));
        assert!(text.contains("outcome=\"coalesced\""));
        assert!(text.contains("ladder_bot_spot_price 0.5015045"));
    }
}

//! Prometheus metrics for the render service

use once_cell::sync::Lazy;
use prometheus::{
    register_counter_vec, register_histogram_vec, CounterVec, Encoder, HistogramVec, TextEncoder,
};

// ── Render metrics ───────────────────────────────────────────────────────────

pub static RENDER_TOTAL: Lazy<CounterVec> = Lazy::new(|| {
    register_counter_vec!(
        "sightline_render_total",
        "Total view renders",
        &["view", "status"]
    )
    .unwrap()
});

pub static RENDER_DURATION: Lazy<HistogramVec> = Lazy::new(|| {
    register_histogram_vec!(
        "sightline_render_duration_seconds",
        "View render latency",
        &["view"],
        vec![0.001, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5]
    )
    .unwrap()
});

// ── Profile source metrics ───────────────────────────────────────────────────

pub static PROFILE_LOADS: Lazy<CounterVec> = Lazy::new(|| {
    register_counter_vec!(
        "sightline_profile_loads_total",
        "Profiles loaded",
        &["source", "status"]
    )
    .unwrap()
});

/// Encode all registered metrics in Prometheus text format.
pub fn encode_metrics() -> String {
    let encoder = TextEncoder::new();
    let metric_families = prometheus::gather();
    let mut buffer = Vec::new();
    if encoder.encode(&metric_families, &mut buffer).is_err() {
        return String::new();
    }
    String::from_utf8(buffer).unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_encode_includes_render_metrics() {
        RENDER_TOTAL.with_label_values(&["top", "ok"]).inc();
        RENDER_DURATION.with_label_values(&["top"]).observe(0.002);
        let text = encode_metrics();
        assert!(text.contains("sightline_render_total"));
        assert!(text.contains("sightline_render_duration_seconds"));
    }
}

use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use prometheus::{IntCounterVec, Opts, Registry};
use std::sync::OnceLock;

pub static METRICS_HANDLE: OnceLock<PrometheusHandle> = OnceLock::new();
pub static PROMETHEUS_REGISTRY: OnceLock<Registry> = OnceLock::new();
pub static INVOICES_INGESTED_TOTAL: OnceLock<IntCounterVec> = OnceLock::new();
pub static EXTRACTION_FAILURES_TOTAL: OnceLock<IntCounterVec> = OnceLock::new();
pub static OFFERS_ACCEPTED_TOTAL: OnceLock<IntCounterVec> = OnceLock::new();
pub static ADVANCED_AMOUNT_TOTAL: OnceLock<IntCounterVec> = OnceLock::new();
pub static SETTLEMENTS_TOTAL: OnceLock<IntCounterVec> = OnceLock::new();

fn counter(name: &str, help: &str, labels: &[&str]) -> anyhow::Result<IntCounterVec> {
    Ok(IntCounterVec::new(Opts::new(name, help), labels)?)
}

/// Install the HTTP metrics recorder and register business counters.
/// Call once, at startup.
pub fn init_metrics() -> anyhow::Result<()> {
    let handle = PrometheusBuilder::new()
        .install_recorder()
        .map_err(|e| anyhow::anyhow!("failed to install Prometheus recorder: {}", e))?;
    METRICS_HANDLE
        .set(handle)
        .map_err(|_| anyhow::anyhow!("metrics already initialized"))?;

    let registry = Registry::new();

    let ingested = counter(
        "financing_invoices_ingested_total",
        "Invoices ingested by source and risk band",
        &["source", "risk_band"],
    )?;
    let extraction_failures = counter(
        "financing_extraction_failures_total",
        "Extraction attempts that fell back to manual entry, by reason",
        &["reason"],
    )?;
    let accepted = counter(
        "financing_offers_accepted_total",
        "Offers accepted by risk band",
        &["risk_band"],
    )?;
    let advanced_amount = counter(
        "financing_advanced_amount_total",
        "Advanced amount by risk band (minor units)",
        &["risk_band"],
    )?;
    let settlements = counter(
        "financing_settlements_total",
        "Settlements created by risk band",
        &["risk_band"],
    )?;

    for c in [
        &ingested,
        &extraction_failures,
        &accepted,
        &advanced_amount,
        &settlements,
    ] {
        registry.register(Box::new(c.clone()))?;
    }

    let _ = PROMETHEUS_REGISTRY.set(registry);
    let _ = INVOICES_INGESTED_TOTAL.set(ingested);
    let _ = EXTRACTION_FAILURES_TOTAL.set(extraction_failures);
    let _ = OFFERS_ACCEPTED_TOTAL.set(accepted);
    let _ = ADVANCED_AMOUNT_TOTAL.set(advanced_amount);
    let _ = SETTLEMENTS_TOTAL.set(settlements);

    Ok(())
}

pub fn get_metrics() -> String {
    let mut output = METRICS_HANDLE
        .get()
        .map(|handle| handle.render())
        .unwrap_or_else(|| "# Metrics recorder not initialized\n".to_string());

    if let Some(registry) = PROMETHEUS_REGISTRY.get() {
        use prometheus::Encoder;
        let encoder = prometheus::TextEncoder::new();
        let mut buffer = Vec::new();
        encoder.encode(&registry.gather(), &mut buffer).ok();
        if let Ok(custom_metrics) = String::from_utf8(buffer) {
            output.push_str(&custom_metrics);
        }
    }

    output
}

pub fn record_ingested(source: &str, risk_band: &str) {
    if let Some(counter) = INVOICES_INGESTED_TOTAL.get() {
        counter.with_label_values(&[source, risk_band]).inc();
    }
}

pub fn record_extraction_failure(reason: &str) {
    if let Some(counter) = EXTRACTION_FAILURES_TOTAL.get() {
        counter.with_label_values(&[reason]).inc();
    }
}

pub fn record_offer_accepted(risk_band: &str, advance_amount: i64) {
    if let Some(counter) = OFFERS_ACCEPTED_TOTAL.get() {
        counter.with_label_values(&[risk_band]).inc();
    }
    if let Some(counter) = ADVANCED_AMOUNT_TOTAL.get() {
        counter
            .with_label_values(&[risk_band])
            .inc_by(advance_amount.max(0) as u64);
    }
}

pub fn record_settlement(risk_band: &str) {
    if let Some(counter) = SETTLEMENTS_TOTAL.get() {
        counter.with_label_values(&[risk_band]).inc();
    }
}

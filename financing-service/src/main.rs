use financing_service::{config::FinancingConfig, services::init_metrics, Application};
use service_core::observability::init_tracing;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = FinancingConfig::load()?;

    init_tracing(
        &config.service_name,
        &config.common.log_level,
        config.common.log_format,
        config.common.otlp_endpoint.as_deref(),
    )?;
    init_metrics()?;

    tracing::info!(
        store = ?config.store.backend,
        extractor = ?config.extraction.backend,
        "Starting financing-service"
    );

    let application = Application::build(config).await?;
    application.run_until_stopped().await?;

    Ok(())
}

use d2render::config::ServiceConfig;
use d2render::{routes, state};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt::init();

    if let Err(e) = dotenvy::dotenv() {
        tracing::debug!(error = %e, "no .env loaded");
    }

    let config = ServiceConfig::from_env()?;
    let state = state::AppState::from_config(&config);
    tracing::info!(
        d2_bin = %config.d2_bin,
        raster = state.pipeline.raster_backend().unwrap_or("none"),
        "pipeline configured"
    );

    let app = routes::app(state);
    let listener = tokio::net::TcpListener::bind(format!("0.0.0.0:{}", config.port)).await?;

    tracing::info!(port = config.port, "d2render listening");
    axum::serve(listener, app).await?;
    Ok(())
}

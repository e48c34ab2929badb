use airsense::api::{self, ApiContext};
use airsense::sink::influx::InfluxSink;
use airsense::sink::{NoopSink, ResultSink};
use airsense::{config, model, state};
use std::net::SocketAddr;
use std::sync::{Arc, RwLock};

fn init_tracing(level: &str) {
    let level = level.parse().unwrap_or(tracing::Level::INFO);
    let subscriber = tracing_subscriber::fmt()
        .with_max_level(level)
        .with_target(false)
        .finish();
    let _ = tracing::subscriber::set_global_default(subscriber);
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let config = config::load_default()?;
    init_tracing(&config.logging.level);
    tracing::info!(
        app = %config.app.name,
        config_path = config::DEFAULT_CONFIG_PATH,
        "airsense starting"
    );

    // A complete model bundle is a hard precondition for serving.
    let models_dir = config.models_dir();
    let bundle = match model::load_bundle_from_dir(&models_dir) {
        Ok(bundle) => {
            tracing::info!(
                dir = %models_dir.display(),
                features = bundle.feature_order.len(),
                trees = bundle.outlier.trees.len(),
                "Model bundle loaded"
            );
            Arc::new(bundle)
        }
        Err(e) => {
            tracing::error!(
                error = %e,
                dir = %models_dir.display(),
                "Failed to load model bundle, refusing to serve"
            );
            return Err(e.into());
        }
    };

    let sink = build_sink(&config);
    let state = Arc::new(RwLock::new(state::AppState::new()));

    let app = api::router(ApiContext {
        state,
        bundle,
        sink,
    });
    let port = config.server_port();
    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!(%addr, "API server listening");
    axum::serve(listener, app).await?;

    Ok(())
}

fn build_sink(config: &config::Config) -> Arc<dyn ResultSink> {
    match config.influx() {
        Some(section) => {
            tracing::info!(
                url = %section.url,
                bucket = %section.bucket,
                "InfluxDB sink enabled"
            );
            Arc::new(InfluxSink::new(
                section.url.clone(),
                section.org.clone(),
                section.bucket.clone(),
                section.token.clone(),
                config.sink_timeout(),
            ))
        }
        None => {
            tracing::warn!("No [influx] section configured, inference results will not be persisted");
            Arc::new(NoopSink)
        }
    }
}

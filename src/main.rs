use tradevault::{api, config::AppConfig};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

fn init_tracing() {
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(fmt::layer().json().flatten_event(true))
        .init();
}

#[tokio::main]
async fn main() {
    init_tracing();

    let config = match AppConfig::from_env() {
        Ok(config) => config,
        Err(e) => {
            tracing::error!(action = "config_invalid", error = %e);
            std::process::exit(1);
        }
    };

    if let Err(e) = api::start_http_server(config).await {
        tracing::error!(action = "server_exited", error = %e);
        std::process::exit(1);
    }
}

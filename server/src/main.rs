use axum::{routing::get, Router};
use httpkit_server::{Server, ServerConfig};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    init_logging();

    let port = match std::env::var("PORT") {
        Ok(port) => port.parse()?,
        Err(_) => 3000,
    };
    let addr = std::env::var("ADDR").unwrap_or_default();
    let config = ServerConfig {
        port,
        addr,
        ..ServerConfig::default()
    };

    let app = Router::new().route("/", get(|| async { "Hello World!" }));
    let mut server = Server::new(config, app);
    server.start_and_wait().await?;
    Ok(())
}

fn init_logging() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(filter)
        .try_init()
        .ok();
}

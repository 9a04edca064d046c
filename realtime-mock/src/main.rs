use realtime_mock::{AppState, MockConfig, MockServer};
use std::sync::Arc;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env file
    dotenv::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "realtime_mock=info,tower_http=info".into()),
        )
        .init();

    let config = MockConfig::from_env();

    let state = Arc::new(AppState::new());
    for (token, user_id) in &config.tokens {
        state.add_token(token.clone(), user_id.clone());
    }
    tracing::info!(tokens = config.tokens.len(), "Starting realtime mock");

    let server = MockServer::start(&config.bind_addr, state).await?;
    tracing::info!("Profile: {}/profile  Socket: {}", server.api_url(), server.socket_url());

    tokio::signal::ctrl_c().await?;
    tracing::info!("Shutting down");
    drop(server);
    Ok(())
}

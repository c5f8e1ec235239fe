use chat_service::config::Config;
use chat_service::redis_client::RedisClient;
use chat_service::state::AppState;
use chat_service::{db, logging, AppError};
use redis_utils::RedisPool;
use std::net::SocketAddr;

#[tokio::main]
async fn main() -> Result<(), AppError> {
    logging::init_tracing();

    let config = Config::from_env()?;

    let pool = db::init_pool(&config.database_url).await?;
    db::MIGRATOR
        .run(&pool)
        .await
        .map_err(|e| AppError::StartServer(format!("migrations failed: {e}")))?;

    let redis_pool = RedisPool::connect(&config.redis_url)
        .await
        .map_err(|e| AppError::StartServer(format!("redis unavailable: {e}")))?;
    let redis = RedisClient::new(redis_pool.manager());

    let state = AppState::build(&config, pool, redis).await;
    let app = chat_service::app(state);

    let addr = SocketAddr::from(([0, 0, 0, 0], config.port));
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .map_err(|e| AppError::StartServer(format!("bind {addr}: {e}")))?;
    tracing::info!(%addr, "chat service listening");

    axum::serve(listener, app)
        .await
        .map_err(|e| AppError::StartServer(e.to_string()))?;
    Ok(())
}

use std::sync::Arc;

use domain::{
    persistence::{FilePort, PersistencePort},
    prescriptions::cqrs,
    Config,
};
use tokio::sync::broadcast::error::RecvError;

mod routes;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_max_level(tracing::Level::INFO)
        .with_target(false)
        .without_time()
        .init();

    let config = Config::from_env();
    let port: Arc<dyn PersistencePort> = Arc::new(FilePort::new(&config.data_dir));
    let (workflow, broadcast) = cqrs::init(port, &config).await?;

    let mut events = broadcast.subscribe();
    tokio::spawn(async move {
        loop {
            match events.recv().await {
                Ok(event) => {
                    tracing::info!("Received event: {} for {}", event.event_type, event.id)
                }
                Err(RecvError::Lagged(skipped)) => {
                    tracing::warn!("Event log lagged, {} events skipped", skipped)
                }
                Err(RecvError::Closed) => break,
            }
        }
    });

    let app = routes::router(routes::AppState { workflow }, config.max_body_bytes);

    let listener = tokio::net::TcpListener::bind(&config.bind_addr).await?;
    tracing::info!("Listening on {}", config.bind_addr);
    axum::serve(listener, app).await?;

    Ok(())
}

use log::*;
use service::AppState;
use tokio::net::TcpListener;

mod controller;
pub mod error;
mod params;
pub mod router;
mod ws;

pub async fn init_server(app_state: AppState) -> std::io::Result<()> {
    let interface = app_state
        .config
        .interface
        .clone()
        .unwrap_or_else(|| "127.0.0.1".to_string());
    let listen_addr = format!("{interface}:{}", app_state.config.port);

    info!("Server starting... listening for connections on http://{listen_addr}");

    let listener = TcpListener::bind(&listen_addr).await?;
    let registry = app_state.registry().clone();
    let router = router::define_routes(app_state);

    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!(
        "Server stopped with {} live connection(s) remaining",
        registry.connection_count()
    );
    Ok(())
}

async fn shutdown_signal() {
    match tokio::signal::ctrl_c().await {
        Ok(()) => info!("Received Ctrl-C, shutting down"),
        Err(e) => error!("Unable to listen for the shutdown signal: {e}"),
    }
}

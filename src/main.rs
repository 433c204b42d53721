use log::{error, info};
use service::{config::Config, logging::Logger, AppState};

#[tokio::main]
async fn main() {
    let config = Config::new();
    Logger::init_logger(&config as &Config);

    info!(
        "Starting live notification server [{:?}]",
        config.runtime_env()
    );

    let lifecycle = match domain::build_lifecycle(&config) {
        Ok(lifecycle) => lifecycle,
        Err(e) => {
            error!("Failed to configure the notification core: {e}");
            std::process::exit(1);
        }
    };

    let app_state = AppState::new(config, lifecycle);

    if let Err(e) = web::init_server(app_state).await {
        error!("Server exited with an error: {e}");
        std::process::exit(1);
    }
}

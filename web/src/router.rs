use crate::{controller::health_check_controller, ws};
use axum::{
    http::{HeaderValue, Method},
    routing::get,
    Router,
};
use log::*;
use service::AppState;
use tower_http::cors::CorsLayer;

pub fn define_routes(app_state: AppState) -> Router {
    let cors = cors_layer(&app_state.config.allowed_origins);

    Router::new()
        .merge(health_routes(app_state.clone()))
        .merge(ws_routes(app_state))
        .layer(cors)
}

fn health_routes(app_state: AppState) -> Router {
    Router::new()
        .route("/health", get(health_check_controller::health_check))
        .with_state(app_state)
}

fn ws_routes(app_state: AppState) -> Router {
    Router::new()
        .route("/ws", get(ws::handler::ws_handler))
        .route("/ws/", get(ws::handler::ws_handler))
        .with_state(app_state)
}

fn cors_layer(allowed_origins: &[String]) -> CorsLayer {
    let origins: Vec<HeaderValue> = allowed_origins
        .iter()
        .filter_map(|origin| match origin.parse::<HeaderValue>() {
            Ok(value) => Some(value),
            Err(e) => {
                warn!("Ignoring invalid allowed origin {origin:?}: {e}");
                None
            }
        })
        .collect();

    CorsLayer::new()
        .allow_origin(origins)
        .allow_methods([Method::GET])
        .allow_credentials(true)
}

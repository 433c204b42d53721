use axum::extract::State;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use service::AppState;

/// GET liveness probe. Reports the number of live connections in the body.
pub async fn health_check(State(app_state): State<AppState>) -> impl IntoResponse {
    (
        StatusCode::OK,
        format!(
            "healthy ({} live connection(s))",
            app_state.registry().connection_count()
        ),
    )
}

use axum::{Router, debug_handler, response::IntoResponse, routing::get};
use homeroom::{AppState, hub};
use tower_http::cors::CorsLayer;
use tracing::info;

fn init_logging() {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).with_target(true).init();
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_logging();

    let app_state = AppState { hub: hub::HubHandle::spawn() };

    // The browser UI lives on the CRUD side of the platform.
    let app = Router::new()
        .route("/", get(hello))
        .nest("/chat", hub::router())
        .with_state(app_state)
        .layer(CorsLayer::permissive());

    let bind = dotenv::var("BIND_ADDR").unwrap_or_else(|_| "0.0.0.0:8080".to_owned());
    let listener = tokio::net::TcpListener::bind(&bind).await?;
    info!(%bind, "homeroom listening");
    axum::serve(listener, app).await?;
    Ok(())
}

#[debug_handler]
async fn hello() -> impl IntoResponse {
    "homeroom chat hub"
}

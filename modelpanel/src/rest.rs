use crate::{admin, materializer, openapi, AppError, AppState, ModelRegistry};
use axum::extract::{FromRequest, State};
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::Router;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::sync::watch;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::info;
use utoipa::OpenApi;
use utoipa_swagger_ui::{Config, SwaggerUi};

pub const OPENAPI_PATH: &str = "/apidoc/openapi.json";

// Create our own JSON extractor by wrapping `axum::Json`. This makes it easy to override the
// rejection and provide our own which formats errors to match our application.
#[derive(FromRequest)]
#[from_request(via(axum::Json), rejection(AppError))]
pub struct AppJson<T>(pub T);

impl<T> IntoResponse for AppJson<T>
where
    axum::Json<T>: IntoResponse,
{
    fn into_response(self) -> Response {
        axum::Json(self.0).into_response()
    }
}

#[derive(OpenApi)]
#[openapi(
    info(title = "modelpanel", description = "Admin panel with runtime-defined models", license(name = "MIT")),
    components(schemas(crate::ErrorResponse))
)]
pub struct ApiDoc;

/// Admin routes, the OpenAPI document and Swagger UI; everything else falls
/// through to the materialized model routes.
pub fn build_router(state: AppState, cors: Option<CorsLayer>) -> Router<()> {
    let (admin, base_doc) = admin::routes().split_for_parts();
    let base_doc = Arc::new(base_doc);
    let router = admin
        .route(
            OPENAPI_PATH,
            get(move |State(registry): State<Arc<ModelRegistry>>| {
                let base_doc = Arc::clone(&base_doc);
                async move { axum::Json(openapi::document(&base_doc, &registry.all())) }
            }),
        )
        .fallback(materializer::dispatch)
        .with_state(state)
        .merge(SwaggerUi::new("/swagger-ui").config(Config::from(OPENAPI_PATH)))
        .layer(TraceLayer::new_for_http());
    if let Some(cors_layer) = cors {
        router.layer(cors_layer)
    } else {
        router
    }
}

pub async fn serve(
    state: AppState,
    socket_addr: SocketAddr,
    cors: Option<CorsLayer>,
    shutdown: watch::Receiver<bool>,
) -> Result<(), AppError> {
    let router: Router<()> = build_router(state, cors);
    let tcp = TcpListener::bind(socket_addr).await?;
    info!("Listening on http://{}", socket_addr);

    let mut shutdown = shutdown.clone();
    axum::serve(tcp, router)
        .with_graceful_shutdown(async move {
            if shutdown.changed().await.is_ok() {
                info!("Shutting down server...");
            }
        })
        .await?;
    Ok(())
}

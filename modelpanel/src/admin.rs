use crate::error::{ErrorResponse, PageError};
use crate::model::ModelDefinition;
use crate::publisher::ModelSubmission;
use crate::rest::{AppJson, ApiDoc};
use crate::users::CurrentUser;
use crate::{views, AppError, AppState};
use axum::body::Bytes;
use axum::extract::State;
use axum::response::{Html, IntoResponse, Redirect, Response};
use http::header::CONTENT_TYPE;
use http::{HeaderMap, StatusCode};
use serde::Serialize;
use utoipa::{OpenApi, ToSchema};
use utoipa_axum::router::OpenApiRouter;
use utoipa_axum::routes;

#[derive(Debug, Serialize, ToSchema)]
pub struct PublishResponse {
    pub registered: bool,
    pub model: ModelDefinition,
}

pub fn routes() -> OpenApiRouter<AppState> {
    OpenApiRouter::with_openapi(ApiDoc::openapi())
        .routes(routes!(index))
        .routes(routes!(list_models))
        .routes(routes!(publish))
}

fn is_json(headers: &HeaderMap) -> bool {
    headers
        .get(CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|ct| ct.trim_start().starts_with("application/json"))
}

#[utoipa::path(
    get,
    path = "/",
    responses((status = OK, description = "Registered models and the publish form", content_type = "text/html", body = String)),
    tag = "admin"
)]
#[axum::debug_handler]
pub async fn index(State(state): State<AppState>, user: CurrentUser) -> Html<String> {
    Html(views::model_index(&state.registry.all(), &user.0))
}

#[utoipa::path(get, path = "/admin/models", responses((status = OK, body = Vec<ModelDefinition>)), tag = "admin")]
#[axum::debug_handler]
pub async fn list_models(State(state): State<AppState>) -> AppJson<Vec<ModelDefinition>> {
    AppJson(state.registry.all().iter().map(|m| ModelDefinition::clone(m)).collect())
}

/// JSON bodies get a JSON answer; anything else is treated as the admin form.
#[utoipa::path(
    post,
    path = "/admin/publish",
    request_body(content = ModelSubmission, content_type = "application/json"),
    responses(
        (status = CREATED, description = "Model registered and routes mounted", body = PublishResponse),
        (status = OK, description = "Name already registered, nothing changed", body = PublishResponse),
        (status = SEE_OTHER, description = "Form submissions redirect to the index"),
        (status = BAD_REQUEST, body = ErrorResponse),
        (status = CONFLICT, body = ErrorResponse)
    ),
    tag = "admin"
)]
#[axum::debug_handler]
pub async fn publish(State(state): State<AppState>, user: CurrentUser, headers: HeaderMap, body: Bytes) -> Result<Response, AppError> {
    if is_json(&headers) {
        let outcome = state.publisher.publish(ModelSubmission::from_json(&body)?).await?;
        let status = if outcome.is_new() { StatusCode::CREATED } else { StatusCode::OK };
        let response = PublishResponse { registered: outcome.is_new(), model: ModelDefinition::clone(outcome.model()) };
        return Ok((status, AppJson(response)).into_response());
    }
    let published = match ModelSubmission::from_form(&body) {
        Ok(submission) => state.publisher.publish(submission).await,
        Err(e) => Err(e),
    };
    match published {
        Ok(_) => Ok(Redirect::to(&format!("/?user={}", urlencoding::encode(user.username()))).into_response()),
        Err(e) => Ok(PageError(e).into_response()),
    }
}

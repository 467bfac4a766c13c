use super::ModelContext;
use crate::model::Operation;
use crate::record::{Input, Record};
use crate::rest::AppJson;
use crate::users::CurrentUser;
use crate::AppError;
use axum::extract::{Path, State};
use http::StatusCode;

pub async fn index(State(ctx): State<ModelContext>, user: CurrentUser) -> Result<AppJson<Vec<Record>>, AppError> {
    Ok(AppJson(ctx.list(&user.requester()).await?))
}

pub async fn show(State(ctx): State<ModelContext>, user: CurrentUser, Path(id): Path<String>) -> Result<AppJson<Record>, AppError> {
    Ok(AppJson(ctx.find(Operation::Read, &user.requester(), &id).await?))
}

pub async fn create(
    State(ctx): State<ModelContext>,
    user: CurrentUser,
    AppJson(input): AppJson<Input>,
) -> Result<(StatusCode, AppJson<Record>), AppError> {
    let record = ctx.create(&user.requester(), &input).await?;
    Ok((StatusCode::CREATED, AppJson(record)))
}

pub async fn update(
    State(ctx): State<ModelContext>,
    user: CurrentUser,
    Path(id): Path<String>,
    AppJson(input): AppJson<Input>,
) -> Result<AppJson<Record>, AppError> {
    Ok(AppJson(ctx.update(&user.requester(), &id, &input).await?))
}

pub async fn delete(State(ctx): State<ModelContext>, user: CurrentUser, Path(id): Path<String>) -> Result<StatusCode, AppError> {
    ctx.delete(&user.requester(), &id).await?;
    Ok(StatusCode::NO_CONTENT)
}

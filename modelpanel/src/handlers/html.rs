use super::ModelContext;
use crate::error::PageError;
use crate::model::Operation;
use crate::record::{input_from_pairs, Input};
use crate::users::CurrentUser;
use crate::views;
use crate::AppError;
use axum::body::Bytes;
use axum::extract::{Path, State};
use axum::response::{Html, Redirect};

fn form_input(body: &[u8]) -> Result<Input, AppError> {
    let pairs: Vec<(String, String)> = serde_urlencoded::from_bytes(body)?;
    Ok(input_from_pairs(pairs))
}

/// Mutations land back on the listing, keeping the acting user.
fn back_to_listing(ctx: &ModelContext, user: &CurrentUser) -> Redirect {
    Redirect::to(&views::listing_path(&ctx.model, &user.0))
}

pub async fn list(State(ctx): State<ModelContext>, user: CurrentUser) -> Result<Html<String>, PageError> {
    let records = ctx.list(&user.requester()).await?;
    Ok(Html(views::record_list(&ctx.model, &records, &user.0)))
}

pub async fn new_form(State(ctx): State<ModelContext>, user: CurrentUser) -> Result<Html<String>, PageError> {
    ctx.permit(Operation::Create, &user.requester()).await?;
    Ok(Html(views::record_form(&ctx.model, None, &user.0)))
}

pub async fn create(State(ctx): State<ModelContext>, user: CurrentUser, body: Bytes) -> Result<Redirect, PageError> {
    let input = form_input(&body)?;
    ctx.create(&user.requester(), &input).await?;
    Ok(back_to_listing(&ctx, &user))
}

pub async fn show(State(ctx): State<ModelContext>, user: CurrentUser, Path(id): Path<String>) -> Result<Html<String>, PageError> {
    let record = ctx.find(Operation::Read, &user.requester(), &id).await?;
    Ok(Html(views::record_show(&ctx.model, &record, &user.0)))
}

pub async fn edit_form(State(ctx): State<ModelContext>, user: CurrentUser, Path(id): Path<String>) -> Result<Html<String>, PageError> {
    let record = ctx.find(Operation::Update, &user.requester(), &id).await?;
    Ok(Html(views::record_form(&ctx.model, Some(&record), &user.0)))
}

pub async fn update(
    State(ctx): State<ModelContext>,
    user: CurrentUser,
    Path(id): Path<String>,
    body: Bytes,
) -> Result<Redirect, PageError> {
    let input = form_input(&body)?;
    ctx.update(&user.requester(), &id, &input).await?;
    Ok(back_to_listing(&ctx, &user))
}

pub async fn delete(State(ctx): State<ModelContext>, user: CurrentUser, Path(id): Path<String>) -> Result<Redirect, PageError> {
    ctx.delete(&user.requester(), &id).await?;
    Ok(back_to_listing(&ctx, &user))
}

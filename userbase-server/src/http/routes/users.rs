//! User endpoints
//!
//! Reads go to the replica-backed store; creates and updates read their
//! result back through the primary-backed store.

use std::sync::Arc;

use axum::{
    extract::State,
    routing::get,
    Json, Router,
};
use serde_json::{json, Value};
use userbase_core::Row;

use crate::context::AppContext;
use crate::http::error::ApiError;
use crate::http::extractors::{ValidQuery, ValidUuid};
use crate::http::Envelope;
use crate::models::{
    CreateUserRequest, EmailAddress, PageRequest, PaginationParams, UpdateUserRequest, Username,
};

fn not_found(id: impl Into<String>) -> ApiError {
    ApiError::NotFound {
        resource: "user",
        id: id.into(),
    }
}

/// GET /users?offset=&limit= - list active users
async fn list_users(
    State(ctx): State<Arc<AppContext>>,
    ValidQuery(params): ValidQuery<PaginationParams>,
) -> Result<Json<Envelope<Vec<Row>>>, ApiError> {
    let page = PageRequest::from(params);
    let rows = ctx
        .reader()
        .get_users(page.offset, page.limit.into())
        .await?;
    Ok(Json(Envelope::ok(rows)))
}

/// GET /users/{id} - get a single active user
async fn get_user(
    State(ctx): State<Arc<AppContext>>,
    ValidUuid(id): ValidUuid,
) -> Result<Json<Envelope<Row>>, ApiError> {
    let id = id.to_string();
    match ctx.reader().get_user(&id).await? {
        Some(row) => Ok(Json(Envelope::ok(row))),
        None => Err(not_found(id)),
    }
}

/// POST /users - sign up a new user
async fn create_user(
    State(ctx): State<Arc<AppContext>>,
    Json(req): Json<CreateUserRequest>,
) -> Result<Json<Envelope<Option<Row>>>, ApiError> {
    let username = Username::new(&req.username)?;
    let email_address = EmailAddress::new(&req.email_address)?;

    let store = ctx.writer();
    let id = store.new_user(&username, &email_address, req.active).await?;
    tracing::info!(user_id = %id, "user signed up");

    // An inactive signup is not visible to get_user; respond with null then
    let row = store.get_user(&id).await?;
    Ok(Json(Envelope::ok(row)))
}

/// PUT /users/{id} - replace a user's email address
async fn update_user(
    State(ctx): State<Arc<AppContext>>,
    ValidUuid(id): ValidUuid,
    Json(req): Json<UpdateUserRequest>,
) -> Result<Json<Envelope<Row>>, ApiError> {
    let email_address = EmailAddress::new(&req.email_address)?;
    let id = id.to_string();

    let store = ctx.writer();
    if !store.update_user(&id, &email_address).await? {
        return Err(not_found(id));
    }

    match store.get_user(&id).await? {
        Some(row) => Ok(Json(Envelope::ok(row))),
        None => Err(not_found(id)),
    }
}

/// DELETE /users/{id} - soft-delete a user
async fn delete_user(
    State(ctx): State<Arc<AppContext>>,
    ValidUuid(id): ValidUuid,
) -> Result<Json<Envelope<Value>>, ApiError> {
    ctx.writer().delete_user(&id.to_string()).await?;
    Ok(Json(Envelope::ok(json!({}))))
}

/// User routes
pub fn router() -> Router<Arc<AppContext>> {
    Router::new()
        .route("/users", get(list_users).post(create_user))
        .route(
            "/users/{id}",
            get(get_user).put(update_user).delete(delete_user),
        )
}

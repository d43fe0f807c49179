use crate::error::{AppError, AppResult};
use crate::models::UserId;
use crate::services::pagination::{InboxQuery, PageQuery, PageRequest};
use crate::state::AppState;
use actix_middleware::AuthenticatedUser;
use actix_web::{web, HttpResponse};
use validator::Validate;

/// GET /api/v1/chats/inbox
pub async fn inbox(
    state: web::Data<AppState>,
    user: AuthenticatedUser,
    query: web::Query<InboxQuery>,
) -> AppResult<HttpResponse> {
    let query = query.into_inner();
    query.validate()?;
    let page = PageRequest::parse(
        query.cursor.as_deref(),
        query.limit.as_deref(),
        state.pagination.config(),
    )?;

    let result = state
        .pagination
        .inbox(UserId(user.id), query.search.as_deref(), page)
        .await?;
    Ok(HttpResponse::Ok().json(result))
}

/// GET /api/v1/chats/history/{other_user_id}
pub async fn history(
    state: web::Data<AppState>,
    user: AuthenticatedUser,
    path: web::Path<String>,
    query: web::Query<PageQuery>,
) -> AppResult<HttpResponse> {
    let other: UserId = path.into_inner().parse().map_err(|_| {
        AppError::Validation(crate::error::FieldErrors::single(
            "other_user_id",
            "must be a decimal id string",
        ))
    })?;
    let page = PageRequest::parse(
        query.cursor.as_deref(),
        query.limit.as_deref(),
        state.pagination.config(),
    )?;

    let result = state
        .pagination
        .history(UserId(user.id), other, page)
        .await?;
    Ok(HttpResponse::Ok().json(result))
}

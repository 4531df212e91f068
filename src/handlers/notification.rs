//! In-app notification inbox

use axum::{
    extract::{Path, Query, State},
    Json,
};
use std::sync::Arc;
use uuid::Uuid;

use crate::error::ApiError;
use crate::middleware::AuthenticatedUser;
use crate::models::ApiResponse;
use crate::notification::{InboxQuery, Notification};
use crate::store::NotificationQueue;

pub async fn list_notifications(
    State(inbox): State<Arc<dyn NotificationQueue>>,
    user: AuthenticatedUser,
    Query(query): Query<InboxQuery>,
) -> Result<Json<ApiResponse<Vec<Notification>>>, ApiError> {
    let notifications = inbox.inbox(user.user_id, &query).await?;

    Ok(Json(ApiResponse {
        success: true,
        data: Some(notifications),
        error: None,
    }))
}

pub async fn mark_notification_read(
    State(inbox): State<Arc<dyn NotificationQueue>>,
    user: AuthenticatedUser,
    Path(id): Path<Uuid>,
) -> Result<Json<ApiResponse<Uuid>>, ApiError> {
    if !inbox.mark_read(id, user.user_id).await? {
        return Err(ApiError::NotFound(format!("notification {}", id)));
    }

    Ok(Json(ApiResponse {
        success: true,
        data: Some(id),
        error: None,
    }))
}

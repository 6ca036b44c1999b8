use axum::extract::{Json, Query, State};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use crate::audit;
use crate::auth::AdminUser;
use crate::error::{AppError, AppResult};
use crate::routes::applications::to_iso;
use crate::state::AppState;

#[derive(Deserialize)]
pub struct AdminActionListQuery {
    pub application_id: Option<Uuid>,
    pub action_type: Option<String>,
}

#[derive(Serialize)]
pub struct AdminActionResponse {
    pub id: Uuid,
    pub admin_id: Uuid,
    pub application_id: Option<Uuid>,
    pub action_type: String,
    pub notes: Option<String>,
    pub payload: Value,
    pub created_at: String,
}

pub async fn list_admin_actions(
    State(state): State<AppState>,
    _admin: AdminUser,
    Query(query): Query<AdminActionListQuery>,
) -> AppResult<Json<Vec<AdminActionResponse>>> {
    let mut conn = state.db()?;

    let actions = audit::list_actions(
        &mut conn,
        query.application_id,
        query.action_type.as_deref(),
    )
    .map_err(|err| AppError::internal(format!("failed to load admin actions: {err}")))?;

    Ok(Json(
        actions
            .into_iter()
            .map(|action| AdminActionResponse {
                id: action.id,
                admin_id: action.admin_id,
                application_id: action.application_id,
                action_type: action.action_type,
                notes: action.notes,
                payload: action.payload,
                created_at: to_iso(action.created_at),
            })
            .collect(),
    ))
}

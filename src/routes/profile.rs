use axum::extract::{Json, State};
use chrono::Utc;
use diesel::prelude::*;
use serde::Serialize;
use serde_json::Value;
use uuid::Uuid;

use crate::auth::AuthenticatedUser;
use crate::error::{AppError, AppResult};
use crate::models::{Application, Document, User};
use crate::routes::applications::{to_application_response, ApplicationResponse};
use crate::schema::{applications, documents, users};
use crate::state::AppState;
use crate::utils::json::{classify_nullable, NullableValue};

#[derive(Serialize)]
pub struct ProfileResponse {
    pub id: Uuid,
    pub email: String,
    pub name: String,
    pub role: String,
    pub phone: Option<String>,
    pub avatar_url: Option<String>,
    pub applications: Vec<ApplicationResponse>,
    pub documents: Vec<ProfileDocumentSummary>,
}

#[derive(Serialize)]
pub struct ProfileDocumentSummary {
    pub id: Uuid,
    pub doc_type: String,
    pub storage_path: String,
    pub uploaded_at: String,
}

#[derive(AsChangeset, Default)]
#[diesel(table_name = users)]
struct UpdateProfileChangeset<'a> {
    name: Option<&'a str>,
    phone: Option<Option<&'a str>>,
    avatar_url: Option<Option<&'a str>>,
}

pub async fn get_profile(
    State(state): State<AppState>,
    user: AuthenticatedUser,
) -> AppResult<Json<ProfileResponse>> {
    let mut conn = state.db()?;

    let profile: User = users::table.find(user.user_id).first(&mut conn)?;

    let my_applications: Vec<Application> = applications::table
        .filter(applications::user_id.eq(user.user_id))
        .order(applications::applied_at.desc())
        .load(&mut conn)?;

    let my_documents: Vec<Document> = documents::table
        .filter(documents::user_id.eq(user.user_id))
        .order(documents::uploaded_at.desc())
        .load(&mut conn)?;

    Ok(Json(ProfileResponse {
        id: profile.id,
        email: profile.email,
        name: profile.name,
        role: profile.role,
        phone: profile.phone,
        avatar_url: profile.avatar_url,
        applications: my_applications
            .into_iter()
            .map(to_application_response)
            .collect(),
        documents: my_documents
            .into_iter()
            .map(|doc| ProfileDocumentSummary {
                id: doc.id,
                doc_type: doc.doc_type,
                storage_path: doc.storage_path,
                uploaded_at: crate::routes::applications::to_iso(doc.uploaded_at),
            })
            .collect(),
    }))
}

/// Updates the caller's own profile. Only name, phone and avatar_url are
/// reachable here; email is the login identity and role changes are an
/// out-of-band administrative act, neither has a write path in the API.
pub async fn update_profile(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Json(body): Json<Value>,
) -> AppResult<Json<ProfileResponse>> {
    if body.get("role").is_some() || body.get("email").is_some() {
        return Err(AppError::validation("role and email cannot be changed here"));
    }

    let name_class = classify_nullable(body.get("name")).map_err(AppError::validation)?;
    let phone_class = classify_nullable(body.get("phone")).map_err(AppError::validation)?;
    let avatar_class = classify_nullable(body.get("avatar_url")).map_err(AppError::validation)?;

    let mut new_name: Option<String> = None;
    match name_class {
        NullableValue::Omitted => {}
        NullableValue::Null => return Err(AppError::validation("name cannot be null")),
        NullableValue::String(value) => {
            let trimmed = value.trim();
            if trimmed.is_empty() {
                return Err(AppError::validation("name must not be empty"));
            }
            new_name = Some(trimmed.to_string());
        }
    }

    let mut phone_change: Option<Option<String>> = None;
    match phone_class {
        NullableValue::Omitted => {}
        NullableValue::Null => phone_change = Some(None),
        NullableValue::String(value) => phone_change = Some(Some(value.trim().to_string())),
    }

    let mut avatar_change: Option<Option<String>> = None;
    match avatar_class {
        NullableValue::Omitted => {}
        NullableValue::Null => avatar_change = Some(None),
        NullableValue::String(value) => avatar_change = Some(Some(value.trim().to_string())),
    }

    if new_name.is_none() && phone_change.is_none() && avatar_change.is_none() {
        return Err(AppError::validation("no changes provided"));
    }

    let changeset = UpdateProfileChangeset {
        name: new_name.as_deref(),
        phone: phone_change
            .as_ref()
            .map(|opt| opt.as_ref().map(|value| value.as_str())),
        avatar_url: avatar_change
            .as_ref()
            .map(|opt| opt.as_ref().map(|value| value.as_str())),
    };

    let mut conn = state.db()?;
    let now = Utc::now().naive_utc();
    diesel::update(users::table.find(user.user_id))
        .set((&changeset, users::updated_at.eq(now)))
        .execute(&mut conn)?;

    drop(conn);

    get_profile(State(state), user).await
}

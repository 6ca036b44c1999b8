use axum::extract::{Json, Multipart, Path, Query, State};
use axum::http::StatusCode;
use chrono::NaiveDate;
use diesel::prelude::*;
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::{error, info};
use uuid::Uuid;

use crate::audit::{self, ACTION_INTERNSHIP_STATUS_CHANGE, ACTION_OFFER_ISSUED};
use crate::auth::{AdminUser, AuthenticatedUser};
use crate::error::{AppError, AppResult};
use crate::lifecycle::{self, ApplicationStatus, InternshipStatus, LifecycleError};
use crate::models::{Application, Internship, NewDocument, NewInternship, User};
use crate::routes::applications::{
    to_internship_response, ApplicantResponse, InternshipResponse,
};
use crate::schema::{applications, documents, internships, users};
use crate::state::AppState;
use crate::storage::object_key;

pub const DOC_TYPE_OFFER_LETTER: &str = "offer_letter";
pub const DOC_TYPE_TERMS: &str = "terms";
pub const DOC_TYPE_SIGNED_OFFER: &str = "signed_offer";

#[derive(Deserialize)]
pub struct UpdateInternshipStatusRequest {
    pub status: String,
}

#[derive(Deserialize)]
pub struct ActiveListQuery {
    pub kind: Option<String>,
}

#[derive(Serialize)]
pub struct ActiveInternshipRow {
    #[serde(flatten)]
    pub internship: InternshipResponse,
    #[serde(rename = "type")]
    pub kind: String,
    pub applicant: ApplicantResponse,
}

struct UploadedFile {
    filename: String,
    content_type: Option<String>,
    bytes: Vec<u8>,
}

async fn read_file_field(field: axum::extract::multipart::Field<'_>) -> AppResult<UploadedFile> {
    let filename = field
        .file_name()
        .map(|n| n.to_string())
        .ok_or_else(|| AppError::validation("file fields must carry a filename"))?;
    let content_type = field
        .content_type()
        .map(|mime| mime.to_string())
        .or_else(|| mime_guess::from_path(&filename).first().map(|m| m.to_string()));
    let bytes = field.bytes().await.map_err(|err| {
        error!(error = %err, "failed to read file bytes");
        AppError::validation(format!("failed to read file bytes: {err}"))
    })?;
    if bytes.is_empty() {
        return Err(AppError::validation("file fields must not be empty"));
    }
    Ok(UploadedFile {
        filename,
        content_type,
        bytes: bytes.to_vec(),
    })
}

fn parse_date(value: &str, field: &str) -> AppResult<NaiveDate> {
    NaiveDate::parse_from_str(value.trim(), "%Y-%m-%d")
        .map_err(|_| AppError::validation(format!("{field} must be a YYYY-MM-DD date")))
}

/// Issue an offer: multipart with `application_id`, `stipend`,
/// `duration_months`, `start_date`, `end_date`, an `offer` file and an
/// optional `terms` file. The generated documents are uploaded first; the
/// `offered` transition and the internship/document rows then commit as one
/// transaction, so a rejected transition leaves only unreferenced objects.
pub async fn offer_internship(
    State(state): State<AppState>,
    AdminUser(admin): AdminUser,
    mut multipart: Multipart,
) -> AppResult<(StatusCode, Json<InternshipResponse>)> {
    let mut application_id: Option<Uuid> = None;
    let mut stipend: Option<i64> = None;
    let mut duration_months: Option<i32> = None;
    let mut start_date: Option<NaiveDate> = None;
    let mut end_date: Option<NaiveDate> = None;
    let mut offer: Option<UploadedFile> = None;
    let mut terms: Option<UploadedFile> = None;

    while let Some(field) = multipart.next_field().await.map_err(|err| {
        error!(error = %err, "invalid multipart data");
        AppError::validation(format!("invalid multipart data: {err}"))
    })? {
        let name = field.name().map(|n| n.to_string());
        match name.as_deref() {
            Some("application_id") => {
                let value = field.text().await.map_err(|err| {
                    AppError::validation(format!("invalid application_id field: {err}"))
                })?;
                application_id = Some(
                    Uuid::parse_str(value.trim())
                        .map_err(|_| AppError::validation("application_id must be a valid UUID"))?,
                );
            }
            Some("stipend") => {
                let value = field
                    .text()
                    .await
                    .map_err(|err| AppError::validation(format!("invalid stipend field: {err}")))?;
                stipend = Some(
                    value
                        .trim()
                        .parse()
                        .map_err(|_| AppError::validation("stipend must be an integer"))?,
                );
            }
            Some("duration_months") => {
                let value = field.text().await.map_err(|err| {
                    AppError::validation(format!("invalid duration_months field: {err}"))
                })?;
                duration_months = Some(
                    value
                        .trim()
                        .parse()
                        .map_err(|_| AppError::validation("duration_months must be an integer"))?,
                );
            }
            Some("start_date") => {
                let value = field.text().await.map_err(|err| {
                    AppError::validation(format!("invalid start_date field: {err}"))
                })?;
                start_date = Some(parse_date(&value, "start_date")?);
            }
            Some("end_date") => {
                let value = field.text().await.map_err(|err| {
                    AppError::validation(format!("invalid end_date field: {err}"))
                })?;
                end_date = Some(parse_date(&value, "end_date")?);
            }
            Some("offer") => {
                offer = Some(read_file_field(field).await?);
            }
            Some("terms") => {
                terms = Some(read_file_field(field).await?);
            }
            _ => {}
        }
    }

    let application_id =
        application_id.ok_or_else(|| AppError::validation("application_id is required"))?;
    let stipend = stipend.ok_or_else(|| AppError::validation("stipend is required"))?;
    if stipend < 0 {
        return Err(AppError::validation("stipend must not be negative"));
    }
    let duration_months =
        duration_months.ok_or_else(|| AppError::validation("duration_months is required"))?;
    if duration_months <= 0 {
        return Err(AppError::validation("duration_months must be positive"));
    }
    let start_date = start_date.ok_or_else(|| AppError::validation("start_date is required"))?;
    let end_date = end_date.ok_or_else(|| AppError::validation("end_date is required"))?;
    if end_date <= start_date {
        return Err(AppError::validation("end_date must be after start_date"));
    }
    let offer = offer.ok_or_else(|| AppError::validation("offer file is required"))?;

    let mut conn = state.db()?;

    let application: Application = applications::table
        .find(application_id)
        .first(&mut conn)
        .optional()?
        .ok_or_else(AppError::not_found)?;

    let existing: Option<Internship> = internships::table
        .filter(internships::application_id.eq(application_id))
        .first(&mut conn)
        .optional()?;
    if existing.is_some() {
        return Err(AppError::validation(
            "an internship already exists for this application",
        ));
    }
    drop(conn);

    let offer_key = object_key("offers", application.user_id, &offer.filename);
    let offer_size = offer.bytes.len() as i64;
    state
        .storage
        .put_object(&offer_key, offer.bytes, offer.content_type.clone(), None)
        .await
        .map_err(AppError::transient)?;

    let mut terms_row: Option<NewDocument> = None;
    let mut terms_key: Option<String> = None;
    if let Some(terms) = terms {
        let key = object_key("terms", application.user_id, &terms.filename);
        let size = terms.bytes.len() as i64;
        state
            .storage
            .put_object(&key, terms.bytes, terms.content_type.clone(), None)
            .await
            .map_err(AppError::transient)?;
        terms_row = Some(NewDocument {
            id: Uuid::new_v4(),
            user_id: application.user_id,
            application_id: Some(application_id),
            doc_type: DOC_TYPE_TERMS.to_string(),
            storage_path: key.clone(),
            mime_type: terms.content_type,
            size_bytes: size,
        });
        terms_key = Some(key);
    }

    let new_internship = NewInternship {
        id: Uuid::new_v4(),
        application_id,
        stipend,
        duration_months,
        start_date,
        end_date,
        offer_letter_path: offer_key.clone(),
        terms_path: terms_key,
        status: InternshipStatus::Pending.as_str().to_string(),
    };

    let offer_row = NewDocument {
        id: Uuid::new_v4(),
        user_id: application.user_id,
        application_id: Some(application_id),
        doc_type: DOC_TYPE_OFFER_LETTER.to_string(),
        storage_path: offer_key,
        mime_type: offer.content_type,
        size_bytes: offer_size,
    };

    let mut conn = state.db()?;
    let internship: Internship = conn
        .transaction(|conn| {
            lifecycle::transition_application(
                conn,
                application_id,
                ApplicationStatus::Offered,
                Some(admin.user_id),
            )?;

            diesel::insert_into(internships::table)
                .values(&new_internship)
                .execute(conn)
                .map_err(LifecycleError::from)?;

            diesel::insert_into(documents::table)
                .values(&offer_row)
                .execute(conn)
                .map_err(LifecycleError::from)?;
            if let Some(ref terms_row) = terms_row {
                diesel::insert_into(documents::table)
                    .values(terms_row)
                    .execute(conn)
                    .map_err(LifecycleError::from)?;
            }

            internships::table
                .find(new_internship.id)
                .first(conn)
                .map_err(LifecycleError::from)
        })
        .map_err(AppError::from)?;

    info!(
        internship_id = %internship.id,
        application_id = %application_id,
        admin_id = %admin.user_id,
        "internship offered"
    );

    if let Err(err) = audit::record_action(
        &mut conn,
        admin.user_id,
        Some(application_id),
        ACTION_OFFER_ISSUED,
        None,
        json!({ "internship_id": internship.id, "stipend": stipend }),
    ) {
        error!(error = %err, internship_id = %internship.id, "failed to record admin action");
    }

    Ok((StatusCode::CREATED, Json(to_internship_response(internship))))
}

/// The signed offer may come from the applicant or an admin. Storing the
/// file and the pending → joined move commit together; the conditional
/// update means a second upload races to a clean illegal-transition error.
pub async fn upload_signed_offer(
    State(state): State<AppState>,
    Path(internship_id): Path<Uuid>,
    user: AuthenticatedUser,
    mut multipart: Multipart,
) -> AppResult<Json<InternshipResponse>> {
    let mut signed: Option<UploadedFile> = None;

    while let Some(field) = multipart.next_field().await.map_err(|err| {
        error!(error = %err, "invalid multipart data");
        AppError::validation(format!("invalid multipart data: {err}"))
    })? {
        if field.name() == Some("signed_offer") {
            signed = Some(read_file_field(field).await?);
        }
    }

    let signed = signed.ok_or_else(|| AppError::validation("signed_offer file is required"))?;

    let mut conn = state.db()?;

    let internship: Internship = internships::table
        .find(internship_id)
        .first(&mut conn)
        .optional()?
        .ok_or_else(AppError::not_found)?;

    let application: Application = applications::table
        .find(internship.application_id)
        .first(&mut conn)?;

    if application.user_id != user.user_id && !user.is_admin() {
        return Err(AppError::forbidden());
    }
    drop(conn);

    let signed_key = object_key("offers", application.user_id, &signed.filename);
    let signed_size = signed.bytes.len() as i64;
    state
        .storage
        .put_object(&signed_key, signed.bytes, signed.content_type.clone(), None)
        .await
        .map_err(AppError::transient)?;

    let signed_row = NewDocument {
        id: Uuid::new_v4(),
        user_id: application.user_id,
        application_id: Some(internship.application_id),
        doc_type: DOC_TYPE_SIGNED_OFFER.to_string(),
        storage_path: signed_key.clone(),
        mime_type: signed.content_type,
        size_bytes: signed_size,
    };

    let mut conn = state.db()?;
    let updated: Internship = conn
        .transaction(|conn| {
            lifecycle::transition_internship(conn, internship_id, InternshipStatus::Joined)?;

            diesel::update(internships::table.find(internship_id))
                .set(internships::offer_signed_path.eq(&signed_key))
                .execute(conn)
                .map_err(LifecycleError::from)?;

            diesel::insert_into(documents::table)
                .values(&signed_row)
                .execute(conn)
                .map_err(LifecycleError::from)?;

            internships::table
                .find(internship_id)
                .first(conn)
                .map_err(LifecycleError::from)
        })
        .map_err(AppError::from)?;

    info!(
        internship_id = %internship_id,
        user_id = %user.user_id,
        "signed offer uploaded"
    );

    Ok(Json(to_internship_response(updated)))
}

pub async fn update_internship_status(
    State(state): State<AppState>,
    Path(internship_id): Path<Uuid>,
    AdminUser(admin): AdminUser,
    Json(payload): Json<UpdateInternshipStatusRequest>,
) -> AppResult<Json<InternshipResponse>> {
    let new_status = InternshipStatus::parse(&payload.status)
        .ok_or_else(|| AppError::validation(format!("unknown status '{}'", payload.status)))?;

    let mut conn = state.db()?;

    let internship = lifecycle::transition_internship(&mut conn, internship_id, new_status)?;

    info!(
        internship_id = %internship.id,
        status = %internship.status,
        admin_id = %admin.user_id,
        "internship transitioned"
    );

    if let Err(err) = audit::record_action(
        &mut conn,
        admin.user_id,
        Some(internship.application_id),
        ACTION_INTERNSHIP_STATUS_CHANGE,
        None,
        json!({ "internship_id": internship.id, "status": internship.status.clone() }),
    ) {
        error!(error = %err, internship_id = %internship.id, "failed to record admin action");
    }

    Ok(Json(to_internship_response(internship)))
}

pub async fn get_internship(
    State(state): State<AppState>,
    Path(internship_id): Path<Uuid>,
    user: AuthenticatedUser,
) -> AppResult<Json<InternshipResponse>> {
    let mut conn = state.db()?;

    let internship: Internship = internships::table
        .find(internship_id)
        .first(&mut conn)
        .optional()?
        .ok_or_else(AppError::not_found)?;

    let application: Application = applications::table
        .find(internship.application_id)
        .first(&mut conn)?;

    if application.user_id != user.user_id && !user.is_admin() {
        return Err(AppError::not_found());
    }

    Ok(Json(to_internship_response(internship)))
}

/// Interns and employees currently on board: pending or joined records,
/// newest first, with the applicant identity for display.
pub async fn list_active_internships(
    State(state): State<AppState>,
    _admin: AdminUser,
    Query(query): Query<ActiveListQuery>,
) -> AppResult<Json<Vec<ActiveInternshipRow>>> {
    let mut conn = state.db()?;

    let mut list_query = internships::table
        .inner_join(applications::table.inner_join(users::table))
        .filter(internships::status.eq_any([
            InternshipStatus::Pending.as_str(),
            InternshipStatus::Joined.as_str(),
        ]))
        .order(internships::created_at.desc())
        .into_boxed();

    if let Some(kind) = query.kind {
        list_query = list_query.filter(applications::kind.eq(kind));
    }

    let rows: Vec<(Internship, (Application, User))> = list_query.load(&mut conn)?;

    Ok(Json(
        rows.into_iter()
            .map(|(internship, (application, applicant))| ActiveInternshipRow {
                internship: to_internship_response(internship),
                kind: application.kind,
                applicant: ApplicantResponse {
                    id: applicant.id,
                    name: applicant.name,
                    email: applicant.email,
                    role: applicant.role,
                },
            })
            .collect(),
    ))
}

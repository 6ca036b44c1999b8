use axum::extract::{Json, Multipart, Path, Query, State};
use axum::http::StatusCode;
use chrono::{DateTime, NaiveDateTime, Utc};
use diesel::prelude::*;
use diesel::PgConnection;
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::{error, info};
use uuid::Uuid;

use crate::audit::{self, ACTION_STATUS_CHANGE};
use crate::auth::{AdminUser, AuthenticatedUser};
use crate::error::{AppError, AppResult};
use crate::lifecycle::{self, ApplicationStatus};
use crate::models::{
    Application, Document, Internship, Interview, NewApplication, NewDocument, User,
};
use crate::schema::{applications, documents, internships, interviews, users};
use crate::state::AppState;
use crate::storage::object_key;

pub const APPLICATION_KINDS: &[&str] = &["intern", "employee"];

pub const DOC_TYPE_RESUME: &str = "resume";
pub const DOC_TYPE_CERTIFICATE: &str = "certificate";

#[derive(Deserialize)]
pub struct AdminListQuery {
    pub status: Option<String>,
}

#[derive(Deserialize)]
pub struct TransitionRequest {
    pub status: String,
    pub notes: Option<String>,
}

#[derive(Serialize)]
pub struct ApplicationResponse {
    pub id: Uuid,
    pub user_id: Uuid,
    // `type` on the wire, matching the persisted contract
    #[serde(rename = "type")]
    pub kind: String,
    pub cover_letter: String,
    pub resume_path: String,
    pub status: String,
    pub applied_at: String,
    pub last_status_updated_at: String,
    pub current_owner: Option<Uuid>,
}

#[derive(Serialize)]
pub struct ApplicantResponse {
    pub id: Uuid,
    pub name: String,
    pub email: String,
    pub role: String,
}

#[derive(Serialize)]
pub struct AdminApplicationRow {
    #[serde(flatten)]
    pub application: ApplicationResponse,
    pub applicant: ApplicantResponse,
}

#[derive(Serialize)]
pub struct ApplicationDocumentResponse {
    pub id: Uuid,
    pub doc_type: String,
    pub storage_path: String,
    pub mime_type: Option<String>,
    pub size_bytes: i64,
    pub uploaded_at: String,
}

#[derive(Serialize)]
pub struct ApplicationDetailResponse {
    #[serde(flatten)]
    pub application: ApplicationResponse,
    pub applicant: ApplicantResponse,
    pub documents: Vec<ApplicationDocumentResponse>,
}

#[derive(Serialize)]
pub struct InterviewResponse {
    pub id: Uuid,
    pub application_id: Uuid,
    pub scheduled_by: Option<Uuid>,
    pub meet_link: String,
    pub scheduled_for: String,
    pub duration_minutes: i32,
}

#[derive(Serialize)]
pub struct InternshipResponse {
    pub id: Uuid,
    pub application_id: Uuid,
    pub stipend: i64,
    pub duration_months: i32,
    pub start_date: String,
    pub end_date: String,
    pub offer_letter_path: String,
    pub terms_path: Option<String>,
    pub offer_signed_path: Option<String>,
    pub status: String,
}

pub(crate) fn to_iso(dt: NaiveDateTime) -> String {
    DateTime::<Utc>::from_naive_utc_and_offset(dt, Utc).to_rfc3339()
}

pub(crate) fn to_application_response(application: Application) -> ApplicationResponse {
    ApplicationResponse {
        id: application.id,
        user_id: application.user_id,
        kind: application.kind,
        cover_letter: application.cover_letter,
        resume_path: application.resume_path,
        status: application.status,
        applied_at: to_iso(application.applied_at),
        last_status_updated_at: to_iso(application.last_status_updated_at),
        current_owner: application.current_owner,
    }
}

fn to_applicant_response(user: User) -> ApplicantResponse {
    ApplicantResponse {
        id: user.id,
        name: user.name,
        email: user.email,
        role: user.role,
    }
}

pub(crate) fn to_interview_response(interview: Interview) -> InterviewResponse {
    InterviewResponse {
        id: interview.id,
        application_id: interview.application_id,
        scheduled_by: interview.scheduled_by,
        meet_link: interview.meet_link,
        scheduled_for: to_iso(interview.scheduled_for),
        duration_minutes: interview.duration_minutes,
    }
}

pub(crate) fn to_internship_response(internship: Internship) -> InternshipResponse {
    InternshipResponse {
        id: internship.id,
        application_id: internship.application_id,
        stipend: internship.stipend,
        duration_months: internship.duration_months,
        start_date: internship.start_date.to_string(),
        end_date: internship.end_date.to_string(),
        offer_letter_path: internship.offer_letter_path,
        terms_path: internship.terms_path,
        offer_signed_path: internship.offer_signed_path,
        status: internship.status,
    }
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
    Ok(UploadedFile {
        filename,
        content_type,
        bytes: bytes.to_vec(),
    })
}

/// Submit: multipart with `type`, `cover_letter`, one `resume` file and any
/// number of `certificate` files. Certificates become document rows tied to
/// the new application. Object uploads happen before the database writes;
/// an orphaned object on failure is tolerated, an orphaned row is not.
pub async fn submit_application(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    mut multipart: Multipart,
) -> AppResult<(StatusCode, Json<ApplicationResponse>)> {
    let mut kind: Option<String> = None;
    let mut cover_letter: Option<String> = None;
    let mut resume: Option<UploadedFile> = None;
    let mut certificates: Vec<UploadedFile> = Vec::new();

    while let Some(field) = multipart.next_field().await.map_err(|err| {
        error!(error = %err, "invalid multipart data");
        AppError::validation(format!("invalid multipart data: {err}"))
    })? {
        let name = field.name().map(|n| n.to_string());
        match name.as_deref() {
            Some("type") => {
                let value = field
                    .text()
                    .await
                    .map_err(|err| AppError::validation(format!("invalid type field: {err}")))?;
                kind = Some(value.trim().to_lowercase());
            }
            Some("cover_letter") => {
                let value = field.text().await.map_err(|err| {
                    AppError::validation(format!("invalid cover_letter field: {err}"))
                })?;
                cover_letter = Some(value);
            }
            Some("resume") => {
                resume = Some(read_file_field(field).await?);
            }
            Some("certificate") => {
                certificates.push(read_file_field(field).await?);
            }
            _ => {}
        }
    }

    let kind = kind.ok_or_else(|| AppError::validation("type field is required"))?;
    if !APPLICATION_KINDS.contains(&kind.as_str()) {
        return Err(AppError::validation(format!(
            "type must be one of: {}",
            APPLICATION_KINDS.join(", ")
        )));
    }

    let cover_letter = cover_letter
        .map(|text| text.trim().to_string())
        .filter(|text| !text.is_empty())
        .ok_or_else(|| AppError::validation("cover_letter must not be empty"))?;

    let resume = resume.ok_or_else(|| AppError::validation("resume file is required"))?;
    if resume.bytes.is_empty() {
        return Err(AppError::validation("resume file must not be empty"));
    }

    let resume_key = object_key("resumes", user.user_id, &resume.filename);
    state
        .storage
        .put_object(
            &resume_key,
            resume.bytes,
            resume.content_type.clone(),
            None,
        )
        .await
        .map_err(AppError::transient)?;

    let mut certificate_rows: Vec<NewDocument> = Vec::with_capacity(certificates.len());
    for certificate in certificates {
        if certificate.bytes.is_empty() {
            return Err(AppError::validation("certificate files must not be empty"));
        }
        let key = object_key("certificates", user.user_id, &certificate.filename);
        let size = certificate.bytes.len() as i64;
        state
            .storage
            .put_object(&key, certificate.bytes, certificate.content_type.clone(), None)
            .await
            .map_err(AppError::transient)?;
        certificate_rows.push(NewDocument {
            id: Uuid::new_v4(),
            user_id: user.user_id,
            application_id: None, // patched once the application id exists
            doc_type: DOC_TYPE_CERTIFICATE.to_string(),
            storage_path: key,
            mime_type: certificate.content_type,
            size_bytes: size,
        });
    }

    let new_application = NewApplication {
        id: Uuid::new_v4(),
        user_id: user.user_id,
        kind: kind.clone(),
        cover_letter,
        resume_path: resume_key,
        status: ApplicationStatus::Submitted.as_str().to_string(),
    };

    for row in &mut certificate_rows {
        row.application_id = Some(new_application.id);
    }

    let mut conn = state.db()?;
    let application: Application = conn.transaction(|conn| {
        diesel::insert_into(applications::table)
            .values(&new_application)
            .execute(conn)?;
        if !certificate_rows.is_empty() {
            diesel::insert_into(documents::table)
                .values(&certificate_rows)
                .execute(conn)?;
        }
        applications::table.find(new_application.id).first(conn)
    })?;

    info!(
        application_id = %application.id,
        user_id = %user.user_id,
        kind = %kind,
        certificates = certificate_rows.len(),
        "application submitted"
    );

    Ok((StatusCode::CREATED, Json(to_application_response(application))))
}

pub async fn list_my_applications(
    State(state): State<AppState>,
    user: AuthenticatedUser,
) -> AppResult<Json<Vec<ApplicationResponse>>> {
    let mut conn = state.db()?;

    let rows: Vec<Application> = applications::table
        .filter(applications::user_id.eq(user.user_id))
        .order(applications::applied_at.desc())
        .load(&mut conn)?;

    Ok(Json(rows.into_iter().map(to_application_response).collect()))
}

pub async fn list_applications_for_admin(
    State(state): State<AppState>,
    _admin: AdminUser,
    Query(query): Query<AdminListQuery>,
) -> AppResult<Json<Vec<AdminApplicationRow>>> {
    let status_filter = match query.status.as_deref() {
        Some(raw) => Some(
            ApplicationStatus::parse(raw)
                .ok_or_else(|| AppError::validation(format!("unknown status '{raw}'")))?,
        ),
        None => None,
    };

    let mut conn = state.db()?;

    let mut list_query = applications::table
        .inner_join(users::table)
        .order(applications::applied_at.desc())
        .into_boxed();

    if let Some(status) = status_filter {
        list_query = list_query.filter(applications::status.eq(status.as_str()));
    }

    let rows: Vec<(Application, User)> = list_query.load(&mut conn)?;

    Ok(Json(
        rows.into_iter()
            .map(|(application, applicant)| AdminApplicationRow {
                application: to_application_response(application),
                applicant: to_applicant_response(applicant),
            })
            .collect(),
    ))
}

/// Loads an application the caller may see: its owner or any admin. Anyone
/// else gets not-found rather than forbidden so ids cannot be probed.
fn load_visible_application(
    conn: &mut PgConnection,
    application_id: Uuid,
    user: &AuthenticatedUser,
) -> AppResult<Application> {
    let application: Application = applications::table
        .find(application_id)
        .first(conn)
        .optional()?
        .ok_or_else(AppError::not_found)?;

    if application.user_id != user.user_id && !user.is_admin() {
        return Err(AppError::not_found());
    }

    Ok(application)
}

pub async fn get_application(
    State(state): State<AppState>,
    Path(application_id): Path<Uuid>,
    user: AuthenticatedUser,
) -> AppResult<Json<ApplicationDetailResponse>> {
    let mut conn = state.db()?;

    let application = load_visible_application(&mut conn, application_id, &user)?;

    let applicant: User = users::table.find(application.user_id).first(&mut conn)?;

    let docs: Vec<Document> = documents::table
        .filter(documents::application_id.eq(application_id))
        .order(documents::uploaded_at.desc())
        .load(&mut conn)?;

    Ok(Json(ApplicationDetailResponse {
        application: to_application_response(application),
        applicant: to_applicant_response(applicant),
        documents: docs
            .into_iter()
            .map(|doc| ApplicationDocumentResponse {
                id: doc.id,
                doc_type: doc.doc_type,
                storage_path: doc.storage_path,
                mime_type: doc.mime_type,
                size_bytes: doc.size_bytes,
                uploaded_at: to_iso(doc.uploaded_at),
            })
            .collect(),
    }))
}

pub async fn transition_application(
    State(state): State<AppState>,
    Path(application_id): Path<Uuid>,
    AdminUser(admin): AdminUser,
    Json(payload): Json<TransitionRequest>,
) -> AppResult<Json<ApplicationResponse>> {
    let new_status = ApplicationStatus::parse(&payload.status)
        .ok_or_else(|| AppError::validation(format!("unknown status '{}'", payload.status)))?;

    let mut conn = state.db()?;

    let application = lifecycle::transition_application(
        &mut conn,
        application_id,
        new_status,
        Some(admin.user_id),
    )?;

    info!(
        application_id = %application.id,
        status = %application.status,
        admin_id = %admin.user_id,
        "application transitioned"
    );

    // Audit is diagnostic; the transition above already committed.
    if let Err(err) = audit::record_action(
        &mut conn,
        admin.user_id,
        Some(application.id),
        ACTION_STATUS_CHANGE,
        payload.notes,
        json!({ "status": application.status.clone() }),
    ) {
        error!(error = %err, application_id = %application.id, "failed to record admin action");
    }

    Ok(Json(to_application_response(application)))
}

pub async fn withdraw_application(
    State(state): State<AppState>,
    Path(application_id): Path<Uuid>,
    user: AuthenticatedUser,
) -> AppResult<Json<ApplicationResponse>> {
    let mut conn = state.db()?;

    let application: Application = applications::table
        .find(application_id)
        .first(&mut conn)
        .optional()?
        .ok_or_else(AppError::not_found)?;

    if application.user_id != user.user_id {
        return Err(AppError::forbidden());
    }

    let application = lifecycle::transition_application(
        &mut conn,
        application_id,
        ApplicationStatus::Withdrawn,
        None,
    )?;

    info!(application_id = %application.id, user_id = %user.user_id, "application withdrawn");

    Ok(Json(to_application_response(application)))
}

pub async fn get_application_interview(
    State(state): State<AppState>,
    Path(application_id): Path<Uuid>,
    user: AuthenticatedUser,
) -> AppResult<Json<InterviewResponse>> {
    let mut conn = state.db()?;

    load_visible_application(&mut conn, application_id, &user)?;

    let interview: Interview = interviews::table
        .filter(interviews::application_id.eq(application_id))
        .order(interviews::created_at.desc())
        .first(&mut conn)
        .optional()?
        .ok_or_else(AppError::not_found)?;

    Ok(Json(to_interview_response(interview)))
}

pub async fn get_application_internship(
    State(state): State<AppState>,
    Path(application_id): Path<Uuid>,
    user: AuthenticatedUser,
) -> AppResult<Json<InternshipResponse>> {
    let mut conn = state.db()?;

    load_visible_application(&mut conn, application_id, &user)?;

    let internship: Internship = internships::table
        .filter(internships::application_id.eq(application_id))
        .first(&mut conn)
        .optional()?
        .ok_or_else(AppError::not_found)?;

    Ok(Json(to_internship_response(internship)))
}

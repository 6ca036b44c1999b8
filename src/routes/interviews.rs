use axum::extract::{Json, Path, State};
use axum::http::StatusCode;
use chrono::{DateTime, Utc};
use diesel::prelude::*;
use serde::Deserialize;
use serde_json::json;
use tracing::{error, info};
use uuid::Uuid;

use crate::audit::{
    self, ACTION_INTERVIEW_CANCELLED, ACTION_INTERVIEW_RESCHEDULED, ACTION_INTERVIEW_SCHEDULED,
};
use crate::auth::AdminUser;
use crate::error::{AppError, AppResult};
use crate::lifecycle::{self, ApplicationStatus, LifecycleError};
use crate::models::{Interview, NewInterview};
use crate::routes::applications::{to_interview_response, InterviewResponse};
use crate::schema::interviews;
use crate::state::AppState;

#[derive(Deserialize)]
pub struct ScheduleInterviewRequest {
    pub application_id: Uuid,
    pub meet_link: String,
    pub scheduled_for: DateTime<Utc>,
    pub duration_minutes: i32,
}

#[derive(Deserialize)]
pub struct UpdateInterviewRequest {
    pub meet_link: Option<String>,
    pub scheduled_for: Option<DateTime<Utc>>,
    pub duration_minutes: Option<i32>,
}

fn validate_slot(scheduled_for: DateTime<Utc>, duration_minutes: i32) -> AppResult<()> {
    if duration_minutes <= 0 {
        return Err(AppError::validation("duration_minutes must be positive"));
    }
    // Allow a minute of clock skew for "right now" slots.
    if scheduled_for < Utc::now() - chrono::Duration::minutes(1) {
        return Err(AppError::validation("scheduled_for must not be in the past"));
    }
    Ok(())
}

/// Scheduling and the `interview_scheduled` transition are one logical unit:
/// both run in a single transaction, transition first, so a rejected
/// transition leaves no interview row behind. Any earlier interview for the
/// application is replaced in the same unit.
pub async fn schedule_interview(
    State(state): State<AppState>,
    AdminUser(admin): AdminUser,
    Json(payload): Json<ScheduleInterviewRequest>,
) -> AppResult<(StatusCode, Json<InterviewResponse>)> {
    let meet_link = payload.meet_link.trim().to_string();
    if meet_link.is_empty() {
        return Err(AppError::validation("meet_link must not be empty"));
    }
    validate_slot(payload.scheduled_for, payload.duration_minutes)?;

    let mut conn = state.db()?;

    let interview: Interview = conn
        .transaction(|conn| {
            lifecycle::transition_application(
                conn,
                payload.application_id,
                ApplicationStatus::InterviewScheduled,
                Some(admin.user_id),
            )?;

            diesel::delete(
                interviews::table.filter(interviews::application_id.eq(payload.application_id)),
            )
            .execute(conn)
            .map_err(LifecycleError::from)?;

            let new_interview = NewInterview {
                id: Uuid::new_v4(),
                application_id: payload.application_id,
                scheduled_by: Some(admin.user_id),
                meet_link: meet_link.clone(),
                scheduled_for: payload.scheduled_for.naive_utc(),
                duration_minutes: payload.duration_minutes,
            };

            diesel::insert_into(interviews::table)
                .values(&new_interview)
                .execute(conn)
                .map_err(LifecycleError::from)?;

            interviews::table
                .find(new_interview.id)
                .first(conn)
                .map_err(LifecycleError::from)
        })
        .map_err(AppError::from)?;

    info!(
        interview_id = %interview.id,
        application_id = %payload.application_id,
        admin_id = %admin.user_id,
        "interview scheduled"
    );

    if let Err(err) = audit::record_action(
        &mut conn,
        admin.user_id,
        Some(payload.application_id),
        ACTION_INTERVIEW_SCHEDULED,
        None,
        json!({
            "interview_id": interview.id,
            "scheduled_for": payload.scheduled_for.to_rfc3339(),
        }),
    ) {
        error!(error = %err, interview_id = %interview.id, "failed to record admin action");
    }

    Ok((StatusCode::CREATED, Json(to_interview_response(interview))))
}

/// Reschedule only touches the detail row; the application already sits in
/// `interview_scheduled` and stays there.
pub async fn update_interview(
    State(state): State<AppState>,
    Path(interview_id): Path<Uuid>,
    AdminUser(admin): AdminUser,
    Json(payload): Json<UpdateInterviewRequest>,
) -> AppResult<Json<InterviewResponse>> {
    let mut conn = state.db()?;

    let existing: Interview = interviews::table
        .find(interview_id)
        .first(&mut conn)
        .optional()?
        .ok_or_else(AppError::not_found)?;

    let meet_link = match payload.meet_link {
        Some(ref link) => {
            let trimmed = link.trim();
            if trimmed.is_empty() {
                return Err(AppError::validation("meet_link must not be empty"));
            }
            trimmed.to_string()
        }
        None => existing.meet_link.clone(),
    };
    let scheduled_for = payload
        .scheduled_for
        .map(|dt| dt.naive_utc())
        .unwrap_or(existing.scheduled_for);
    let duration_minutes = payload.duration_minutes.unwrap_or(existing.duration_minutes);

    if let Some(dt) = payload.scheduled_for {
        validate_slot(dt, duration_minutes)?;
    } else if duration_minutes <= 0 {
        return Err(AppError::validation("duration_minutes must be positive"));
    }

    let now = Utc::now().naive_utc();
    diesel::update(interviews::table.find(interview_id))
        .set((
            interviews::meet_link.eq(&meet_link),
            interviews::scheduled_for.eq(scheduled_for),
            interviews::duration_minutes.eq(duration_minutes),
            interviews::updated_at.eq(now),
        ))
        .execute(&mut conn)?;

    let updated: Interview = interviews::table.find(interview_id).first(&mut conn)?;

    if let Err(err) = audit::record_action(
        &mut conn,
        admin.user_id,
        Some(updated.application_id),
        ACTION_INTERVIEW_RESCHEDULED,
        None,
        json!({ "interview_id": updated.id }),
    ) {
        error!(error = %err, interview_id = %updated.id, "failed to record admin action");
    }

    Ok(Json(to_interview_response(updated)))
}

/// Cancellation deletes the row only; reverting the application status is a
/// separate, explicit transition.
pub async fn cancel_interview(
    State(state): State<AppState>,
    Path(interview_id): Path<Uuid>,
    AdminUser(admin): AdminUser,
) -> AppResult<StatusCode> {
    let mut conn = state.db()?;

    let existing: Interview = interviews::table
        .find(interview_id)
        .first(&mut conn)
        .optional()?
        .ok_or_else(AppError::not_found)?;

    diesel::delete(interviews::table.find(interview_id)).execute(&mut conn)?;

    info!(
        interview_id = %interview_id,
        application_id = %existing.application_id,
        admin_id = %admin.user_id,
        "interview cancelled"
    );

    if let Err(err) = audit::record_action(
        &mut conn,
        admin.user_id,
        Some(existing.application_id),
        ACTION_INTERVIEW_CANCELLED,
        None,
        json!({ "interview_id": interview_id }),
    ) {
        error!(error = %err, interview_id = %interview_id, "failed to record admin action");
    }

    Ok(StatusCode::NO_CONTENT)
}

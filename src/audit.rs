use diesel::pg::PgConnection;
use diesel::prelude::*;
use serde_json::Value;
use thiserror::Error;
use uuid::Uuid;

use crate::models::{AdminAction, NewAdminAction};
use crate::schema::admin_actions;

pub const ACTION_STATUS_CHANGE: &str = "status-change";
pub const ACTION_INTERVIEW_SCHEDULED: &str = "interview-scheduled";
pub const ACTION_INTERVIEW_RESCHEDULED: &str = "interview-rescheduled";
pub const ACTION_INTERVIEW_CANCELLED: &str = "interview-cancelled";
pub const ACTION_OFFER_ISSUED: &str = "offer-issued";
pub const ACTION_INTERNSHIP_STATUS_CHANGE: &str = "internship-status-change";
pub const ACTION_DOCUMENT_DELETED: &str = "document-deleted";

#[derive(Debug, Error)]
pub enum AuditError {
    #[error("database error: {0}")]
    Database(#[from] diesel::result::Error),
}

pub type AuditResult<T> = Result<T, AuditError>;

/// Appends one audit row. The table is append-only; nothing in the crate
/// updates or deletes from it. Callers treat a failure here as diagnostic:
/// the primary write has already committed, so they log and move on.
pub fn record_action(
    conn: &mut PgConnection,
    admin_id: Uuid,
    application_id: Option<Uuid>,
    action_type: &str,
    notes: Option<String>,
    payload: Value,
) -> AuditResult<AdminAction> {
    let new_action = NewAdminAction {
        id: Uuid::new_v4(),
        admin_id,
        application_id,
        action_type: action_type.to_string(),
        notes,
        payload,
    };

    diesel::insert_into(admin_actions::table)
        .values(&new_action)
        .execute(conn)?;

    let action = admin_actions::table.find(new_action.id).first(conn)?;
    Ok(action)
}

pub fn list_actions(
    conn: &mut PgConnection,
    application_id: Option<Uuid>,
    action_type: Option<&str>,
) -> AuditResult<Vec<AdminAction>> {
    let mut query = admin_actions::table
        .order(admin_actions::created_at.desc())
        .into_boxed();

    if let Some(application_id) = application_id {
        query = query.filter(admin_actions::application_id.eq(application_id));
    }
    if let Some(action_type) = action_type {
        query = query.filter(admin_actions::action_type.eq(action_type.to_string()));
    }

    let actions = query.load(conn)?;
    Ok(actions)
}

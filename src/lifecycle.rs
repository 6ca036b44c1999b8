//! Status machines for applications and internships.
//!
//! Both lifecycles are closed graphs: a transition is legal iff the edge is
//! listed here, and every write is conditioned on the status the caller
//! observed, so two racing transitions cannot silently overwrite each other.

use chrono::Utc;
use diesel::pg::PgConnection;
use diesel::prelude::*;
use thiserror::Error;
use uuid::Uuid;

use crate::models::{Application, Internship};
use crate::schema::{applications, internships};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApplicationStatus {
    Submitted,
    UnderReview,
    InterviewScheduled,
    Offered,
    Accepted,
    Rejected,
    Withdrawn,
}

impl ApplicationStatus {
    pub const ALL: [ApplicationStatus; 7] = [
        ApplicationStatus::Submitted,
        ApplicationStatus::UnderReview,
        ApplicationStatus::InterviewScheduled,
        ApplicationStatus::Offered,
        ApplicationStatus::Accepted,
        ApplicationStatus::Rejected,
        ApplicationStatus::Withdrawn,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            ApplicationStatus::Submitted => "submitted",
            ApplicationStatus::UnderReview => "under_review",
            ApplicationStatus::InterviewScheduled => "interview_scheduled",
            ApplicationStatus::Offered => "offered",
            ApplicationStatus::Accepted => "accepted",
            ApplicationStatus::Rejected => "rejected",
            ApplicationStatus::Withdrawn => "withdrawn",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|status| status.as_str() == value)
    }

    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            ApplicationStatus::Accepted | ApplicationStatus::Rejected | ApplicationStatus::Withdrawn
        )
    }

    /// Edge predicate for the application graph. Self-loops are not edges,
    /// and nothing leaves a terminal state.
    pub fn can_transition_to(self, next: ApplicationStatus) -> bool {
        use ApplicationStatus::*;
        match (self, next) {
            (Submitted, UnderReview)
            | (UnderReview, InterviewScheduled)
            | (InterviewScheduled, Offered)
            | (Offered, Accepted) => true,
            (from, Rejected) | (from, Withdrawn) => !from.is_terminal(),
            _ => false,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InternshipStatus {
    Pending,
    Joined,
    Terminated,
    Completed,
}

impl InternshipStatus {
    pub const ALL: [InternshipStatus; 4] = [
        InternshipStatus::Pending,
        InternshipStatus::Joined,
        InternshipStatus::Terminated,
        InternshipStatus::Completed,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            InternshipStatus::Pending => "pending",
            InternshipStatus::Joined => "joined",
            InternshipStatus::Terminated => "terminated",
            InternshipStatus::Completed => "completed",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|status| status.as_str() == value)
    }

    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            InternshipStatus::Terminated | InternshipStatus::Completed
        )
    }

    pub fn can_transition_to(self, next: InternshipStatus) -> bool {
        use InternshipStatus::*;
        matches!(
            (self, next),
            (Pending, Joined) | (Pending, Terminated) | (Joined, Completed) | (Joined, Terminated)
        )
    }
}

#[derive(Debug, Error)]
pub enum LifecycleError {
    #[error("application not found")]
    ApplicationNotFound,
    #[error("internship not found")]
    InternshipNotFound,
    #[error("cannot transition application from {from} to {to}")]
    IllegalApplicationTransition { from: String, to: String },
    #[error("cannot transition internship from {from} to {to}")]
    IllegalInternshipTransition { from: String, to: String },
    #[error("database error: {0}")]
    Database(#[from] diesel::result::Error),
}

pub type LifecycleResult<T> = Result<T, LifecycleError>;

/// Moves an application along the graph. The update is filtered on the
/// status read above it, so a concurrent transition makes this one affect
/// zero rows and fail instead of clobbering the newer state.
///
/// `current_owner` is assigned to the acting admin on non-terminal targets
/// and cleared on terminal ones; terminal records have no active handler.
pub fn transition_application(
    conn: &mut PgConnection,
    application_id: Uuid,
    new_status: ApplicationStatus,
    acting_admin: Option<Uuid>,
) -> LifecycleResult<Application> {
    let current: Application = applications::table
        .find(application_id)
        .first(conn)
        .optional()?
        .ok_or(LifecycleError::ApplicationNotFound)?;

    let from = ApplicationStatus::parse(&current.status).ok_or_else(|| {
        LifecycleError::IllegalApplicationTransition {
            from: current.status.clone(),
            to: new_status.as_str().to_string(),
        }
    })?;

    if !from.can_transition_to(new_status) {
        return Err(LifecycleError::IllegalApplicationTransition {
            from: from.as_str().to_string(),
            to: new_status.as_str().to_string(),
        });
    }

    let owner = if new_status.is_terminal() {
        None
    } else {
        acting_admin
    };

    let now = Utc::now().naive_utc();
    let updated = diesel::update(
        applications::table
            .find(application_id)
            .filter(applications::status.eq(from.as_str())),
    )
    .set((
        applications::status.eq(new_status.as_str()),
        applications::last_status_updated_at.eq(now),
        applications::current_owner.eq(owner),
    ))
    .execute(conn)?;

    if updated == 0 {
        // Lost the race; report against the state we validated.
        return Err(LifecycleError::IllegalApplicationTransition {
            from: from.as_str().to_string(),
            to: new_status.as_str().to_string(),
        });
    }

    let refreshed = applications::table.find(application_id).first(conn)?;
    Ok(refreshed)
}

pub fn transition_internship(
    conn: &mut PgConnection,
    internship_id: Uuid,
    new_status: InternshipStatus,
) -> LifecycleResult<Internship> {
    let current: Internship = internships::table
        .find(internship_id)
        .first(conn)
        .optional()?
        .ok_or(LifecycleError::InternshipNotFound)?;

    let from = InternshipStatus::parse(&current.status).ok_or_else(|| {
        LifecycleError::IllegalInternshipTransition {
            from: current.status.clone(),
            to: new_status.as_str().to_string(),
        }
    })?;

    if !from.can_transition_to(new_status) {
        return Err(LifecycleError::IllegalInternshipTransition {
            from: from.as_str().to_string(),
            to: new_status.as_str().to_string(),
        });
    }

    let now = Utc::now().naive_utc();
    let updated = diesel::update(
        internships::table
            .find(internship_id)
            .filter(internships::status.eq(from.as_str())),
    )
    .set((
        internships::status.eq(new_status.as_str()),
        internships::updated_at.eq(now),
    ))
    .execute(conn)?;

    if updated == 0 {
        return Err(LifecycleError::IllegalInternshipTransition {
            from: from.as_str().to_string(),
            to: new_status.as_str().to_string(),
        });
    }

    let refreshed = internships::table.find(internship_id).first(conn)?;
    Ok(refreshed)
}

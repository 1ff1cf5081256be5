//! services/api/src/web/protocol.rs
//!
//! Defines the payload shapes shared between the REST handlers and the
//! classmates activity socket.

use chrono::{DateTime, Utc};
use serde::Serialize;
use utoipa::ToSchema;

use drona_core::domain::Submission;
use drona_core::workflow::SubmissionState;

/// One classmate's approved attempt, as shown in the shared-lesson feed.
#[derive(Serialize, Debug, Clone, ToSchema)]
pub struct ClassmateActivity {
    pub student_id: String,
    pub student_name: String,
    pub ai_score: Option<f64>,
    pub created_at: DateTime<Utc>,
}

impl From<&Submission> for ClassmateActivity {
    fn from(sub: &Submission) -> Self {
        ClassmateActivity {
            student_id: sub.student_id.clone(),
            student_name: sub.student_name.clone(),
            ai_score: sub.ai_score,
            created_at: sub.created_at,
        }
    }
}

/// A submission slot as handed to the client: the state machine's position
/// plus the record backing it, if any.
#[derive(Serialize, Debug, Clone)]
pub struct SubmissionView {
    pub state: &'static str,
    pub submission: Option<Submission>,
}

impl From<SubmissionState> for SubmissionView {
    fn from(state: SubmissionState) -> Self {
        let name = state.name();
        SubmissionView {
            state: name,
            submission: state.record().cloned(),
        }
    }
}

/// Represents the structured text messages the server can send over the
/// activity socket.
#[derive(Serialize, Debug, Clone)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerMessage {
    /// A fresh read of the classmates feed for the watched lesson.
    ActivityUpdate { entries: Vec<ClassmateActivity> },

    /// Reports an error to the client, which should display an error message.
    Error { message: String },
}

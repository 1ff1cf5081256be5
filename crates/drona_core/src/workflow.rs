//! crates/drona_core/src/workflow.rs
//!
//! The submission grading workflow: an explicit state machine over a student's
//! homework attempt for one lesson, plus the orchestrator that drives it
//! through the store and grader ports.

use std::sync::Arc;

use chrono::Utc;

use crate::domain::{new_record_id, Profile, Submission, SubmissionStatus};
use crate::ports::{HomeworkGrader, PortError, PortResult, RecordStore};

/// Placeholder feedback shown while a submission is being analyzed.
pub const PENDING_FEEDBACK: &str = "Drona is analyzing your submission...";

/// How many classmate entries the shared-lesson activity feed carries.
pub const CLASSMATES_FEED_LIMIT: usize = 10;

//=========================================================================================
// Submission State Machine
//=========================================================================================

/// The state of one (student, lesson) submission slot.
///
/// Transitions:
/// - upload: `NoSubmission | Rejected` -> `Pending`
/// - resolve (grading completion): `Pending` -> `Approved | Rejected`
/// - reset (student action): `Rejected` -> `NoSubmission`, display-only
///
/// `Approved` is terminal: re-submission over an approved attempt is refused.
#[derive(Debug, Clone, PartialEq)]
pub enum SubmissionState {
    NoSubmission,
    Pending(Submission),
    Approved(Submission),
    Rejected(Submission),
}

impl SubmissionState {
    /// Maps a stored record (or its absence) onto the state machine.
    pub fn from_record(record: Option<Submission>) -> Self {
        match record {
            None => SubmissionState::NoSubmission,
            Some(sub) => match sub.status {
                SubmissionStatus::Pending => SubmissionState::Pending(sub),
                SubmissionStatus::Approved => SubmissionState::Approved(sub),
                SubmissionStatus::Rejected => SubmissionState::Rejected(sub),
            },
        }
    }

    /// The underlying record, if one exists.
    pub fn record(&self) -> Option<&Submission> {
        match self {
            SubmissionState::NoSubmission => None,
            SubmissionState::Pending(sub)
            | SubmissionState::Approved(sub)
            | SubmissionState::Rejected(sub) => Some(sub),
        }
    }

    /// Whether an upload may run from this state.
    pub fn can_upload(&self) -> bool {
        matches!(
            self,
            SubmissionState::NoSubmission | SubmissionState::Rejected(_)
        )
    }

    /// The student-initiated re-scan transition. Clears the displayed
    /// submission without touching the persisted record; only a rejected
    /// attempt may be reset.
    pub fn reset(self) -> PortResult<Self> {
        match self {
            SubmissionState::Rejected(_) => Ok(SubmissionState::NoSubmission),
            other => Err(PortError::Conflict(format!(
                "only a rejected submission can be reset, current state is {}",
                other.name()
            ))),
        }
    }

    /// A stable lowercase name for logs and wire payloads.
    pub fn name(&self) -> &'static str {
        match self {
            SubmissionState::NoSubmission => "no_submission",
            SubmissionState::Pending(_) => "pending",
            SubmissionState::Approved(_) => "approved",
            SubmissionState::Rejected(_) => "rejected",
        }
    }
}

//=========================================================================================
// Workflow Orchestrator
//=========================================================================================

/// Drives a submission from upload through grading, coordinating the record
/// store with the grading client. These methods are the only writers of
/// submission records.
#[derive(Clone)]
pub struct SubmissionWorkflow {
    store: Arc<dyn RecordStore>,
    grader: Arc<dyn HomeworkGrader>,
}

impl SubmissionWorkflow {
    pub fn new(store: Arc<dyn RecordStore>, grader: Arc<dyn HomeworkGrader>) -> Self {
        Self { store, grader }
    }

    /// The state currently persisted for this (student, lesson) pair.
    pub async fn current_state(
        &self,
        student_id: &str,
        lesson_id: &str,
    ) -> PortResult<SubmissionState> {
        let record = self.store.submission_for(student_id, lesson_id).await?;
        Ok(SubmissionState::from_record(record))
    }

    /// The upload transition: synthesizes a `Pending` record for the image and
    /// persists it before returning, so the attempt is visible to concurrent
    /// readers before grading starts.
    ///
    /// Reuses the prior record's id when one exists, so the store's
    /// upsert-by-pair replaces it. A persistence failure here surfaces as an
    /// error and leaves the prior state untouched.
    pub async fn upload(
        &self,
        student: &Profile,
        lesson_id: &str,
        image: String,
    ) -> PortResult<Submission> {
        let prior = self.store.submission_for(&student.id, lesson_id).await?;
        let state = SubmissionState::from_record(prior.clone());
        if !state.can_upload() {
            return Err(PortError::Conflict(format!(
                "cannot upload while the submission is {}",
                state.name()
            )));
        }

        let pending = Submission {
            id: prior.map(|s| s.id).unwrap_or_else(new_record_id),
            student_id: student.id.clone(),
            lesson_id: lesson_id.to_string(),
            image_url: image,
            ai_score: None,
            ai_feedback: Some(PENDING_FEEDBACK.to_string()),
            status: SubmissionStatus::Pending,
            student_name: student.name.clone(),
            created_at: Utc::now(),
        };
        self.store.upsert_submission(pending.clone()).await?;
        Ok(pending)
    }

    /// The grading continuation: resolves a pending record to `Approved` or
    /// `Rejected` and persists the merged result. The grader cannot fail, so
    /// a graded submission never stays `Pending`.
    pub async fn grade(&self, pending: Submission) -> PortResult<Submission> {
        let verdict = self.grader.analyze(&pending.image_url).await;
        let resolved = Submission {
            ai_score: Some(verdict.score),
            ai_feedback: Some(verdict.feedback),
            status: verdict.status.into(),
            ..pending
        };
        self.store.upsert_submission(resolved.clone()).await?;
        Ok(resolved)
    }

    /// Upload followed by grading, for callers that want the whole sequence.
    pub async fn submit(
        &self,
        student: &Profile,
        lesson_id: &str,
        image: String,
    ) -> PortResult<Submission> {
        let pending = self.upload(student, lesson_id, image).await?;
        self.grade(pending).await
    }
}

/// Classmates' recent approved submissions for a shared lesson: everyone but
/// the viewer, newest first, capped at `limit`.
pub async fn classmates_activity(
    store: &dyn RecordStore,
    lesson_id: &str,
    viewer_id: &str,
    limit: usize,
) -> PortResult<Vec<Submission>> {
    let mut subs: Vec<Submission> = store
        .submissions_by_lesson(lesson_id)
        .await?
        .into_iter()
        .filter(|s| s.student_id != viewer_id && s.status == SubmissionStatus::Approved)
        .collect();
    subs.sort_by(|a, b| b.created_at.cmp(&a.created_at));
    subs.truncate(limit);
    Ok(subs)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn submission(status: SubmissionStatus) -> Submission {
        Submission {
            id: "sub123abc".to_string(),
            student_id: "stu123abc".to_string(),
            lesson_id: "les123abc".to_string(),
            image_url: "data:image/jpeg;base64,AAAA".to_string(),
            ai_score: None,
            ai_feedback: None,
            status,
            student_name: "Asha".to_string(),
            created_at: Utc::now(),
        }
    }

    #[test]
    fn state_maps_from_stored_record() {
        assert_eq!(
            SubmissionState::from_record(None),
            SubmissionState::NoSubmission
        );
        let pending = submission(SubmissionStatus::Pending);
        assert!(matches!(
            SubmissionState::from_record(Some(pending)),
            SubmissionState::Pending(_)
        ));
    }

    #[test]
    fn upload_is_allowed_only_without_a_live_attempt() {
        assert!(SubmissionState::NoSubmission.can_upload());
        assert!(SubmissionState::Rejected(submission(SubmissionStatus::Rejected)).can_upload());
        assert!(!SubmissionState::Pending(submission(SubmissionStatus::Pending)).can_upload());
        assert!(!SubmissionState::Approved(submission(SubmissionStatus::Approved)).can_upload());
    }

    #[test]
    fn only_a_rejected_submission_resets() {
        let rejected = SubmissionState::Rejected(submission(SubmissionStatus::Rejected));
        assert_eq!(rejected.reset().unwrap(), SubmissionState::NoSubmission);

        let approved = SubmissionState::Approved(submission(SubmissionStatus::Approved));
        assert!(approved.reset().is_err());
        let pending = SubmissionState::Pending(submission(SubmissionStatus::Pending));
        assert!(pending.reset().is_err());
        assert!(SubmissionState::NoSubmission.reset().is_err());
    }

    #[test]
    fn state_names_are_stable() {
        assert_eq!(SubmissionState::NoSubmission.name(), "no_submission");
        assert_eq!(
            SubmissionState::Approved(submission(SubmissionStatus::Approved)).name(),
            "approved"
        );
    }
}

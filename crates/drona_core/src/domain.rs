//! crates/drona_core/src/domain.rs
//!
//! Defines the pure, core data structures for the application.
//! These structs are independent of any storage backend; their serde shape is
//! the shape persisted locally and mirrored remotely.

use chrono::{DateTime, Utc};
use rand::Rng;
use serde::{Deserialize, Serialize};

/// Whether a profile belongs to a teacher or a student.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Teacher,
    Student,
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Role::Teacher => write!(f, "teacher"),
            Role::Student => write!(f, "student"),
        }
    }
}

/// An identity record, created once at sign-up and immutable thereafter.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Profile {
    pub id: String,
    pub name: String,
    pub role: Role,
    pub phone_number: Option<String>,
    pub email: Option<String>,
}

/// A classroom, owned by a teacher and joined through its code.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Batch {
    pub code: String,
    pub teacher_id: String,
    pub title: String,
}

/// A (student, batch) join record. At most one exists per pair.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Enrollment {
    pub student_id: String,
    pub batch_code: String,
}

/// A curriculum module within a batch, carrying a video and a homework
/// assignment. `scheduled_at` gates student visibility.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Lesson {
    pub id: String,
    pub batch_code: String,
    pub title: String,
    pub youtube_url: String,
    pub homework_description: String,
    pub homework_url: Option<String>,
    pub deadline: DateTime<Utc>,
    pub scheduled_at: DateTime<Utc>,
    pub answer_key_url: String,
}

/// Lifecycle of a grading attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SubmissionStatus {
    Pending,
    Approved,
    Rejected,
}

impl std::fmt::Display for SubmissionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SubmissionStatus::Pending => write!(f, "Pending"),
            SubmissionStatus::Approved => write!(f, "Approved"),
            SubmissionStatus::Rejected => write!(f, "Rejected"),
        }
    }
}

/// A student's homework attempt for a lesson. At most one live record exists
/// per (student_id, lesson_id) pair; a new attempt replaces the prior one.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Submission {
    pub id: String,
    pub student_id: String,
    pub lesson_id: String,
    pub image_url: String,
    pub ai_score: Option<f64>,
    pub ai_feedback: Option<String>,
    pub status: SubmissionStatus,
    pub student_name: String,
    pub created_at: DateTime<Utc>,
}

/// A student's private timestamped bookmark on a lesson video.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Note {
    pub id: String,
    pub lesson_id: String,
    pub student_id: String,
    pub timestamp: f64,
    pub content: String,
}

/// The grading model's judgement of a submission.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum VerdictStatus {
    Approved,
    Rejected,
}

impl From<VerdictStatus> for SubmissionStatus {
    fn from(status: VerdictStatus) -> Self {
        match status {
            VerdictStatus::Approved => SubmissionStatus::Approved,
            VerdictStatus::Rejected => SubmissionStatus::Rejected,
        }
    }
}

/// The three-field result returned by the grading service. Scoring semantics
/// belong to the model; no score-vs-status consistency is enforced here.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Verdict {
    pub status: VerdictStatus,
    pub score: f64,
    pub feedback: String,
}

/// Feedback text of the fixed verdict every grading failure resolves to.
pub const FALLBACK_FEEDBACK: &str = "The AI was unable to scan the image clearly. Please ensure your photo is well-lit and all text is legible before trying again.";

impl Verdict {
    /// The safe default verdict: a rejection asking for a clearer photo.
    pub fn fallback() -> Self {
        Verdict {
            status: VerdictStatus::Rejected,
            score: 0.0,
            feedback: FALLBACK_FEEDBACK.to_string(),
        }
    }
}

//=========================================================================================
// Token Generation
//=========================================================================================

const RECORD_ID_LEN: usize = 9;
const JOIN_CODE_LEN: usize = 6;

fn random_token(charset: &[u8], len: usize) -> String {
    let mut rng = rand::thread_rng();
    (0..len)
        .map(|_| charset[rng.gen_range(0..charset.len())] as char)
        .collect()
}

/// A fresh opaque record id: 9 lowercase alphanumeric characters.
pub fn new_record_id() -> String {
    random_token(b"abcdefghijklmnopqrstuvwxyz0123456789", RECORD_ID_LEN)
}

/// A fresh batch join code: 6 uppercase alphanumeric characters.
pub fn new_join_code() -> String {
    random_token(b"ABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789", JOIN_CODE_LEN)
}

/// Join codes are human-typed; lookups always go through this normalization.
pub fn normalize_join_code(code: &str) -> String {
    code.trim().to_ascii_uppercase()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn record_ids_are_short_lowercase_tokens() {
        let id = new_record_id();
        assert_eq!(id.len(), 9);
        assert!(id.chars().all(|c| c.is_ascii_lowercase() || c.is_ascii_digit()));
    }

    #[test]
    fn join_codes_are_uppercase_tokens_of_fixed_length() {
        let code = new_join_code();
        assert_eq!(code.len(), 6);
        assert!(code.chars().all(|c| c.is_ascii_uppercase() || c.is_ascii_digit()));
    }

    #[test]
    fn join_code_normalization_uppercases_and_trims() {
        assert_eq!(normalize_join_code(" phy-882 "), "PHY-882");
        assert_eq!(normalize_join_code("PHY-882"), "PHY-882");
    }

    #[test]
    fn roles_serialize_lowercase() {
        assert_eq!(serde_json::to_string(&Role::Teacher).unwrap(), "\"teacher\"");
        assert_eq!(serde_json::to_string(&Role::Student).unwrap(), "\"student\"");
    }

    #[test]
    fn submission_status_serializes_capitalized() {
        assert_eq!(
            serde_json::to_string(&SubmissionStatus::Pending).unwrap(),
            "\"Pending\""
        );
    }

    #[test]
    fn fallback_verdict_is_a_scoreless_rejection() {
        let verdict = Verdict::fallback();
        assert_eq!(verdict.status, VerdictStatus::Rejected);
        assert_eq!(verdict.score, 0.0);
        assert_eq!(verdict.feedback, FALLBACK_FEEDBACK);
    }
}

//! crates/drona_core/src/ports.rs
//!
//! Defines the service contracts (traits) for the application's core logic.
//! These traits form the boundary of the hexagonal architecture, allowing the core
//! to be independent of specific external implementations like storage or model APIs.

use async_trait::async_trait;

use crate::domain::{Batch, Enrollment, Lesson, Note, Profile, Submission, Verdict};

//=========================================================================================
// Generic Port Error and Result Types
//=========================================================================================

/// A generic error type for all port operations.
/// This abstracts away the specific errors from external services (e.g., storage, network).
#[derive(Debug, thiserror::Error)]
pub enum PortError {
    #[error("Item not found: {0}")]
    NotFound(String),
    #[error("Conflict: {0}")]
    Conflict(String),
    #[error("An unexpected error occurred: {0}")]
    Unexpected(String),
    #[error("Unauthorized")]
    Unauthorized,
}

/// A convenience type alias for `Result<T, PortError>`.
pub type PortResult<T> = Result<T, PortError>;

//=========================================================================================
// Record Store Port
//=========================================================================================

/// The repository of persisted records. Callers see atomic-looking operations;
/// an implementation may realize each one as a whole-collection rewrite as long
/// as the per-entity upsert policy below holds.
///
/// Upsert policy:
/// - profiles and batches are append-only creates,
/// - enrollments are idempotent on the (student, batch) pair,
/// - lessons replace by id,
/// - submissions replace by the (student_id, lesson_id) pair, never by id.
#[async_trait]
pub trait RecordStore: Send + Sync {
    // --- Profiles ---
    async fn create_profile(&self, profile: Profile) -> PortResult<()>;
    async fn profile_by_id(&self, id: &str) -> PortResult<Option<Profile>>;

    // --- Batches ---
    async fn create_batch(&self, batch: Batch) -> PortResult<()>;
    async fn batch_by_code(&self, code: &str) -> PortResult<Option<Batch>>;
    async fn batches_by_teacher(&self, teacher_id: &str) -> PortResult<Vec<Batch>>;

    // --- Enrollments ---
    async fn create_enrollment(&self, enrollment: Enrollment) -> PortResult<()>;
    async fn batches_for_student(&self, student_id: &str) -> PortResult<Vec<Batch>>;
    async fn students_in_batch(&self, batch_code: &str) -> PortResult<Vec<Profile>>;

    // --- Lessons ---
    async fn upsert_lesson(&self, lesson: Lesson) -> PortResult<()>;
    async fn lesson_by_id(&self, id: &str) -> PortResult<Option<Lesson>>;
    async fn lessons_by_batch(&self, batch_code: &str) -> PortResult<Vec<Lesson>>;

    // --- Submissions ---
    async fn upsert_submission(&self, submission: Submission) -> PortResult<()>;
    async fn submission_for(
        &self,
        student_id: &str,
        lesson_id: &str,
    ) -> PortResult<Option<Submission>>;
    async fn submissions_by_lesson(&self, lesson_id: &str) -> PortResult<Vec<Submission>>;

    // --- Notes (kept per (lesson, student), outside the shared collections) ---
    async fn notes_for(&self, lesson_id: &str, student_id: &str) -> PortResult<Vec<Note>>;
    async fn save_notes(
        &self,
        lesson_id: &str,
        student_id: &str,
        notes: Vec<Note>,
    ) -> PortResult<()>;

    // --- Session singleton ---
    async fn session(&self) -> PortResult<Option<Profile>>;
    async fn set_session(&self, profile: Profile) -> PortResult<()>;
    async fn clear_session(&self) -> PortResult<()>;
}

//=========================================================================================
// Grading Port
//=========================================================================================

#[async_trait]
pub trait HomeworkGrader: Send + Sync {
    /// Judges a homework photo and returns a verdict.
    ///
    /// This call cannot fail: implementations map every internal failure
    /// (network, malformed model output, parse error) to `Verdict::fallback()`.
    async fn analyze(&self, image: &str) -> Verdict;
}

//=========================================================================================
// Mirror Port
//=========================================================================================

/// One mutation of a mirrored collection, addressed to its remote table.
#[derive(Debug, Clone)]
pub enum MirrorEvent {
    Profile(Profile),
    Batch(Batch),
    Enrollment(Enrollment),
    Lesson(Lesson),
    Submission(Submission),
}

impl MirrorEvent {
    /// The remote table this event targets.
    pub fn table(&self) -> &'static str {
        match self {
            MirrorEvent::Profile(_) => "profiles",
            MirrorEvent::Batch(_) => "batches",
            MirrorEvent::Enrollment(_) => "enrollments",
            MirrorEvent::Lesson(_) => "lessons",
            MirrorEvent::Submission(_) => "submissions",
        }
    }
}

/// Receives every successful local mutation of a mirrored collection.
///
/// Enqueueing must not block and must not fail outward: the mirror is a
/// best-effort backup sink, never a consistency mechanism, and the local
/// write's result never depends on it.
pub trait ChangeSink: Send + Sync {
    fn record_changed(&self, event: MirrorEvent);
}

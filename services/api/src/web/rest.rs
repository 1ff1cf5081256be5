//! services/api/src/web/rest.rs
//!
//! Contains the Axum handlers for the REST API endpoints and the master
//! definition for the OpenAPI specification.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Json},
    Extension,
};
use chrono::{DateTime, Utc};
use serde::Deserialize;
use std::sync::Arc;
use tracing::error;
use utoipa::{OpenApi, ToSchema};

use crate::web::{
    protocol::{ClassmateActivity, SubmissionView},
    state::AppState,
};
use drona_core::domain::{
    new_join_code, new_record_id, normalize_join_code, Batch, Enrollment, Lesson, Note, Profile,
    Role,
};
use drona_core::ports::{PortError, RecordStore};
use drona_core::workflow::{classmates_activity, SubmissionState, CLASSMATES_FEED_LIMIT};

//=========================================================================================
// OpenAPI Master Definition
//=========================================================================================

#[derive(OpenApi)]
#[openapi(
    paths(
        crate::web::auth::signup_handler,
        crate::web::auth::signin_handler,
        crate::web::auth::signout_handler,
        crate::web::auth::session_handler,
        create_batch_handler,
        list_batches_handler,
        get_batch_handler,
        batch_students_handler,
        join_batch_handler,
        upsert_lesson_handler,
        list_lessons_handler,
        upload_submission_handler,
        my_submission_handler,
        reset_submission_handler,
        classmates_handler,
        list_notes_handler,
        add_note_handler,
        delete_note_handler,
    ),
    components(
        schemas(
            crate::web::auth::SignupRequest,
            crate::web::auth::SigninRequest,
            CreateBatchRequest,
            JoinBatchRequest,
            LessonUpsertRequest,
            UploadSubmissionRequest,
            AddNoteRequest,
            ClassmateActivity,
        )
    ),
    tags(
        (name = "Drona API", description = "API endpoints for the education platform: batches, lessons, homework submissions and AI grading.")
    )
)]
pub struct ApiDoc;

//=========================================================================================
// Request Payload Structs
//=========================================================================================

#[derive(Deserialize, ToSchema)]
pub struct CreateBatchRequest {
    pub title: String,
}

#[derive(Deserialize, ToSchema)]
pub struct JoinBatchRequest {
    /// The human-typed join code, any case.
    pub code: String,
}

#[derive(Deserialize, ToSchema)]
pub struct LessonUpsertRequest {
    /// Omitted for a new lesson; carrying an existing id replaces that lesson.
    pub id: Option<String>,
    pub title: String,
    pub youtube_url: String,
    pub homework_description: String,
    pub homework_url: Option<String>,
    pub deadline: DateTime<Utc>,
    pub scheduled_at: DateTime<Utc>,
    pub answer_key_url: String,
}

#[derive(Deserialize, ToSchema)]
pub struct UploadSubmissionRequest {
    /// The homework photo as a data URI.
    pub image: String,
}

#[derive(Deserialize, ToSchema)]
pub struct AddNoteRequest {
    /// Seconds into the lesson video.
    pub timestamp: f64,
    pub content: String,
}

/// Maps a port error onto the HTTP surface.
fn port_error(e: PortError) -> (StatusCode, String) {
    let status = match &e {
        PortError::NotFound(_) => StatusCode::NOT_FOUND,
        PortError::Conflict(_) => StatusCode::CONFLICT,
        PortError::Unauthorized => StatusCode::UNAUTHORIZED,
        PortError::Unexpected(_) => StatusCode::INTERNAL_SERVER_ERROR,
    };
    if status == StatusCode::INTERNAL_SERVER_ERROR {
        error!("Request failed: {:?}", e);
    }
    (status, e.to_string())
}

//=========================================================================================
// Batch Handlers
//=========================================================================================

/// Create a new batch with a freshly generated join code.
#[utoipa::path(
    post,
    path = "/batches",
    request_body = CreateBatchRequest,
    responses(
        (status = 201, description = "Batch created"),
        (status = 403, description = "Only teachers can create batches"),
        (status = 500, description = "Internal server error")
    )
)]
pub async fn create_batch_handler(
    State(state): State<Arc<AppState>>,
    Extension(profile): Extension<Profile>,
    Json(req): Json<CreateBatchRequest>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    if profile.role != Role::Teacher {
        return Err((
            StatusCode::FORBIDDEN,
            "Only teachers can create batches".to_string(),
        ));
    }

    let batch = Batch {
        code: new_join_code(),
        teacher_id: profile.id,
        title: req.title,
    };
    state
        .store
        .create_batch(batch.clone())
        .await
        .map_err(port_error)?;

    Ok((StatusCode::CREATED, Json(batch)))
}

/// The caller's batches: owned ones for a teacher, enrolled ones for a student.
#[utoipa::path(
    get,
    path = "/batches",
    responses(
        (status = 200, description = "The caller's batches"),
        (status = 500, description = "Internal server error")
    )
)]
pub async fn list_batches_handler(
    State(state): State<Arc<AppState>>,
    Extension(profile): Extension<Profile>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    let batches = match profile.role {
        Role::Teacher => state.store.batches_by_teacher(&profile.id).await,
        Role::Student => state.store.batches_for_student(&profile.id).await,
    }
    .map_err(port_error)?;
    Ok(Json(batches))
}

/// Look up one batch by its join code.
#[utoipa::path(
    get,
    path = "/batches/{code}",
    params(("code" = String, Path, description = "The batch join code.")),
    responses(
        (status = 200, description = "The batch"),
        (status = 404, description = "No batch with this code"),
        (status = 500, description = "Internal server error")
    )
)]
pub async fn get_batch_handler(
    State(state): State<Arc<AppState>>,
    Path(code): Path<String>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    let batch = state
        .store
        .batch_by_code(&normalize_join_code(&code))
        .await
        .map_err(port_error)?
        .ok_or((StatusCode::NOT_FOUND, "Batch not found".to_string()))?;
    Ok(Json(batch))
}

/// The profiles enrolled in a batch.
#[utoipa::path(
    get,
    path = "/batches/{code}/students",
    params(("code" = String, Path, description = "The batch join code.")),
    responses(
        (status = 200, description = "Enrolled students"),
        (status = 500, description = "Internal server error")
    )
)]
pub async fn batch_students_handler(
    State(state): State<Arc<AppState>>,
    Path(code): Path<String>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    let students = state
        .store
        .students_in_batch(&normalize_join_code(&code))
        .await
        .map_err(port_error)?;
    Ok(Json(students))
}

/// Join a batch by code. Joining twice is a no-op.
#[utoipa::path(
    post,
    path = "/enrollments",
    request_body = JoinBatchRequest,
    responses(
        (status = 201, description = "Enrolled; the joined batch is returned"),
        (status = 403, description = "Only students can join batches"),
        (status = 404, description = "Invalid class code"),
        (status = 500, description = "Internal server error")
    )
)]
pub async fn join_batch_handler(
    State(state): State<Arc<AppState>>,
    Extension(profile): Extension<Profile>,
    Json(req): Json<JoinBatchRequest>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    if profile.role != Role::Student {
        return Err((
            StatusCode::FORBIDDEN,
            "Only students can join batches".to_string(),
        ));
    }

    let batch = state
        .store
        .batch_by_code(&normalize_join_code(&req.code))
        .await
        .map_err(port_error)?
        .ok_or((
            StatusCode::NOT_FOUND,
            "Invalid class code. Please check and try again.".to_string(),
        ))?;

    state
        .store
        .create_enrollment(Enrollment {
            student_id: profile.id,
            batch_code: batch.code.clone(),
        })
        .await
        .map_err(port_error)?;

    Ok((StatusCode::CREATED, Json(batch)))
}

//=========================================================================================
// Lesson Handlers
//=========================================================================================

/// Create or replace a lesson in a batch the caller teaches.
#[utoipa::path(
    put,
    path = "/batches/{code}/lessons",
    params(("code" = String, Path, description = "The batch join code.")),
    request_body = LessonUpsertRequest,
    responses(
        (status = 200, description = "Lesson stored"),
        (status = 403, description = "Not the owning teacher"),
        (status = 404, description = "No batch with this code"),
        (status = 500, description = "Internal server error")
    )
)]
pub async fn upsert_lesson_handler(
    State(state): State<Arc<AppState>>,
    Extension(profile): Extension<Profile>,
    Path(code): Path<String>,
    Json(req): Json<LessonUpsertRequest>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    let batch = state
        .store
        .batch_by_code(&normalize_join_code(&code))
        .await
        .map_err(port_error)?
        .ok_or((StatusCode::NOT_FOUND, "Batch not found".to_string()))?;
    if batch.teacher_id != profile.id {
        return Err((
            StatusCode::FORBIDDEN,
            "Only the owning teacher can edit lessons".to_string(),
        ));
    }

    let lesson = Lesson {
        id: req.id.unwrap_or_else(new_record_id),
        batch_code: batch.code,
        title: req.title,
        youtube_url: req.youtube_url,
        homework_description: req.homework_description,
        homework_url: req.homework_url,
        deadline: req.deadline,
        scheduled_at: req.scheduled_at,
        answer_key_url: req.answer_key_url,
    };
    state
        .store
        .upsert_lesson(lesson.clone())
        .await
        .map_err(port_error)?;

    Ok(Json(lesson))
}

/// The lessons of a batch. Students only see lessons whose `scheduled_at`
/// has passed; the owning teacher sees all of them.
#[utoipa::path(
    get,
    path = "/batches/{code}/lessons",
    params(("code" = String, Path, description = "The batch join code.")),
    responses(
        (status = 200, description = "Lessons visible to the caller"),
        (status = 404, description = "No batch with this code"),
        (status = 500, description = "Internal server error")
    )
)]
pub async fn list_lessons_handler(
    State(state): State<Arc<AppState>>,
    Extension(profile): Extension<Profile>,
    Path(code): Path<String>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    let batch = state
        .store
        .batch_by_code(&normalize_join_code(&code))
        .await
        .map_err(port_error)?
        .ok_or((StatusCode::NOT_FOUND, "Batch not found".to_string()))?;

    let mut lessons = state
        .store
        .lessons_by_batch(&batch.code)
        .await
        .map_err(port_error)?;
    if profile.role == Role::Student {
        let now = Utc::now();
        lessons.retain(|l| l.scheduled_at <= now);
    }
    Ok(Json(lessons))
}

//=========================================================================================
// Submission Handlers
//=========================================================================================

/// Upload a homework photo for grading.
///
/// The `Pending` record is persisted before this handler responds; the
/// grading call itself runs as a background continuation and resolves the
/// record to Approved or Rejected whenever the model answers.
#[utoipa::path(
    post,
    path = "/lessons/{lesson_id}/submission",
    params(("lesson_id" = String, Path, description = "The lesson id.")),
    request_body = UploadSubmissionRequest,
    responses(
        (status = 202, description = "Submission recorded as Pending; grading in progress"),
        (status = 403, description = "Only students submit homework"),
        (status = 404, description = "No such lesson"),
        (status = 409, description = "A live attempt already exists"),
        (status = 500, description = "Internal server error")
    )
)]
pub async fn upload_submission_handler(
    State(state): State<Arc<AppState>>,
    Extension(profile): Extension<Profile>,
    Path(lesson_id): Path<String>,
    Json(req): Json<UploadSubmissionRequest>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    if profile.role != Role::Student {
        return Err((
            StatusCode::FORBIDDEN,
            "Only students submit homework".to_string(),
        ));
    }
    state
        .store
        .lesson_by_id(&lesson_id)
        .await
        .map_err(port_error)?
        .ok_or((StatusCode::NOT_FOUND, "Lesson not found".to_string()))?;

    let workflow = state.workflow();
    let pending = workflow
        .upload(&profile, &lesson_id, req.image)
        .await
        .map_err(port_error)?;

    // Grade in the background; the Pending record is already visible.
    let record = pending.clone();
    tokio::spawn(async move {
        if let Err(e) = workflow.grade(record).await {
            error!("Failed to persist grading result: {:?}", e);
        }
    });

    Ok((
        StatusCode::ACCEPTED,
        Json(SubmissionView::from(SubmissionState::Pending(pending))),
    ))
}

/// The caller's submission slot for a lesson.
#[utoipa::path(
    get,
    path = "/lessons/{lesson_id}/submission",
    params(("lesson_id" = String, Path, description = "The lesson id.")),
    responses(
        (status = 200, description = "The submission state"),
        (status = 500, description = "Internal server error")
    )
)]
pub async fn my_submission_handler(
    State(state): State<Arc<AppState>>,
    Extension(profile): Extension<Profile>,
    Path(lesson_id): Path<String>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    let current = state
        .workflow()
        .current_state(&profile.id, &lesson_id)
        .await
        .map_err(port_error)?;
    Ok(Json(SubmissionView::from(current)))
}

/// The re-scan transition: a rejected attempt goes back to "no submission"
/// so a fresh upload can replace it. The persisted record is not deleted.
#[utoipa::path(
    delete,
    path = "/lessons/{lesson_id}/submission",
    params(("lesson_id" = String, Path, description = "The lesson id.")),
    responses(
        (status = 200, description = "Slot cleared for re-submission"),
        (status = 409, description = "Only a rejected attempt can be reset"),
        (status = 500, description = "Internal server error")
    )
)]
pub async fn reset_submission_handler(
    State(state): State<Arc<AppState>>,
    Extension(profile): Extension<Profile>,
    Path(lesson_id): Path<String>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    let current = state
        .workflow()
        .current_state(&profile.id, &lesson_id)
        .await
        .map_err(port_error)?;
    let cleared = current.reset().map_err(port_error)?;
    Ok(Json(SubmissionView::from(cleared)))
}

/// Classmates' recent approved attempts for a shared lesson.
#[utoipa::path(
    get,
    path = "/lessons/{lesson_id}/classmates",
    params(("lesson_id" = String, Path, description = "The lesson id.")),
    responses(
        (status = 200, description = "Recent approved attempts by other students", body = [ClassmateActivity]),
        (status = 500, description = "Internal server error")
    )
)]
pub async fn classmates_handler(
    State(state): State<Arc<AppState>>,
    Extension(profile): Extension<Profile>,
    Path(lesson_id): Path<String>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    let entries = classmates_activity(
        state.store.as_ref(),
        &lesson_id,
        &profile.id,
        CLASSMATES_FEED_LIMIT,
    )
    .await
    .map_err(port_error)?;
    let entries: Vec<ClassmateActivity> = entries.iter().map(ClassmateActivity::from).collect();
    Ok(Json(entries))
}

//=========================================================================================
// Note Handlers
//=========================================================================================

/// The caller's notes for a lesson, ordered by video timestamp.
#[utoipa::path(
    get,
    path = "/lessons/{lesson_id}/notes",
    params(("lesson_id" = String, Path, description = "The lesson id.")),
    responses(
        (status = 200, description = "The caller's notes"),
        (status = 500, description = "Internal server error")
    )
)]
pub async fn list_notes_handler(
    State(state): State<Arc<AppState>>,
    Extension(profile): Extension<Profile>,
    Path(lesson_id): Path<String>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    let notes = state
        .store
        .notes_for(&lesson_id, &profile.id)
        .await
        .map_err(port_error)?;
    Ok(Json(notes))
}

/// Bookmark a moment in the lesson video.
#[utoipa::path(
    post,
    path = "/lessons/{lesson_id}/notes",
    params(("lesson_id" = String, Path, description = "The lesson id.")),
    request_body = AddNoteRequest,
    responses(
        (status = 201, description = "Note added"),
        (status = 500, description = "Internal server error")
    )
)]
pub async fn add_note_handler(
    State(state): State<Arc<AppState>>,
    Extension(profile): Extension<Profile>,
    Path(lesson_id): Path<String>,
    Json(req): Json<AddNoteRequest>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    let note = Note {
        id: new_record_id(),
        lesson_id: lesson_id.clone(),
        student_id: profile.id.clone(),
        timestamp: req.timestamp,
        content: req.content,
    };

    let mut notes = state
        .store
        .notes_for(&lesson_id, &profile.id)
        .await
        .map_err(port_error)?;
    notes.push(note.clone());
    notes.sort_by(|a, b| a.timestamp.total_cmp(&b.timestamp));
    state
        .store
        .save_notes(&lesson_id, &profile.id, notes)
        .await
        .map_err(port_error)?;

    Ok((StatusCode::CREATED, Json(note)))
}

/// Remove one of the caller's notes.
#[utoipa::path(
    delete,
    path = "/lessons/{lesson_id}/notes/{note_id}",
    params(
        ("lesson_id" = String, Path, description = "The lesson id."),
        ("note_id" = String, Path, description = "The note id.")
    ),
    responses(
        (status = 200, description = "Remaining notes"),
        (status = 500, description = "Internal server error")
    )
)]
pub async fn delete_note_handler(
    State(state): State<Arc<AppState>>,
    Extension(profile): Extension<Profile>,
    Path((lesson_id, note_id)): Path<(String, String)>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    let mut notes = state
        .store
        .notes_for(&lesson_id, &profile.id)
        .await
        .map_err(port_error)?;
    notes.retain(|n| n.id != note_id);
    state
        .store
        .save_notes(&lesson_id, &profile.id, notes.clone())
        .await
        .map_err(port_error)?;
    Ok(Json(notes))
}

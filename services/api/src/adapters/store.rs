//! services/api/src/adapters/store.rs
//!
//! This module contains the local store adapter, the concrete implementation
//! of the `RecordStore` port from the `core` crate. Each persisted key is one
//! JSON file holding the full ordered sequence of that collection's records,
//! and every mutation rewrites the whole file.

use std::io::ErrorKind;
use std::path::PathBuf;
use std::sync::Arc;

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::Serialize;
use tokio::sync::Mutex;

use drona_core::domain::{Batch, Enrollment, Lesson, Note, Profile, Submission};
use drona_core::ports::{ChangeSink, MirrorEvent, PortError, PortResult, RecordStore};

const PROFILES_KEY: &str = "edu_profiles";
const BATCHES_KEY: &str = "edu_batches";
const LESSONS_KEY: &str = "edu_lessons";
const ENROLLMENTS_KEY: &str = "edu_enrollments";
const SUBMISSIONS_KEY: &str = "edu_submissions";
const SESSION_KEY: &str = "edu_session";

fn notes_key(lesson_id: &str, student_id: &str) -> String {
    format!("notes_{}_{}", lesson_id, student_id)
}

//=========================================================================================
// The Main Adapter Struct
//=========================================================================================

/// A file-backed store that implements the `RecordStore` port.
///
/// Writers take a single lock so that each read-modify-write of a collection
/// is serialized; readers see whole files only (writes land via a temp file
/// and rename). Successful mutations of mirrored collections are handed to
/// the `ChangeSink` after the local write; the sink never affects the result.
pub struct JsonStore {
    dir: PathBuf,
    sink: Arc<dyn ChangeSink>,
    write_lock: Mutex<()>,
}

impl JsonStore {
    /// Creates a new `JsonStore` rooted at `dir`.
    pub fn new(dir: impl Into<PathBuf>, sink: Arc<dyn ChangeSink>) -> Self {
        Self {
            dir: dir.into(),
            sink,
            write_lock: Mutex::new(()),
        }
    }

    /// Ensures the data directory exists. Call once at startup.
    pub async fn init(&self) -> PortResult<()> {
        tokio::fs::create_dir_all(&self.dir)
            .await
            .map_err(|e| PortError::Unexpected(format!("cannot create data dir: {}", e)))
    }

    fn path_for(&self, key: &str) -> PathBuf {
        self.dir.join(format!("{}.json", key))
    }

    /// Reads a whole collection; a missing file is the empty sequence.
    async fn read_key<T: DeserializeOwned + Send>(&self, key: &str) -> PortResult<Vec<T>> {
        match tokio::fs::read(self.path_for(key)).await {
            Ok(bytes) => serde_json::from_slice(&bytes)
                .map_err(|e| PortError::Unexpected(format!("corrupt collection {}: {}", key, e))),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(Vec::new()),
            Err(e) => Err(PortError::Unexpected(format!(
                "cannot read collection {}: {}",
                key, e
            ))),
        }
    }

    /// Replaces a whole collection on disk.
    async fn write_key<T: Serialize + Sync>(&self, key: &str, records: &[T]) -> PortResult<()> {
        let bytes = serde_json::to_vec_pretty(records)
            .map_err(|e| PortError::Unexpected(format!("cannot encode collection {}: {}", key, e)))?;
        self.write_raw(key, bytes).await
    }

    async fn write_raw(&self, key: &str, bytes: Vec<u8>) -> PortResult<()> {
        let path = self.path_for(key);
        let tmp = self.dir.join(format!("{}.json.tmp", key));
        tokio::fs::write(&tmp, bytes)
            .await
            .map_err(|e| PortError::Unexpected(format!("cannot write collection {}: {}", key, e)))?;
        tokio::fs::rename(&tmp, &path)
            .await
            .map_err(|e| PortError::Unexpected(format!("cannot write collection {}: {}", key, e)))
    }
}

//=========================================================================================
// `RecordStore` Trait Implementation
//=========================================================================================

#[async_trait]
impl RecordStore for JsonStore {
    async fn create_profile(&self, profile: Profile) -> PortResult<()> {
        let _guard = self.write_lock.lock().await;
        let mut profiles: Vec<Profile> = self.read_key(PROFILES_KEY).await?;
        profiles.push(profile.clone());
        self.write_key(PROFILES_KEY, &profiles).await?;
        self.sink.record_changed(MirrorEvent::Profile(profile));
        Ok(())
    }

    async fn profile_by_id(&self, id: &str) -> PortResult<Option<Profile>> {
        let profiles: Vec<Profile> = self.read_key(PROFILES_KEY).await?;
        Ok(profiles.into_iter().find(|p| p.id == id))
    }

    async fn create_batch(&self, batch: Batch) -> PortResult<()> {
        let _guard = self.write_lock.lock().await;
        let mut batches: Vec<Batch> = self.read_key(BATCHES_KEY).await?;
        batches.push(batch.clone());
        self.write_key(BATCHES_KEY, &batches).await?;
        self.sink.record_changed(MirrorEvent::Batch(batch));
        Ok(())
    }

    async fn batch_by_code(&self, code: &str) -> PortResult<Option<Batch>> {
        let batches: Vec<Batch> = self.read_key(BATCHES_KEY).await?;
        Ok(batches.into_iter().find(|b| b.code == code))
    }

    async fn batches_by_teacher(&self, teacher_id: &str) -> PortResult<Vec<Batch>> {
        let batches: Vec<Batch> = self.read_key(BATCHES_KEY).await?;
        Ok(batches
            .into_iter()
            .filter(|b| b.teacher_id == teacher_id)
            .collect())
    }

    async fn create_enrollment(&self, enrollment: Enrollment) -> PortResult<()> {
        let _guard = self.write_lock.lock().await;
        let mut enrollments: Vec<Enrollment> = self.read_key(ENROLLMENTS_KEY).await?;
        // Joining a batch twice is a silent no-op.
        if enrollments
            .iter()
            .any(|e| e.student_id == enrollment.student_id && e.batch_code == enrollment.batch_code)
        {
            return Ok(());
        }
        enrollments.push(enrollment.clone());
        self.write_key(ENROLLMENTS_KEY, &enrollments).await?;
        self.sink.record_changed(MirrorEvent::Enrollment(enrollment));
        Ok(())
    }

    async fn batches_for_student(&self, student_id: &str) -> PortResult<Vec<Batch>> {
        let enrollments: Vec<Enrollment> = self.read_key(ENROLLMENTS_KEY).await?;
        let codes: Vec<String> = enrollments
            .into_iter()
            .filter(|e| e.student_id == student_id)
            .map(|e| e.batch_code)
            .collect();
        let batches: Vec<Batch> = self.read_key(BATCHES_KEY).await?;
        Ok(batches
            .into_iter()
            .filter(|b| codes.contains(&b.code))
            .collect())
    }

    async fn students_in_batch(&self, batch_code: &str) -> PortResult<Vec<Profile>> {
        let enrollments: Vec<Enrollment> = self.read_key(ENROLLMENTS_KEY).await?;
        let student_ids: Vec<String> = enrollments
            .into_iter()
            .filter(|e| e.batch_code == batch_code)
            .map(|e| e.student_id)
            .collect();
        let profiles: Vec<Profile> = self.read_key(PROFILES_KEY).await?;
        Ok(profiles
            .into_iter()
            .filter(|p| student_ids.contains(&p.id))
            .collect())
    }

    async fn upsert_lesson(&self, lesson: Lesson) -> PortResult<()> {
        let _guard = self.write_lock.lock().await;
        let mut lessons: Vec<Lesson> = self.read_key(LESSONS_KEY).await?;
        match lessons.iter_mut().find(|l| l.id == lesson.id) {
            Some(existing) => *existing = lesson.clone(),
            None => lessons.push(lesson.clone()),
        }
        self.write_key(LESSONS_KEY, &lessons).await?;
        self.sink.record_changed(MirrorEvent::Lesson(lesson));
        Ok(())
    }

    async fn lesson_by_id(&self, id: &str) -> PortResult<Option<Lesson>> {
        let lessons: Vec<Lesson> = self.read_key(LESSONS_KEY).await?;
        Ok(lessons.into_iter().find(|l| l.id == id))
    }

    async fn lessons_by_batch(&self, batch_code: &str) -> PortResult<Vec<Lesson>> {
        let lessons: Vec<Lesson> = self.read_key(LESSONS_KEY).await?;
        Ok(lessons
            .into_iter()
            .filter(|l| l.batch_code == batch_code)
            .collect())
    }

    async fn upsert_submission(&self, submission: Submission) -> PortResult<()> {
        let _guard = self.write_lock.lock().await;
        let mut submissions: Vec<Submission> = self.read_key(SUBMISSIONS_KEY).await?;
        // Replacement matches on the (student, lesson) pair, not on id.
        match submissions
            .iter_mut()
            .find(|s| s.student_id == submission.student_id && s.lesson_id == submission.lesson_id)
        {
            Some(existing) => *existing = submission.clone(),
            None => submissions.push(submission.clone()),
        }
        self.write_key(SUBMISSIONS_KEY, &submissions).await?;
        self.sink.record_changed(MirrorEvent::Submission(submission));
        Ok(())
    }

    async fn submission_for(
        &self,
        student_id: &str,
        lesson_id: &str,
    ) -> PortResult<Option<Submission>> {
        let submissions: Vec<Submission> = self.read_key(SUBMISSIONS_KEY).await?;
        Ok(submissions
            .into_iter()
            .find(|s| s.student_id == student_id && s.lesson_id == lesson_id))
    }

    async fn submissions_by_lesson(&self, lesson_id: &str) -> PortResult<Vec<Submission>> {
        let submissions: Vec<Submission> = self.read_key(SUBMISSIONS_KEY).await?;
        Ok(submissions
            .into_iter()
            .filter(|s| s.lesson_id == lesson_id)
            .collect())
    }

    async fn notes_for(&self, lesson_id: &str, student_id: &str) -> PortResult<Vec<Note>> {
        self.read_key(&notes_key(lesson_id, student_id)).await
    }

    async fn save_notes(
        &self,
        lesson_id: &str,
        student_id: &str,
        notes: Vec<Note>,
    ) -> PortResult<()> {
        let _guard = self.write_lock.lock().await;
        self.write_key(&notes_key(lesson_id, student_id), &notes)
            .await
    }

    async fn session(&self) -> PortResult<Option<Profile>> {
        match tokio::fs::read(self.path_for(SESSION_KEY)).await {
            Ok(bytes) => serde_json::from_slice(&bytes)
                .map(Some)
                .map_err(|e| PortError::Unexpected(format!("corrupt session record: {}", e))),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(PortError::Unexpected(format!("cannot read session: {}", e))),
        }
    }

    async fn set_session(&self, profile: Profile) -> PortResult<()> {
        let _guard = self.write_lock.lock().await;
        let bytes = serde_json::to_vec_pretty(&profile)
            .map_err(|e| PortError::Unexpected(format!("cannot encode session: {}", e)))?;
        self.write_raw(SESSION_KEY, bytes).await
    }

    async fn clear_session(&self) -> PortResult<()> {
        let _guard = self.write_lock.lock().await;
        match tokio::fs::remove_file(self.path_for(SESSION_KEY)).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(PortError::Unexpected(format!("cannot clear session: {}", e))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::mirror::NullSink;
    use chrono::Utc;
    use drona_core::domain::{new_record_id, Role, SubmissionStatus};

    fn temp_store() -> JsonStore {
        let dir = std::env::temp_dir().join(format!("drona-store-{}", new_record_id()));
        JsonStore::new(dir, Arc::new(NullSink))
    }

    fn profile(id: &str, role: Role) -> Profile {
        Profile {
            id: id.to_string(),
            name: format!("user {}", id),
            role,
            phone_number: None,
            email: None,
        }
    }

    fn lesson(id: &str, batch_code: &str, title: &str) -> Lesson {
        Lesson {
            id: id.to_string(),
            batch_code: batch_code.to_string(),
            title: title.to_string(),
            youtube_url: "https://www.youtube.com/watch?v=dQw4w9WgXcQ".to_string(),
            homework_description: "Solve the worksheet.".to_string(),
            homework_url: None,
            deadline: Utc::now(),
            scheduled_at: Utc::now(),
            answer_key_url: "https://example.com/answers.pdf".to_string(),
        }
    }

    fn submission(student_id: &str, lesson_id: &str, image: &str) -> Submission {
        Submission {
            id: new_record_id(),
            student_id: student_id.to_string(),
            lesson_id: lesson_id.to_string(),
            image_url: image.to_string(),
            ai_score: None,
            ai_feedback: None,
            status: SubmissionStatus::Pending,
            student_name: "Asha".to_string(),
            created_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn missing_collections_read_as_empty() {
        let store = temp_store();
        store.init().await.unwrap();
        assert!(store.batches_by_teacher("t1").await.unwrap().is_empty());
        assert!(store.session().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn enrollment_create_is_idempotent_per_pair() {
        let store = temp_store();
        store.init().await.unwrap();
        store
            .create_profile(profile("stu1", Role::Student))
            .await
            .unwrap();
        store
            .create_batch(Batch {
                code: "ABC123".to_string(),
                teacher_id: "t1".to_string(),
                title: "Algebra I".to_string(),
            })
            .await
            .unwrap();

        for _ in 0..2 {
            store
                .create_enrollment(Enrollment {
                    student_id: "stu1".to_string(),
                    batch_code: "ABC123".to_string(),
                })
                .await
                .unwrap();
        }

        let batches = store.batches_for_student("stu1").await.unwrap();
        assert_eq!(batches.len(), 1);
        assert_eq!(batches[0].title, "Algebra I");
        assert_eq!(store.students_in_batch("ABC123").await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn lessons_upsert_by_id() {
        let store = temp_store();
        store.init().await.unwrap();
        store
            .upsert_lesson(lesson("l1", "ABC123", "Fractions"))
            .await
            .unwrap();
        store
            .upsert_lesson(lesson("l1", "ABC123", "Fractions, revised"))
            .await
            .unwrap();
        store
            .upsert_lesson(lesson("l2", "ABC123", "Decimals"))
            .await
            .unwrap();

        let lessons = store.lessons_by_batch("ABC123").await.unwrap();
        assert_eq!(lessons.len(), 2);
        assert_eq!(lessons[0].title, "Fractions, revised");
    }

    #[tokio::test]
    async fn submissions_upsert_by_student_lesson_pair() {
        let store = temp_store();
        store.init().await.unwrap();
        let first = submission("stu1", "l1", "data:image/jpeg;base64,first");
        let mut second = submission("stu1", "l1", "data:image/jpeg;base64,second");
        second.id = first.id.clone();
        store.upsert_submission(first).await.unwrap();
        store.upsert_submission(second).await.unwrap();
        // A different student's attempt for the same lesson is its own record.
        store
            .upsert_submission(submission("stu2", "l1", "data:image/jpeg;base64,other"))
            .await
            .unwrap();

        let subs = store.submissions_by_lesson("l1").await.unwrap();
        assert_eq!(subs.len(), 2);
        let mine = store.submission_for("stu1", "l1").await.unwrap().unwrap();
        assert_eq!(mine.image_url, "data:image/jpeg;base64,second");
    }

    #[tokio::test]
    async fn notes_are_kept_per_lesson_and_student() {
        let store = temp_store();
        store.init().await.unwrap();
        let note = Note {
            id: new_record_id(),
            lesson_id: "l1".to_string(),
            student_id: "stu1".to_string(),
            timestamp: 42.5,
            content: "key formula".to_string(),
        };
        store
            .save_notes("l1", "stu1", vec![note.clone()])
            .await
            .unwrap();

        let mine = store.notes_for("l1", "stu1").await.unwrap();
        assert_eq!(mine.len(), 1);
        assert_eq!(mine[0].content, "key formula");
        assert!(store.notes_for("l1", "stu2").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn session_is_a_singleton() {
        let store = temp_store();
        store.init().await.unwrap();
        store
            .set_session(profile("stu1", Role::Student))
            .await
            .unwrap();
        store
            .set_session(profile("t1", Role::Teacher))
            .await
            .unwrap();
        assert_eq!(store.session().await.unwrap().unwrap().id, "t1");

        store.clear_session().await.unwrap();
        assert!(store.session().await.unwrap().is_none());
    }
}

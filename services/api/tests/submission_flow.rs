//! services/api/tests/submission_flow.rs
//!
//! End-to-end checks of the submission workflow against the real file-backed
//! store, with the grading model stubbed out.

use std::sync::Arc;

use async_trait::async_trait;

use api_lib::adapters::{JsonStore, NullSink};
use drona_core::domain::{
    new_join_code, new_record_id, normalize_join_code, Batch, Enrollment, Profile, Role, Verdict,
    VerdictStatus, FALLBACK_FEEDBACK,
};
use drona_core::ports::{HomeworkGrader, PortError, RecordStore};
use drona_core::workflow::{
    classmates_activity, SubmissionWorkflow, CLASSMATES_FEED_LIMIT, PENDING_FEEDBACK,
};

/// A grader that always returns the same verdict.
struct ScriptedGrader(Verdict);

#[async_trait]
impl HomeworkGrader for ScriptedGrader {
    async fn analyze(&self, _image: &str) -> Verdict {
        self.0.clone()
    }
}

/// Models a grading client whose underlying call blows up: per the port
/// contract it still resolves, to the fixed fallback verdict.
struct FailingGrader;

#[async_trait]
impl HomeworkGrader for FailingGrader {
    async fn analyze(&self, _image: &str) -> Verdict {
        Verdict::fallback()
    }
}

fn temp_store() -> Arc<JsonStore> {
    let dir = std::env::temp_dir().join(format!("drona-flow-{}", new_record_id()));
    Arc::new(JsonStore::new(dir, Arc::new(NullSink)))
}

fn student(name: &str) -> Profile {
    Profile {
        id: new_record_id(),
        name: name.to_string(),
        role: Role::Student,
        phone_number: None,
        email: None,
    }
}

fn approved(score: f64, feedback: &str) -> Verdict {
    Verdict {
        status: VerdictStatus::Approved,
        score,
        feedback: feedback.to_string(),
    }
}

#[tokio::test]
async fn upload_persists_a_pending_record_before_grading() {
    let store = temp_store();
    store.init().await.unwrap();
    let workflow = SubmissionWorkflow::new(
        store.clone(),
        Arc::new(ScriptedGrader(approved(9.0, "Great work"))),
    );
    let asha = student("Asha");

    let pending = workflow
        .upload(&asha, "lesson1", "data:image/jpeg;base64,AAAA".to_string())
        .await
        .unwrap();

    assert!(!pending.id.is_empty());
    let stored = store
        .submission_for(&asha.id, "lesson1")
        .await
        .unwrap()
        .unwrap();
    assert_eq!(stored.status, drona_core::domain::SubmissionStatus::Pending);
    assert_eq!(stored.ai_feedback.as_deref(), Some(PENDING_FEEDBACK));
    assert_eq!(stored.ai_score, None);
    assert_eq!(stored.student_name, "Asha");
}

#[tokio::test]
async fn grading_resolves_the_record_and_feeds_classmates() {
    let store = temp_store();
    store.init().await.unwrap();
    let workflow = SubmissionWorkflow::new(
        store.clone(),
        Arc::new(ScriptedGrader(approved(9.0, "Great work"))),
    );
    let asha = student("Asha");

    let resolved = workflow
        .submit(&asha, "lesson1", "data:image/jpeg;base64,AAAA".to_string())
        .await
        .unwrap();
    assert_eq!(
        resolved.status,
        drona_core::domain::SubmissionStatus::Approved
    );
    assert_eq!(resolved.ai_score, Some(9.0));
    assert_eq!(resolved.ai_feedback.as_deref(), Some("Great work"));

    // A classmate's activity poll for the lesson sees the approved attempt.
    let feed = classmates_activity(
        store.as_ref(),
        "lesson1",
        "someone-else",
        CLASSMATES_FEED_LIMIT,
    )
    .await
    .unwrap();
    assert_eq!(feed.len(), 1);
    assert_eq!(feed[0].student_id, asha.id);
    assert_eq!(feed[0].ai_score, Some(9.0));

    // The student's own poll excludes their attempt.
    let own_view = classmates_activity(store.as_ref(), "lesson1", &asha.id, CLASSMATES_FEED_LIMIT)
        .await
        .unwrap();
    assert!(own_view.is_empty());
}

#[tokio::test]
async fn a_failing_grader_still_resolves_to_the_fallback_rejection() {
    let store = temp_store();
    store.init().await.unwrap();
    let workflow = SubmissionWorkflow::new(store.clone(), Arc::new(FailingGrader));
    let asha = student("Asha");

    let resolved = workflow
        .submit(&asha, "lesson1", "data:image/jpeg;base64,AAAA".to_string())
        .await
        .unwrap();

    assert_eq!(
        resolved.status,
        drona_core::domain::SubmissionStatus::Rejected
    );
    assert_eq!(resolved.ai_score, Some(0.0));
    assert_eq!(resolved.ai_feedback.as_deref(), Some(FALLBACK_FEEDBACK));

    // Never stuck in Pending once the grade call has resolved.
    let stored = store
        .submission_for(&asha.id, "lesson1")
        .await
        .unwrap()
        .unwrap();
    assert_ne!(stored.status, drona_core::domain::SubmissionStatus::Pending);
}

#[tokio::test]
async fn resubmission_after_rejection_overwrites_the_same_record() {
    let store = temp_store();
    store.init().await.unwrap();
    let workflow = SubmissionWorkflow::new(store.clone(), Arc::new(FailingGrader));
    let asha = student("Asha");

    let first = workflow
        .submit(&asha, "lesson1", "data:image/jpeg;base64,first".to_string())
        .await
        .unwrap();
    let second = workflow
        .upload(&asha, "lesson1", "data:image/jpeg;base64,second".to_string())
        .await
        .unwrap();

    // The prior id carries forward and exactly one record exists for the pair.
    assert_eq!(second.id, first.id);
    let all = store.submissions_by_lesson("lesson1").await.unwrap();
    assert_eq!(all.len(), 1);
    assert_eq!(all[0].image_url, "data:image/jpeg;base64,second");
}

#[tokio::test]
async fn an_approved_attempt_is_terminal() {
    let store = temp_store();
    store.init().await.unwrap();
    let workflow = SubmissionWorkflow::new(
        store.clone(),
        Arc::new(ScriptedGrader(approved(8.0, "Solid"))),
    );
    let asha = student("Asha");

    workflow
        .submit(&asha, "lesson1", "data:image/jpeg;base64,AAAA".to_string())
        .await
        .unwrap();
    let err = workflow
        .upload(&asha, "lesson1", "data:image/jpeg;base64,BBBB".to_string())
        .await
        .unwrap_err();
    assert!(matches!(err, PortError::Conflict(_)));
}

#[tokio::test]
async fn batch_codes_join_case_insensitively_and_once() {
    let store = temp_store();
    store.init().await.unwrap();

    let code = new_join_code();
    assert_eq!(code.len(), 6);
    assert!(code
        .chars()
        .all(|c| c.is_ascii_uppercase() || c.is_ascii_digit()));

    store
        .create_batch(Batch {
            code: code.clone(),
            teacher_id: "teacher1".to_string(),
            title: "Algebra I".to_string(),
        })
        .await
        .unwrap();

    // The student types the code in lowercase; lookups normalize first.
    let typed = code.to_ascii_lowercase();
    let found = store
        .batch_by_code(&normalize_join_code(&typed))
        .await
        .unwrap()
        .expect("the lowercased code should resolve to the batch");
    assert_eq!(found.title, "Algebra I");

    let asha = student("Asha");
    store.create_profile(asha.clone()).await.unwrap();
    for _ in 0..2 {
        store
            .create_enrollment(Enrollment {
                student_id: asha.id.clone(),
                batch_code: found.code.clone(),
            })
            .await
            .unwrap();
    }

    let batches = store.batches_for_student(&asha.id).await.unwrap();
    assert_eq!(batches.len(), 1);
    assert_eq!(batches[0].title, "Algebra I");
}

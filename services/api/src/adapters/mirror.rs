//! services/api/src/adapters/mirror.rs
//!
//! This module contains the remote mirror adapter: a bounded queue drained by
//! a background task that upserts every local mutation into the matching
//! remote table. The mirror is a write-only backup sink; it is never read,
//! and no failure in it reaches the caller of the local store.

use sqlx::PgPool;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{info, warn};

use drona_core::ports::{ChangeSink, MirrorEvent};

/// What happens to an event the remote side will not take.
///
/// An upsert that still fails after `retry_attempts` retries is logged and
/// dropped; an event arriving at a full queue is dropped at enqueue time.
#[derive(Debug, Clone, Copy)]
pub struct MirrorPolicy {
    pub retry_attempts: u32,
    pub queue_capacity: usize,
}

//=========================================================================================
// Enqueue Handle
//=========================================================================================

/// The sending half of the mirror queue; this is what the local store holds.
#[derive(Clone)]
pub struct MirrorHandle {
    tx: mpsc::Sender<MirrorEvent>,
}

impl ChangeSink for MirrorHandle {
    fn record_changed(&self, event: MirrorEvent) {
        let table = event.table();
        if self.tx.try_send(event).is_err() {
            warn!("mirror queue unavailable, dropping {} record", table);
        }
    }
}

/// A sink for deployments with mirroring disabled.
pub struct NullSink;

impl ChangeSink for NullSink {
    fn record_changed(&self, _event: MirrorEvent) {}
}

//=========================================================================================
// Mirror Worker
//=========================================================================================

/// Starts the mirror worker and returns the enqueue handle plus the worker's
/// join handle. The worker runs until every `MirrorHandle` is dropped.
pub fn spawn_mirror(pool: PgPool, policy: MirrorPolicy) -> (MirrorHandle, JoinHandle<()>) {
    let (tx, mut rx) = mpsc::channel::<MirrorEvent>(policy.queue_capacity);
    let worker = tokio::spawn(async move {
        info!(
            "Mirror worker started (retry_attempts={}, queue_capacity={}).",
            policy.retry_attempts, policy.queue_capacity
        );
        while let Some(event) = rx.recv().await {
            let mut attempt = 0u32;
            loop {
                match upsert_event(&pool, &event).await {
                    Ok(()) => break,
                    Err(e) if attempt < policy.retry_attempts => {
                        attempt += 1;
                        warn!(
                            "mirror upsert of {} record failed (attempt {}), retrying: {}",
                            event.table(),
                            attempt,
                            e
                        );
                    }
                    Err(e) => {
                        warn!(
                            "mirror sync failed for {} record, dropping: {}",
                            event.table(),
                            e
                        );
                        break;
                    }
                }
            }
        }
        info!("Mirror worker stopped.");
    });
    (MirrorHandle { tx }, worker)
}

/// One upsert against the remote table matching the event's collection.
/// Conflict targets are the natural keys; submissions conflict on the
/// (student_id, lesson_id) pair, matching the local store's replacement rule.
async fn upsert_event(pool: &PgPool, event: &MirrorEvent) -> Result<(), sqlx::Error> {
    match event {
        MirrorEvent::Profile(p) => {
            sqlx::query(
                "INSERT INTO profiles (id, name, role, phone_number, email) \
                 VALUES ($1, $2, $3, $4, $5) \
                 ON CONFLICT (id) DO UPDATE SET \
                 name = EXCLUDED.name, role = EXCLUDED.role, \
                 phone_number = EXCLUDED.phone_number, email = EXCLUDED.email",
            )
            .bind(&p.id)
            .bind(&p.name)
            .bind(p.role.to_string())
            .bind(&p.phone_number)
            .bind(&p.email)
            .execute(pool)
            .await?;
        }
        MirrorEvent::Batch(b) => {
            sqlx::query(
                "INSERT INTO batches (code, teacher_id, title) VALUES ($1, $2, $3) \
                 ON CONFLICT (code) DO NOTHING",
            )
            .bind(&b.code)
            .bind(&b.teacher_id)
            .bind(&b.title)
            .execute(pool)
            .await?;
        }
        MirrorEvent::Enrollment(e) => {
            sqlx::query(
                "INSERT INTO enrollments (student_id, batch_code) VALUES ($1, $2) \
                 ON CONFLICT (student_id, batch_code) DO NOTHING",
            )
            .bind(&e.student_id)
            .bind(&e.batch_code)
            .execute(pool)
            .await?;
        }
        MirrorEvent::Lesson(l) => {
            sqlx::query(
                "INSERT INTO lessons (id, batch_code, title, youtube_url, \
                 homework_description, homework_url, deadline, scheduled_at, answer_key_url) \
                 VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9) \
                 ON CONFLICT (id) DO UPDATE SET \
                 batch_code = EXCLUDED.batch_code, title = EXCLUDED.title, \
                 youtube_url = EXCLUDED.youtube_url, \
                 homework_description = EXCLUDED.homework_description, \
                 homework_url = EXCLUDED.homework_url, deadline = EXCLUDED.deadline, \
                 scheduled_at = EXCLUDED.scheduled_at, answer_key_url = EXCLUDED.answer_key_url",
            )
            .bind(&l.id)
            .bind(&l.batch_code)
            .bind(&l.title)
            .bind(&l.youtube_url)
            .bind(&l.homework_description)
            .bind(&l.homework_url)
            .bind(l.deadline)
            .bind(l.scheduled_at)
            .bind(&l.answer_key_url)
            .execute(pool)
            .await?;
        }
        MirrorEvent::Submission(s) => {
            sqlx::query(
                "INSERT INTO submissions (id, student_id, lesson_id, image_url, \
                 ai_score, ai_feedback, status, student_name, created_at) \
                 VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9) \
                 ON CONFLICT (student_id, lesson_id) DO UPDATE SET \
                 id = EXCLUDED.id, image_url = EXCLUDED.image_url, \
                 ai_score = EXCLUDED.ai_score, ai_feedback = EXCLUDED.ai_feedback, \
                 status = EXCLUDED.status, student_name = EXCLUDED.student_name, \
                 created_at = EXCLUDED.created_at",
            )
            .bind(&s.id)
            .bind(&s.student_id)
            .bind(&s.lesson_id)
            .bind(&s.image_url)
            .bind(s.ai_score)
            .bind(&s.ai_feedback)
            .bind(s.status.to_string())
            .bind(&s.student_name)
            .bind(s.created_at)
            .execute(pool)
            .await?;
        }
    }
    Ok(())
}

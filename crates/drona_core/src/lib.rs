pub mod domain;
pub mod ports;
pub mod workflow;

pub use domain::{
    new_join_code, new_record_id, normalize_join_code, Batch, Enrollment, Lesson, Note, Profile,
    Role, Submission, SubmissionStatus, Verdict, VerdictStatus, FALLBACK_FEEDBACK,
};
pub use ports::{ChangeSink, HomeworkGrader, MirrorEvent, PortError, PortResult, RecordStore};
pub use workflow::{
    classmates_activity, SubmissionState, SubmissionWorkflow, CLASSMATES_FEED_LIMIT,
    PENDING_FEEDBACK,
};

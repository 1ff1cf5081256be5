pub mod grader;
pub mod mirror;
pub mod store;

pub use grader::OpenAiGraderAdapter;
pub use mirror::{spawn_mirror, MirrorHandle, MirrorPolicy, NullSink};
pub use store::JsonStore;

//! services/api/src/web/state.rs
//!
//! Defines the application's shared state.

use crate::config::Config;
use drona_core::ports::{HomeworkGrader, RecordStore};
use drona_core::workflow::SubmissionWorkflow;
use std::sync::Arc;

/// The shared application state, created once at startup and passed to all handlers.
#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn RecordStore>,
    pub grader: Arc<dyn HomeworkGrader>,
    pub config: Arc<Config>,
}

impl AppState {
    /// A workflow bound to this state's store and grader.
    pub fn workflow(&self) -> SubmissionWorkflow {
        SubmissionWorkflow::new(self.store.clone(), self.grader.clone())
    }
}

//! Shared state of one pipeline run.

use crate::compiler::{EventLog, PipelineConfig};

/// State shared by every pass of a pipeline run.
///
/// The context is only ever handed out by shared reference, so one context can serve
/// worker threads compiling independent functions at the same time. The event log is
/// append-only and thread-safe; the configuration is read-only.
#[derive(Debug, Default)]
pub struct CompilerContext {
    /// Pass selection and limits.
    pub config: PipelineConfig,

    /// Accumulated events from all passes and functions.
    pub events: EventLog,
}

impl CompilerContext {
    /// Creates a context with the given configuration and an empty event log.
    #[must_use]
    pub fn new(config: PipelineConfig) -> Self {
        Self {
            config,
            events: EventLog::new(),
        }
    }
}

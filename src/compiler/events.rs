//! Event logging for the optimization pipeline.
//!
//! Every rewrite a pass performs and every decision the pipeline takes is recorded as an
//! [`Event`]. Events can be inspected for debugging or safely ignored when not needed.
//!
//! # Architecture
//!
//! - [`Event`] - A single recorded event: a rewrite, a pass boundary or a rejection
//! - [`EventLog`] - Append-only collection with query and summary capabilities
//! - [`EventBuilder`] - Fluent API for creating events
//!
//! # Example
//!
//! ```rust
//! use vmopt::{compiler::{EventKind, EventLog}, ir::BlockId};
//!
//! let log = EventLog::new();
//!
//! log.record(EventKind::TrampolineRemoved)
//!     .at("main", BlockId::new(3))
//!     .message("b3 -> b7");
//! log.record(EventKind::PassStarted).pass("block-merger");
//!
//! assert_eq!(log.len(), 2);
//! assert_eq!(log.summary(), "1 trampoline removed");
//! ```

use std::{collections::HashMap, fmt};

use crate::ir::BlockId;

/// Categories of events that can be logged.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    /// A block consisting of a single jump was removed and its references redirected.
    TrampolineRemoved,
    /// A straight-line chain of blocks was fused into its head.
    BlocksFused,
    /// A handler association was dropped from a block that cannot throw.
    HandlerCleared,
    /// An unreachable block was removed.
    BlockRemoved,
    /// Virtual registers were packed into fewer physical slots.
    RegistersReduced,
    /// A natural loop was found.
    LoopDetected,

    /// A pass declined to run on a function.
    PassSkipped,
    /// A pass started.
    PassStarted,
    /// A pass completed.
    PassCompleted,

    /// A function was rejected and left unoptimized.
    Error,
}

impl EventKind {
    /// Returns a human-readable description of this event kind.
    #[must_use]
    pub fn description(&self) -> &'static str {
        match self {
            // Transformations
            Self::TrampolineRemoved => "trampoline removed",
            Self::BlocksFused => "blocks fused",
            Self::HandlerCleared => "handler cleared",
            Self::BlockRemoved => "block removed",
            Self::RegistersReduced => "registers reduced",
            // Analysis
            Self::LoopDetected => "loop detected",
            // Pipeline
            Self::PassSkipped => "pass skipped",
            Self::PassStarted => "pass started",
            Self::PassCompleted => "pass completed",
            // Diagnostic
            Self::Error => "error",
        }
    }

    /// Returns true if this event represents a code transformation.
    #[must_use]
    pub fn is_transformation(&self) -> bool {
        matches!(
            self,
            Self::TrampolineRemoved
                | Self::BlocksFused
                | Self::HandlerCleared
                | Self::BlockRemoved
                | Self::RegistersReduced
        )
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.description())
    }
}

/// A single logged event.
#[derive(Debug, Clone)]
pub struct Event {
    /// The type of event.
    pub kind: EventKind,
    /// The function where the event occurred (if applicable).
    pub function: Option<String>,
    /// The block the event concerns.
    pub block: Option<BlockId>,
    /// Human-readable description.
    pub message: String,
    /// Associated pass name (if from a pass).
    pub pass: Option<String>,
}

impl fmt::Display for Event {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}]", self.kind)?;
        if let Some(function) = &self.function {
            write!(f, " {function}")?;
        }
        if let Some(block) = self.block {
            write!(f, ":{block}")?;
        }
        write!(f, " {}", self.message)
    }
}

/// Builder for creating events with a fluent API.
///
/// Created by [`EventLog::record`]. The event is automatically added
/// to the log when the builder is dropped.
pub struct EventBuilder<'a> {
    log: &'a EventLog,
    kind: EventKind,
    function: Option<String>,
    block: Option<BlockId>,
    message: Option<String>,
    pass: Option<String>,
}

impl<'a> EventBuilder<'a> {
    fn new(log: &'a EventLog, kind: EventKind) -> Self {
        Self {
            log,
            kind,
            function: None,
            block: None,
            message: None,
            pass: None,
        }
    }

    /// Sets the function and block where the event occurred.
    pub fn at(mut self, function: &str, block: BlockId) -> Self {
        self.function = Some(function.to_string());
        self.block = Some(block);
        self
    }

    /// Sets only the function (for function-level events).
    pub fn function(mut self, function: &str) -> Self {
        self.function = Some(function.to_string());
        self
    }

    /// Sets a custom message describing the event.
    pub fn message(mut self, msg: impl Into<String>) -> Self {
        self.message = Some(msg.into());
        self
    }

    /// Associates this event with a specific pass.
    pub fn pass(mut self, pass_name: impl Into<String>) -> Self {
        self.pass = Some(pass_name.into());
        self
    }
}

impl Drop for EventBuilder<'_> {
    fn drop(&mut self) {
        let message = self
            .message
            .take()
            .unwrap_or_else(|| self.kind.description().to_string());

        let event = Event {
            kind: self.kind,
            function: self.function.take(),
            block: self.block.take(),
            message,
            pass: self.pass.take(),
        };

        self.log.events.push(event);
    }
}

/// Collection of events from the optimization pipeline.
///
/// This type is thread-safe: events can be appended concurrently from multiple worker
/// threads through shared references (`&self`).
#[derive(Debug)]
pub struct EventLog {
    events: boxcar::Vec<Event>,
}

impl Default for EventLog {
    fn default() -> Self {
        Self::new()
    }
}

impl Clone for EventLog {
    fn clone(&self) -> Self {
        let new_log = Self::new();
        new_log.merge(self);
        new_log
    }
}

impl EventLog {
    /// Creates an empty event log.
    #[must_use]
    pub fn new() -> Self {
        Self {
            events: boxcar::Vec::new(),
        }
    }

    /// Returns true if no events have been logged.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.events.count() == 0
    }

    /// Returns the total number of events.
    #[must_use]
    pub fn len(&self) -> usize {
        self.events.count()
    }

    /// Starts building a new event of the given kind.
    ///
    /// The event is automatically added when the builder is dropped.
    pub fn record(&self, kind: EventKind) -> EventBuilder<'_> {
        EventBuilder::new(self, kind)
    }

    /// Appends clones of all events of `other`.
    pub fn merge(&self, other: &EventLog) {
        for (_, event) in &other.events {
            self.events.push(event.clone());
        }
    }

    /// Returns true if any event of the given kind exists.
    #[must_use]
    pub fn has(&self, kind: EventKind) -> bool {
        self.events.iter().any(|(_, e)| e.kind == kind)
    }

    /// Counts events of the given kind.
    #[must_use]
    pub fn count_kind(&self, kind: EventKind) -> usize {
        self.events.iter().filter(|(_, e)| e.kind == kind).count()
    }

    /// Returns an iterator over all events.
    pub fn iter(&self) -> impl Iterator<Item = &Event> {
        self.events.iter().map(|(_, e)| e)
    }

    /// Returns an iterator over events for a specific function.
    pub fn filter_function<'a>(&'a self, function: &'a str) -> impl Iterator<Item = &'a Event> {
        self.iter()
            .filter(move |e| e.function.as_deref() == Some(function))
    }

    /// Returns an iterator over transformation events only.
    pub fn transformations(&self) -> impl Iterator<Item = &Event> + '_ {
        self.iter().filter(|e| e.kind.is_transformation())
    }

    /// Counts events grouped by kind.
    #[must_use]
    pub fn count_by_kind(&self) -> HashMap<EventKind, usize> {
        let mut counts = HashMap::new();
        for (_, event) in &self.events {
            *counts.entry(event.kind).or_insert(0) += 1;
        }
        counts
    }

    /// Generates a human-readable summary of the transformations.
    #[must_use]
    pub fn summary(&self) -> String {
        if self.is_empty() {
            return "no events".to_string();
        }

        let counts = self.count_by_kind();

        // Only show transformation counts in summary
        let mut parts: Vec<String> = counts
            .iter()
            .filter(|(k, _)| k.is_transformation())
            .map(|(kind, count)| format!("{} {}", count, kind.description()))
            .collect();

        if parts.is_empty() {
            return format!("{} events", self.len());
        }

        parts.sort();
        parts.join(", ")
    }
}

#[cfg(test)]
mod tests {
    use std::{sync::Arc, thread};

    use crate::{
        compiler::{EventKind, EventLog},
        ir::BlockId,
    };

    #[test]
    fn test_builder_records_on_drop() {
        let log = EventLog::new();
        log.record(EventKind::BlocksFused)
            .at("f", BlockId::new(2))
            .pass("block-merger");

        let event = log.iter().next().unwrap();
        assert_eq!(event.kind, EventKind::BlocksFused);
        assert_eq!(event.message, "blocks fused");
        assert_eq!(event.block, Some(BlockId::new(2)));
        assert_eq!(event.pass.as_deref(), Some("block-merger"));
        assert_eq!(event.to_string(), "[blocks fused] f:b2 blocks fused");
    }

    #[test]
    fn test_summary_counts_transformations_only() {
        let log = EventLog::new();
        assert_eq!(log.summary(), "no events");

        log.record(EventKind::PassStarted);
        assert_eq!(log.summary(), "1 events");

        log.record(EventKind::BlockRemoved);
        log.record(EventKind::BlockRemoved);
        log.record(EventKind::HandlerCleared);
        assert_eq!(log.summary(), "1 handler cleared, 2 block removed");
        assert_eq!(log.count_kind(EventKind::BlockRemoved), 2);
        assert_eq!(log.transformations().count(), 3);
    }

    #[test]
    fn test_concurrent_append() {
        let log = Arc::new(EventLog::new());
        let workers: Vec<_> = (0..4)
            .map(|i| {
                let log = Arc::clone(&log);
                thread::spawn(move || {
                    for _ in 0..25 {
                        log.record(EventKind::PassStarted).function(&format!("f{i}"));
                    }
                })
            })
            .collect();
        for worker in workers {
            worker.join().unwrap();
        }

        assert_eq!(log.len(), 100);
        assert_eq!(log.filter_function("f3").count(), 25);
        assert_eq!(log.clone().len(), 100);
    }
}

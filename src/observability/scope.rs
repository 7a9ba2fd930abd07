//! ObservationScope for run phases
//!
//! - Logs `{PHASE}_BEGIN` on creation
//! - Logs `{PHASE}_COMPLETE` or `{PHASE}_FAILED` when closed explicitly
//! - Logs `{PHASE}_INCOMPLETE` on drop otherwise, e.g. when a fatal error
//!   propagates out of the phase with `?`

use std::time::Instant;

use super::logger::Logger;

/// A scope that logs the start and end of a run phase
pub struct ObservationScope {
    phase: &'static str,
    started: Instant,
    closed: bool,
}

impl ObservationScope {
    /// Open a scope. Logs `{phase}_BEGIN`.
    pub fn new(phase: &'static str) -> Self {
        Logger::info(&format!("{}_BEGIN", phase), &[]);
        Self {
            phase,
            started: Instant::now(),
            closed: false,
        }
    }

    pub fn phase(&self) -> &'static str {
        self.phase
    }

    fn elapsed_ms(&self) -> String {
        self.started.elapsed().as_millis().to_string()
    }

    /// Close successfully. Logs `{phase}_COMPLETE` with `fields`.
    pub fn complete(mut self, fields: &[(&str, &str)]) {
        self.closed = true;
        let elapsed = self.elapsed_ms();
        let mut all: Vec<(&str, &str)> = vec![("elapsed_ms", elapsed.as_str())];
        all.extend_from_slice(fields);
        Logger::info(&format!("{}_COMPLETE", self.phase), &all);
    }

    /// Close with failures. Logs `{phase}_FAILED` at ERROR.
    pub fn fail(mut self, reason: &str) {
        self.closed = true;
        let elapsed = self.elapsed_ms();
        Logger::error(
            &format!("{}_FAILED", self.phase),
            &[("elapsed_ms", elapsed.as_str()), ("reason", reason)],
        );
    }

    pub fn is_closed(&self) -> bool {
        self.closed
    }
}

impl Drop for ObservationScope {
    fn drop(&mut self) {
        if !self.closed {
            Logger::warn(
                &format!("{}_INCOMPLETE", self.phase),
                &[("reason", "phase ended without completion")],
            );
        }
    }
}

//! Result bookkeeping shared by every fallible unit operation

use crate::error::{Result, Status};
use std::cell::Cell;
use std::sync::atomic::{AtomicI32, Ordering};
use std::sync::Arc;

/// Records the most recent result, the most recent failure, and the last
/// failure reported from the render context.
///
/// `last_error` is sticky: successes never clear it, only a newer failure
/// replaces it.
#[derive(Debug, Default)]
pub struct ErrorTracker {
    last_result: Cell<Status>,
    last_error: Cell<Option<Status>>,
    render: RenderErrorSlot,
}

impl ErrorTracker {
    /// Create an empty tracker
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a result code and hand it back
    pub fn register_result(&self, status: Status) -> Status {
        self.last_result.set(status);
        if status.is_err() {
            self.last_error.set(Some(status));
        }
        status
    }

    /// Record the outcome of an operation
    pub fn record<T>(&self, result: &Result<T>) {
        match result {
            Ok(_) => self.register_result(Status::NO_ERR),
            Err(e) => self.register_result(e.status()),
        };
    }

    /// The most recent result, success or not
    pub fn last_result(&self) -> Status {
        self.last_result.get()
    }

    /// The most recent failure, if any has happened
    pub fn last_error(&self) -> Option<Status> {
        self.last_error.get()
    }

    /// The last failure returned by a render callback
    pub fn last_render_error(&self) -> Option<Status> {
        self.render.get()
    }

    /// Forget the last render failure
    pub fn clear_render_error(&self) {
        self.render.clear();
    }

    /// A handle the render context writes into
    pub fn render_slot(&self) -> RenderErrorSlot {
        self.render.clone()
    }
}

/// Lock-free cell written from the render context and read from the control context
#[derive(Debug, Clone, Default)]
pub struct RenderErrorSlot(Arc<AtomicI32>);

impl RenderErrorSlot {
    /// Store `status` if it is a failure. Never blocks or allocates.
    pub fn report(&self, status: Status) {
        if status.is_err() {
            self.0.store(status.0, Ordering::Relaxed);
        }
    }

    /// The last failure reported, if any
    pub fn get(&self) -> Option<Status> {
        match self.0.load(Ordering::Relaxed) {
            0 => None,
            code => Some(Status(code)),
        }
    }

    /// Reset to "no failure"
    pub fn clear(&self) {
        self.0.store(0, Ordering::Relaxed);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn last_error_is_sticky() {
        let tracker = ErrorTracker::new();
        assert_eq!(tracker.last_result(), Status::NO_ERR);
        assert_eq!(tracker.last_error(), None);

        tracker.register_result(Status::INVALID_PROPERTY);
        tracker.register_result(Status::NO_ERR);

        assert_eq!(tracker.last_result(), Status::NO_ERR);
        assert_eq!(tracker.last_error(), Some(Status::INVALID_PROPERTY));

        tracker.register_result(Status::INVALID_ELEMENT);
        assert_eq!(tracker.last_error(), Some(Status::INVALID_ELEMENT));
    }

    #[test]
    fn render_slot_ignores_successes() {
        let tracker = ErrorTracker::new();
        let slot = tracker.render_slot();
        slot.report(Status::TOO_MANY_FRAMES_TO_PROCESS);
        slot.report(Status::NO_ERR);
        assert_eq!(
            tracker.last_render_error(),
            Some(Status::TOO_MANY_FRAMES_TO_PROCESS)
        );
        tracker.clear_render_error();
        assert_eq!(tracker.last_render_error(), None);
        // Render failures never touch the configuration-side slots.
        assert_eq!(tracker.last_error(), None);
    }
}

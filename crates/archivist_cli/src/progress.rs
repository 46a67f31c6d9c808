//! Progress reporting for sync runs.
//!
//! Library progress events are rendered as structured `tracing` lines; the
//! subscriber installed in `main` decides where they go.

mod logging;

use std::sync::Arc;

use archivist::sync::ProgressCallback;

pub use logging::LoggingReporter;

impl LoggingReporter {
    /// Convert to a ProgressCallback for the library.
    pub fn as_callback(self: &Arc<Self>) -> Arc<ProgressCallback> {
        let reporter = Arc::clone(self);
        Arc::new(Box::new(move |event| {
            reporter.handle(event);
        }))
    }
}

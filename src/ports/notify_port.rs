//! Best-effort notification sink.

use tracing::warn;

use crate::domain::error::AmatraderError;

pub trait NotifyPort {
    fn notify(&self, message: &str) -> Result<(), AmatraderError>;
}

/// Sends `message`, logging and discarding any failure.
pub fn notify_best_effort(sink: &dyn NotifyPort, message: &str) {
    if let Err(e) = sink.notify(message) {
        warn!(error = %e, message, "notification dropped");
    }
}

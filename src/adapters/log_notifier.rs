//! Notification sink that writes to the log under the `notify` target.

use tracing::info;

use crate::domain::error::AmatraderError;
use crate::ports::notify_port::NotifyPort;

#[derive(Debug, Clone, Copy, Default)]
pub struct LogNotifier;

impl NotifyPort for LogNotifier {
    fn notify(&self, message: &str) -> Result<(), AmatraderError> {
        info!(target: "notify", "{message}");
        Ok(())
    }
}

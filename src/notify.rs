//! Human-readable status output

/// Receiver of the plain status strings the core emits
pub trait NotificationSink {
    fn notify(&self, message: &str);
}

/// Default sink: status lines go to the log
pub struct LogSink;

impl NotificationSink for LogSink {
    fn notify(&self, message: &str) {
        tracing::info!(target: "bargain::notify", "{message}");
    }
}

use std::sync::Arc;

/// One tick on the unified progress channel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProgressEvent {
    /// Segmented download completion, 0-100.
    Download { percent: u32 },
    /// Per-format encode completion, 0-100.
    Encode { format: String, percent: u32 },
}

/// Consumer of progress ticks. Kept out of the scheduler's control
/// flow so a logger, a UI or a test probe can be swapped in.
pub trait ProgressSink: Send + Sync {
    fn emit(&self, event: ProgressEvent);
}

impl<F> ProgressSink for F
where
    F: Fn(ProgressEvent) + Send + Sync,
{
    fn emit(&self, event: ProgressEvent) {
        self(event)
    }
}

pub type SharedProgressSink = Arc<dyn ProgressSink>;

/// Default sink: one log line per tick.
pub fn log_sink() -> SharedProgressSink {
    Arc::new(|event: ProgressEvent| match event {
        ProgressEvent::Download { percent } => tracing::info!("Downloading: {percent}%"),
        ProgressEvent::Encode { format, percent } => {
            tracing::info!("Transcoding to {format}: {percent}%")
        }
    })
}

pub fn null_sink() -> SharedProgressSink {
    Arc::new(|_event: ProgressEvent| {})
}

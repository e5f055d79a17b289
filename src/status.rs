//! User-facing notices ("toasts") raised by the engine.

use std::time::{Duration, Instant};

use parking_lot::Mutex;
use tracing::{error, info};

/// How long a notice stays in the status line.
pub const NOTICE_TTL: Duration = Duration::from_secs(3);

/// Severity of a user-facing notice.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NoticeLevel {
    Info,
    Error,
}

/// Fire-and-forget notification sink.
pub trait Notifier: Send + Sync {
    fn notify(&self, message: &str, level: NoticeLevel);
}

/// A notice with the time it was raised.
#[derive(Debug, Clone)]
pub struct Notice {
    pub message: String,
    pub level: NoticeLevel,
    pub raised: Instant,
}

/// Keeps the latest notice for the status line and mirrors it to the log.
#[derive(Debug, Default)]
pub struct StatusLine {
    current: Mutex<Option<Notice>>,
}

impl StatusLine {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn current(&self) -> Option<Notice> {
        self.current.lock().clone()
    }

    /// Drop the notice once it has been shown for longer than [`NOTICE_TTL`].
    pub fn clear_expired(&self) {
        let mut current = self.current.lock();
        if current
            .as_ref()
            .is_some_and(|notice| notice.raised.elapsed() > NOTICE_TTL)
        {
            *current = None;
        }
    }
}

impl Notifier for StatusLine {
    fn notify(&self, message: &str, level: NoticeLevel) {
        match level {
            NoticeLevel::Info => info!(notice = message),
            NoticeLevel::Error => error!(notice = message),
        }
        *self.current.lock() = Some(Notice {
            message: message.to_string(),
            level,
            raised: Instant::now(),
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn notify_stores_message() {
        let status = StatusLine::new();
        status.notify("Created file a.ts", NoticeLevel::Info);
        let notice = status.current().unwrap();
        assert_eq!(notice.message, "Created file a.ts");
        assert_eq!(notice.level, NoticeLevel::Info);
    }

    #[test]
    fn clear_expired_keeps_recent() {
        let status = StatusLine::new();
        status.notify("fresh", NoticeLevel::Error);
        status.clear_expired();
        assert!(status.current().is_some());
    }

    #[test]
    fn clear_expired_removes_old() {
        let status = StatusLine::new();
        *status.current.lock() = Some(Notice {
            message: "old".into(),
            level: NoticeLevel::Info,
            raised: Instant::now() - Duration::from_secs(5),
        });
        status.clear_expired();
        assert!(status.current().is_none());
    }
}

//! User-facing notifications (the toast channel of the front desk)
//!
//! Failures that are not fatal end up here as well as in the log: the caller
//! drains the queue and shows the messages however it presents things.

use parking_lot::Mutex;

use crate::error::{AppError, AppResult};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Level {
    Success,
    Info,
    Error,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notification {
    pub level: Level,
    pub message: String,
}

#[derive(Debug, Default)]
pub struct Notifications {
    queue: Mutex<Vec<Notification>>,
}

impl Notifications {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn success(&self, message: impl Into<String>) {
        self.push(Level::Success, message.into());
    }

    pub fn info(&self, message: impl Into<String>) {
        self.push(Level::Info, message.into());
    }

    pub fn error(&self, message: impl Into<String>) {
        self.push(Level::Error, message.into());
    }

    fn push(&self, level: Level, message: String) {
        match level {
            Level::Error => tracing::warn!(notification = %message),
            _ => tracing::info!(notification = %message),
        }
        self.queue.lock().push(Notification { level, message });
    }

    /// Pass a result through, queuing an error notification when it failed.
    ///
    /// The backend's own `detail` wins over `fallback`; auth and validation
    /// failures keep their message as well.
    pub fn on_error<T>(&self, result: AppResult<T>, fallback: &str) -> AppResult<T> {
        if let Err(e) = &result {
            let message = match e {
                AppError::Backend { detail: Some(detail), .. } => detail.clone(),
                AppError::Authentication(msg) | AppError::Validation(msg) => msg.clone(),
                _ => fallback.to_string(),
            };
            self.error(message);
        }
        result
    }

    /// Take everything queued so far
    pub fn drain(&self) -> Vec<Notification> {
        std::mem::take(&mut *self.queue.lock())
    }

    /// Last queued notification, without removing it
    pub fn last(&self) -> Option<Notification> {
        self.queue.lock().last().cloned()
    }
}

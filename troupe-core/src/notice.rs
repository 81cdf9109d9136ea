//! User-facing notices.
//!
//! Errors and cache health are turned into short messages with a severity;
//! how long a notice stays visible depends on that severity.

use std::fmt;
use std::time::Duration;

use serde::Serialize;

use crate::cache::{HealthReport, HealthStatus, StoreError};
use crate::error::{ErrorKind, SyncError};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Info,
    Warning,
    Error,
    Critical,
}

impl Severity {
    pub fn duration(&self) -> Duration {
        match self {
            Severity::Info => Duration::from_secs(3),
            Severity::Warning => Duration::from_secs(5),
            Severity::Error => Duration::from_secs(8),
            Severity::Critical => Duration::from_secs(15),
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Severity::Info => "info",
            Severity::Warning => "warning",
            Severity::Error => "error",
            Severity::Critical => "critical",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Notice {
    pub severity: Severity,
    pub message: String,
    #[serde(with = "duration_millis", rename = "durationMs")]
    pub duration: Duration,
}

impl Notice {
    pub fn new(severity: Severity, message: impl Into<String>) -> Self {
        Self {
            severity,
            message: message.into(),
            duration: severity.duration(),
        }
    }

    pub fn info(message: impl Into<String>) -> Self {
        Self::new(Severity::Info, message)
    }

    pub fn warning(message: impl Into<String>) -> Self {
        Self::new(Severity::Warning, message)
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self::new(Severity::Error, message)
    }

    pub fn critical(message: impl Into<String>) -> Self {
        Self::new(Severity::Critical, message)
    }

    pub fn from_sync_error(err: &SyncError) -> Self {
        let severity = match err.kind() {
            ErrorKind::Validation => Severity::Warning,
            ErrorKind::Connectivity | ErrorKind::Unknown => Severity::Error,
            ErrorKind::Storage => Severity::Critical,
        };
        Self::new(severity, err.to_string())
    }

    pub fn from_store_error(err: &StoreError) -> Self {
        match err {
            StoreError::QuotaExceeded { .. } => Self::warning(err.to_string()),
            _ => Self::critical(err.to_string()),
        }
    }

    /// `None` when the cache is healthy.
    pub fn from_health(report: &HealthReport) -> Option<Self> {
        match report.status {
            HealthStatus::Healthy => None,
            HealthStatus::Warning => Some(Self::warning(report.message.clone())),
            HealthStatus::Error => Some(Self::critical(report.message.clone())),
        }
    }
}

impl fmt::Display for Notice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}", self.severity.label(), self.message)
    }
}

mod duration_millis {
    use std::time::Duration;

    use serde::Serializer;

    pub fn serialize<S: Serializer>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u64(duration.as_millis() as u64)
    }
}

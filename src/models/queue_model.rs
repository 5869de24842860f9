//! models/queue_model.rs
//! Estados y política de reintentos compartidos por las colas (email, sync CRM).

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "snake_case")]
#[sqlx(rename_all = "snake_case")]
pub enum QueueStatus {
    Pending,
    Sending,
    Sent,
    Retry,
    Failed,
    Cancelled,
}

impl QueueStatus {
    pub const ALL: [QueueStatus; 6] = [
        QueueStatus::Pending,
        QueueStatus::Sending,
        QueueStatus::Sent,
        QueueStatus::Retry,
        QueueStatus::Failed,
        QueueStatus::Cancelled,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            QueueStatus::Pending => "pending",
            QueueStatus::Sending => "sending",
            QueueStatus::Sent => "sent",
            QueueStatus::Retry => "retry",
            QueueStatus::Failed => "failed",
            QueueStatus::Cancelled => "cancelled",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|s| s.as_str() == value)
    }

    /// Estados desde los que un admin puede forzar un reintento manual.
    pub fn is_manually_retryable(&self) -> bool {
        matches!(
            self,
            QueueStatus::Failed | QueueStatus::Retry | QueueStatus::Cancelled
        )
    }

    pub fn is_cancellable(&self) -> bool {
        matches!(self, QueueStatus::Pending | QueueStatus::Retry)
    }
}

/// Política de reintentos: backoff exponencial a partir de `base_backoff_secs`.
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    pub max_attempts: i64,
    pub base_backoff_secs: i64,
    pub max_backoff_secs: i64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_backoff_secs: 60,
            max_backoff_secs: 3600,
        }
    }
}

impl RetryPolicy {
    /// Espera antes del siguiente intento tras `attempts` intentos fallidos (>= 1).
    pub fn backoff(&self, attempts: i64) -> Duration {
        let exp = (attempts.max(1) - 1).min(20) as u32;
        let secs = self
            .base_backoff_secs
            .saturating_mul(2_i64.saturating_pow(exp))
            .min(self.max_backoff_secs)
            .max(0);
        Duration::seconds(secs)
    }

    pub fn next_retry_at(&self, attempts: i64, now: DateTime<Utc>) -> DateTime<Utc> {
        now + self.backoff(attempts)
    }
}

/// Resultado de una pasada de un procesador de cola.
#[derive(Debug, Clone, Default, Serialize, PartialEq, Eq)]
pub struct ProcessSummary {
    pub recovered: u64,
    pub processed: u64,
    pub sent: u64,
    pub retried: u64,
    pub failed: u64,
    pub released: u64,
    pub batches: u64,
    pub timed_out: bool,
    pub elapsed_ms: u64,
}

#[derive(Debug, Clone, Serialize)]
pub struct StatusCount {
    pub status: QueueStatus,
    pub count: i64,
}

#[derive(Debug, Clone, Serialize)]
pub struct QueueStats {
    pub total: i64,
    pub by_status: Vec<StatusCount>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct QueueListQuery {
    pub status: Option<String>,
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}

impl QueueListQuery {
    pub fn status_filter(&self) -> Result<Option<QueueStatus>, String> {
        match self.status.as_deref() {
            None | Some("") => Ok(None),
            Some(s) => QueueStatus::parse(s)
                .map(Some)
                .ok_or_else(|| format!("estado de cola desconocido: {s}")),
        }
    }
}

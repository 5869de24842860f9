//! services/queue_store.rs
//! Operaciones comunes sobre tablas de cola (email_queue, brevo_sync_queue):
//! reclamar lotes, registrar fallos con backoff, recuperar filas atascadas,
//! el bucle de procesado por lotes y acciones manuales del panel.

use std::future::Future;
use std::time::{Duration, Instant};

use chrono::Utc;
use sqlx::{sqlite::SqliteRow, FromRow, Pool, Sqlite};

use crate::config::app_config::QueueSettings;
use crate::models::error_model::{ApiError, ApiResult, DatabaseError, DbResultExt};
use crate::models::queue_model::{
    ProcessSummary, QueueStats, QueueStatus, RetryPolicy, StatusCount,
};
use crate::models::{now_timestamp, timestamp};

/// Tamaño máximo del mensaje de error guardado en la fila.
const MAX_ERROR_LEN: usize = 1000;

/// Descripción de una tabla de cola. Los nombres son constantes del código,
/// nunca entrada de usuario, así que se pueden interpolar en el SQL.
#[derive(Debug, Clone, Copy)]
pub struct QueueTable {
    pub name: &'static str,
    pub columns: &'static str,
    /// Columna con la fecha de finalización correcta.
    pub completed_column: &'static str,
}

pub const EMAIL_QUEUE: QueueTable = QueueTable {
    name: "email_queue",
    columns: "id, recipients, cc, subject, html_body, attachments, mandato_id, status, attempts, \
              max_attempts, last_error, next_retry_at, sending_started_at, sent_at, \
              provider_message_id, created_at, updated_at",
    completed_column: "sent_at",
};

pub const SYNC_QUEUE: QueueTable = QueueTable {
    name: "brevo_sync_queue",
    columns: "id, entity_type, entity_id, action, payload, status, attempts, max_attempts, \
              last_error, next_retry_at, sending_started_at, processed_at, created_at, updated_at",
    completed_column: "processed_at",
};

/// Lo mínimo que necesitamos saber de una fila reclamada.
pub trait QueueRow {
    fn id(&self) -> &str;
    fn attempts(&self) -> i64;
    fn max_attempts(&self) -> i64;
    fn created_at(&self) -> &str;
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RecoveredRows {
    pub retried: u64,
    pub failed: u64,
}

impl RecoveredRows {
    pub fn total(&self) -> u64 {
        self.retried + self.failed
    }
}

fn truncate_error(error: &str) -> String {
    if error.len() <= MAX_ERROR_LEN {
        return error.to_string();
    }
    let mut end = MAX_ERROR_LEN;
    while !error.is_char_boundary(end) {
        end -= 1;
    }
    format!("{}…", &error[..end])
}

/// Filas en 'sending' desde hace más de `stuck_after` vuelven a la cola.
/// Cuenta como intento: si agota los intentos pasa a 'failed'.
pub async fn recover_stuck(
    pool: &Pool<Sqlite>,
    table: QueueTable,
    stuck_after: Duration,
) -> Result<RecoveredRows, DatabaseError> {
    let now = Utc::now();
    let stuck_after = chrono::Duration::from_std(stuck_after).unwrap_or(chrono::Duration::zero());
    let threshold = timestamp(now - stuck_after);
    let now = timestamp(now);
    let message = "Recuperado: la fila quedó atascada en 'sending'";

    let failed_sql = format!(
        r#"
        UPDATE {name}
        SET status = 'failed',
            attempts = attempts + 1,
            last_error = ?1,
            next_retry_at = NULL,
            sending_started_at = NULL,
            updated_at = ?2
        WHERE status = 'sending'
          AND (sending_started_at IS NULL OR sending_started_at < ?3)
          AND attempts + 1 >= max_attempts
        "#,
        name = table.name
    );
    let failed = sqlx::query(&failed_sql)
        .bind(message)
        .bind(&now)
        .bind(&threshold)
        .execute(pool)
        .await
        .db_context("recover_stuck", table.name)?
        .rows_affected();

    let retry_sql = format!(
        r#"
        UPDATE {name}
        SET status = 'retry',
            attempts = attempts + 1,
            last_error = ?1,
            next_retry_at = ?2,
            sending_started_at = NULL,
            updated_at = ?2
        WHERE status = 'sending'
          AND (sending_started_at IS NULL OR sending_started_at < ?3)
        "#,
        name = table.name
    );
    let retried = sqlx::query(&retry_sql)
        .bind(message)
        .bind(&now)
        .bind(&threshold)
        .execute(pool)
        .await
        .db_context("recover_stuck", table.name)?
        .rows_affected();

    if failed + retried > 0 {
        log::warn!(
            "({}) Recuperadas {} filas atascadas ({} reintento, {} fallidas)",
            table.name,
            failed + retried,
            retried,
            failed
        );
    }

    Ok(RecoveredRows { retried, failed })
}

/// Reclama hasta `limit` filas pendientes o con reintento vencido y las pasa
/// a 'sending', las más antiguas primero.
///
/// Es una única sentencia UPDATE: SQLite toma el bloqueo de escritura al
/// empezar, así que dos procesadores a la vez esperan su turno (busy_timeout)
/// en lugar de fallar con SQLITE_BUSY, y nunca reclaman la misma fila.
pub async fn claim_batch<T>(
    pool: &Pool<Sqlite>,
    table: QueueTable,
    limit: i64,
) -> Result<Vec<T>, DatabaseError>
where
    T: for<'r> FromRow<'r, SqliteRow> + QueueRow + Send + Unpin,
{
    let sql = format!(
        r#"
        UPDATE {name}
        SET status = 'sending', sending_started_at = ?1, updated_at = ?1
        WHERE status IN ('pending', 'retry')
          AND id IN (
            SELECT id FROM {name}
            WHERE status = 'pending'
               OR (status = 'retry' AND (next_retry_at IS NULL OR next_retry_at <= ?1))
            ORDER BY created_at ASC
            LIMIT ?2
          )
        RETURNING {columns}
        "#,
        columns = table.columns,
        name = table.name
    );
    let mut claimed: Vec<T> = sqlx::query_as(&sql)
        .bind(now_timestamp())
        .bind(limit)
        .fetch_all(pool)
        .await
        .db_context("claim_batch", table.name)?;

    // RETURNING no respeta el ORDER BY de la subconsulta
    claimed.sort_by(|a, b| a.created_at().cmp(b.created_at()));
    Ok(claimed)
}

/// Marca como completada una fila reclamada.
pub async fn mark_completed(
    pool: &Pool<Sqlite>,
    table: QueueTable,
    id: &str,
) -> Result<(), DatabaseError> {
    let now = now_timestamp();
    let sql = format!(
        r#"
        UPDATE {name}
        SET status = 'sent', {completed} = ?1, last_error = NULL,
            next_retry_at = NULL, sending_started_at = NULL, updated_at = ?1
        WHERE id = ?2
        "#,
        name = table.name,
        completed = table.completed_column
    );
    sqlx::query(&sql)
        .bind(&now)
        .bind(id)
        .execute(pool)
        .await
        .db_context("mark_completed", table.name)?;
    Ok(())
}

/// Registra un intento fallido. Devuelve el estado resultante:
/// 'retry' con `next_retry_at` según el backoff, o 'failed' si se agotaron
/// los intentos (o si `permanent` es true).
pub async fn mark_failure<T: QueueRow>(
    pool: &Pool<Sqlite>,
    table: QueueTable,
    row: &T,
    error: &str,
    policy: &RetryPolicy,
    permanent: bool,
) -> Result<QueueStatus, DatabaseError> {
    let now = Utc::now();
    let attempts = row.attempts() + 1;
    let (status, next_retry_at) = if permanent || attempts >= row.max_attempts() {
        (QueueStatus::Failed, None)
    } else {
        (
            QueueStatus::Retry,
            Some(timestamp(policy.next_retry_at(attempts, now))),
        )
    };

    let sql = format!(
        r#"
        UPDATE {name}
        SET status = ?1, attempts = ?2, last_error = ?3, next_retry_at = ?4,
            sending_started_at = NULL, updated_at = ?5
        WHERE id = ?6
        "#,
        name = table.name
    );
    sqlx::query(&sql)
        .bind(status)
        .bind(attempts)
        .bind(truncate_error(error))
        .bind(next_retry_at)
        .bind(timestamp(now))
        .bind(row.id())
        .execute(pool)
        .await
        .db_context("mark_failure", table.name)?;

    Ok(status)
}

/// Devuelve una fila reclamada a la cola sin contar intento: 'pending' si
/// nunca se intentó, 'retry' (con su `next_retry_at`) si ya llevaba intentos.
pub async fn release<T: QueueRow>(
    pool: &Pool<Sqlite>,
    table: QueueTable,
    row: &T,
) -> Result<(), DatabaseError> {
    let sql = format!(
        r#"
        UPDATE {name}
        SET status = CASE WHEN attempts > 0 THEN 'retry' ELSE 'pending' END,
            sending_started_at = NULL,
            updated_at = ?1
        WHERE id = ?2 AND status = 'sending'
        "#,
        name = table.name
    );
    sqlx::query(&sql)
        .bind(now_timestamp())
        .bind(row.id())
        .execute(pool)
        .await
        .db_context("release", table.name)?;
    Ok(())
}

/// Libera todas las filas indicadas. Un fallo se registra y se sigue con el
/// resto; esas filas las recogerá `recover_stuck`.
async fn release_all<T: QueueRow>(
    pool: &Pool<Sqlite>,
    table: QueueTable,
    rows: impl IntoIterator<Item = T>,
) -> u64 {
    let mut released = 0;
    for row in rows {
        match release(pool, table, &row).await {
            Ok(()) => released += 1,
            Err(e) => log::error!("({}) No se pudo liberar {}: {}", table.name, row.id(), e),
        }
    }
    released
}

/// Una pasada completa de un procesador: recupera filas atascadas y reclama
/// lotes hasta vaciar la cola o alcanzar `max_runtime`. `handle` procesa una
/// fila reclamada, la deja en su estado final y devuelve ese estado.
///
/// Si `handle` devuelve error, las filas que quedaban del lote vuelven a la
/// cola y el error se propaga. La fila que falló sigue en 'sending'.
pub async fn drain<T, F, Fut>(
    pool: &Pool<Sqlite>,
    table: QueueTable,
    settings: &QueueSettings,
    mut handle: F,
) -> anyhow::Result<ProcessSummary>
where
    T: for<'r> FromRow<'r, SqliteRow> + QueueRow + Send + Unpin,
    F: FnMut(T) -> Fut,
    Fut: Future<Output = anyhow::Result<QueueStatus>>,
{
    let started = Instant::now();
    let mut summary = ProcessSummary {
        recovered: recover_stuck(pool, table, settings.stuck_after)
            .await?
            .total(),
        ..ProcessSummary::default()
    };

    'batches: loop {
        if started.elapsed() >= settings.max_runtime {
            summary.timed_out = true;
            break;
        }

        let batch: Vec<T> = claim_batch(pool, table, settings.batch_size).await?;
        if batch.is_empty() {
            break;
        }
        summary.batches += 1;
        log::info!(
            "({}) Lote {} con {} fila(s)",
            table.name,
            summary.batches,
            batch.len()
        );

        let mut items = batch.into_iter();
        while let Some(item) = items.next() {
            if started.elapsed() >= settings.max_runtime {
                summary.timed_out = true;
                summary.released +=
                    release_all(pool, table, std::iter::once(item).chain(items.by_ref())).await;
                log::warn!(
                    "({}) Corte de tiempo alcanzado; {} fila(s) devueltas a la cola",
                    table.name,
                    summary.released
                );
                break 'batches;
            }

            summary.processed += 1;
            let id = item.id().to_string();
            match handle(item).await {
                Ok(QueueStatus::Sent) => summary.sent += 1,
                Ok(QueueStatus::Retry) => summary.retried += 1,
                Ok(_) => summary.failed += 1,
                Err(e) => {
                    let released = release_all(pool, table, items.by_ref()).await;
                    log::error!(
                        "({}) Pasada interrumpida en {}: {:#}; {} fila(s) devueltas a la cola",
                        table.name,
                        id,
                        e,
                        released
                    );
                    return Err(e);
                }
            }
        }

        if !settings.batch_delay.is_zero() {
            tokio::time::sleep(settings.batch_delay).await;
        }
    }

    summary.elapsed_ms = started.elapsed().as_millis() as u64;
    log::info!("({}) Pasada terminada: {:?}", table.name, summary);
    Ok(summary)
}

async fn current_status(
    pool: &Pool<Sqlite>,
    table: QueueTable,
    id: &str,
) -> ApiResult<QueueStatus> {
    let sql = format!("SELECT status FROM {} WHERE id = ?1", table.name);
    let status: Option<(QueueStatus,)> = sqlx::query_as(&sql)
        .bind(id)
        .fetch_optional(pool)
        .await
        .db_context("current_status", table.name)?;
    status
        .map(|(s,)| s)
        .ok_or_else(|| ApiError::NotFound(format!("{} {}", table.name, id)))
}

/// Reintento manual desde el panel: vuelve a 'pending' con los intentos a cero.
pub async fn manual_retry(pool: &Pool<Sqlite>, table: QueueTable, id: &str) -> ApiResult<()> {
    let status = current_status(pool, table, id).await?;
    if !status.is_manually_retryable() {
        return Err(ApiError::Conflict(format!(
            "no se puede reintentar una fila en estado '{}'",
            status.as_str()
        )));
    }

    let sql = format!(
        r#"
        UPDATE {name}
        SET status = 'pending', attempts = 0, last_error = NULL, next_retry_at = NULL,
            sending_started_at = NULL, updated_at = ?1
        WHERE id = ?2 AND status = ?3
        "#,
        name = table.name
    );
    let result = sqlx::query(&sql)
        .bind(now_timestamp())
        .bind(id)
        .bind(status)
        .execute(pool)
        .await
        .db_context("manual_retry", table.name)?;

    if result.rows_affected() == 0 {
        return Err(ApiError::Conflict(
            "la fila cambió de estado mientras se reintentaba".to_string(),
        ));
    }
    log::info!("({}) Reintento manual de {}", table.name, id);
    Ok(())
}

pub async fn cancel(pool: &Pool<Sqlite>, table: QueueTable, id: &str) -> ApiResult<()> {
    let status = current_status(pool, table, id).await?;
    if !status.is_cancellable() {
        return Err(ApiError::Conflict(format!(
            "no se puede cancelar una fila en estado '{}'",
            status.as_str()
        )));
    }

    let sql = format!(
        "UPDATE {} SET status = 'cancelled', next_retry_at = NULL, updated_at = ?1 \
         WHERE id = ?2 AND status = ?3",
        table.name
    );
    let result = sqlx::query(&sql)
        .bind(now_timestamp())
        .bind(id)
        .bind(status)
        .execute(pool)
        .await
        .db_context("cancel", table.name)?;

    if result.rows_affected() == 0 {
        return Err(ApiError::Conflict(
            "la fila cambió de estado mientras se cancelaba".to_string(),
        ));
    }
    Ok(())
}

pub async fn stats(pool: &Pool<Sqlite>, table: QueueTable) -> Result<QueueStats, DatabaseError> {
    let sql = format!(
        "SELECT status, COUNT(*) FROM {} GROUP BY status",
        table.name
    );
    let rows: Vec<(QueueStatus, i64)> = sqlx::query_as(&sql)
        .fetch_all(pool)
        .await
        .db_context("stats", table.name)?;

    let by_status: Vec<StatusCount> = QueueStatus::ALL
        .into_iter()
        .map(|status| StatusCount {
            status,
            count: rows
                .iter()
                .find(|(s, _)| *s == status)
                .map(|(_, c)| *c)
                .unwrap_or(0),
        })
        .collect();

    Ok(QueueStats {
        total: by_status.iter().map(|s| s.count).sum(),
        by_status,
    })
}

pub async fn list<T>(
    pool: &Pool<Sqlite>,
    table: QueueTable,
    status: Option<QueueStatus>,
    limit: i64,
    offset: i64,
) -> Result<Vec<T>, DatabaseError>
where
    T: for<'r> FromRow<'r, SqliteRow> + Send + Unpin,
{
    let sql = format!(
        r#"
        SELECT {columns} FROM {name}
        WHERE (?1 IS NULL OR status = ?1)
        ORDER BY created_at DESC
        LIMIT ?2 OFFSET ?3
        "#,
        columns = table.columns,
        name = table.name
    );
    sqlx::query_as(&sql)
        .bind(status)
        .bind(limit.clamp(1, 500))
        .bind(offset.max(0))
        .fetch_all(pool)
        .await
        .db_context("list", table.name)
}

pub async fn get<T>(pool: &Pool<Sqlite>, table: QueueTable, id: &str) -> ApiResult<T>
where
    T: for<'r> FromRow<'r, SqliteRow> + Send + Unpin,
{
    let sql = format!(
        "SELECT {} FROM {} WHERE id = ?1",
        table.columns, table.name
    );
    sqlx::query_as(&sql)
        .bind(id)
        .fetch_optional(pool)
        .await
        .db_context("get", table.name)?
        .ok_or_else(|| ApiError::NotFound(format!("{} {}", table.name, id)))
}

//! services/email_queue_service.rs
//! Cola de emails salientes: alta, procesado por lotes y acciones del panel.

use std::sync::Arc;

use anyhow::{Context, Result};
use sqlx::{Pool, Sqlite};
use uuid::Uuid;

use crate::config::app_config::QueueSettings;
use crate::models::email_model::{EmailQueueItem, EnqueueEmailRequest};
use crate::models::error_model::{ApiError, ApiResult, DbResultExt};
use crate::models::now_timestamp;
use crate::models::queue_model::{ProcessSummary, QueueStats, QueueStatus};
use crate::services::email_service::EmailSender;
use crate::services::queue_store::{self, QueueRow, EMAIL_QUEUE};

impl QueueRow for EmailQueueItem {
    fn id(&self) -> &str {
        &self.id
    }
    fn attempts(&self) -> i64 {
        self.attempts
    }
    fn max_attempts(&self) -> i64 {
        self.max_attempts
    }
    fn created_at(&self) -> &str {
        &self.created_at
    }
}

#[derive(Clone)]
pub struct EmailQueueService {
    db_pool: Pool<Sqlite>,
    sender: Arc<dyn EmailSender>,
    settings: QueueSettings,
}

impl EmailQueueService {
    pub fn new(db_pool: Pool<Sqlite>, sender: Arc<dyn EmailSender>, settings: QueueSettings) -> Self {
        Self {
            db_pool,
            sender,
            settings,
        }
    }

    pub fn settings(&self) -> &QueueSettings {
        &self.settings
    }

    /// Inserta un email en la cola en estado 'pending'.
    pub async fn enqueue(&self, req: EnqueueEmailRequest) -> ApiResult<String> {
        let recipients: Vec<String> = req
            .recipients
            .iter()
            .map(|r| r.trim().to_string())
            .filter(|r| !r.is_empty())
            .collect();
        if recipients.is_empty() {
            return Err(ApiError::BadRequest(
                "se necesita al menos un destinatario".to_string(),
            ));
        }
        if let Some(bad) = recipients.iter().chain(req.cc.iter()).find(|r| !r.contains('@')) {
            return Err(ApiError::BadRequest(format!("dirección inválida: {bad}")));
        }
        if req.subject.trim().is_empty() {
            return Err(ApiError::BadRequest("el asunto es obligatorio".to_string()));
        }

        let id = Uuid::new_v4().to_string();
        let now = now_timestamp();
        let cc = (!req.cc.is_empty()).then(|| req.cc.join(";"));
        let attachments = if req.attachments.is_empty() {
            None
        } else {
            Some(serde_json::to_string(&req.attachments).map_err(anyhow::Error::from)?)
        };
        let max_attempts = req
            .max_attempts
            .unwrap_or(self.settings.retry.max_attempts)
            .max(1);

        sqlx::query(
            r#"
            INSERT INTO email_queue (
                id, recipients, cc, subject, html_body, attachments, mandato_id,
                status, attempts, max_attempts, created_at, updated_at
            )
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, 'pending', 0, ?8, ?9, ?9)
            "#,
        )
        .bind(&id)
        .bind(recipients.join(";"))
        .bind(cc)
        .bind(&req.subject)
        .bind(&req.html_body)
        .bind(attachments)
        .bind(&req.mandato_id)
        .bind(max_attempts)
        .bind(&now)
        .execute(&self.db_pool)
        .await
        .db_context("enqueue", "email_queue")?;

        log::info!(
            "(email_queue) Encolado {} para {} destinatario(s)",
            id,
            recipients.len()
        );
        Ok(id)
    }

    /// Una pasada completa del procesador: recupera atascados y drena la cola
    /// por lotes hasta vaciarla o alcanzar el corte de tiempo.
    ///
    /// Sin SMTP configurado no se reclama nada: las filas siguen en la cola,
    /// sin gastar intentos, hasta que haya un sender real.
    pub async fn process_queue(&self) -> Result<ProcessSummary> {
        if !self.sender.is_enabled() {
            log::warn!("(email_queue) SMTP no configurado; la cola no se procesa");
            return Ok(ProcessSummary::default());
        }
        queue_store::drain(
            &self.db_pool,
            EMAIL_QUEUE,
            &self.settings,
            move |item: EmailQueueItem| async move { self.process_item(&item).await },
        )
        .await
    }

    /// Envía un email ya reclamado y deja la fila en su estado final.
    async fn process_item(&self, item: &EmailQueueItem) -> Result<QueueStatus> {
        let outgoing = match item.to_outgoing() {
            Ok(outgoing) => outgoing,
            Err(e) => {
                let error = format!("Adjuntos corruptos: {e}");
                log::error!("(email_queue) {} -> {}", item.id, error);
                let status = queue_store::mark_failure(
                    &self.db_pool,
                    EMAIL_QUEUE,
                    item,
                    &error,
                    &self.settings.retry,
                    true,
                )
                .await?;
                return Ok(status);
            }
        };

        match self.sender.send(&outgoing).await {
            Ok(message_id) => {
                queue_store::mark_completed(&self.db_pool, EMAIL_QUEUE, &item.id).await?;
                sqlx::query("UPDATE email_queue SET provider_message_id = ?1 WHERE id = ?2")
                    .bind(&message_id)
                    .bind(&item.id)
                    .execute(&self.db_pool)
                    .await
                    .context("Failed to store provider message id")?;
                log::info!("(email_queue) {} enviado ({})", item.id, message_id);
                Ok(QueueStatus::Sent)
            }
            Err(e) => {
                let error = format!("{e:#}");
                let status = queue_store::mark_failure(
                    &self.db_pool,
                    EMAIL_QUEUE,
                    item,
                    &error,
                    &self.settings.retry,
                    false,
                )
                .await?;
                log::error!(
                    "(email_queue) {} falló (intento {}/{}): {} -> {}",
                    item.id,
                    item.attempts + 1,
                    item.max_attempts,
                    error,
                    status.as_str()
                );
                Ok(status)
            }
        }
    }

    pub async fn get(&self, id: &str) -> ApiResult<EmailQueueItem> {
        queue_store::get(&self.db_pool, EMAIL_QUEUE, id).await
    }

    pub async fn list(
        &self,
        status: Option<QueueStatus>,
        limit: i64,
        offset: i64,
    ) -> ApiResult<Vec<EmailQueueItem>> {
        Ok(queue_store::list(&self.db_pool, EMAIL_QUEUE, status, limit, offset).await?)
    }

    pub async fn stats(&self) -> ApiResult<QueueStats> {
        Ok(queue_store::stats(&self.db_pool, EMAIL_QUEUE).await?)
    }

    pub async fn retry(&self, id: &str) -> ApiResult<()> {
        queue_store::manual_retry(&self.db_pool, EMAIL_QUEUE, id).await
    }

    pub async fn cancel(&self, id: &str) -> ApiResult<()> {
        queue_store::cancel(&self.db_pool, EMAIL_QUEUE, id).await
    }

    /// Reintento manual de todos los fallidos (botón "reintentar todo").
    pub async fn retry_all_failed(&self) -> Result<u64> {
        let result = sqlx::query(
            r#"
            UPDATE email_queue
            SET status = 'pending', attempts = 0, last_error = NULL,
                next_retry_at = NULL, updated_at = ?1
            WHERE status = 'failed'
            "#,
        )
        .bind(now_timestamp())
        .execute(&self.db_pool)
        .await
        .context("Failed to reset failed emails")?;
        Ok(result.rows_affected())
    }
}

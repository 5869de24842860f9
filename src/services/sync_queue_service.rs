//! services/sync_queue_service.rs
//! Sincronización de contactos y empresas con Brevo a través de la cola
//! `brevo_sync_queue`.

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde_json::json;
use sqlx::{Pool, Sqlite};
use uuid::Uuid;

use crate::config::app_config::{BrevoConfig, QueueSettings};
use crate::models::crm_model::{Contacto, Empresa};
use crate::models::error_model::{ApiResult, DbResultExt};
use crate::models::now_timestamp;
use crate::models::queue_model::{ProcessSummary, QueueStats, QueueStatus};
use crate::models::sync_model::{
    BrevoCompany, BrevoContact, SyncAction, SyncEntityType, SyncQueueItem,
};
use crate::services::crm_service::CrmService;
use crate::services::queue_store::{self, QueueRow, SYNC_QUEUE};

const BREVO_TIMEOUT: Duration = Duration::from_secs(20);

impl QueueRow for SyncQueueItem {
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

/// Error de un envío al CRM externo. `permanent` evita reintentos inútiles
/// (p.ej. un 400 por datos inválidos).
#[derive(Debug, thiserror::Error)]
#[error("{message}")]
pub struct SyncError {
    pub message: String,
    pub permanent: bool,
}

impl SyncError {
    pub fn transient(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            permanent: false,
        }
    }

    pub fn permanent(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            permanent: true,
        }
    }
}

#[async_trait]
pub trait CrmSyncClient: Send + Sync {
    /// `false` cuando no hay credenciales: la cola no se procesa.
    fn is_enabled(&self) -> bool {
        true
    }
    async fn upsert_contact(&self, contact: &BrevoContact) -> Result<(), SyncError>;
    async fn delete_contact(&self, email: &str) -> Result<(), SyncError>;
    async fn upsert_company(&self, company: &BrevoCompany) -> Result<(), SyncError>;
}

/// Cliente HTTP de la API v3 de Brevo.
pub struct BrevoClient {
    http: Client,
    base_url: String,
    api_key: String,
}

impl BrevoClient {
    pub fn new(config: &BrevoConfig) -> Result<Self> {
        let http = Client::builder()
            .timeout(BREVO_TIMEOUT)
            .build()
            .context("No se pudo crear el cliente HTTP de Brevo")?;
        Ok(Self {
            http,
            base_url: config.api_url.trim_end_matches('/').to_string(),
            api_key: config.api_key.clone(),
        })
    }

    async fn check(response: reqwest::Response) -> Result<(), SyncError> {
        let status = response.status();
        if status.is_success() {
            return Ok(());
        }
        let body = response.text().await.unwrap_or_default();
        Err(classify_status(status, &body))
    }
}

/// 429 y 5xx se reintentan; el resto de 4xx son definitivos.
pub fn classify_status(status: StatusCode, body: &str) -> SyncError {
    let message = format!("Brevo respondió {}: {}", status.as_u16(), body);
    if status == StatusCode::TOO_MANY_REQUESTS || status.is_server_error() {
        SyncError::transient(message)
    } else {
        SyncError::permanent(message)
    }
}

fn transport_error(e: reqwest::Error) -> SyncError {
    SyncError::transient(format!("Error de red con Brevo: {e}"))
}

#[async_trait]
impl CrmSyncClient for BrevoClient {
    async fn upsert_contact(&self, contact: &BrevoContact) -> Result<(), SyncError> {
        let response = self
            .http
            .post(format!("{}/v3/contacts", self.base_url))
            .header("api-key", &self.api_key)
            .json(contact)
            .send()
            .await
            .map_err(transport_error)?;
        Self::check(response).await
    }

    async fn delete_contact(&self, email: &str) -> Result<(), SyncError> {
        let response = self
            .http
            .delete(format!(
                "{}/v3/contacts/{}",
                self.base_url,
                urlencoding::encode(email)
            ))
            .header("api-key", &self.api_key)
            .send()
            .await
            .map_err(transport_error)?;
        // Borrar algo que ya no existe cuenta como hecho.
        if response.status() == StatusCode::NOT_FOUND {
            return Ok(());
        }
        Self::check(response).await
    }

    async fn upsert_company(&self, company: &BrevoCompany) -> Result<(), SyncError> {
        let response = self
            .http
            .post(format!("{}/v3/companies", self.base_url))
            .header("api-key", &self.api_key)
            .json(company)
            .send()
            .await
            .map_err(transport_error)?;
        Self::check(response).await
    }
}

/// Sin credenciales de Brevo. El procesador no llega a llamarlo porque
/// `is_enabled` es false; si se llama, el error es transitorio.
pub struct DisabledSyncClient;

#[async_trait]
impl CrmSyncClient for DisabledSyncClient {
    fn is_enabled(&self) -> bool {
        false
    }
    async fn upsert_contact(&self, _contact: &BrevoContact) -> Result<(), SyncError> {
        Err(SyncError::transient("Brevo no configurado"))
    }
    async fn delete_contact(&self, _email: &str) -> Result<(), SyncError> {
        Err(SyncError::transient("Brevo no configurado"))
    }
    async fn upsert_company(&self, _company: &BrevoCompany) -> Result<(), SyncError> {
        Err(SyncError::transient("Brevo no configurado"))
    }
}

pub fn contact_to_brevo(contacto: &Contacto, empresa: Option<&Empresa>) -> Option<BrevoContact> {
    let email = contacto.email.as_deref()?.trim();
    if email.is_empty() {
        return None;
    }
    Some(BrevoContact {
        email: email.to_lowercase(),
        attributes: json!({
            "NOMBRE": contacto.nombre,
            "APELLIDOS": contacto.apellidos.clone().unwrap_or_default(),
            "TELEFONO": contacto.telefono.clone().unwrap_or_default(),
            "CARGO": contacto.cargo.clone().unwrap_or_default(),
            "EMPRESA": empresa.map(|e| e.nombre.clone()).unwrap_or_default(),
        }),
        update_enabled: true,
    })
}

pub fn company_to_brevo(empresa: &Empresa) -> BrevoCompany {
    BrevoCompany {
        name: empresa.nombre.clone(),
        attributes: json!({
            "cif": empresa.cif,
            "sector": empresa.sector,
            "ciudad": empresa.ciudad,
            "pais": empresa.pais,
            "domain": empresa.web,
            "revenue": empresa.facturacion,
            "number_of_employees": empresa.empleados,
        }),
    }
}

#[derive(Clone)]
pub struct SyncQueueService {
    db_pool: Pool<Sqlite>,
    crm: CrmService,
    client: Arc<dyn CrmSyncClient>,
    settings: QueueSettings,
}

impl SyncQueueService {
    pub fn new(
        db_pool: Pool<Sqlite>,
        crm: CrmService,
        client: Arc<dyn CrmSyncClient>,
        settings: QueueSettings,
    ) -> Self {
        Self {
            db_pool,
            crm,
            client,
            settings,
        }
    }

    /// Encola una sincronización. Si ya hay una pendiente para la misma
    /// entidad, acción y payload se reutiliza. `payload` guarda una foto de
    /// los datos necesarios cuando la entidad ya no existirá al procesar
    /// (borrados, o el email anterior tras un cambio de email).
    ///
    /// Un borrado cancela las actualizaciones pendientes de la misma entidad.
    pub async fn enqueue(
        &self,
        entity_type: SyncEntityType,
        entity_id: &str,
        action: SyncAction,
        payload: Option<serde_json::Value>,
    ) -> ApiResult<String> {
        let payload = payload.map(|p| p.to_string());
        let existing: Option<(String,)> = sqlx::query_as(
            r#"
            SELECT id FROM brevo_sync_queue
            WHERE entity_type = ?1 AND entity_id = ?2 AND action = ?3
              AND payload IS ?4
              AND status IN ('pending', 'retry')
            LIMIT 1
            "#,
        )
        .bind(entity_type)
        .bind(entity_id)
        .bind(action)
        .bind(&payload)
        .fetch_optional(&self.db_pool)
        .await
        .db_context("enqueue_dedup", "brevo_sync_queue")?;

        if let Some((id,)) = existing {
            log::debug!("(crm_sync) {} ya estaba en cola ({})", entity_id, id);
            return Ok(id);
        }

        let id = Uuid::new_v4().to_string();
        let now = now_timestamp();
        let mut tx = self
            .db_pool
            .begin()
            .await
            .db_context("enqueue", "brevo_sync_queue")?;

        if action == SyncAction::Delete {
            let superseded = sqlx::query(
                r#"
                UPDATE brevo_sync_queue
                SET status = 'cancelled', last_error = 'sustituida por un borrado',
                    next_retry_at = NULL, updated_at = ?3
                WHERE entity_type = ?1 AND entity_id = ?2 AND action = 'upsert'
                  AND status IN ('pending', 'retry')
                "#,
            )
            .bind(entity_type)
            .bind(entity_id)
            .bind(&now)
            .execute(&mut *tx)
            .await
            .db_context("enqueue_supersede", "brevo_sync_queue")?
            .rows_affected();
            if superseded > 0 {
                log::info!(
                    "(crm_sync) {} actualización(es) pendientes de {} canceladas por el borrado",
                    superseded,
                    entity_id
                );
            }
        }

        sqlx::query(
            r#"
            INSERT INTO brevo_sync_queue (
                id, entity_type, entity_id, action, payload, status,
                attempts, max_attempts, created_at, updated_at
            )
            VALUES (?1, ?2, ?3, ?4, ?5, 'pending', 0, ?6, ?7, ?7)
            "#,
        )
        .bind(&id)
        .bind(entity_type)
        .bind(entity_id)
        .bind(action)
        .bind(&payload)
        .bind(self.settings.retry.max_attempts)
        .bind(&now)
        .execute(&mut *tx)
        .await
        .db_context("enqueue", "brevo_sync_queue")?;

        tx.commit().await.db_context("enqueue", "brevo_sync_queue")?;
        Ok(id)
    }

    /// Igual que `enqueue` pero sin propagar el error: se usa tras crear o
    /// editar entidades, donde un fallo al encolar no debe romper la petición.
    pub async fn enqueue_quietly(
        &self,
        entity_type: SyncEntityType,
        entity_id: &str,
        action: SyncAction,
        payload: Option<serde_json::Value>,
    ) {
        if let Err(e) = self.enqueue(entity_type, entity_id, action, payload).await {
            log::error!("(crm_sync) No se pudo encolar {}: {}", entity_id, e);
        }
    }

    /// Sin credenciales de Brevo la cola no se procesa y las filas conservan
    /// sus intentos.
    pub async fn process_queue(&self) -> Result<ProcessSummary> {
        if !self.client.is_enabled() {
            log::warn!("(crm_sync) Brevo no configurado; la cola no se procesa");
            return Ok(ProcessSummary::default());
        }
        queue_store::drain(
            &self.db_pool,
            SYNC_QUEUE,
            &self.settings,
            move |item: SyncQueueItem| async move { self.process_item(&item).await },
        )
        .await
    }

    async fn process_item(&self, item: &SyncQueueItem) -> Result<QueueStatus> {
        match self.sync_item(item).await {
            Ok(()) => {
                queue_store::mark_completed(&self.db_pool, SYNC_QUEUE, &item.id).await?;
                Ok(QueueStatus::Sent)
            }
            Err(e) => {
                log::error!(
                    "(crm_sync) {} {:?}/{} falló: {}",
                    item.id,
                    item.entity_type,
                    item.entity_id,
                    e
                );
                let status = queue_store::mark_failure(
                    &self.db_pool,
                    SYNC_QUEUE,
                    item,
                    &e.message,
                    &self.settings.retry,
                    e.permanent,
                )
                .await?;
                Ok(status)
            }
        }
    }

    async fn sync_item(&self, item: &SyncQueueItem) -> Result<(), SyncError> {
        match (item.entity_type, item.action) {
            (SyncEntityType::Contacto, SyncAction::Upsert) => {
                // Un contacto ausente solo llega aquí si se borró sin pasar por
                // la API: el borrado por la API cancela las actualizaciones.
                let contacto = self
                    .crm
                    .find_contacto(&item.entity_id)
                    .await
                    .map_err(|e| SyncError::transient(e.to_string()))?
                    .ok_or_else(|| SyncError::permanent("el contacto ya no existe"))?;
                let empresa = match contacto.empresa_id.as_deref() {
                    Some(empresa_id) => self
                        .crm
                        .find_empresa(empresa_id)
                        .await
                        .map_err(|e| SyncError::transient(e.to_string()))?,
                    None => None,
                };
                let brevo = contact_to_brevo(&contacto, empresa.as_ref())
                    .ok_or_else(|| SyncError::permanent("el contacto no tiene email"))?;
                self.client.upsert_contact(&brevo).await
            }
            (SyncEntityType::Contacto, SyncAction::Delete) => {
                let email = item
                    .payload
                    .as_deref()
                    .and_then(|p| serde_json::from_str::<serde_json::Value>(p).ok())
                    .and_then(|p| p.get("email").and_then(|e| e.as_str()).map(str::to_string))
                    .ok_or_else(|| SyncError::permanent("falta el email para el borrado"))?;
                self.client.delete_contact(&email).await
            }
            (SyncEntityType::Empresa, SyncAction::Upsert) => {
                let empresa = self
                    .crm
                    .find_empresa(&item.entity_id)
                    .await
                    .map_err(|e| SyncError::transient(e.to_string()))?
                    .ok_or_else(|| SyncError::permanent("la empresa ya no existe"))?;
                self.client.upsert_company(&company_to_brevo(&empresa)).await
            }
            (SyncEntityType::Empresa, SyncAction::Delete) => Err(SyncError::permanent(
                "el borrado de empresas no se sincroniza",
            )),
        }
    }

    pub async fn list(
        &self,
        status: Option<QueueStatus>,
        limit: i64,
        offset: i64,
    ) -> ApiResult<Vec<SyncQueueItem>> {
        Ok(queue_store::list(&self.db_pool, SYNC_QUEUE, status, limit, offset).await?)
    }

    pub async fn retry(&self, id: &str) -> ApiResult<()> {
        queue_store::manual_retry(&self.db_pool, SYNC_QUEUE, id).await
    }

    pub async fn stats(&self) -> ApiResult<QueueStats> {
        Ok(queue_store::stats(&self.db_pool, SYNC_QUEUE).await?)
    }
}

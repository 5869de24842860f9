//! models/sync_model.rs
//! Cola de sincronización con el CRM externo (Brevo).

use serde::{Deserialize, Serialize};

use crate::models::queue_model::QueueStatus;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "snake_case")]
#[sqlx(rename_all = "snake_case")]
pub enum SyncEntityType {
    Contacto,
    Empresa,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "snake_case")]
#[sqlx(rename_all = "snake_case")]
pub enum SyncAction {
    Upsert,
    Delete,
}

#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct SyncQueueItem {
    pub id: String,
    pub entity_type: SyncEntityType,
    pub entity_id: String,
    pub action: SyncAction,
    pub payload: Option<String>,
    pub status: QueueStatus,
    pub attempts: i64,
    pub max_attempts: i64,
    pub last_error: Option<String>,
    pub next_retry_at: Option<String>,
    pub sending_started_at: Option<String>,
    pub processed_at: Option<String>,
    pub created_at: String,
    pub updated_at: String,
}

/// POST /api/crm-sync
#[derive(Debug, Clone, Deserialize)]
pub struct EnqueueSyncRequest {
    pub entity_type: SyncEntityType,
    pub entity_id: String,
    pub action: SyncAction,
    #[serde(default)]
    pub payload: Option<serde_json::Value>,
}

/// Contacto tal y como lo espera la API de contactos de Brevo.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct BrevoContact {
    pub email: String,
    pub attributes: serde_json::Value,
    #[serde(rename = "updateEnabled")]
    pub update_enabled: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct BrevoCompany {
    pub name: String,
    pub attributes: serde_json::Value,
}

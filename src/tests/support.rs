//! tests/support.rs
//! Utilidades compartidas: base de datos en memoria y proveedores falsos.

use std::str::FromStr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions};
use sqlx::{Pool, Sqlite};
use tempfile::TempDir;

use crate::config::app_config::QueueSettings;
use crate::models::crm_model::{ContactoInput, EmpresaInput, MandatoInput, MandatoTipo};
use crate::models::email_model::{EnqueueEmailRequest, OutgoingEmail};
use crate::models::sync_model::{BrevoCompany, BrevoContact};
use crate::services::ai_task_service::{AiTaskError, GatewayReply, LlmGateway};
use crate::services::crm_service::CrmService;
use crate::services::email_service::EmailSender;
use crate::services::operation_service::OperationService;
use crate::services::sync_queue_service::{CrmSyncClient, SyncError};

/// Una sola conexión que no caduca: cada conexión `:memory:` es una base
/// distinta.
pub async fn test_pool() -> Pool<Sqlite> {
    let options = SqliteConnectOptions::from_str("sqlite::memory:")
        .expect("opciones sqlite")
        .foreign_keys(true);
    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .idle_timeout(None)
        .max_lifetime(None)
        .connect_with(options)
        .await
        .expect("pool en memoria");
    OperationService::new(pool.clone())
        .run_migrations()
        .await
        .expect("migraciones");
    pool
}

/// Base de datos en fichero con WAL y varias conexiones, como la de
/// producción. Vive mientras viva `dir`.
pub async fn file_pool(dir: &TempDir, max_connections: u32) -> Pool<Sqlite> {
    let options = SqliteConnectOptions::new()
        .filename(dir.path().join("crm.db"))
        .create_if_missing(true)
        .journal_mode(SqliteJournalMode::Wal)
        .busy_timeout(Duration::from_secs(5))
        .foreign_keys(true);
    let pool = SqlitePoolOptions::new()
        .max_connections(max_connections)
        .connect_with(options)
        .await
        .expect("pool en fichero");
    OperationService::new(pool.clone())
        .run_migrations()
        .await
        .expect("migraciones");
    pool
}

pub fn fast_settings() -> QueueSettings {
    QueueSettings {
        batch_delay: Duration::ZERO,
        ..QueueSettings::default()
    }
}

pub fn email_request(to: &str) -> EnqueueEmailRequest {
    EnqueueEmailRequest {
        recipients: vec![to.to_string()],
        cc: Vec::new(),
        subject: "Teaser Proyecto Atlas".to_string(),
        html_body: "<p>Adjuntamos el teaser.</p>".to_string(),
        attachments: Vec::new(),
        mandato_id: None,
        max_attempts: None,
    }
}

/// Sender en memoria. `fail` hace fallar todos los envíos; `delay` simula
/// un proveedor lento.
#[derive(Default)]
pub struct FakeSender {
    pub fail: bool,
    pub delay: Option<Duration>,
    pub sent: Mutex<Vec<OutgoingEmail>>,
    pub calls: AtomicUsize,
}

impl FakeSender {
    pub fn ok() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn failing() -> Arc<Self> {
        Arc::new(Self {
            fail: true,
            ..Self::default()
        })
    }

    pub fn slow(delay: Duration) -> Arc<Self> {
        Arc::new(Self {
            delay: Some(delay),
            ..Self::default()
        })
    }

    pub fn sent_count(&self) -> usize {
        self.sent.lock().map(|s| s.len()).unwrap_or(0)
    }
}

#[async_trait]
impl EmailSender for FakeSender {
    async fn send(&self, email: &OutgoingEmail) -> Result<String> {
        let n = self.calls.fetch_add(1, Ordering::SeqCst);
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        if self.fail {
            return Err(anyhow!("conexión rechazada por el proveedor"));
        }
        self.sent
            .lock()
            .map_err(|_| anyhow!("mutex envenenado"))?
            .push(email.clone());
        Ok(format!("<fake-{n}@test>"))
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum SyncCall {
    UpsertContact(String),
    DeleteContact(String),
    UpsertCompany(String),
}

/// Cliente de CRM en memoria. `error` se devuelve en todas las llamadas.
#[derive(Default)]
pub struct FakeSyncClient {
    pub error: Option<(String, bool)>,
    pub calls: Mutex<Vec<SyncCall>>,
}

impl FakeSyncClient {
    pub fn ok() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn failing(message: &str, permanent: bool) -> Arc<Self> {
        Arc::new(Self {
            error: Some((message.to_string(), permanent)),
            ..Self::default()
        })
    }

    pub fn calls(&self) -> Vec<SyncCall> {
        self.calls.lock().map(|c| c.clone()).unwrap_or_default()
    }

    fn record(&self, call: SyncCall) -> Result<(), SyncError> {
        if let Ok(mut calls) = self.calls.lock() {
            calls.push(call);
        }
        match &self.error {
            Some((message, true)) => Err(SyncError::permanent(message.clone())),
            Some((message, false)) => Err(SyncError::transient(message.clone())),
            None => Ok(()),
        }
    }
}

#[async_trait]
impl CrmSyncClient for FakeSyncClient {
    async fn upsert_contact(&self, contact: &BrevoContact) -> Result<(), SyncError> {
        self.record(SyncCall::UpsertContact(contact.email.clone()))
    }

    async fn delete_contact(&self, email: &str) -> Result<(), SyncError> {
        self.record(SyncCall::DeleteContact(email.to_string()))
    }

    async fn upsert_company(&self, company: &BrevoCompany) -> Result<(), SyncError> {
        self.record(SyncCall::UpsertCompany(company.name.clone()))
    }
}

/// Gateway de IA con respuesta fija.
pub struct FakeGateway {
    pub reply: GatewayReply,
    pub calls: AtomicUsize,
}

impl FakeGateway {
    pub fn replying(status: u16, body: &str) -> Arc<Self> {
        Arc::new(Self {
            reply: GatewayReply {
                status,
                body: body.to_string(),
            },
            calls: AtomicUsize::new(0),
        })
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl LlmGateway for FakeGateway {
    async fn chat(&self, _system: &str, _user: &str) -> Result<GatewayReply, AiTaskError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.reply.clone())
    }
}

/// Cuerpo chat-completions con `content` como mensaje del asistente.
pub fn completion_body(content: &str) -> String {
    serde_json::json!({
        "id": "chatcmpl-test",
        "choices": [
            { "index": 0, "message": { "role": "assistant", "content": content } }
        ]
    })
    .to_string()
}

pub async fn seed_empresa(crm: &CrmService, nombre: &str, cif: Option<&str>) -> String {
    crm.create_empresa(EmpresaInput {
        nombre: Some(nombre.to_string()),
        cif: cif.map(str::to_string),
        sector: Some("Industrial".to_string()),
        ..EmpresaInput::default()
    })
    .await
    .expect("empresa")
    .id
}

pub async fn seed_contacto(
    crm: &CrmService,
    nombre: &str,
    email: Option<&str>,
    empresa_id: Option<&str>,
) -> String {
    crm.create_contacto(ContactoInput {
        nombre: Some(nombre.to_string()),
        email: email.map(str::to_string),
        empresa_id: empresa_id.map(str::to_string),
        ..ContactoInput::default()
    })
    .await
    .expect("contacto")
    .id
}

pub async fn seed_mandato(crm: &CrmService, nombre: &str, valor: Option<f64>) -> String {
    crm.create_mandato(MandatoInput {
        nombre: Some(nombre.to_string()),
        tipo: Some(MandatoTipo::Venta),
        valor_estimado: valor,
        ..MandatoInput::default()
    })
    .await
    .expect("mandato")
    .id
}

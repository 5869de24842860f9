use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use actix_web::{web, App, HttpServer};
use anyhow::{Context, Result};
use dotenv::dotenv;
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions};
use sqlx::{Pool, Sqlite};

use crate::config::app_config::AppConfig;
use crate::config::document_config::DocumentLayout;
use crate::logger::init_logger;
use crate::models::operation_model::OperationType;
use crate::services::ai_task_service::{AiTaskService, DisabledLlmGateway, HttpLlmGateway, LlmGateway};
use crate::services::crm_service::CrmService;
use crate::services::document_service::DocumentService;
use crate::services::email_queue_service::EmailQueueService;
use crate::services::email_service::{DisabledEmailSender, EmailSender, SmtpEmailSender};
use crate::services::import_service::ImportService;
use crate::services::operation_service::OperationService;
use crate::services::pdf_service::{PdfService, DOCUMENTS_DIR};
use crate::services::search_service::SearchService;
use crate::services::sync_queue_service::{
    BrevoClient, CrmSyncClient, DisabledSyncClient, SyncQueueService,
};
use crate::services::task_service::TaskService;

mod app;
mod config;
mod handlers;
mod logger;
mod models;
mod services;

#[cfg(test)]
mod tests;

async fn setup_database(database_url: &str) -> Result<Pool<Sqlite>> {
    // Crear la carpeta del fichero si no existe (p.ej. ./data)
    if let Some(path) = database_url.strip_prefix("sqlite:") {
        let path = path.trim_start_matches("//");
        if let Some(parent) = std::path::Path::new(path).parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)
                    .with_context(|| format!("No se pudo crear el directorio {:?}", parent))?;
            }
        }
    }

    log::info!("Conectando a SQLite en {}", database_url);
    let options = SqliteConnectOptions::from_str(database_url)
        .context("DATABASE_URL inválida")?
        .create_if_missing(true)
        .journal_mode(SqliteJournalMode::Wal)
        .busy_timeout(Duration::from_secs(5))
        .foreign_keys(true);

    SqlitePoolOptions::new()
        .max_connections(8)
        .connect_with(options)
        .await
        .context("No se pudo conectar a la base de datos SQLite")
}

fn build_email_sender(config: &AppConfig) -> Arc<dyn EmailSender> {
    match &config.smtp {
        Some(smtp) => match SmtpEmailSender::new(smtp, &config.email_from, &config.email_from_name) {
            Ok(sender) => Arc::new(sender),
            Err(e) => {
                log::error!("Configuración SMTP inválida: {:?}", e);
                Arc::new(DisabledEmailSender)
            }
        },
        None => Arc::new(DisabledEmailSender),
    }
}

fn build_sync_client(config: &AppConfig) -> Arc<dyn CrmSyncClient> {
    match &config.brevo {
        Some(brevo) => match BrevoClient::new(brevo) {
            Ok(client) => Arc::new(client),
            Err(e) => {
                log::error!("No se pudo crear el cliente de Brevo: {:?}", e);
                Arc::new(DisabledSyncClient)
            }
        },
        None => Arc::new(DisabledSyncClient),
    }
}

fn build_llm_gateway(config: &AppConfig) -> Arc<dyn LlmGateway> {
    match config.llm.clone() {
        Some(llm) => match HttpLlmGateway::new(llm) {
            Ok(gateway) => Arc::new(gateway),
            Err(e) => {
                log::error!("No se pudo crear el cliente del gateway de IA: {:?}", e);
                Arc::new(DisabledLlmGateway)
            }
        },
        None => Arc::new(DisabledLlmGateway),
    }
}

/// Procesa ambas colas cada `worker_interval`, registrando cada pasada.
fn spawn_queue_worker(
    email_queue: EmailQueueService,
    sync_queue: SyncQueueService,
    operations: OperationService,
) {
    let interval = email_queue.settings().worker_interval;
    log::info!("Worker de colas activo cada {}s", interval.as_secs());
    actix_rt::spawn(async move {
        loop {
            let (email, sync) = futures_util::future::join(
                operations.track(OperationType::EmailQueue, email_queue.process_queue()),
                operations.track(OperationType::CrmSync, sync_queue.process_queue()),
            )
            .await;
            if let Err(e) = email {
                log::error!("Worker: fallo procesando la cola de emails: {:?}", e);
            }
            if let Err(e) = sync {
                log::error!("Worker: fallo procesando la cola de Brevo: {:?}", e);
            }
            tokio::time::sleep(interval).await;
        }
    });
}

#[actix_web::main]
async fn main() -> Result<()> {
    dotenv().ok(); // Cargar .env al inicio
    init_logger();

    let config = AppConfig::from_env();
    let db_pool = setup_database(&config.database_url).await?;

    let operation_service = OperationService::new(db_pool.clone());
    operation_service.run_migrations().await?;

    let crm_service = CrmService::new(db_pool.clone());
    let email_queue_service = EmailQueueService::new(
        db_pool.clone(),
        build_email_sender(&config),
        config.queue.clone(),
    );
    let sync_queue_service = SyncQueueService::new(
        db_pool.clone(),
        crm_service.clone(),
        build_sync_client(&config),
        config.queue.clone(),
    );
    let task_service = TaskService::new(db_pool.clone(), config.default_task_assignee.clone());
    let ai_task_service = AiTaskService::new(build_llm_gateway(&config));
    let search_service = SearchService::new(crm_service.clone());
    let import_service = ImportService::new(crm_service.clone(), sync_queue_service.clone());
    let pdf_service = PdfService::new(DOCUMENTS_DIR);
    let document_service = DocumentService::new(pdf_service.clone(), DocumentLayout::default());

    if !config.queue.worker_interval.is_zero() {
        spawn_queue_worker(
            email_queue_service.clone(),
            sync_queue_service.clone(),
            operation_service.clone(),
        );
    }

    let bind = (config.host.clone(), config.port);
    log::info!("Levantando servidor en {}:{}", bind.0, bind.1);
    HttpServer::new(move || {
        App::new()
            .app_data(web::Data::new(config.clone()))
            .app_data(web::Data::new(operation_service.clone()))
            .app_data(web::Data::new(crm_service.clone()))
            .app_data(web::Data::new(email_queue_service.clone()))
            .app_data(web::Data::new(sync_queue_service.clone()))
            .app_data(web::Data::new(task_service.clone()))
            .app_data(web::Data::new(ai_task_service.clone()))
            .app_data(web::Data::new(search_service.clone()))
            .app_data(web::Data::new(import_service.clone()))
            .app_data(web::Data::new(pdf_service.clone()))
            .app_data(web::Data::new(document_service.clone()))
            .configure(app::init_app)
    })
    .bind(bind)?
    .run()
    .await?;

    Ok(())
}

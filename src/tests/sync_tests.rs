//! tests/sync_tests.rs
//! Cola de sincronización con Brevo.

use std::sync::Arc;

use reqwest::StatusCode;
use serde_json::json;

use crate::models::crm_model::Contacto;
use crate::models::queue_model::QueueStatus;
use crate::models::sync_model::{SyncAction, SyncEntityType, SyncQueueItem};
use crate::services::crm_service::CrmService;
use crate::services::sync_queue_service::{
    classify_status, company_to_brevo, contact_to_brevo, CrmSyncClient, DisabledSyncClient,
    SyncQueueService,
};
use crate::tests::support::{
    fast_settings, seed_contacto, seed_empresa, test_pool, FakeSyncClient, SyncCall,
};

async fn setup(client: Arc<dyn CrmSyncClient>) -> (CrmService, SyncQueueService) {
    let pool = test_pool().await;
    let crm = CrmService::new(pool.clone());
    let sync = SyncQueueService::new(pool, crm.clone(), client, fast_settings());
    (crm, sync)
}

async fn only_item(sync: &SyncQueueService) -> SyncQueueItem {
    let mut items = sync.list(None, 10, 0).await.expect("listar");
    assert_eq!(items.len(), 1);
    items.remove(0)
}

#[actix_rt::test]
async fn pending_enqueues_are_deduplicated() {
    let (crm, sync) = setup(FakeSyncClient::ok()).await;
    let id = seed_contacto(&crm, "Ana", Some("ana@alfa.es"), None).await;

    let first = sync
        .enqueue(SyncEntityType::Contacto, &id, SyncAction::Upsert, None)
        .await
        .expect("encolar");
    let second = sync
        .enqueue(SyncEntityType::Contacto, &id, SyncAction::Upsert, None)
        .await
        .expect("encolar");
    assert_eq!(first, second);

    // Otra acción sobre la misma entidad sí es una fila nueva
    let delete = sync
        .enqueue(
            SyncEntityType::Contacto,
            &id,
            SyncAction::Delete,
            Some(json!({ "email": "ana@alfa.es" })),
        )
        .await
        .expect("encolar");
    assert_ne!(first, delete);
    assert_eq!(sync.stats().await.expect("stats").total, 2);
}

#[actix_rt::test]
async fn upserts_contacts_and_companies() {
    let client = FakeSyncClient::ok();
    let (crm, sync) = setup(client.clone()).await;
    let empresa = seed_empresa(&crm, "Alfa SL", Some("B11111111")).await;
    let contacto = seed_contacto(&crm, "Ana", Some("Ana@Alfa.es"), Some(&empresa)).await;

    sync.enqueue(SyncEntityType::Empresa, &empresa, SyncAction::Upsert, None)
        .await
        .expect("encolar");
    sync.enqueue(SyncEntityType::Contacto, &contacto, SyncAction::Upsert, None)
        .await
        .expect("encolar");

    let summary = sync.process_queue().await.expect("procesar");
    assert_eq!(summary.processed, 2);
    assert_eq!(summary.sent, 2);

    let calls = client.calls();
    assert!(calls.contains(&SyncCall::UpsertCompany("Alfa SL".to_string())));
    assert!(calls.contains(&SyncCall::UpsertContact("ana@alfa.es".to_string())));

    let sent = sync
        .list(Some(QueueStatus::Sent), 10, 0)
        .await
        .expect("listar");
    assert_eq!(sent.len(), 2);
    assert!(sent.iter().all(|item| item.processed_at.is_some()));
}

#[actix_rt::test]
async fn contact_without_email_fails_permanently() {
    let client = FakeSyncClient::ok();
    let (crm, sync) = setup(client.clone()).await;
    let id = seed_contacto(&crm, "Sin email", None, None).await;
    sync.enqueue(SyncEntityType::Contacto, &id, SyncAction::Upsert, None)
        .await
        .expect("encolar");

    let summary = sync.process_queue().await.expect("procesar");
    assert_eq!(summary.failed, 1);
    assert!(client.calls().is_empty());

    let item = only_item(&sync).await;
    assert_eq!(item.status, QueueStatus::Failed);
    assert_eq!(item.last_error.as_deref(), Some("el contacto no tiene email"));
}

#[actix_rt::test]
async fn deleted_entity_fails_permanently() {
    let (_crm, sync) = setup(FakeSyncClient::ok()).await;
    sync.enqueue(SyncEntityType::Empresa, "no-existe", SyncAction::Upsert, None)
        .await
        .expect("encolar");

    sync.process_queue().await.expect("procesar");
    let item = only_item(&sync).await;
    assert_eq!(item.status, QueueStatus::Failed);
    assert_eq!(item.attempts, 1);
}

#[actix_rt::test]
async fn transient_errors_are_retried_with_backoff() {
    let client = FakeSyncClient::failing("Brevo respondió 503: mantenimiento", false);
    let (crm, sync) = setup(client.clone()).await;
    let id = seed_empresa(&crm, "Alfa SL", None).await;
    sync.enqueue(SyncEntityType::Empresa, &id, SyncAction::Upsert, None)
        .await
        .expect("encolar");

    let summary = sync.process_queue().await.expect("procesar");
    assert_eq!(summary.retried, 1);

    let item = only_item(&sync).await;
    assert_eq!(item.status, QueueStatus::Retry);
    assert_eq!(item.attempts, 1);
    assert!(item.next_retry_at.is_some());

    // Aún no toca: una segunda pasada no vuelve a llamar al cliente
    sync.process_queue().await.expect("procesar");
    assert_eq!(client.calls().len(), 1);

    // Un reintento manual lo deja pendiente de inmediato
    sync.retry(&item.id).await.expect("reintentar");
    assert_eq!(only_item(&sync).await.status, QueueStatus::Pending);
}

#[actix_rt::test]
async fn permanent_client_errors_are_not_retried() {
    let client = FakeSyncClient::failing("Brevo respondió 400: invalid_parameter", true);
    let (crm, sync) = setup(client).await;
    let id = seed_contacto(&crm, "Ana", Some("ana@alfa.es"), None).await;
    sync.enqueue(SyncEntityType::Contacto, &id, SyncAction::Upsert, None)
        .await
        .expect("encolar");

    sync.process_queue().await.expect("procesar");
    let item = only_item(&sync).await;
    assert_eq!(item.status, QueueStatus::Failed);
    assert_eq!(item.attempts, 1);
}

#[actix_rt::test]
async fn delete_uses_email_from_payload() {
    let client = FakeSyncClient::ok();
    let (crm, sync) = setup(client.clone()).await;
    let id = seed_contacto(&crm, "Ana", Some("ana@alfa.es"), None).await;
    crm.delete_contacto(&id).await.expect("borrar");

    sync.enqueue(
        SyncEntityType::Contacto,
        &id,
        SyncAction::Delete,
        Some(json!({ "email": "ana@alfa.es" })),
    )
    .await
    .expect("encolar");
    sync.enqueue(SyncEntityType::Contacto, "otro", SyncAction::Delete, None)
        .await
        .expect("encolar");

    let summary = sync.process_queue().await.expect("procesar");
    assert_eq!(summary.sent, 1);
    assert_eq!(summary.failed, 1);
    assert_eq!(
        client.calls(),
        vec![SyncCall::DeleteContact("ana@alfa.es".to_string())]
    );
}

#[actix_rt::test]
async fn delete_cancels_pending_upsert_of_the_same_contact() {
    let client = FakeSyncClient::ok();
    let (crm, sync) = setup(client.clone()).await;
    let id = seed_contacto(&crm, "Ana", Some("ana@alfa.es"), None).await;
    let upsert = sync
        .enqueue(SyncEntityType::Contacto, &id, SyncAction::Upsert, None)
        .await
        .expect("encolar");

    crm.delete_contacto(&id).await.expect("borrar");
    sync.enqueue(
        SyncEntityType::Contacto,
        &id,
        SyncAction::Delete,
        Some(json!({ "email": "ana@alfa.es" })),
    )
    .await
    .expect("encolar");

    let summary = sync.process_queue().await.expect("procesar");
    assert_eq!(summary.processed, 1);
    assert_eq!(summary.failed, 0);
    assert_eq!(
        client.calls(),
        vec![SyncCall::DeleteContact("ana@alfa.es".to_string())]
    );

    let cancelled = sync
        .list(Some(QueueStatus::Cancelled), 10, 0)
        .await
        .expect("listar");
    assert_eq!(cancelled.len(), 1);
    assert_eq!(cancelled[0].id, upsert);
}

#[actix_rt::test]
async fn deletes_with_different_emails_are_not_merged() {
    let (_crm, sync) = setup(FakeSyncClient::ok()).await;
    let first = sync
        .enqueue(
            SyncEntityType::Contacto,
            "c1",
            SyncAction::Delete,
            Some(json!({ "email": "ana@alfa.es" })),
        )
        .await
        .expect("encolar");
    let second = sync
        .enqueue(
            SyncEntityType::Contacto,
            "c1",
            SyncAction::Delete,
            Some(json!({ "email": "ana@beta.es" })),
        )
        .await
        .expect("encolar");
    assert_ne!(first, second);
}

#[actix_rt::test]
async fn disabled_client_keeps_rows_pending() {
    let (crm, sync) = setup(Arc::new(DisabledSyncClient)).await;
    let id = seed_empresa(&crm, "Alfa SL", None).await;
    sync.enqueue(SyncEntityType::Empresa, &id, SyncAction::Upsert, None)
        .await
        .expect("encolar");

    for _ in 0..4 {
        assert_eq!(sync.process_queue().await.expect("procesar").processed, 0);
    }
    let item = only_item(&sync).await;
    assert_eq!(item.status, QueueStatus::Pending);
    assert_eq!(item.attempts, 0);
}

#[test]
fn status_classification() {
    assert!(!classify_status(StatusCode::TOO_MANY_REQUESTS, "").permanent);
    assert!(!classify_status(StatusCode::BAD_GATEWAY, "").permanent);
    assert!(classify_status(StatusCode::BAD_REQUEST, "duplicate_parameter").permanent);
    assert!(classify_status(StatusCode::UNAUTHORIZED, "").permanent);
    assert!(classify_status(StatusCode::BAD_REQUEST, "x")
        .message
        .contains("400"));
}

#[test]
fn brevo_payloads() {
    let contacto = Contacto {
        id: "c1".to_string(),
        nombre: "Ana".to_string(),
        apellidos: Some("García".to_string()),
        email: Some(" Ana@Alfa.ES ".to_string()),
        telefono: None,
        cargo: Some("CEO".to_string()),
        empresa_id: None,
        notas: None,
        created_at: "2026-10-19T09:00:00.000Z".to_string(),
        updated_at: "2026-10-19T09:00:00.000Z".to_string(),
    };
    let brevo = contact_to_brevo(&contacto, None).expect("tiene email");
    assert_eq!(brevo.email, "ana@alfa.es");
    assert_eq!(brevo.attributes["APELLIDOS"], "García");
    assert_eq!(brevo.attributes["EMPRESA"], "");
    assert!(brevo.update_enabled);

    let sin_email = Contacto {
        email: Some("   ".to_string()),
        ..contacto
    };
    assert!(contact_to_brevo(&sin_email, None).is_none());
}

#[actix_rt::test]
async fn company_payload_carries_attributes() {
    let (crm, _sync) = setup(FakeSyncClient::ok()).await;
    let id = seed_empresa(&crm, "Alfa SL", Some("b11111111")).await;
    let empresa = crm.get_empresa(&id).await.expect("empresa");

    let company = company_to_brevo(&empresa);
    assert_eq!(company.name, "Alfa SL");
    assert_eq!(company.attributes["cif"], "B11111111");
    assert_eq!(company.attributes["sector"], "Industrial");
}

//! tests/handler_tests.rs
//! Rutas HTTP montadas con `app::init_app` sobre servicios en memoria.

use std::sync::Arc;

use actix_web::http::{header, StatusCode};
use actix_web::{test, web, App};
use serde_json::{json, Value};

use crate::app;
use crate::config::app_config::AppConfig;
use crate::config::document_config::DocumentLayout;
use crate::services::ai_task_service::{AiTaskService, LlmGateway};
use crate::services::crm_service::CrmService;
use crate::services::document_service::DocumentService;
use crate::services::email_queue_service::EmailQueueService;
use crate::services::import_service::ImportService;
use crate::services::operation_service::OperationService;
use crate::services::pdf_service::PdfService;
use crate::services::search_service::SearchService;
use crate::services::sync_queue_service::SyncQueueService;
use crate::services::task_service::TaskService;
use crate::tests::support::{
    completion_body, fast_settings, seed_contacto, seed_empresa, seed_mandato, test_pool,
    FakeGateway, FakeSender, FakeSyncClient, SyncCall,
};

const TOKEN: &str = "secreto-de-pruebas";

struct Harness {
    config: AppConfig,
    operations: OperationService,
    crm: CrmService,
    email_queue: EmailQueueService,
    sync_queue: SyncQueueService,
    tasks: TaskService,
    ai: AiTaskService,
    search: SearchService,
    import: ImportService,
    pdf: PdfService,
    documents: DocumentService,
    sync_client: Arc<FakeSyncClient>,
}

impl Harness {
    async fn new(gateway: Arc<dyn LlmGateway>) -> Self {
        let pool = test_pool().await;
        let config = AppConfig {
            api_token: Some(TOKEN.to_string()),
            queue: fast_settings(),
            ..AppConfig::default()
        };
        let crm = CrmService::new(pool.clone());
        let sync_client = FakeSyncClient::ok();
        let sync_queue = SyncQueueService::new(
            pool.clone(),
            crm.clone(),
            sync_client.clone(),
            config.queue.clone(),
        );
        let pdf = PdfService::new(std::env::temp_dir().join("crm_handler_tests"));
        Self {
            operations: OperationService::new(pool.clone()),
            email_queue: EmailQueueService::new(pool.clone(), FakeSender::ok(), config.queue.clone()),
            tasks: TaskService::new(pool, None),
            ai: AiTaskService::new(gateway),
            search: SearchService::new(crm.clone()),
            import: ImportService::new(crm.clone(), sync_queue.clone()),
            documents: DocumentService::new(pdf.clone(), DocumentLayout::default()),
            pdf,
            sync_queue,
            sync_client,
            crm,
            config,
        }
    }
}

macro_rules! test_app {
    ($h:expr) => {
        test::init_service(
            App::new()
                .app_data(web::Data::new($h.config.clone()))
                .app_data(web::Data::new($h.operations.clone()))
                .app_data(web::Data::new($h.crm.clone()))
                .app_data(web::Data::new($h.email_queue.clone()))
                .app_data(web::Data::new($h.sync_queue.clone()))
                .app_data(web::Data::new($h.tasks.clone()))
                .app_data(web::Data::new($h.ai.clone()))
                .app_data(web::Data::new($h.search.clone()))
                .app_data(web::Data::new($h.import.clone()))
                .app_data(web::Data::new($h.pdf.clone()))
                .app_data(web::Data::new($h.documents.clone()))
                .configure(app::init_app),
        )
        .await
    };
}

fn bearer() -> (header::HeaderName, String) {
    (header::AUTHORIZATION, format!("Bearer {TOKEN}"))
}

#[actix_rt::test]
async fn process_endpoints_require_bearer_token() {
    let h = Harness::new(FakeGateway::replying(200, "{}")).await;
    let app = test_app!(h);

    let resp = test::call_service(
        &app,
        test::TestRequest::post().uri("/api/email-queue/process").to_request(),
    )
    .await;
    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);

    let resp = test::call_service(
        &app,
        test::TestRequest::post()
            .uri("/api/crm-sync/process")
            .insert_header((header::AUTHORIZATION, "Bearer otro"))
            .to_request(),
    )
    .await;
    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);

    let resp = test::call_service(
        &app,
        test::TestRequest::post()
            .uri("/api/email-queue/process")
            .insert_header(bearer())
            .to_request(),
    )
    .await;
    assert_eq!(resp.status(), StatusCode::OK);
    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body["success"], true);
    assert_eq!(body["summary"]["processed"], 0);
}

#[actix_rt::test]
async fn enqueue_then_process_email_is_tracked() {
    let h = Harness::new(FakeGateway::replying(200, "{}")).await;
    let app = test_app!(h);

    let resp = test::call_service(
        &app,
        test::TestRequest::post()
            .uri("/api/email-queue")
            .set_json(json!({
                "recipients": ["inversor@fondo.es"],
                "subject": "Teaser Proyecto Atlas",
                "html_body": "<p>Adjuntamos el teaser.</p>"
            }))
            .to_request(),
    )
    .await;
    assert_eq!(resp.status(), StatusCode::CREATED);

    let resp = test::call_service(
        &app,
        test::TestRequest::post()
            .uri("/api/email-queue/process")
            .insert_header(bearer())
            .to_request(),
    )
    .await;
    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body["summary"]["sent"], 1);

    let ops = h.operations.list_operations(1, 10).await.expect("operaciones");
    assert_eq!(ops.total, 1);
    assert_eq!(ops.items[0].operation_type, "email_queue");
    assert_eq!(ops.items[0].status, "done");
}

#[actix_rt::test]
async fn search_and_pipeline_routes() {
    let h = Harness::new(FakeGateway::replying(200, "{}")).await;
    seed_empresa(&h.crm, "Atlas Industrial SL", None).await;
    seed_mandato(&h.crm, "Proyecto Atlas", Some(1_000_000.0)).await;
    let app = test_app!(h);

    let body: Value = test::call_and_read_body_json(
        &app,
        test::TestRequest::get().uri("/api/search?q=atlas").to_request(),
    )
    .await;
    assert_eq!(body["total"], 2);

    let columns: Value = test::call_and_read_body_json(
        &app,
        test::TestRequest::get().uri("/api/pipeline").to_request(),
    )
    .await;
    let columns = columns.as_array().expect("array");
    assert_eq!(columns.len(), 9);
    assert_eq!(columns[0]["estado"], "prospeccion");
    assert_eq!(columns[0]["total_valor"], 1_000_000.0);
}

#[actix_rt::test]
async fn crm_routes_report_errors_as_json() {
    let h = Harness::new(FakeGateway::replying(200, "{}")).await;
    let app = test_app!(h);

    let resp = test::call_service(
        &app,
        test::TestRequest::get().uri("/api/empresas/no-existe").to_request(),
    )
    .await;
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);
    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body["success"], false);

    let resp = test::call_service(
        &app,
        test::TestRequest::post()
            .uri("/api/mandatos")
            .set_json(json!({ "nombre": "Sin tipo" }))
            .to_request(),
    )
    .await;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);

    let resp = test::call_service(
        &app,
        test::TestRequest::get()
            .uri("/api/calendar?desde=2026-12-01&hasta=2026-11-01")
            .to_request(),
    )
    .await;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
}

#[actix_rt::test]
async fn email_change_removes_old_brevo_contact() {
    let h = Harness::new(FakeGateway::replying(200, "{}")).await;
    let id = seed_contacto(&h.crm, "Ana", Some("ana@alfa.es"), None).await;
    let app = test_app!(h);

    let resp = test::call_service(
        &app,
        test::TestRequest::put()
            .uri(&format!("/api/contactos/{id}"))
            .set_json(json!({ "email": "Ana.Garcia@alfa.es" }))
            .to_request(),
    )
    .await;
    assert_eq!(resp.status(), StatusCode::OK);

    // Sin cambio de email no se encola ninguna baja
    let resp = test::call_service(
        &app,
        test::TestRequest::put()
            .uri(&format!("/api/contactos/{id}"))
            .set_json(json!({ "cargo": "CFO" }))
            .to_request(),
    )
    .await;
    assert_eq!(resp.status(), StatusCode::OK);

    let summary = h.sync_queue.process_queue().await.expect("procesar");
    assert_eq!(summary.sent, 2);
    let calls = h.sync_client.calls();
    assert_eq!(calls.len(), 2);
    assert!(calls.contains(&SyncCall::DeleteContact("ana@alfa.es".to_string())));
    assert!(calls.contains(&SyncCall::UpsertContact("ana.garcia@alfa.es".to_string())));
}

#[actix_rt::test]
async fn csv_import_route() {
    let h = Harness::new(FakeGateway::replying(200, "{}")).await;
    let app = test_app!(h);

    let resp = test::call_service(
        &app,
        test::TestRequest::post()
            .uri("/api/import/empresas?dry_run=true")
            .insert_header(bearer())
            .insert_header((header::CONTENT_TYPE, "text/csv"))
            .set_payload("nombre;cif\nAlfa SL;B1\nBeta SL;B2\n")
            .to_request(),
    )
    .await;
    assert_eq!(resp.status(), StatusCode::OK);
    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body["imported"], 2);
    assert_eq!(body["dry_run"], true);

    let resp = test::call_service(
        &app,
        test::TestRequest::post()
            .uri("/api/import/mandatos")
            .insert_header(bearer())
            .set_payload("x")
            .to_request(),
    )
    .await;
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);

    let resp = test::call_service(
        &app,
        test::TestRequest::post()
            .uri("/api/import/contactos")
            .insert_header(bearer())
            .set_payload(vec![0xff_u8, 0xfe, 0x00])
            .to_request(),
    )
    .await;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
}

#[actix_rt::test]
async fn ai_rate_limit_maps_to_429() {
    let h = Harness::new(FakeGateway::replying(429, "{\"error\":\"slow down\"}")).await;
    let app = test_app!(h);

    let resp = test::call_service(
        &app,
        test::TestRequest::post()
            .uri("/api/ai/parse-tasks")
            .insert_header(bearer())
            .set_json(json!({ "text": "Llamar al comprador el lunes" }))
            .to_request(),
    )
    .await;
    assert_eq!(resp.status(), StatusCode::TOO_MANY_REQUESTS);
    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body["success"], false);

    let ops = h.operations.list_operations(1, 10).await.expect("operaciones");
    assert_eq!(ops.items[0].operation_type, "ai_parse_tasks");
    assert_eq!(ops.items[0].status, "failed");
}

#[actix_rt::test]
async fn ai_parse_can_create_tasks() {
    let content = json!({
        "tasks": [
            { "title": "Enviar NDA a Fondo Norte", "priority": "alta", "due_date": "2026-10-23" },
            { "title": "" }
        ]
    })
    .to_string();
    let h = Harness::new(FakeGateway::replying(200, &completion_body(&content))).await;
    let app = test_app!(h);

    let body: Value = test::call_and_read_body_json(
        &app,
        test::TestRequest::post()
            .uri("/api/ai/parse-tasks")
            .insert_header(bearer())
            .set_json(json!({
                "text": "Enviar el NDA a Fondo Norte antes del jueves",
                "create": true,
                "default_assignee": "marta"
            }))
            .to_request(),
    )
    .await;
    assert_eq!(body["success"], true);
    assert_eq!(body["parsed"]["tasks"].as_array().map(Vec::len), Some(2));
    assert_eq!(body["created"]["total"], 2);
    assert_eq!(body["created"]["created"][0]["asignado_a"], "marta");
    assert_eq!(body["created"]["failed"][0]["index"], 1);
}

#[actix_rt::test]
async fn document_preview_returns_html() {
    let h = Harness::new(FakeGateway::replying(200, "{}")).await;
    let app = test_app!(h);

    let resp = test::call_service(
        &app,
        test::TestRequest::post()
            .uri("/api/documents/preview")
            .set_json(json!({
                "documento": {
                    "tipo": "nda",
                    "campos": {
                        "parte_reveladora": "Metalúrgica Norte SL",
                        "cif_reveladora": "B12345678",
                        "parte_receptora": "Inversiones Cantábrico SA",
                        "cif_receptora": "A87654321",
                        "proyecto": "Atlas",
                        "ciudad": "Bilbao",
                        "fecha": "19 de octubre de 2026"
                    }
                }
            }))
            .to_request(),
    )
    .await;
    assert_eq!(resp.status(), StatusCode::OK);
    assert!(resp.headers().contains_key("x-document-pages"));
    let html = test::read_body(resp).await;
    let html = String::from_utf8_lossy(&html);
    assert!(html.contains("Inversiones Cantábrico SA"));

    let resp = test::call_service(
        &app,
        test::TestRequest::get()
            .uri("/api/documents/files/no-existe.pdf")
            .to_request(),
    )
    .await;
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);
}
